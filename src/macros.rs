/// Declares a closed enumeration of spec tags that plugins may extend.
///
/// Every generated enum carries the listed built-in variants plus a
/// `Custom(String)` variant. Names are looked up against the built-ins first;
/// anything else goes through `HookRegistry::resolve_enum` and only becomes a
/// `Custom` value when a plugin claims it.
#[macro_export]
macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($kind:expr) {
            $( $(#[$vmeta:meta])* $variant:ident => $tag:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A value claimed by a plugin during enum resolution
            Custom(String),
        }

        impl $name {
            pub const KIND: $crate::enums::EnumKind = $kind;

            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $tag, )+
                    Self::Custom(tag) => tag.as_str(),
                }
            }

            /// Every built-in variant, in declaration order
            pub fn builtins() -> Vec<Self> {
                vec![$( Self::$variant ),+]
            }

            pub fn builtin(name: &str) -> Option<Self> {
                match name {
                    $( $tag => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Two-stage lookup: built-in tags, then the plugin extension hook
            pub fn resolve(name: &str, hooks: &$crate::hooks::HookRegistry) -> $crate::Result<Self> {
                if let Some(value) = Self::builtin(name) {
                    return Ok(value);
                }
                match hooks.resolve_enum(name, Self::KIND) {
                    Some(tag) => Ok(Self::builtin(&tag).unwrap_or(Self::Custom(tag))),
                    None => Err($crate::Error::EnumValueNotFound {
                        name: name.to_string(),
                        kind: Self::KIND,
                    }
                    .into()),
                }
            }

            pub fn is_custom(&self) -> bool {
                matches!(self, Self::Custom(_))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}
