//! Tags used by test specs.
//!
//! Each enum is closed over its built-in values; plugins may contribute more
//! through the `resolve_enum` hook, in which case the value arrives as `Custom`.

use serde::Serialize;

use crate::Result;
use crate::hooks::HookRegistry;

/// Which enumeration a name is being resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnumKind {
    Action,
    ValidationType,
    XPathState,
    UrlState,
    ValidationState,
    OutputSource,
}

tag_enum! {
    /// The action a step performs
    pub enum Action (EnumKind::Action) {
        Click => "Click",
        Clear => "Clear",
        SendKeys => "SendKeys",
        WaitForExistence => "WaitForExistence",
        WaitForVisibility => "WaitForVisibility",
        NavigateTo => "NavigateTo",
        Validate => "Validate",
        Refresh => "Refresh",
        AddCookies => "AddCookies",
        SetCookies => "SetCookies",
        RemoveCookie => "RemoveCookie",
        ClearCookies => "ClearCookies",
        NavigateForward => "NavigateForward",
        NavigateBack => "NavigateBack",
        SetBrowserSize => "SetBrowserSize",
        SetZoomLevel => "SetZoomLevel",
        Hover => "Hover",
        OutputValue => "OutputValue",
    }
}

tag_enum! {
    pub enum ValidationType (EnumKind::ValidationType) {
        XPath => "XPath",
        Url => "URL",
    }
}

tag_enum! {
    /// Assertions about an element located by XPath
    pub enum XPathState (EnumKind::XPathState) {
        Exists => "Exists",
        NotExists => "NotExists",
        Visible => "Visible",
        NotVisible => "NotVisible",
        TextMatches => "TextMatches",
        NotTextMatches => "NotTextMatches",
        HasProperty => "HasProperty",
        NotHasProperty => "NotHasProperty",
        PropertyHasValue => "PropertyHasValue",
        NotPropertyHasValue => "NotPropertyHasValue",
        HasAttribute => "HasAttribute",
        NotHasAttribute => "NotHasAttribute",
        AttributeHasValue => "AttributeHasValue",
        NotAttributeHasValue => "NotAttributeHasValue",
        VisualParity => "VisualParity",
    }
}

tag_enum! {
    /// Assertions about the current URL of a target
    pub enum UrlState (EnumKind::UrlState) {
        Contains => "Contains",
        NotContains => "NotContains",
        Equals => "Equals",
        NotEquals => "NotEquals",
        Matches => "Matches",
        NotMatches => "NotMatches",
    }
}

tag_enum! {
    /// Where an `OutputValue` step reads its value from
    pub enum OutputSource (EnumKind::OutputSource) {
        Literal => "Literal",
        XPathText => "XPathText",
        XPathProperty => "XPathProperty",
    }
}

/// The state a validation asserts. The set of valid states depends on the
/// validation type, so the state is resolved only after the type is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValidationState {
    XPath(XPathState),
    Url(UrlState),
    /// State of a plugin-provided validation type
    Custom(String),
}

impl ValidationState {
    pub fn resolve(
        name: &str,
        validation_type: &ValidationType,
        hooks: &HookRegistry,
    ) -> Result<Self> {
        Ok(match validation_type {
            ValidationType::XPath => Self::XPath(XPathState::resolve(name, hooks)?),
            ValidationType::Url => Self::Url(UrlState::resolve(name, hooks)?),
            ValidationType::Custom(_) => match hooks.resolve_enum(name, EnumKind::ValidationState) {
                Some(tag) => Self::Custom(tag),
                None => {
                    return Err(crate::Error::EnumValueNotFound {
                        name: name.to_string(),
                        kind: EnumKind::ValidationState,
                    }
                    .into());
                }
            },
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::XPath(state) => state.as_str(),
            Self::Url(state) => state.as_str(),
            Self::Custom(tag) => tag,
        }
    }
}

impl std::fmt::Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ValidationState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Kinds of images handed to the storage hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumIs)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageKind {
    Baseline,
    Treatment,
    Delta,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hooks::Plugin;

    struct ScrollPlugin;

    impl Plugin for ScrollPlugin {
        fn name(&self) -> &str {
            "scroll"
        }

        fn resolve_enum(&self, name: &str, kind: EnumKind) -> Option<String> {
            match (kind, name) {
                (EnumKind::Action, "ScrollTo") => Some("ScrollTo".to_string()),
                (EnumKind::Action, "Tap") => Some("Click".to_string()),
                _ => None,
            }
        }
    }

    #[test]
    fn test_builtin_lookup() {
        let hooks = HookRegistry::default();
        assert_eq!(Action::resolve("SendKeys", &hooks).unwrap(), Action::SendKeys);
        assert_eq!(
            ValidationType::resolve("URL", &hooks).unwrap(),
            ValidationType::Url
        );
        assert_eq!(ValidationType::Url.to_string(), "URL");
    }

    #[test]
    fn test_unknown_without_plugin_fails() {
        let hooks = HookRegistry::default();
        let err = Action::resolve("ScrollTo", &hooks).unwrap_err();
        match err.downcast_ref::<crate::Error>() {
            Some(crate::Error::EnumValueNotFound { name, kind }) => {
                assert_eq!(name, "ScrollTo");
                assert_eq!(*kind, EnumKind::Action);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plugin_extends_enum() {
        let mut hooks = HookRegistry::default();
        hooks.register(Arc::new(ScrollPlugin));
        let action = Action::resolve("ScrollTo", &hooks).unwrap();
        assert_eq!(action, Action::Custom("ScrollTo".to_string()));
        assert!(action.is_custom());
        // plugins answering with a built-in tag get the built-in variant
        assert_eq!(Action::resolve("Tap", &hooks).unwrap(), Action::Click);
    }

    #[test]
    fn test_state_depends_on_type() {
        let hooks = HookRegistry::default();
        let state = ValidationState::resolve("Equals", &ValidationType::Url, &hooks).unwrap();
        assert_eq!(state, ValidationState::Url(UrlState::Equals));
        assert!(ValidationState::resolve("Equals", &ValidationType::XPath, &hooks).is_err());
        assert!(
            ValidationState::resolve(
                "Anything",
                &ValidationType::Custom("Aria".to_string()),
                &hooks
            )
            .is_err()
        );
    }
}
