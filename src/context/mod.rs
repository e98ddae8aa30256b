//! Run-level context shared by every target of a run.

use std::path::Path;
use std::sync::Mutex;

use eyre::WrapErr;
use serde_json::Value;

use crate::Result;
use crate::hooks::HookRegistry;
use crate::settings::Settings;

mod expr;
mod store;

pub use expr::{ExpressionResolver, MAX_SUBSTITUTIONS};
pub use store::{Namespace, Node, PathConflict, VariableStore};

#[derive(Debug)]
pub struct Context {
    pub settings: Settings,
    pub hooks: HookRegistry,
    store: VariableStore,
    output_target: Mutex<Option<String>>,
}

impl Context {
    /// Build a context and load the definition files named in `settings`
    pub fn new(settings: Settings, hooks: HookRegistry) -> Result<Self> {
        let ctx = Self {
            output_target: Mutex::new(settings.output_target.clone()),
            settings,
            hooks,
            store: VariableStore::default(),
        };
        for path in &ctx.settings.definitions {
            ctx.load_definition_file(path)?;
        }
        Ok(ctx)
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn resolver(&self) -> ExpressionResolver<'_> {
        ExpressionResolver::new(&self.store, &self.hooks)
    }

    pub fn resolve(&self, text: &str) -> Result<String> {
        self.resolver().resolve(text)
    }

    /// Resolve every string in a parameter tree, through nested objects and arrays
    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::String(s) => Value::String(self.resolve(s)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_value(v))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_value(v)?)))
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        })
    }

    pub fn load_definitions(&self, definitions: &Value) {
        if definitions.is_object() {
            self.store.load_definitions(definitions.clone());
        }
    }

    /// Merge a JSON, YAML or TOML definitions file into `Definitions`
    pub fn load_definition_file(&self, path: &Path) -> Result<()> {
        debug!("loading definitions from {}", path.display());
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read definitions file {}", path.display()))?;
        let value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&raw)?,
            Some("toml") => toml::from_str(&raw)?,
            _ => serde_json::from_str(&raw)?,
        };
        if !value.is_object() {
            eyre::bail!("definitions file {} must contain an object", path.display());
        }
        self.store.load_definitions(value);
        Ok(())
    }

    /// The first call wins unless the target was configured explicitly
    pub fn set_default_output_target(&self, target: &str) {
        let mut output_target = self.output_target.lock().unwrap();
        if output_target.is_none() {
            *output_target = Some(target.to_string());
        }
    }

    pub fn is_output_target(&self, target: &str) -> bool {
        self.output_target
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(target))
    }

    /// Record an output produced while running against `target`
    pub fn create_output(&self, name: &str, value: Value, target: &str) -> Result<()> {
        debug!("{target}: creating output {name} = {value}");
        self.store
            .set_output(name, value, self.is_output_target(target))
    }

    pub fn outputs(&self) -> Value {
        self.store.snapshot(Namespace::Outputs)
    }
}
