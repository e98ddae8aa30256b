//! Test spec documents.
//!
//! A document is parsed once per run into an immutable `TestSpec`. Every tag
//! (action, validation type and state, output source) goes through two-stage
//! enum resolution here, so an unknown tag fails the whole run before any
//! target is opened.

use std::fmt::{self, Display, Formatter};
use std::path::Path;

use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::{Action, OutputSource, ValidationState, ValidationType};
use crate::hooks::HookRegistry;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpec {
    #[serde(alias = "targets")]
    target_browsers: Vec<String>,
    path: String,
    #[serde(default)]
    definitions: Option<Map<String, Value>>,
    steps: Vec<RawStepDef>,
}

#[derive(Debug, Deserialize)]
struct RawStepDef {
    action: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
    #[serde(default, rename = "type")]
    validation_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// Type and state of a `Validate` step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDef {
    #[serde(rename = "type")]
    pub validation_type: ValidationType,
    pub state: ValidationState,
}

/// One step as written in the spec, with its tags resolved.
/// Target and parameters stay raw until the step runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDef {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub validation: Option<ValidationDef>,
    /// Resolved `parameters.source` of an output step
    #[serde(skip)]
    pub source: Option<OutputSource>,
}

impl StepDef {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            target: None,
            parameters: None,
            validation: None,
            source: None,
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters.as_object().cloned();
        self
    }

    pub fn validate(validation_type: ValidationType, state: ValidationState, target: &str) -> Self {
        let mut def = Self::new(Action::Validate).with_target(target);
        def.validation = Some(ValidationDef {
            validation_type,
            state,
        });
        def
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.as_ref().and_then(|p| p.get(name))
    }

    fn from_raw(raw: RawStepDef, hooks: &HookRegistry) -> Result<Self> {
        let action = Action::resolve(&raw.action, hooks)?;
        let validation = if action == Action::Validate {
            let (Some(validation_type), Some(state)) = (raw.validation_type, raw.state) else {
                return Err(Error::InvalidSpec(
                    "a Validate step requires both \"type\" and \"state\"".to_string(),
                )
                .into());
            };
            let validation_type = ValidationType::resolve(&validation_type, hooks)?;
            let state = ValidationState::resolve(&state, &validation_type, hooks)?;
            Some(ValidationDef {
                validation_type,
                state,
            })
        } else {
            None
        };
        let source = match raw.parameters.as_ref().and_then(|p| p.get("source")) {
            Some(Value::String(source)) => Some(OutputSource::resolve(source, hooks)?),
            Some(other) => {
                return Err(Error::InvalidSpec(format!(
                    "\"source\" must be a string, found {other}"
                ))
                .into());
            }
            None => None,
        };
        Ok(Self {
            action,
            target: raw.target,
            parameters: raw.parameters,
            validation,
            source,
        })
    }
}

impl Display for StepDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        if let Some(validation) = &self.validation {
            write!(f, " {} {}", validation.validation_type, validation.state)?;
        }
        if let Some(target) = &self.target {
            write!(f, " {target}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSpec {
    pub target_names: Vec<String>,
    pub root_path: String,
    pub definitions: Value,
    pub steps: Vec<StepDef>,
}

impl TestSpec {
    pub fn parse(raw: &str, hooks: &HookRegistry) -> Result<Self> {
        let raw: RawSpec = serde_json::from_str(raw).wrap_err("failed to parse test spec")?;
        Self::from_raw(raw, hooks)
    }

    pub fn from_value(value: Value, hooks: &HookRegistry) -> Result<Self> {
        let raw: RawSpec = serde_json::from_value(value).wrap_err("failed to parse test spec")?;
        Self::from_raw(raw, hooks)
    }

    /// Read a spec file; `.yaml`/`.yml` and `.toml` are accepted besides JSON
    #[tracing::instrument(level = "info", name = "spec.load", skip(path, hooks), fields(path = %path.display()))]
    pub fn from_file(path: &Path, hooks: &HookRegistry) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&raw)?,
            Some("toml") => toml::from_str(&raw)?,
            _ => serde_json::from_str(&raw)?,
        };
        Self::from_value(value, hooks)
            .wrap_err_with(|| format!("invalid test spec {}", path.display()))
    }

    fn from_raw(raw: RawSpec, hooks: &HookRegistry) -> Result<Self> {
        if raw.target_browsers.is_empty() {
            return Err(Error::InvalidSpec("no targets declared".to_string()).into());
        }
        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                StepDef::from_raw(step, hooks).wrap_err_with(|| format!("step {i} is invalid"))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "parsed spec with {} steps for {:?}",
            steps.len(),
            raw.target_browsers
        );
        Ok(Self {
            target_names: raw.target_browsers,
            root_path: raw.path,
            definitions: raw.definitions.map(Value::Object).unwrap_or(Value::Object(Map::new())),
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::enums::{UrlState, XPathState};

    #[test]
    fn test_parse() {
        let spec = TestSpec::parse(
            r#"{
                "targetBrowsers": ["Firefox", "Chrome"],
                "path": "https://example.com",
                "definitions": {"Search": "//input"},
                "steps": [
                    {"action": "SendKeys", "target": "${{ Definitions.Search }}", "parameters": {"data": "rust"}},
                    {"action": "Validate", "type": "URL", "state": "Contains", "target": "example"},
                    {"action": "Validate", "type": "XPath", "state": "VisualParity", "target": "//body",
                     "parameters": {"baselineID": "home"}},
                    {"action": "OutputValue", "target": "//h1", "parameters": {"source": "XPathText", "outputName": "title"}}
                ]
            }"#,
            &HookRegistry::default(),
        )
        .unwrap();
        assert_eq!(spec.target_names, vec!["Firefox", "Chrome"]);
        assert_eq!(spec.root_path, "https://example.com");
        assert_eq!(spec.definitions, json!({"Search": "//input"}));
        assert_eq!(spec.steps.len(), 4);
        assert_eq!(spec.steps[0].action, Action::SendKeys);
        assert_eq!(spec.steps[0].parameter("data"), Some(&json!("rust")));
        assert_eq!(
            spec.steps[1].validation,
            Some(ValidationDef {
                validation_type: ValidationType::Url,
                state: ValidationState::Url(UrlState::Contains),
            })
        );
        assert_eq!(
            spec.steps[2].validation.as_ref().map(|v| &v.state),
            Some(&ValidationState::XPath(XPathState::VisualParity))
        );
        assert_eq!(spec.steps[3].source, Some(OutputSource::XPathText));
    }

    #[test]
    fn test_validate_requires_type_and_state() {
        let err = TestSpec::from_value(
            json!({
                "targetBrowsers": ["Chrome"],
                "path": "/",
                "steps": [{"action": "Validate", "type": "URL", "target": "x"}]
            }),
            &HookRegistry::default(),
        )
        .unwrap_err();
        assert!(format!("{err:?}").contains("requires both"));
    }

    #[test]
    fn test_unknown_action_is_spec_error() {
        let err = TestSpec::from_value(
            json!({
                "targetBrowsers": ["Chrome"],
                "path": "/",
                "steps": [{"action": "Teleport"}]
            }),
            &HookRegistry::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::EnumValueNotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_source_is_spec_error() {
        assert!(
            TestSpec::from_value(
                json!({
                    "targetBrowsers": ["Chrome"],
                    "path": "/",
                    "steps": [{"action": "OutputValue", "target": "x",
                               "parameters": {"source": "Clipboard", "outputName": "o"}}]
                }),
                &HookRegistry::default(),
            )
            .is_err()
        );
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("login.yaml");
        std::fs::write(
            &path,
            "targets: [Chrome]\npath: http://localhost\nsteps:\n  - action: Refresh\n",
        )
        .unwrap();
        let spec = TestSpec::from_file(&path, &HookRegistry::default()).unwrap();
        assert_eq!(spec.target_names, vec!["Chrome"]);
        assert_eq!(spec.steps, vec![StepDef::new(Action::Refresh)]);
    }

    #[test]
    fn test_display() {
        let def = StepDef::validate(
            ValidationType::Url,
            ValidationState::Url(UrlState::Equals),
            "http://example.com",
        );
        assert_eq!(def.to_string(), "Validate URL Equals http://example.com");
    }
}
