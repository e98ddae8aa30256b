//! Step construction and execution.
//!
//! A step is built from an immutable [`StepDef`] by the factory registered for
//! its action, then bound to the driver of the target it runs against. Targets
//! never share a step: each one gets its own copy of the sequence.
//!
//! # Module Organization
//!
//! - [`factory`] - Action to factory mapping, extensible by plugins
//! - [`action`] - Pointer, keyboard, navigation, cookie and window steps
//! - [`output`] - Steps that publish values for later steps
//! - [`validation`] - XPath, URL and visual parity assertions
//! - [`sequence`] - Running the steps of one target in order
//! - [`target`] - Fanning a sequence out to every target
//!
//! # Usage
//!
//! ```ignore
//! let registry = StepFactoryRegistry::default();
//! let sequence = StepSequence::build(&ctx, &registry, &spec.steps)?;
//! let reports = TargetRunSet::new(ctx, &sequence, &spec.target_names)
//!     .run(drivers, &spec.root_path)
//!     .await?;
//! ```

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::Context;
use crate::driver::{Driver, ElementRef};
use crate::enums::Action;
use crate::report::Report;
use crate::spec::StepDef;
use crate::{Error, Result};

mod action;
mod factory;
mod output;
mod sequence;
mod target;
pub mod validation;

pub use action::ActionStep;
pub use factory::{StepFactory, StepFactoryRegistry};
pub use output::OutputValueStep;
pub use sequence::{SequenceState, StepSequence};
pub use target::TargetRunSet;

/// An executable step.
///
/// `with_driver` binds the target's driver; `perform` runs the step and
/// returns its report, if the step produces one.
pub trait Step: Send + Sync + Debug {
    fn action(&self) -> &Action;

    fn with_driver(&mut self, driver: Arc<dyn Driver>);

    fn perform(&self) -> Result<Option<Report>>;

    /// Independent copy with no driver bound
    fn box_clone(&self) -> Box<dyn Step>;
}

impl Clone for Box<dyn Step> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// State every built-in step carries: the raw target and parameters from the
/// spec and the driver slot. Target and parameters are resolved on each access
/// since outputs of earlier steps may change what they resolve to.
#[derive(Clone)]
pub struct StepCore {
    pub ctx: Arc<Context>,
    pub action: Action,
    target: Option<String>,
    parameters: Option<Map<String, Value>>,
    driver: Option<Arc<dyn Driver>>,
}

impl Debug for StepCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepCore")
            .field("action", &self.action)
            .field("target", &self.target)
            .field("parameters", &self.parameters)
            .field("driver", &self.driver.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

impl StepCore {
    pub fn new(ctx: &Arc<Context>, def: &StepDef) -> Self {
        Self {
            ctx: ctx.clone(),
            action: def.action.clone(),
            target: def.target.clone(),
            parameters: def.parameters.clone(),
            driver: None,
        }
    }

    /// Copy of the configuration without the driver
    pub fn unbound(&self) -> Self {
        Self {
            driver: None,
            ..self.clone()
        }
    }

    pub fn bind(&mut self, driver: Arc<dyn Driver>) {
        self.driver = Some(driver);
    }

    pub fn raw_target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn has_raw_parameter(&self, name: &str) -> bool {
        self.parameters
            .as_ref()
            .is_some_and(|p| p.contains_key(name))
    }

    pub fn target(&self) -> Result<Option<String>> {
        self.target
            .as_deref()
            .map(|t| self.ctx.resolve(t))
            .transpose()
    }

    pub fn required_target(&self) -> Result<String> {
        self.target()?
            .ok_or_else(|| Error::FailedStep(missing_target(&self.action)).into())
    }

    pub fn parameters(&self) -> Result<Map<String, Value>> {
        match &self.parameters {
            Some(params) => match self.ctx.resolve_value(&Value::Object(params.clone()))? {
                Value::Object(map) => Ok(map),
                _ => Ok(Map::new()),
            },
            None => Ok(Map::new()),
        }
    }

    /// Resolved parameters, failing the step when any of `names` is absent
    pub fn require(&self, names: &[&str]) -> Result<Map<String, Value>> {
        let params = self.parameters()?;
        for name in names {
            if !params.contains_key(*name) {
                return Err(Error::FailedStep(missing_parameter(name, &self.action)).into());
            }
        }
        Ok(params)
    }

    pub fn driver(&self) -> Result<&Arc<dyn Driver>> {
        self.driver
            .as_ref()
            .ok_or_else(|| Error::NoDriver(self.action.to_string()).into())
    }

    pub fn target_name(&self) -> Result<String> {
        Ok(self.driver()?.name().to_string())
    }

    /// First element matching the resolved target
    pub fn element(&self) -> Result<ElementRef> {
        let target = self.required_target()?;
        self.driver()?.find_element(&target)
    }
}

pub fn missing_parameter(name: &str, action: &Action) -> String {
    format!("\"{name}\" parameter not specified for \"{action}\" action")
}

pub fn missing_target(action: &Action) -> String {
    format!("No specified target for \"{action}\" action")
}

/// Parameter as text: strings verbatim, other scalars as JSON
pub fn param_string(params: &Map<String, Value>, name: &str) -> Option<String> {
    params.get(name).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Parameter as a number, accepting numeric strings
pub fn param_f64(params: &Map<String, Value>, name: &str) -> Option<f64> {
    match params.get(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::driver::MemoryDriver;
    use crate::hooks::HookRegistry;
    use crate::settings::Settings;

    fn ctx() -> Arc<Context> {
        Arc::new(Context::new(Settings::default(), HookRegistry::default()).unwrap())
    }

    #[test]
    fn test_target_and_parameters_resolve_on_every_access() {
        let ctx = ctx();
        let def = StepDef::new(Action::SendKeys)
            .with_target("//input[@name='${{ Validation.field }}']")
            .with_parameters(json!({"data": "${{ Validation.value }}"}));
        let core = StepCore::new(&ctx, &def);
        assert!(core.target().is_err());
        ctx.create_output("field", json!("q"), "Chrome").unwrap();
        ctx.create_output("value", json!("first"), "Chrome").unwrap();
        assert_eq!(core.target().unwrap().unwrap(), "//input[@name='q']");
        assert_eq!(core.parameters().unwrap()["data"], json!("first"));
        ctx.create_output("value", json!("second"), "Chrome").unwrap();
        assert_eq!(core.parameters().unwrap()["data"], json!("second"));
    }

    #[test]
    fn test_missing_inputs() {
        let ctx = ctx();
        let core = StepCore::new(&ctx, &StepDef::new(Action::SendKeys));
        assert_eq!(
            core.required_target().unwrap_err().to_string(),
            "No specified target for \"SendKeys\" action"
        );
        assert_eq!(
            core.require(&["data"]).unwrap_err().to_string(),
            "\"data\" parameter not specified for \"SendKeys\" action"
        );
        assert!(matches!(
            core.driver().err().unwrap().downcast_ref::<Error>(),
            Some(Error::NoDriver(_))
        ));
    }

    #[test]
    fn test_unbound_drops_driver() {
        let ctx = ctx();
        let mut core = StepCore::new(&ctx, &StepDef::new(Action::Refresh));
        core.bind(Arc::new(MemoryDriver::new("Chrome")));
        assert_eq!(core.target_name().unwrap(), "Chrome");
        assert!(core.unbound().driver().is_err());
    }

    #[test]
    fn test_param_helpers() {
        let params = json!({"width": 800, "height": "600", "name": "x", "flag": true});
        let params = params.as_object().unwrap();
        assert_eq!(param_f64(params, "width"), Some(800.0));
        assert_eq!(param_f64(params, "height"), Some(600.0));
        assert_eq!(param_f64(params, "name"), None);
        assert_eq!(param_string(params, "flag").as_deref(), Some("true"));
        assert_eq!(param_string(params, "missing"), None);
    }
}
