use std::sync::Arc;

use serde_json::Value;

use super::{Step, StepCore, missing_parameter, missing_target, param_string};
use crate::context::Context;
use crate::driver::Driver;
use crate::enums::{Action, OutputSource};
use crate::report::Report;
use crate::spec::StepDef;
use crate::{Error, Result};

/// Publishes a value under `outputName` for later steps to reference as
/// `${{ Validation.<outputName> }}`
#[derive(Debug, Clone)]
pub struct OutputValueStep {
    core: StepCore,
    source: OutputSource,
}

impl OutputValueStep {
    pub fn new(ctx: &Arc<Context>, def: &StepDef) -> Result<Self> {
        let core = StepCore::new(ctx, def);
        if core.raw_target().is_none() {
            return Err(Error::InvalidSpec(missing_target(&def.action)).into());
        }
        for name in ["source", "outputName"] {
            if !core.has_raw_parameter(name) {
                return Err(Error::InvalidSpec(missing_parameter(name, &def.action)).into());
            }
        }
        let source = def.source.clone().ok_or_else(|| {
            Error::InvalidSpec(missing_parameter("source", &def.action))
        })?;
        Ok(Self { core, source })
    }

    pub fn build(ctx: &Arc<Context>, def: &StepDef) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self::new(ctx, def)?))
    }

    fn value(&self) -> Result<Value> {
        match &self.source {
            OutputSource::Literal => Ok(Value::String(self.core.required_target()?)),
            OutputSource::XPathText => {
                let element = self.core.element()?;
                Ok(Value::String(self.core.driver()?.text(&element)?))
            }
            OutputSource::XPathProperty => {
                let params = self.core.require(&["propertyName"])?;
                let name = param_string(&params, "propertyName").unwrap_or_default();
                let element = self.core.element()?;
                Ok(self
                    .core
                    .driver()?
                    .property(&element, &name)?
                    .unwrap_or(Value::Null))
            }
            OutputSource::Custom(source) => Err(Error::FailedStep(format!(
                "output source \"{source}\" has no built-in handler"
            ))
            .into()),
        }
    }
}

impl Step for OutputValueStep {
    fn action(&self) -> &Action {
        &self.core.action
    }

    fn with_driver(&mut self, driver: Arc<dyn Driver>) {
        self.core.bind(driver);
    }

    fn perform(&self) -> Result<Option<Report>> {
        let params = self.core.require(&["outputName"])?;
        let name = param_string(&params, "outputName").unwrap_or_default();
        debug!(
            "creating value output {name} from {} {:?}",
            self.source,
            self.core.raw_target()
        );
        let value = self.value()?;
        self.core
            .ctx
            .create_output(&name, value, &self.core.target_name()?)?;
        Ok(None)
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(Self {
            core: self.core.unbound(),
            source: self.source.clone(),
        })
    }
}
