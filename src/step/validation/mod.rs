//! Assertion steps.
//!
//! A validation is built by the [`ValidationFactory`] from the declared type,
//! then dispatches on its declared state through a per-type handler table.
//! Assertions that do not hold produce failing reports; only errors raised
//! while checking (missing parameters, driver failures) abort the sequence.

use std::sync::Arc;

use super::{Step, StepCore, StepFactory, missing_target};
use crate::context::Context;
use crate::enums::{ValidationState, ValidationType};
use crate::report::{Report, ValidationReport};
use crate::spec::StepDef;
use crate::{Error, Result};

mod url;
mod visual_parity;
mod xpath;

pub use url::UrlValidation;
pub use visual_parity::VisualParity;
pub use xpath::XPathValidation;

/// Builds the validation matching a `Validate` step's type
#[derive(Debug, Default)]
pub struct ValidationFactory;

impl StepFactory for ValidationFactory {
    fn build(&self, ctx: &Arc<Context>, def: &StepDef) -> Result<Box<dyn Step>> {
        let Some(validation) = &def.validation else {
            return Err(Error::InvalidSpec(format!(
                "\"{}\" step requires a type and a state",
                def.action
            ))
            .into());
        };
        match &validation.validation_type {
            ValidationType::XPath => Ok(Box::new(XPathValidation::new(ctx, def)?)),
            ValidationType::Url => Ok(Box::new(UrlValidation::new(ctx, def)?)),
            ValidationType::Custom(name) => Err(Error::InvalidSpec(format!(
                "no step factory handles \"{name}\" validations"
            ))
            .into()),
        }
    }
}

/// State shared by every validation
#[derive(Debug, Clone)]
pub struct ValidationCore {
    pub step: StepCore,
    pub validation_type: ValidationType,
    pub state: ValidationState,
}

impl ValidationCore {
    pub fn new(ctx: &Arc<Context>, def: &StepDef) -> Result<Self> {
        let step = StepCore::new(ctx, def);
        let Some(validation) = def.validation.clone() else {
            return Err(Error::InvalidSpec(format!(
                "\"{}\" step requires a type and a state",
                def.action
            ))
            .into());
        };
        if step.raw_target().is_none() {
            return Err(Error::InvalidSpec(missing_target(&def.action)).into());
        }
        Ok(Self {
            step,
            validation_type: validation.validation_type,
            state: validation.state,
        })
    }

    pub fn unbound(&self) -> Self {
        Self {
            step: self.step.unbound(),
            ..self.clone()
        }
    }

    /// Report for this validation against the bound target. The target field
    /// carries the locator as declared, before expression resolution.
    pub fn validation_report(&self, success: bool, msg: impl Into<String>) -> Result<ValidationReport> {
        Ok(ValidationReport::new(
            self.validation_type.as_str(),
            self.step.raw_target().unwrap_or_default(),
            self.state.as_str(),
            self.step.target_name()?,
            success,
            msg,
        ))
    }

    pub fn report(&self, success: bool, msg: impl Into<String>) -> Result<Report> {
        Ok(self.validation_report(success, msg)?.into())
    }

    pub fn no_handler(&self) -> eyre::Report {
        Error::FailedStep(format!(
            "no handler for the \"{}\" state of {} validations",
            self.state, self.validation_type
        ))
        .into()
    }
}
