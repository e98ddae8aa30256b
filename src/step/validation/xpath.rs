use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use super::{ValidationCore, VisualParity};
use crate::context::Context;
use crate::driver::Driver;
use crate::enums::{Action, ValidationState, XPathState};
use crate::report::Report;
use crate::spec::StepDef;
use crate::step::{Step, param_string};
use crate::{Error, Result};

type Handler = fn(&XPathValidation) -> Result<Report>;

static HANDLERS: LazyLock<IndexMap<XPathState, Handler>> = LazyLock::new(|| {
    let handlers: [(XPathState, Handler); 15] = [
        (XPathState::Exists, |v| v.check(v.exists()?)),
        (XPathState::NotExists, |v| v.check(!v.exists()?)),
        (XPathState::Visible, |v| v.check(v.visible()?)),
        (XPathState::NotVisible, |v| v.check(!v.visible()?)),
        (XPathState::TextMatches, |v| v.text_matches(true)),
        (XPathState::NotTextMatches, |v| v.text_matches(false)),
        (XPathState::HasProperty, |v| v.check(v.property()?.is_some())),
        (XPathState::NotHasProperty, |v| v.check(v.property()?.is_none())),
        (XPathState::PropertyHasValue, |v| v.check(v.property_has_value()?)),
        (XPathState::NotPropertyHasValue, |v| v.check(!v.property_has_value()?)),
        (XPathState::HasAttribute, |v| v.check(v.attribute()?.is_some())),
        (XPathState::NotHasAttribute, |v| v.check(v.attribute()?.is_none())),
        (XPathState::AttributeHasValue, |v| v.check(v.attribute_has_value()?)),
        (XPathState::NotAttributeHasValue, |v| v.check(!v.attribute_has_value()?)),
        (XPathState::VisualParity, |v| v.visual_parity()),
    ];
    handlers.into_iter().collect()
});

/// Assertions about the element a target locator finds
#[derive(Debug, Clone)]
pub struct XPathValidation {
    core: ValidationCore,
    state: XPathState,
    visual_parity: Option<VisualParity>,
}

impl XPathValidation {
    pub fn new(ctx: &Arc<Context>, def: &StepDef) -> Result<Self> {
        let core = ValidationCore::new(ctx, def)?;
        let state = match &core.state {
            ValidationState::XPath(state) => state.clone(),
            other => {
                return Err(Error::InvalidSpec(format!("\"{other}\" is not an XPath state")).into());
            }
        };
        let visual_parity = match state {
            XPathState::VisualParity => Some(VisualParity::new(def)?),
            _ => None,
        };
        Ok(Self {
            core,
            state,
            visual_parity,
        })
    }

    fn check(&self, success: bool) -> Result<Report> {
        self.core.report(success, "")
    }

    fn exists(&self) -> Result<bool> {
        let target = self.core.step.required_target()?;
        Ok(!self.core.step.driver()?.find_elements(&target)?.is_empty())
    }

    fn visible(&self) -> Result<bool> {
        let element = self.core.step.element()?;
        self.core.step.driver()?.is_displayed(&element)
    }

    fn text_matches(&self, expect_match: bool) -> Result<Report> {
        let params = self.core.step.require(&["pattern"])?;
        let pattern = param_string(&params, "pattern").unwrap_or_default();
        let re = Regex::new(&pattern).map_err(|err| {
            Error::FailedStep(format!("invalid pattern \"{pattern}\": {err}"))
        })?;
        let element = self.core.step.element()?;
        let text = self.core.step.driver()?.text(&element)?;
        let matched = re.is_match(&text);
        let msg = match (expect_match, matched) {
            (true, false) => format!("Element text \"{text}\" does not match pattern \"{pattern}\""),
            (false, true) => format!("Element text \"{text}\" matches pattern \"{pattern}\""),
            _ => String::new(),
        };
        self.core.report(matched == expect_match, msg)
    }

    fn named(&self, names: &[&str]) -> Result<Map<String, Value>> {
        self.core.step.require(names)
    }

    fn property(&self) -> Result<Option<Value>> {
        let params = self.named(&["name"])?;
        let name = param_string(&params, "name").unwrap_or_default();
        let element = self.core.step.element()?;
        Ok(self
            .core
            .step
            .driver()?
            .property(&element, &name)?
            .filter(|value| !value.is_null()))
    }

    fn attribute(&self) -> Result<Option<String>> {
        let params = self.named(&["name"])?;
        let name = param_string(&params, "name").unwrap_or_default();
        let element = self.core.step.element()?;
        self.core.step.driver()?.attribute(&element, &name)
    }

    fn property_has_value(&self) -> Result<bool> {
        let params = self.named(&["name", "value"])?;
        let expected = &params["value"];
        Ok(self
            .property()?
            .is_some_and(|actual| value_matches(&actual, expected)))
    }

    fn attribute_has_value(&self) -> Result<bool> {
        let params = self.named(&["name", "value"])?;
        let expected = &params["value"];
        Ok(self
            .attribute()?
            .is_some_and(|actual| value_matches(&Value::String(actual), expected)))
    }

    fn visual_parity(&self) -> Result<Report> {
        let parity = self.visual_parity.as_ref().ok_or_else(|| self.core.no_handler())?;
        parity.perform(&self.core)
    }
}

/// Property values are compared as JSON, falling back to their text so that
/// `"value": "3"` matches a numeric `3`
fn value_matches(actual: &Value, expected: &Value) -> bool {
    fn text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
    actual == expected || text(actual) == text(expected)
}

impl Step for XPathValidation {
    fn action(&self) -> &Action {
        &self.core.step.action
    }

    fn with_driver(&mut self, driver: Arc<dyn Driver>) {
        self.core.step.bind(driver);
    }

    fn perform(&self) -> Result<Option<Report>> {
        let handler = HANDLERS.get(&self.state).ok_or_else(|| self.core.no_handler())?;
        let report = handler(self)?;
        trace!(
            "{}: {} {}: {}",
            self.core.step.target_name()?,
            self.state,
            self.core.step.raw_target().unwrap_or_default(),
            report.is_success()
        );
        Ok(Some(report))
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(Self {
            core: self.core.unbound(),
            state: self.state.clone(),
            visual_parity: self.visual_parity.clone(),
        })
    }
}
