use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use regex::Regex;

use super::ValidationCore;
use crate::context::Context;
use crate::driver::Driver;
use crate::enums::{Action, UrlState, ValidationState};
use crate::report::Report;
use crate::spec::StepDef;
use crate::step::Step;
use crate::{Error, Result};

type Check = fn(url: &str, target: &str) -> Result<bool>;

static CHECKS: LazyLock<IndexMap<UrlState, Check>> = LazyLock::new(|| {
    let checks: [(UrlState, Check); 6] = [
        (UrlState::Contains, |url, target| Ok(url.contains(target))),
        (UrlState::NotContains, |url, target| Ok(!url.contains(target))),
        (UrlState::Equals, |url, target| Ok(url == target)),
        (UrlState::NotEquals, |url, target| Ok(url != target)),
        (UrlState::Matches, |url, target| Ok(pattern(target)?.is_match(url))),
        (UrlState::NotMatches, |url, target| Ok(!pattern(target)?.is_match(url))),
    ];
    checks.into_iter().collect()
});

fn pattern(target: &str) -> Result<Regex> {
    Regex::new(target)
        .map_err(|err| Error::FailedStep(format!("invalid URL pattern \"{target}\": {err}")).into())
}

/// Assertions about the URL the target is currently on
#[derive(Debug, Clone)]
pub struct UrlValidation {
    core: ValidationCore,
    state: UrlState,
}

impl UrlValidation {
    pub fn new(ctx: &Arc<Context>, def: &StepDef) -> Result<Self> {
        let core = ValidationCore::new(ctx, def)?;
        let state = match &core.state {
            ValidationState::Url(state) => state.clone(),
            other => {
                return Err(Error::InvalidSpec(format!("\"{other}\" is not a URL state")).into());
            }
        };
        Ok(Self { core, state })
    }
}

impl Step for UrlValidation {
    fn action(&self) -> &Action {
        &self.core.step.action
    }

    fn with_driver(&mut self, driver: Arc<dyn Driver>) {
        self.core.step.bind(driver);
    }

    fn perform(&self) -> Result<Option<Report>> {
        let check = CHECKS.get(&self.state).ok_or_else(|| self.core.no_handler())?;
        let target = self.core.step.required_target()?;
        let url = self.core.step.driver()?.current_url()?;
        let success = check(&url, &target)?;
        trace!("{}: URL {} {target}: {success}", self.core.step.target_name()?, self.state);
        let msg = if success {
            String::new()
        } else {
            format!("Expected URL: \"{target}\", Received URL \"{url}\"")
        };
        Ok(Some(self.core.report(success, msg)?))
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(Self {
            core: self.core.unbound(),
            state: self.state.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;
    use crate::enums::ValidationType;
    use crate::hooks::HookRegistry;
    use crate::settings::Settings;

    fn run(state: UrlState, target: &str) -> Report {
        let ctx = Arc::new(Context::new(Settings::default(), HookRegistry::default()).unwrap());
        let def = StepDef::validate(ValidationType::Url, ValidationState::Url(state), target);
        let mut step = UrlValidation::new(&ctx, &def).unwrap();
        step.with_driver(Arc::new(
            MemoryDriver::new("Chrome").with_url("https://example.com/docs/intro"),
        ));
        step.perform().unwrap().unwrap()
    }

    #[test]
    fn test_states() {
        let cases = [
            (UrlState::Contains, "/docs", true),
            (UrlState::Contains, "/blog", false),
            (UrlState::NotContains, "/blog", true),
            (UrlState::Equals, "https://example.com/docs/intro", true),
            (UrlState::Equals, "https://example.com", false),
            (UrlState::NotEquals, "https://example.com", true),
            (UrlState::Matches, r"docs/\w+$", true),
            (UrlState::Matches, r"^docs", false),
            (UrlState::NotMatches, r"^http://", true),
        ];
        for (state, target, expected) in cases {
            let report = run(state.clone(), target);
            assert_eq!(report.is_success(), expected, "{state} {target}");
        }
    }

    #[test]
    fn test_failure_message() {
        let report = run(UrlState::Equals, "https://example.com/");
        let validation = report.validation().unwrap();
        assert_eq!(validation.validation_type, "URL");
        assert_eq!(validation.state, "Equals");
        assert_eq!(validation.target_name, "Chrome");
        assert_eq!(
            validation.msg,
            "Expected URL: \"https://example.com/\", Received URL \"https://example.com/docs/intro\""
        );
    }

    #[test]
    fn test_state_must_belong_to_type() {
        let ctx = Arc::new(Context::new(Settings::default(), HookRegistry::default()).unwrap());
        let def = StepDef::validate(
            ValidationType::Url,
            ValidationState::XPath(crate::enums::XPathState::Exists),
            "x",
        );
        assert!(UrlValidation::new(&ctx, &def).is_err());
    }
}
