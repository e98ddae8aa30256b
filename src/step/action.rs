use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::{Step, StepCore, missing_parameter, param_f64, param_string};
use crate::context::Context;
use crate::driver::Driver;
use crate::enums::Action;
use crate::report::Report;
use crate::spec::StepDef;
use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Steps that drive the target without producing a report
#[derive(Debug, Clone)]
pub struct ActionStep {
    core: StepCore,
}

impl ActionStep {
    pub fn new(ctx: &Arc<Context>, def: &StepDef) -> Self {
        Self {
            core: StepCore::new(ctx, def),
        }
    }

    pub fn build(ctx: &Arc<Context>, def: &StepDef) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self::new(ctx, def)))
    }

    fn driver(&self) -> Result<&Arc<dyn Driver>> {
        self.core.driver()
    }

    fn required_string(&self, name: &str) -> Result<String> {
        let params = self.core.require(&[name])?;
        param_string(&params, name)
            .ok_or_else(|| Error::FailedStep(missing_parameter(name, &self.core.action)).into())
    }

    fn required_number(&self, name: &str) -> Result<f64> {
        let params = self.core.require(&[name])?;
        param_f64(&params, name).ok_or_else(|| {
            Error::FailedStep(format!(
                "\"{name}\" parameter of \"{}\" action must be a number",
                self.core.action
            ))
            .into()
        })
    }

    fn click(&self) -> Result<()> {
        let element = self.core.element()?;
        self.driver()?.click(&element)
    }

    fn clear(&self) -> Result<()> {
        let element = self.core.element()?;
        self.driver()?.clear(&element)
    }

    fn hover(&self) -> Result<()> {
        let element = self.core.element()?;
        self.driver()?.hover(&element)
    }

    fn send_keys(&self) -> Result<()> {
        let data = self.required_string("data")?;
        let element = self.core.element()?;
        self.driver()?.send_keys(&element, &data)
    }

    fn navigate_to(&self) -> Result<()> {
        let url = self.core.required_target()?;
        self.driver()?.navigate_to(&url)
    }

    /// Poll `condition` until it holds or `timeoutInSeconds` passes
    fn wait_for(&self, what: &str, condition: impl Fn(&dyn Driver, &str) -> Result<bool>) -> Result<()> {
        let target = self.core.required_target()?;
        let seconds = self.required_number("timeoutInSeconds")?;
        let invalid = || {
            Error::FailedStep(format!(
                "invalid timeoutInSeconds {seconds} for \"{}\" action",
                self.core.action
            ))
        };
        let timeout = Duration::try_from_secs_f64(seconds.max(0.0)).map_err(|_| invalid())?;
        let driver = self.driver()?;
        let deadline = Instant::now().checked_add(timeout).ok_or_else(invalid)?;
        loop {
            if condition(driver.as_ref(), &target)? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::FailedStep(format!(
                    "timed out after {:.1}s waiting for \"{target}\" to {what}",
                    timeout.as_secs_f64()
                ))
                .into());
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    fn wait_for_existence(&self) -> Result<()> {
        self.wait_for("exist", |driver, target| {
            Ok(!driver.find_elements(target)?.is_empty())
        })
    }

    fn wait_for_visibility(&self) -> Result<()> {
        self.wait_for("become visible", |driver, target| {
            for element in driver.find_elements(target)? {
                if driver.is_displayed(&element)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    fn set_browser_size(&self) -> Result<()> {
        self.core.require(&["width", "height"])?;
        let width = self.required_number("width")?;
        let height = self.required_number("height")?;
        self.driver()?
            .set_window_size(width.round() as u32, height.round() as u32)
    }

    fn add_cookies(&self) -> Result<()> {
        let params = self.core.require(&["cookieJar"])?;
        let driver = self.driver()?;
        match &params["cookieJar"] {
            Value::Array(cookies) => {
                for cookie in cookies {
                    driver.add_cookie(cookie)?;
                }
                Ok(())
            }
            cookie => driver.add_cookie(cookie),
        }
    }

    fn set_cookies(&self) -> Result<()> {
        self.core.require(&["cookieJar"])?;
        self.driver()?.delete_all_cookies()?;
        self.add_cookies()
    }

    fn remove_cookie(&self) -> Result<()> {
        let name = self.required_string("cookieName")?;
        self.driver()?.delete_cookie(&name)
    }

    fn set_zoom_level(&self) -> Result<()> {
        let zoom = self.required_number("zoomLevel")?;
        self.driver()?
            .execute_script(&format!("document.body.style.zoom=\"{zoom}%\""))
    }
}

impl Step for ActionStep {
    fn action(&self) -> &Action {
        &self.core.action
    }

    fn with_driver(&mut self, driver: Arc<dyn Driver>) {
        self.core.bind(driver);
    }

    fn perform(&self) -> Result<Option<Report>> {
        match &self.core.action {
            Action::Click => self.click()?,
            Action::Clear => self.clear()?,
            Action::Hover => self.hover()?,
            Action::SendKeys => self.send_keys()?,
            Action::NavigateTo => self.navigate_to()?,
            Action::WaitForExistence => self.wait_for_existence()?,
            Action::WaitForVisibility => self.wait_for_visibility()?,
            Action::Refresh => self.driver()?.refresh()?,
            Action::NavigateBack => self.driver()?.back()?,
            Action::NavigateForward => self.driver()?.forward()?,
            Action::SetBrowserSize => self.set_browser_size()?,
            Action::AddCookies => self.add_cookies()?,
            Action::SetCookies => self.set_cookies()?,
            Action::RemoveCookie => self.remove_cookie()?,
            Action::ClearCookies => self.driver()?.delete_all_cookies()?,
            Action::SetZoomLevel => self.set_zoom_level()?,
            action @ (Action::Validate | Action::OutputValue | Action::Custom(_)) => {
                return Err(Error::FailedStep(format!(
                    "\"{action}\" is not a basic action"
                ))
                .into());
            }
        }
        Ok(None)
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(Self {
            core: self.core.unbound(),
        })
    }
}
