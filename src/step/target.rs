use std::sync::Arc;

use eyre::WrapErr;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::StepSequence;
use crate::Result;
use crate::context::Context;
use crate::driver::DriverFactory;
use crate::report::Report;

/// Runs one copy of a sequence per target.
///
/// Up to `settings.jobs` targets run at once. Reports are returned grouped by
/// target in the order the targets were declared, whatever order they finish in.
pub struct TargetRunSet {
    ctx: Arc<Context>,
    sequence: StepSequence,
    targets: Vec<String>,
}

impl TargetRunSet {
    pub fn new(ctx: Arc<Context>, sequence: &StepSequence, targets: &[String]) -> Self {
        Self {
            ctx,
            sequence: sequence.clone(),
            targets: targets.to_vec(),
        }
    }

    #[tracing::instrument(level = "info", name = "targets.run", skip_all, fields(targets = self.targets.len()))]
    pub async fn run(self, drivers: Arc<dyn DriverFactory>, root_path: &str) -> Result<Vec<Report>> {
        let semaphore = Arc::new(Semaphore::new(self.ctx.settings.jobs.get()));
        let mut set = JoinSet::new();
        for (index, target) in self.targets.iter().enumerate() {
            let ctx = self.ctx.clone();
            let drivers = drivers.clone();
            let sequence = self.sequence.clone();
            let target = target.clone();
            let root_path = root_path.to_string();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                let handle = tokio::task::spawn_blocking(move || {
                    run_target(&ctx, drivers.as_ref(), sequence, &target, &root_path)
                });
                let reports = match handle.await {
                    Ok(reports) => reports?,
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(e) => return Err(e.into()),
                };
                Ok::<_, eyre::Report>((index, reports))
            });
        }
        let mut results: Vec<Vec<Report>> = vec![vec![]; self.targets.len()];
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok((index, reports))) => results[index] = reports,
                Ok(Err(err)) => return Err(err),
                Err(e) => match e.try_into_panic() {
                    Ok(e) => std::panic::resume_unwind(e),
                    Err(e) => return Err(e.into()),
                },
            }
        }
        Ok(results.into_iter().flatten().collect())
    }
}

/// Opens a driver for `target`, loads the root page and runs the sequence.
/// The driver is quit afterwards unless targets are kept open for debugging.
#[tracing::instrument(level = "info", name = "target.run", skip(ctx, drivers, sequence, root_path))]
fn run_target(
    ctx: &Context,
    drivers: &dyn DriverFactory,
    mut sequence: StepSequence,
    target: &str,
    root_path: &str,
) -> Result<Vec<Report>> {
    let driver = drivers
        .open(target)
        .wrap_err_with(|| format!("failed to open target {target}"))?;
    sequence.with_driver(driver.clone());
    let result = ctx.resolve(root_path).and_then(|root| {
        debug!("{target}: navigating to {root}");
        driver.navigate_to(&root)?;
        sequence.run(ctx.settings.suppress_failures())
    });
    if ctx.settings.close_targets()
        && let Err(err) = driver.quit()
    {
        warn!("{target}: failed to quit driver: {err}");
    }
    let reports = result?;
    info!("{target}: {} reports ({})", reports.len(), sequence.state());
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;

    use serde_json::json;

    use super::*;
    use crate::driver::{Driver, MemoryDriver, MemoryDriverFactory, MemoryElement};
    use crate::hooks::HookRegistry;
    use crate::settings::Settings;
    use crate::spec::TestSpec;
    use crate::step::StepFactoryRegistry;

    fn spec() -> TestSpec {
        TestSpec::from_value(
            json!({
                "targetBrowsers": ["Firefox", "Chrome", "Edge"],
                "path": "https://example.com",
                "steps": [
                    {"action": "Click", "target": "//a[@id='docs']"},
                    {"action": "Validate", "type": "URL", "state": "Contains", "target": "/docs"}
                ]
            }),
            &HookRegistry::default(),
        )
        .unwrap()
    }

    fn factory() -> Arc<MemoryDriverFactory> {
        Arc::new(MemoryDriverFactory::new(|target| {
            let driver = MemoryDriver::new(target);
            match target {
                // the docs link is missing on Edge
                "Edge" => driver,
                _ => driver.with_element(
                    "//a[@id='docs']",
                    MemoryElement::new().href("https://example.com/docs"),
                ),
            }
        }))
    }

    async fn run(settings: Settings, drivers: Arc<MemoryDriverFactory>) -> Vec<Report> {
        let spec = spec();
        let ctx = Arc::new(Context::new(settings, HookRegistry::default()).unwrap());
        let sequence =
            StepSequence::build(&ctx, &StepFactoryRegistry::default(), &spec.steps).unwrap();
        TargetRunSet::new(ctx, &sequence, &spec.target_names)
            .run(drivers, &spec.root_path)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reports_follow_declaration_order() {
        let settings = Settings {
            jobs: NonZero::new(3).unwrap(),
            ..Default::default()
        };
        let reports = run(settings, factory()).await;
        let names: Vec<_> = reports.iter().map(|r| r.target_name().to_string()).collect();
        assert_eq!(names, vec!["Firefox", "Chrome", "Edge"]);
        assert!(reports[0].is_success());
        assert!(reports[1].is_success());
        assert!(reports[2].is_critical());
    }

    #[tokio::test]
    async fn test_drivers_are_quit_unless_debugging() {
        let drivers = factory();
        run(Settings::default(), drivers.clone()).await;
        for driver in drivers.opened() {
            assert!(driver.is_quit(), "{}", driver.name());
            assert_eq!(driver.events()[0], "navigate https://example.com");
        }

        let drivers = Arc::new(MemoryDriverFactory::new(|target| {
            MemoryDriver::new(target).with_element(
                "//a[@id='docs']",
                MemoryElement::new().href("https://example.com/docs"),
            )
        }));
        let debug = Settings {
            debug: true,
            ..Default::default()
        };
        run(debug, drivers.clone()).await;
        assert!(drivers.opened().iter().all(|d| !d.is_quit()));
    }
}
