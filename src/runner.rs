//! Runs a parsed spec end to end.

use std::sync::Arc;

use crate::Result;
use crate::context::Context;
use crate::driver::DriverFactory;
use crate::hooks::HookRegistry;
use crate::report::ReportSummary;
use crate::settings::Settings;
use crate::spec::TestSpec;
use crate::step::{StepFactoryRegistry, StepSequence, TargetRunSet};

pub struct Runner {
    ctx: Arc<Context>,
    drivers: Arc<dyn DriverFactory>,
}

impl Runner {
    pub fn new(settings: Settings, hooks: HookRegistry, drivers: Arc<dyn DriverFactory>) -> Result<Self> {
        Ok(Self::with_context(Arc::new(Context::new(settings, hooks)?), drivers))
    }

    /// Runs against an existing context, keeping whatever earlier runs stored in it
    pub fn with_context(ctx: Arc<Context>, drivers: Arc<dyn DriverFactory>) -> Self {
        Self { ctx, drivers }
    }

    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Builds the spec's steps for every target, runs them and summarizes the
    /// reports. Errors building steps abort before any target is opened.
    #[tracing::instrument(level = "info", name = "runner.execute", skip_all, fields(run_id = %self.ctx.settings.run_id, targets = spec.target_names.len(), steps = spec.steps.len()))]
    pub async fn execute(&self, spec: &TestSpec) -> Result<ReportSummary> {
        let ctx = &self.ctx;
        ctx.load_definitions(&spec.definitions);
        if let Some(first) = spec.target_names.first() {
            ctx.set_default_output_target(first);
        }
        ctx.hooks.before_validate(spec);

        let mut registry = StepFactoryRegistry::default();
        ctx.hooks.augment_step_factories(&mut registry);
        let sequence = StepSequence::build(ctx, &registry, &spec.steps)?;
        info!(
            "running {} steps against {}",
            sequence.len(),
            spec.target_names.join(", ")
        );

        let reports = TargetRunSet::new(ctx.clone(), &sequence, &spec.target_names)
            .run(self.drivers.clone(), &spec.root_path)
            .await?;
        let summary = ReportSummary::new(ctx.settings.run_id.clone(), ctx.outputs(), reports);
        info!(
            "{} reports: {} passed, {} failed, {} critical",
            summary.total(),
            summary.successes(),
            summary.fails(),
            summary.critical_failures()
        );
        ctx.hooks.after_validate(&summary);
        Ok(summary)
    }
}
