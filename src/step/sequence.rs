use std::sync::Arc;

use eyre::{WrapErr, bail};

use super::{Step, StepFactoryRegistry};
use crate::context::Context;
use crate::driver::Driver;
use crate::report::{Report, StepFailureReport};
use crate::spec::StepDef;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs)]
pub enum SequenceState {
    Ready,
    Running,
    Completed,
    /// A step raised; the steps after it were skipped
    Aborted,
}

/// The steps of a spec, run in order against a single target
#[derive(Debug)]
pub struct StepSequence {
    steps: Vec<Box<dyn Step>>,
    state: SequenceState,
    target_name: Option<String>,
}

/// A fresh copy: unbound and ready to run
impl Clone for StepSequence {
    fn clone(&self) -> Self {
        Self::new(self.steps.clone())
    }
}

impl StepSequence {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            state: SequenceState::Ready,
            target_name: None,
        }
    }

    /// Builds every step up front so spec errors surface before any target runs
    pub fn build(
        ctx: &Arc<Context>,
        registry: &StepFactoryRegistry,
        defs: &[StepDef],
    ) -> Result<Self> {
        let steps = defs
            .iter()
            .enumerate()
            .map(|(i, def)| {
                registry
                    .build(ctx, def)
                    .wrap_err_with(|| format!("step {i}: {def}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(steps))
    }

    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn with_driver(&mut self, driver: Arc<dyn Driver>) {
        self.target_name = Some(driver.name().to_string());
        for step in &mut self.steps {
            step.with_driver(driver.clone());
        }
    }

    /// Runs every step in order, collecting the reports they produce.
    ///
    /// A step that raises ends the run: with `suppress_failures` the error
    /// becomes a `StepFailureReport` at that step's index and the remaining
    /// steps are skipped; otherwise the error is returned as is.
    pub fn run(&mut self, suppress_failures: bool) -> Result<Vec<Report>> {
        if !self.state.is_ready() {
            bail!("step sequence is {}, it can only run once", self.state);
        }
        self.state = SequenceState::Running;
        let target_name = self.target_name.clone().unwrap_or_default();
        let mut reports = vec![];
        for (index, step) in self.steps.iter().enumerate() {
            trace!("{target_name}: step {index}: {}", step.action());
            match step.perform() {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(err) if !suppress_failures => {
                    self.state = SequenceState::Aborted;
                    return Err(err);
                }
                Err(err) => {
                    warn!("{target_name}: step {index} ({}) failed: {err}", step.action());
                    reports.push(
                        StepFailureReport::new(
                            step.action().as_str(),
                            &target_name,
                            index,
                            err.to_string(),
                        )
                        .into(),
                    );
                    self.state = SequenceState::Aborted;
                    return Ok(reports);
                }
            }
        }
        self.state = SequenceState::Completed;
        Ok(reports)
    }
}
