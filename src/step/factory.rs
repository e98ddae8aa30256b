use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;

use super::Step;
use super::action::ActionStep;
use super::output::OutputValueStep;
use super::validation::ValidationFactory;
use crate::context::Context;
use crate::enums::Action;
use crate::spec::StepDef;
use crate::{Error, Result};

/// Builds a step from its definition. Checks that do not depend on runtime
/// values happen here so a broken spec fails before any target runs.
pub trait StepFactory: Send + Sync {
    fn build(&self, ctx: &Arc<Context>, def: &StepDef) -> Result<Box<dyn Step>>;
}

impl<F> StepFactory for F
where
    F: Fn(&Arc<Context>, &StepDef) -> Result<Box<dyn Step>> + Send + Sync,
{
    fn build(&self, ctx: &Arc<Context>, def: &StepDef) -> Result<Box<dyn Step>> {
        self(ctx, def)
    }
}

/// Maps actions to factories. Plugins may replace or add entries through
/// `Plugin::augment_step_factories`; the last registration for an action wins.
#[derive(Clone)]
pub struct StepFactoryRegistry {
    factories: IndexMap<Action, Arc<dyn StepFactory>>,
}

impl Default for StepFactoryRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: IndexMap::new(),
        };
        let basic: Arc<dyn StepFactory> = Arc::new(ActionStep::build);
        for action in Action::builtins() {
            let factory: Arc<dyn StepFactory> = match action {
                Action::Validate => Arc::new(ValidationFactory::default()),
                Action::OutputValue => Arc::new(OutputValueStep::build),
                _ => basic.clone(),
            };
            registry.factories.insert(action, factory);
        }
        registry
    }
}

impl Debug for StepFactoryRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.factories.keys().map(|a| a.as_str()))
            .finish()
    }
}

impl StepFactoryRegistry {
    pub fn register(&mut self, action: Action, factory: Arc<dyn StepFactory>) {
        if self.factories.contains_key(&action) {
            debug!("replacing step factory for {action}");
        }
        self.factories.insert(action, factory);
    }

    pub fn contains(&self, action: &Action) -> bool {
        self.factories.contains_key(action)
    }

    pub fn resolve(&self, action: &Action) -> Result<Arc<dyn StepFactory>> {
        self.factories.get(action).cloned().ok_or_else(|| {
            Error::InvalidSpec(format!("no step factory registered for \"{action}\"")).into()
        })
    }

    pub fn build(&self, ctx: &Arc<Context>, def: &StepDef) -> Result<Box<dyn Step>> {
        self.resolve(&def.action)?.build(ctx, def)
    }
}
