use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use itertools::Itertools;

use crate::Result;
use crate::context::Context;
use crate::plugins::builtin_hooks;
use crate::settings::Settings;
use crate::spec::TestSpec;
use crate::step::{StepFactoryRegistry, StepSequence};

/// Parses a test spec and builds its steps without opening any target
#[derive(Debug, clap::Args)]
#[clap(visible_alias = "c")]
pub struct Check {
    /// Test spec (JSON, YAML or TOML)
    #[clap(value_name = "SPEC")]
    spec: PathBuf,
    /// Definition files merged before the spec's own definitions
    #[clap(short, long = "definitions", value_name = "PATH")]
    definitions: Vec<PathBuf>,
    /// Print the parsed steps as JSON
    #[clap(long)]
    raw: bool,
}

impl Check {
    pub async fn run(&self) -> Result<()> {
        Settings::add_definitions(&self.definitions);
        let settings = Settings::get();
        let hooks = builtin_hooks(&settings);
        let spec = TestSpec::from_file(&self.spec, &hooks)?;
        let ctx = Arc::new(Context::new(settings, hooks)?);
        ctx.load_definitions(&spec.definitions);

        let mut registry = StepFactoryRegistry::default();
        ctx.hooks.augment_step_factories(&mut registry);
        let sequence = StepSequence::build(&ctx, &registry, &spec.steps)?;
        debug!("built {} steps from {}", sequence.len(), self.spec.display());

        if self.raw {
            println!("{}", serde_json::to_string_pretty(&spec.steps)?);
            return Ok(());
        }
        println!(
            "{} {} ({})",
            style(self.spec.display()).bold(),
            style(&spec.root_path).dim(),
            spec.target_names.iter().map(|t| style(t).cyan()).join(", ")
        );
        for target in &spec.target_names {
            println!("{}", style(target).cyan());
            for (index, def) in spec.steps.iter().enumerate() {
                println!("  {index:>3}  {def}");
            }
        }
        Ok(())
    }
}
