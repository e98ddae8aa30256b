use std::{
    num::NonZero,
    path::PathBuf,
    sync::{LazyLock, Mutex},
};

use indexmap::IndexSet;
use serde::Serialize;

use crate::env;

/// Run-scoped configuration consumed by the engine.
///
/// Values come from built-in defaults, then `PLUME_*` environment variables,
/// then whatever the CLI set through the `Settings::set_*` functions.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Identifier scoping stored treatment and snapshot images
    pub run_id: String,
    /// Let step errors propagate and leave targets open
    pub debug: bool,
    /// Number of targets driven at the same time
    pub jobs: NonZero<usize>,
    pub update_all_baselines: bool,
    pub update_baseline: IndexSet<String>,
    pub create_baseline_if_absent: bool,
    /// Target whose outputs are published to the `Outputs` namespace.
    /// Defaults to the first target declared by the spec.
    pub output_target: Option<String>,
    /// Extra definition files merged before the spec's own definitions
    pub definitions: Vec<PathBuf>,
    /// Root directory for the local image storage backend
    pub image_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run_id: new_run_id(),
            debug: false,
            jobs: NonZero::<usize>::MIN,
            update_all_baselines: false,
            update_baseline: IndexSet::new(),
            create_baseline_if_absent: false,
            output_target: None,
            definitions: vec![],
            image_dir: None,
        }
    }
}

impl Settings {
    /// Exceptions raised by steps are turned into failure reports
    pub fn suppress_failures(&self) -> bool {
        !self.debug
    }

    /// Drivers are quit once their target finishes
    pub fn close_targets(&self) -> bool {
        !self.debug
    }

    pub fn should_update_baseline(&self, baseline_id: &str) -> bool {
        self.update_all_baselines || self.update_baseline.contains(baseline_id)
    }
}

#[derive(Debug, Default)]
struct SettingsOverride {
    run_id: Option<String>,
    debug: Option<bool>,
    jobs: Option<NonZero<usize>>,
    update_all_baselines: Option<bool>,
    update_baseline: Option<IndexSet<String>>,
    create_baseline_if_absent: Option<bool>,
    output_target: Option<String>,
    definitions: Vec<PathBuf>,
    image_dir: Option<PathBuf>,
}

// Global storage for programmatically set settings
// We store deltas that override the base settings from all other sources
static SETTINGS_OVERRIDE: LazyLock<Mutex<SettingsOverride>> =
    LazyLock::new(|| Mutex::new(SettingsOverride::default()));

impl Settings {
    pub fn get() -> Settings {
        let mut settings = Settings::from_env();
        let overrides = SETTINGS_OVERRIDE.lock().unwrap();
        if let Some(run_id) = &overrides.run_id {
            settings.run_id = run_id.clone();
        }
        if let Some(debug) = overrides.debug {
            settings.debug = debug;
        }
        if let Some(jobs) = overrides.jobs {
            settings.jobs = jobs;
        }
        if let Some(update_all) = overrides.update_all_baselines {
            settings.update_all_baselines = update_all;
        }
        if let Some(ids) = &overrides.update_baseline {
            settings.update_baseline.extend(ids.iter().cloned());
        }
        if let Some(create) = overrides.create_baseline_if_absent {
            settings.create_baseline_if_absent = create;
        }
        if let Some(target) = &overrides.output_target {
            settings.output_target = Some(target.clone());
        }
        settings
            .definitions
            .extend(overrides.definitions.iter().cloned());
        if let Some(dir) = &overrides.image_dir {
            settings.image_dir = Some(dir.clone());
        }
        settings
    }

    fn from_env() -> Settings {
        let mut settings = Settings::default();
        if let Some(run_id) = env::PLUME_RUN_ID.clone() {
            settings.run_id = run_id;
        }
        settings.debug = *env::PLUME_DEBUG;
        if let Some(jobs) = *env::PLUME_JOBS {
            settings.jobs = jobs;
        }
        settings.update_all_baselines = *env::PLUME_UPDATE_ALL_BASELINES;
        settings.update_baseline = env::PLUME_UPDATE_BASELINES.clone();
        settings.create_baseline_if_absent = *env::PLUME_CREATE_BASELINE_IF_ABSENT;
        settings.output_target = env::PLUME_OUTPUT_TARGET.clone();
        settings.image_dir = env::PLUME_IMAGE_DIR.clone();
        settings
    }

    pub fn set_run_id(run_id: String) {
        SETTINGS_OVERRIDE.lock().unwrap().run_id = Some(run_id);
    }

    pub fn set_debug(debug: bool) {
        SETTINGS_OVERRIDE.lock().unwrap().debug = Some(debug);
    }

    pub fn set_jobs(jobs: NonZero<usize>) {
        SETTINGS_OVERRIDE.lock().unwrap().jobs = Some(jobs);
    }

    pub fn set_update_all_baselines(update_all: bool) {
        SETTINGS_OVERRIDE.lock().unwrap().update_all_baselines = Some(update_all);
    }

    pub fn add_update_baselines(ids: &[String]) {
        SETTINGS_OVERRIDE
            .lock()
            .unwrap()
            .update_baseline
            .get_or_insert_with(IndexSet::new)
            .extend(ids.iter().cloned());
    }

    pub fn set_create_baseline_if_absent(create: bool) {
        SETTINGS_OVERRIDE.lock().unwrap().create_baseline_if_absent = Some(create);
    }

    pub fn set_output_target(target: String) {
        SETTINGS_OVERRIDE.lock().unwrap().output_target = Some(target);
    }

    pub fn add_definitions(paths: &[PathBuf]) {
        SETTINGS_OVERRIDE
            .lock()
            .unwrap()
            .definitions
            .extend(paths.iter().cloned());
    }

    pub fn set_image_dir(dir: PathBuf) {
        SETTINGS_OVERRIDE.lock().unwrap().image_dir = Some(dir);
    }
}

fn new_run_id() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string()
}
