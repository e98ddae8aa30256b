pub use std::env::*;
use std::{num::NonZero, path::PathBuf, sync::LazyLock};

use indexmap::IndexSet;

pub static PLUME_LOG: LazyLock<log::LevelFilter> = LazyLock::new(|| {
    var_log_level("PLUME_LOG")
        .or(var_log_level("PLUME_LOG_LEVEL"))
        .unwrap_or(log::LevelFilter::Info)
});

pub static PLUME_DEBUG: LazyLock<bool> = LazyLock::new(|| var_true("PLUME_DEBUG"));
pub static PLUME_RUN_ID: LazyLock<Option<String>> =
    LazyLock::new(|| var("PLUME_RUN_ID").ok().filter(|v| !v.is_empty()));
pub static PLUME_JOBS: LazyLock<Option<NonZero<usize>>> =
    LazyLock::new(|| var("PLUME_JOBS").ok().and_then(|v| v.parse().ok()));
pub static PLUME_OUTPUT_TARGET: LazyLock<Option<String>> =
    LazyLock::new(|| var("PLUME_OUTPUT_TARGET").ok().filter(|v| !v.is_empty()));
pub static PLUME_IMAGE_DIR: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| var_path("PLUME_IMAGE_DIR"));

// Baseline management
pub static PLUME_UPDATE_ALL_BASELINES: LazyLock<bool> =
    LazyLock::new(|| var_true("PLUME_UPDATE_ALL_BASELINES"));
pub static PLUME_UPDATE_BASELINES: LazyLock<IndexSet<String>> = LazyLock::new(|| {
    var_csv("PLUME_UPDATE_BASELINES")
        .or(var_csv("PLUME_UPDATE_BASELINE"))
        .unwrap_or_default()
});
pub static PLUME_CREATE_BASELINE_IF_ABSENT: LazyLock<bool> =
    LazyLock::new(|| var_true("PLUME_CREATE_BASELINE_IF_ABSENT"));

// Tracing configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TraceMode {
    Off,
    Text,
    Json,
}

pub static PLUME_TRACE: LazyLock<TraceMode> =
    LazyLock::new(|| match var("PLUME_TRACE").map(|v| v.to_lowercase()) {
        Ok(v) if v == "json" => TraceMode::Json,
        Ok(v) if v == "1" || v == "true" => TraceMode::Text,
        _ => TraceMode::Off,
    });

fn var_path(name: &str) -> Option<PathBuf> {
    var(name).map(PathBuf::from).ok()
}

fn var_csv(name: &str) -> Option<IndexSet<String>> {
    var(name)
        .map(|val| {
            val.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .ok()
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}

fn var_true(name: &str) -> bool {
    var(name)
        .map(|val| val.to_lowercase())
        .map(|val| val == "true" || val == "1")
        .unwrap_or(false)
}
