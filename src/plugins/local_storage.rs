use std::fs;
use std::path::{Path, PathBuf};

use crate::enums::ImageKind;
use crate::hooks::Plugin;

/// Image storage in a local directory:
///
/// ```text
/// <dir>/baselines/<id>.png
/// <dir>/baselines/snapshots/<id>_<run>.png
/// <dir>/runs/<run>/<id>_treatment.png
/// <dir>/runs/<run>/<id>_delta.png
/// ```
///
/// Snapshots pin the baseline a run compared against, so later baseline
/// updates do not change what an old report points at.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn baseline_path(&self, baseline_id: &str) -> PathBuf {
        self.dir.join("baselines").join(format!("{baseline_id}.png"))
    }

    fn snapshot_path(&self, run_id: &str, baseline_id: &str) -> PathBuf {
        self.dir
            .join("baselines")
            .join("snapshots")
            .join(format!("{baseline_id}_{run_id}.png"))
    }

    fn run_path(&self, run_id: &str, baseline_id: &str, kind: ImageKind) -> PathBuf {
        self.dir
            .join("runs")
            .join(run_id)
            .join(format!("{baseline_id}_{kind}.png"))
    }

    fn write(&self, path: &Path, png: &[u8]) -> std::io::Result<String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, png)?;
        file_uri(path)
    }
}

fn file_uri(path: &Path) -> std::io::Result<String> {
    Ok(format!("file://{}", std::path::absolute(path)?.display()))
}

impl Plugin for LocalStorage {
    fn name(&self) -> &str {
        "local-storage"
    }

    /// An empty URI tells the caller the write failed
    fn store_image(
        &self,
        run_id: &str,
        baseline_id: &str,
        png: &[u8],
        kind: ImageKind,
    ) -> Option<String> {
        let path = match kind {
            ImageKind::Baseline => self.baseline_path(baseline_id),
            ImageKind::Treatment | ImageKind::Delta => self.run_path(run_id, baseline_id, kind),
        };
        match self.write(&path, png) {
            Ok(uri) => {
                debug!("stored {kind} image {}", path.display());
                Some(uri)
            }
            Err(err) => {
                warn!("failed to store {kind} image {}: {err}", path.display());
                Some(String::new())
            }
        }
    }

    /// Empty when no baseline has been stored for `baseline_id`
    fn baseline_bytes(&self, baseline_id: &str) -> Option<Vec<u8>> {
        let path = self.baseline_path(baseline_id);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Some(vec![]),
            Err(err) => {
                warn!("failed to read baseline {}: {err}", path.display());
                Some(vec![])
            }
        }
    }

    fn baseline_uri(&self, run_id: &str, baseline_id: &str) -> Option<String> {
        let snapshot = self.snapshot_path(run_id, baseline_id);
        let result = fs::read(self.baseline_path(baseline_id))
            .and_then(|png| self.write(&snapshot, &png));
        match result {
            Ok(uri) => Some(uri),
            Err(err) => {
                warn!("failed to snapshot baseline {baseline_id}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookRegistry;
    use std::sync::Arc;

    fn registry(dir: &Path) -> HookRegistry {
        let mut hooks = HookRegistry::default();
        hooks.register(Arc::new(LocalStorage::new(dir)));
        hooks
    }

    #[test]
    fn test_missing_baseline_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let hooks = registry(tmp.path());
        assert_eq!(hooks.baseline_bytes("home"), Some(vec![]));
        assert_eq!(hooks.baseline_uri("run-1", "home"), None);
    }

    #[test]
    fn test_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let hooks = registry(tmp.path());

        let uri = hooks
            .store_image("run-1", "home", b"baseline", ImageKind::Baseline)
            .unwrap();
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("baselines/home.png"));
        assert_eq!(hooks.baseline_bytes("home").unwrap(), b"baseline");

        hooks.store_image("run-1", "home", b"treatment", ImageKind::Treatment);
        hooks.store_image("run-1", "home", b"delta", ImageKind::Delta);
        let runs = tmp.path().join("runs").join("run-1");
        assert_eq!(fs::read(runs.join("home_treatment.png")).unwrap(), b"treatment");
        assert_eq!(fs::read(runs.join("home_delta.png")).unwrap(), b"delta");

        let snapshot = hooks.baseline_uri("run-1", "home").unwrap();
        assert!(snapshot.ends_with("baselines/snapshots/home_run-1.png"));

        // updating the baseline leaves the snapshot alone
        hooks.store_image("run-2", "home", b"newer", ImageKind::Baseline);
        let pinned = tmp.path().join("baselines/snapshots/home_run-1.png");
        assert_eq!(fs::read(pinned).unwrap(), b"baseline");
    }

    #[test]
    fn test_builtin_hooks_only_store_when_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = crate::settings::Settings::default();
        assert_eq!(crate::plugins::builtin_hooks(&settings).baseline_bytes("x"), None);
        let settings = crate::settings::Settings {
            image_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let hooks = crate::plugins::builtin_hooks(&settings);
        assert_eq!(hooks.plugin_names().last(), Some(&"local-storage"));
    }
}
