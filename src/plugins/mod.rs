//! Plugins shipped with the crate.

use std::sync::Arc;

use crate::hooks::HookRegistry;
use crate::settings::Settings;

mod local_storage;

pub use local_storage::LocalStorage;

/// Hook registry with the built-in plugins `settings` enables
pub fn builtin_hooks(settings: &Settings) -> HookRegistry {
    let mut hooks = HookRegistry::default();
    if let Some(dir) = &settings.image_dir {
        debug!("storing images under {}", dir.display());
        hooks.register(Arc::new(LocalStorage::new(dir)));
    }
    hooks
}
