//! Plugin hooks.
//!
//! A plugin is a `Plugin` trait object; every hook has a no-op default so a
//! plugin only implements what it cares about. The `HookRegistry` keeps plugins
//! in registration order and dispatches each hook according to its `Hook`
//! declaration: either every plugin is called and all answers are collected,
//! or dispatch stops at the first plugin that answers.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::enums::{EnumKind, ImageKind};
use crate::report::ReportSummary;
use crate::spec::TestSpec;
use crate::step::StepFactoryRegistry;

/// Hook declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Hook {
    ResolveEnum,
    ResolveContextObject,
    AugmentStepFactories,
    BeforeValidate,
    AfterValidate,
    StoreImage,
    BaselineBytes,
    BaselineUri,
}

impl Hook {
    /// Whether dispatch stops at the first plugin that answers
    pub fn first_result(self) -> bool {
        match self {
            Hook::ResolveEnum
            | Hook::ResolveContextObject
            | Hook::StoreImage
            | Hook::BaselineBytes
            | Hook::BaselineUri => true,
            Hook::AugmentStepFactories | Hook::BeforeValidate | Hook::AfterValidate => false,
        }
    }
}

/// Extension points of the engine.
///
/// Storage hooks distinguish "not handled" (`None`) from "handled but empty"
/// (`Some` of an empty value): the first means no backend is configured, the
/// second means the backend answered without a usable result.
#[allow(unused_variables)]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Claim a tag the built-in enums do not know about
    fn resolve_enum(&self, name: &str, kind: EnumKind) -> Option<String> {
        None
    }

    /// Resolve `${{ Root.path }}` for roots other than `Environment`,
    /// `Validation` and `Definitions`
    fn resolve_context_object(&self, root: &str, path: &[&str]) -> Option<String> {
        None
    }

    /// Add or replace step factories before any step is built
    fn augment_step_factories(&self, registry: &mut StepFactoryRegistry) {}

    fn before_validate(&self, spec: &TestSpec) {}

    fn after_validate(&self, summary: &ReportSummary) {}

    /// Store an image, returning the URI it can be retrieved from
    fn store_image(
        &self,
        run_id: &str,
        baseline_id: &str,
        png: &[u8],
        kind: ImageKind,
    ) -> Option<String> {
        None
    }

    /// Bytes of the current baseline image
    fn baseline_bytes(&self, baseline_id: &str) -> Option<Vec<u8>> {
        None
    }

    /// Run-scoped URI of the baseline used for a comparison
    fn baseline_uri(&self, run_id: &str, baseline_id: &str) -> Option<String> {
        None
    }
}

/// Answers nothing. Always registered first, so an empty registry behaves
/// exactly like one whose plugins decline every hook.
struct NoopPlugin;

impl Plugin for NoopPlugin {
    fn name(&self) -> &str {
        "noop"
    }
}

#[derive(Clone)]
pub struct HookRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self {
            plugins: vec![Arc::new(NoopPlugin)],
        }
    }
}

impl Debug for HookRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

impl HookRegistry {
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!("registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Call `f` on each plugin in registration order, collecting answers.
    /// `first_result` hooks stop at the first answer.
    pub fn call<T>(&self, hook: Hook, mut f: impl FnMut(&dyn Plugin) -> Option<T>) -> Vec<T> {
        let mut results = vec![];
        for plugin in &self.plugins {
            if let Some(result) = f(plugin.as_ref()) {
                trace!("{hook}: answered by {}", plugin.name());
                results.push(result);
                if hook.first_result() {
                    break;
                }
            }
        }
        results
    }

    fn call_first<T>(&self, hook: Hook, f: impl FnMut(&dyn Plugin) -> Option<T>) -> Option<T> {
        debug_assert!(hook.first_result());
        self.call(hook, f).into_iter().next()
    }

    pub fn resolve_enum(&self, name: &str, kind: EnumKind) -> Option<String> {
        self.call_first(Hook::ResolveEnum, |p| p.resolve_enum(name, kind))
    }

    pub fn resolve_context_object(&self, root: &str, path: &[&str]) -> Option<String> {
        self.call_first(Hook::ResolveContextObject, |p| {
            p.resolve_context_object(root, path)
        })
    }

    pub fn augment_step_factories(&self, registry: &mut StepFactoryRegistry) {
        self.call(Hook::AugmentStepFactories, |p| {
            p.augment_step_factories(registry);
            None::<()>
        });
    }

    pub fn before_validate(&self, spec: &TestSpec) {
        self.call(Hook::BeforeValidate, |p| {
            p.before_validate(spec);
            None::<()>
        });
    }

    pub fn after_validate(&self, summary: &ReportSummary) {
        self.call(Hook::AfterValidate, |p| {
            p.after_validate(summary);
            None::<()>
        });
    }

    pub fn store_image(
        &self,
        run_id: &str,
        baseline_id: &str,
        png: &[u8],
        kind: ImageKind,
    ) -> Option<String> {
        self.call_first(Hook::StoreImage, |p| {
            p.store_image(run_id, baseline_id, png, kind)
        })
    }

    pub fn baseline_bytes(&self, baseline_id: &str) -> Option<Vec<u8>> {
        self.call_first(Hook::BaselineBytes, |p| p.baseline_bytes(baseline_id))
    }

    pub fn baseline_uri(&self, run_id: &str, baseline_id: &str) -> Option<String> {
        self.call_first(Hook::BaselineUri, |p| p.baseline_uri(run_id, baseline_id))
    }
}
