//! Catalog event hooks.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, info, warn};

/// Storage call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    LoadModels,
    SaveModels,
    LoadConfig,
}

impl StorageOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageOperation::LoadModels => "load_models",
            StorageOperation::SaveModels => "save_models",
            StorageOperation::LoadConfig => "load_config",
        }
    }
}

/// Receives catalog events. Every method defaults to doing nothing.
///
/// Hooks run inline on the task that produced the event and must not block.
/// A panicking hook is caught and logged; it never disturbs the catalog.
pub trait CatalogTelemetry: Send + Sync {
    fn on_fetch_start(&self, _provider_id: &str) {}

    fn on_fetch_success(&self, _provider_id: &str, _count: usize) {}

    fn on_fetch_error(&self, _provider_id: &str, _error: &str) {}

    fn on_user_model_added(&self, _provider_id: &str, _model_id: &str) {}

    fn on_storage_error(&self, _provider_id: &str, _operation: StorageOperation, _error: &str) {}
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl CatalogTelemetry for NoopTelemetry {}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl CatalogTelemetry for TracingTelemetry {
    fn on_fetch_start(&self, provider_id: &str) {
        debug!(provider = provider_id, "model fetch started");
    }

    fn on_fetch_success(&self, provider_id: &str, count: usize) {
        info!(provider = provider_id, count, "model fetch succeeded");
    }

    fn on_fetch_error(&self, provider_id: &str, error: &str) {
        warn!(provider = provider_id, error, "model fetch failed");
    }

    fn on_user_model_added(&self, provider_id: &str, model_id: &str) {
        info!(provider = provider_id, model = model_id, "user model added");
    }

    fn on_storage_error(&self, provider_id: &str, operation: StorageOperation, error: &str) {
        warn!(
            provider = provider_id,
            operation = operation.as_str(),
            error,
            "catalog storage failure"
        );
    }
}

/// Panic-isolating wrapper around the injected hooks.
#[derive(Clone)]
pub(crate) struct Telemetry {
    hooks: Arc<dyn CatalogTelemetry>,
}

impl Telemetry {
    pub(crate) fn new(hooks: Arc<dyn CatalogTelemetry>) -> Self {
        Self { hooks }
    }

    pub(crate) fn fetch_start(&self, provider_id: &str) {
        self.emit("fetch_start", |hooks| hooks.on_fetch_start(provider_id));
    }

    pub(crate) fn fetch_success(&self, provider_id: &str, count: usize) {
        self.emit("fetch_success", |hooks| {
            hooks.on_fetch_success(provider_id, count)
        });
    }

    pub(crate) fn fetch_error(&self, provider_id: &str, error: &str) {
        self.emit("fetch_error", |hooks| hooks.on_fetch_error(provider_id, error));
    }

    pub(crate) fn user_model_added(&self, provider_id: &str, model_id: &str) {
        self.emit("user_model_added", |hooks| {
            hooks.on_user_model_added(provider_id, model_id)
        });
    }

    pub(crate) fn storage_error(&self, provider_id: &str, operation: StorageOperation, error: &str) {
        self.emit("storage_error", |hooks| {
            hooks.on_storage_error(provider_id, operation, error)
        });
    }

    fn emit(&self, event: &'static str, call: impl FnOnce(&dyn CatalogTelemetry)) {
        let hooks = self.hooks.as_ref();
        if catch_unwind(AssertUnwindSafe(|| call(hooks))).is_err() {
            warn!(event, "telemetry hook panicked");
        }
    }
}
