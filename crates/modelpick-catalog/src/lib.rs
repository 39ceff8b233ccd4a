//! # modelpick-catalog
//!
//! An in-memory, per-provider cache of model metadata for model pickers.
//!
//! The catalog reconciles three sources for each provider:
//!
//! 1. the provider's **builtin** model list,
//! 2. models **persisted** by earlier sessions (hydrated once per provider),
//! 3. the provider's **live** listing (fetched on refresh).
//!
//! Readers take immutable [`CatalogSnapshot`]s and subscribe to change
//! notifications. Writers never touch state directly: every change goes
//! through the [`StateStore`] as a copy-on-write update.
//!
//! ```ignore
//! use std::sync::Arc;
//! use modelpick_catalog::{Catalog, RefreshOptions};
//!
//! let catalog = Catalog::builder(registry, Arc::new(store)).build();
//! catalog.initialize(false).await;
//! catalog.refresh("openai", RefreshOptions::default()).await;
//! let snapshot = catalog.snapshot();
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod merge;
pub mod persistence;
pub mod snapshot;
pub mod state;
pub mod telemetry;

pub use catalog::{Catalog, CatalogBuilder, Clock, RefreshOptions};
pub use config::{
    has_stored_credentials, load_provider_config, provider_config_key, remove_provider_config,
    save_provider_config,
};
pub use error::{Error, Result};
pub use persistence::{
    ENVELOPE_VERSION, clear_persisted_models, get_persisted_models, models_key,
    set_persisted_models,
};
pub use snapshot::{CatalogModel, CatalogSnapshot, ProviderSnapshot};
pub use state::{
    CatalogState, Listener, PendingWork, ProviderCatalogState, ProviderStatus, StateStore,
    Subscription, WorkKind,
};
pub use telemetry::{CatalogTelemetry, NoopTelemetry, StorageOperation, TracingTelemetry};
