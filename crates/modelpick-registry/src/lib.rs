//! # modelpick-registry
//!
//! Provider-side building blocks for the model catalog:
//!
//! - **[`ModelRecord`]**: one model offered by one provider, tagged with its
//!   [`ModelOrigin`].
//! - **[`ModelProvider`]**: the port a vendor integration implements (static
//!   metadata, builtin models, config validation, live model listing).
//! - **[`Registry`]**: a [`ProviderDirectory`] that providers can join at any
//!   time.
//! - Two ready-made integrations: [`StaticProvider`] and the models.dev-backed
//!   [`ModelsDevProvider`].
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use modelpick_registry::{ModelsDevProvider, ModelsDevSource, ProviderMetadata, Registry};
//!
//! let source = Arc::new(ModelsDevSource::new());
//! let registry = Registry::new();
//! registry.register(
//!     ModelsDevProvider::new(ProviderMetadata::new("openai", "OpenAI"), builtins, source)
//!         .with_env(["OPENAI_API_KEY"]),
//! );
//! ```

pub mod error;
pub mod model;
pub mod model_source;
pub mod models_dev;
pub mod provider;
pub mod registry;
pub mod spec;

pub use error::Error;
pub use model::{ModelCapabilities, ModelLimits, ModelOrigin, ModelRecord};
pub use model_source::{ModelLoader, StaticProvider};
pub use models_dev::{ModelsDevProvider, ModelsDevSource};
pub use provider::{ConfigValidation, ModelProvider, ProviderConfig, ProviderMetadata, config_value};
pub use registry::{ProviderDirectory, Registry};
pub use spec::{ModelLimit, ModelSpec, ModelsDevSpec, Modalities, ProviderSpec};
