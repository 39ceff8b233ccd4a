//! Providers backed by a static model list and an optional loader callback.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::model::ModelRecord;
use crate::provider::{ConfigValidation, ModelProvider, ProviderConfig, ProviderMetadata, config_value};

/// Callback used for dynamic model listing.
pub trait ModelLoader: Send + Sync {
    fn load_models(&self, provider_id: &str, config: &ProviderConfig)
    -> Result<Vec<ModelRecord>, Error>;
}

impl<F> ModelLoader for F
where
    F: Fn(&str, &ProviderConfig) -> Result<Vec<ModelRecord>, Error> + Send + Sync,
{
    fn load_models(
        &self,
        provider_id: &str,
        config: &ProviderConfig,
    ) -> Result<Vec<ModelRecord>, Error> {
        (self)(provider_id, config)
    }
}

/// A provider whose listing is either its builtin models or whatever a
/// [`ModelLoader`] returns.
///
/// Useful for local servers, tests, and integrations whose model list ships
/// with the binary.
pub struct StaticProvider {
    metadata: ProviderMetadata,
    builtins: Vec<ModelRecord>,
    required_keys: Vec<String>,
    loader: Option<Arc<dyn ModelLoader>>,
}

impl StaticProvider {
    pub fn new(metadata: ProviderMetadata, builtins: Vec<ModelRecord>) -> Self {
        Self {
            metadata,
            builtins,
            required_keys: Vec::new(),
            loader: None,
        }
    }

    /// Require `key` to be present (and non-blank) in the stored config.
    pub fn require_key(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }

    pub fn with_loader(mut self, loader: impl ModelLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }
}

impl std::fmt::Debug for StaticProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticProvider")
            .field("id", &self.metadata.id)
            .field("builtins", &format!("{} models", self.builtins.len()))
            .field("loader", &self.loader.as_ref().map(|_| "<loader>"))
            .finish()
    }
}

#[async_trait]
impl ModelProvider for StaticProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn builtin_models(&self) -> &[ModelRecord] {
        &self.builtins
    }

    fn validate_config(&self, config: &ProviderConfig) -> ConfigValidation {
        let missing: Vec<String> = self
            .required_keys
            .iter()
            .filter(|key| config_value(config, &[key.as_str()]).is_none())
            .cloned()
            .collect();
        ConfigValidation {
            missing,
            errors: Vec::new(),
        }
    }

    async fn fetch_models(&self, config: &ProviderConfig) -> Result<Vec<ModelRecord>, Error> {
        match &self.loader {
            Some(loader) => loader.load_models(&self.metadata.id, config),
            None => Ok(self.builtins.clone()),
        }
    }
}
