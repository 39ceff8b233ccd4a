//! The provider directory: registered providers keyed by id.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::provider::{ModelProvider, ProviderMetadata};

/// Enumerates registered providers.
///
/// Membership may change at any time; consumers must not assume the set seen
/// at construction is final.
pub trait ProviderDirectory: Send + Sync {
    /// All registered providers, ordered by id.
    fn providers(&self) -> Vec<Arc<dyn ModelProvider>>;

    fn provider(&self, id: &str) -> Option<Arc<dyn ModelProvider>>;

    fn has_provider(&self, id: &str) -> bool {
        self.provider(id).is_some()
    }

    /// Registered provider ids, ordered.
    fn provider_ids(&self) -> Vec<String> {
        self.providers()
            .iter()
            .map(|provider| provider.metadata().id.clone())
            .collect()
    }
}

/// Thread-safe [`ProviderDirectory`] that accepts registrations through a
/// shared reference.
///
/// # Example
///
/// ```ignore
/// use modelpick_registry::{ModelRecord, ProviderDirectory, ProviderMetadata, Registry, StaticProvider};
///
/// let registry = Registry::new();
/// registry.register(StaticProvider::new(
///     ProviderMetadata::new("local", "Local"),
///     vec![ModelRecord::new("llama3", "Llama 3")],
/// ));
/// assert!(registry.has_provider("local"));
/// ```
#[derive(Default)]
pub struct Registry {
    providers: RwLock<BTreeMap<String, Arc<dyn ModelProvider>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous registration with the same
    /// id.
    pub fn register(&self, provider: impl ModelProvider + 'static) {
        self.register_arc(Arc::new(provider));
    }

    pub fn register_arc(&self, provider: Arc<dyn ModelProvider>) {
        let id = provider.metadata().id.clone();
        debug!(provider = %id, "registering provider");
        self.providers.write().insert(id, provider);
    }

    /// Metadata of every registered provider, ordered by id.
    pub fn metadata(&self) -> Vec<ProviderMetadata> {
        self.providers
            .read()
            .values()
            .map(|provider| provider.metadata().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

impl ProviderDirectory for Registry {
    fn providers(&self) -> Vec<Arc<dyn ModelProvider>> {
        self.providers.read().values().cloned().collect()
    }

    fn provider(&self, id: &str) -> Option<Arc<dyn ModelProvider>> {
        self.providers.read().get(id).cloned()
    }

    fn has_provider(&self, id: &str) -> bool {
        self.providers.read().contains_key(id)
    }

    fn provider_ids(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }
}
