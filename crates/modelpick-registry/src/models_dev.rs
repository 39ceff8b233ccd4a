//! Provider adapter that lists models from the models.dev registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Error;
use crate::model::ModelRecord;
use crate::provider::{ConfigValidation, ModelProvider, ProviderConfig, ProviderMetadata, config_value};
use crate::spec::ModelsDevSpec;

const MODELS_DEV_URL: &str = "https://models.dev/api.json";

/// How long a downloaded payload is served before it is fetched again.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);

/// Config keys accepted as the provider credential.
const CREDENTIAL_KEYS: &[&str] = &["api_key", "access_token"];

/// Shared, lazily fetched copy of the models.dev payload.
///
/// One source is typically shared by every [`ModelsDevProvider`]. Concurrent
/// fetches wait on a single download, and a payload younger than the source's
/// max age is served without touching the network.
pub struct ModelsDevSource {
    url: String,
    client: reqwest::Client,
    spec: RwLock<Option<Loaded>>,
    max_age: Duration,
    download: tokio::sync::Mutex<()>,
    /// Never hit the network; serve whatever was loaded.
    pinned: bool,
}

struct Loaded {
    spec: Arc<ModelsDevSpec>,
    at: Instant,
}

impl ModelsDevSource {
    pub fn new() -> Self {
        Self::with_url(MODELS_DEV_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            spec: RwLock::new(None),
            max_age: DEFAULT_MAX_AGE,
            download: tokio::sync::Mutex::new(()),
            pinned: false,
        }
    }

    /// Serve a downloaded payload for `max_age` before fetching it again.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// A source that serves `spec` and never fetches.
    pub fn pinned(spec: ModelsDevSpec) -> Self {
        Self {
            url: MODELS_DEV_URL.to_string(),
            client: reqwest::Client::new(),
            spec: RwLock::new(Some(Loaded {
                spec: Arc::new(spec),
                at: Instant::now(),
            })),
            max_age: DEFAULT_MAX_AGE,
            download: tokio::sync::Mutex::new(()),
            pinned: true,
        }
    }

    /// A pinned source parsed from a JSON string.
    pub fn pinned_from_str(json: &str) -> Result<Self, Error> {
        let parsed: ModelsDevSpec = serde_json::from_str(json)?;
        Ok(Self::pinned(parsed))
    }

    /// The last loaded payload, if any.
    pub fn cached(&self) -> Option<Arc<ModelsDevSpec>> {
        self.spec.read().as_ref().map(|loaded| Arc::clone(&loaded.spec))
    }

    fn fresh(&self) -> Option<Arc<ModelsDevSpec>> {
        self.spec
            .read()
            .as_ref()
            .filter(|loaded| self.pinned || loaded.at.elapsed() < self.max_age)
            .map(|loaded| Arc::clone(&loaded.spec))
    }

    /// Return the payload, downloading it unless pinned or still fresh.
    pub async fn fetch(&self) -> Result<Arc<ModelsDevSpec>, Error> {
        if let Some(spec) = self.fresh() {
            return Ok(spec);
        }

        let _download = self.download.lock().await;
        // Another caller may have finished the download while we waited.
        if let Some(spec) = self.fresh() {
            return Ok(spec);
        }

        debug!(url = %self.url, "fetching models.dev spec");
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::fetch("models.dev", e))?
            .text()
            .await
            .map_err(|e| Error::fetch("models.dev", e))?;

        let parsed: ModelsDevSpec = serde_json::from_str(&body)?;
        let parsed = Arc::new(parsed);
        *self.spec.write() = Some(Loaded {
            spec: Arc::clone(&parsed),
            at: Instant::now(),
        });
        Ok(parsed)
    }
}

impl Default for ModelsDevSource {
    fn default() -> Self {
        Self::new()
    }
}

/// A provider whose live listing is its models.dev entry.
///
/// The configuration is valid when an API key is stored for the provider or
/// one of its environment variables is set.
pub struct ModelsDevProvider {
    metadata: ProviderMetadata,
    builtins: Vec<ModelRecord>,
    env: Vec<String>,
    source: Arc<ModelsDevSource>,
}

impl ModelsDevProvider {
    pub fn new(
        metadata: ProviderMetadata,
        builtins: Vec<ModelRecord>,
        source: Arc<ModelsDevSource>,
    ) -> Self {
        Self {
            metadata,
            builtins,
            env: Vec::new(),
            source,
        }
    }

    /// Environment variables consulted when no key is stored.
    pub fn with_env(mut self, vars: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.env = vars.into_iter().map(Into::into).collect();
        self
    }

    fn env_key(&self) -> Option<String> {
        self.env.iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
    }
}

#[async_trait]
impl ModelProvider for ModelsDevProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn builtin_models(&self) -> &[ModelRecord] {
        &self.builtins
    }

    fn validate_config(&self, config: &ProviderConfig) -> ConfigValidation {
        if config_value(config, CREDENTIAL_KEYS).is_some() || self.env_key().is_some() {
            ConfigValidation::ok()
        } else {
            ConfigValidation::missing("api_key")
        }
    }

    async fn fetch_models(&self, _config: &ProviderConfig) -> Result<Vec<ModelRecord>, Error> {
        let spec = self.source.fetch().await?;
        let provider = spec
            .get(&self.metadata.id)
            .ok_or_else(|| Error::ProviderNotFound(self.metadata.id.clone()))?;
        Ok(provider.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "acme": {
            "id": "acme",
            "name": "Acme AI",
            "models": {
                "a-1": { "id": "a-1", "name": "A One" },
                "a-2": { "id": "a-2", "name": "A Two" }
            }
        }
    }"#;

    fn provider(id: &str) -> ModelsDevProvider {
        let source = Arc::new(ModelsDevSource::pinned_from_str(SAMPLE).expect("parse"));
        ModelsDevProvider::new(ProviderMetadata::new(id, "Acme AI"), Vec::new(), source)
            .with_env(["MODELPICK_TEST_UNSET_VARIABLE"])
    }

    #[tokio::test]
    async fn pinned_source_serves_provider_models() {
        let models = provider("acme")
            .fetch_models(&ProviderConfig::new())
            .await
            .expect("fetch");
        let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a-1", "a-2"]);
    }

    #[tokio::test]
    async fn unknown_provider_is_an_error() {
        let err = provider("nope")
            .fetch_models(&ProviderConfig::new())
            .await
            .expect_err("missing provider");
        assert!(matches!(err, Error::ProviderNotFound(id) if id == "nope"));
    }

    fn seeded(source: &ModelsDevSource) {
        let spec: ModelsDevSpec = serde_json::from_str(SAMPLE).expect("parse");
        *source.spec.write() = Some(Loaded {
            spec: Arc::new(spec),
            at: Instant::now(),
        });
    }

    #[tokio::test]
    async fn fresh_download_is_reused() {
        // Nothing listens on the discard port, so any download fails.
        let source = ModelsDevSource::with_url("http://127.0.0.1:9/api.json");
        seeded(&source);

        let spec = source.fetch().await.expect("served from cache");
        assert!(spec.get("acme").is_some());
    }

    #[tokio::test]
    async fn stale_download_is_fetched_again() {
        let source =
            ModelsDevSource::with_url("http://127.0.0.1:9/api.json").with_max_age(Duration::ZERO);
        seeded(&source);

        let err = source.fetch().await.expect_err("stale cache refetched");
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(source.cached().is_some());
    }

    #[test]
    fn stored_api_key_validates() {
        let provider = provider("acme");
        assert!(!provider.validate_config(&ProviderConfig::new()).is_ok());

        let mut config = ProviderConfig::new();
        config.insert("api_key".into(), "sk-test".into());
        assert!(provider.validate_config(&config).is_ok());
    }
}
