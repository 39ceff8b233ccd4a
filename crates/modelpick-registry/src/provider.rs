//! The provider port: what the catalog needs from a vendor integration.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Error;
use crate::model::ModelRecord;

/// Flat provider configuration as kept by the storage backend
/// (e.g. `api_key`, `base_url`).
pub type ProviderConfig = HashMap<String, String>;

/// Static provider metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    /// Provider identifier, e.g. `"openai"`.
    pub id: String,
    /// Display name, e.g. `"OpenAI"`.
    pub name: String,
    /// Optional link to the provider's documentation.
    pub doc_url: Option<String>,
}

impl ProviderMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            doc_url: None,
        }
    }
}

/// Outcome of [`ModelProvider::validate_config`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigValidation {
    /// Config keys that are required but absent or empty.
    pub missing: Vec<String>,
    /// Human readable problems beyond missing keys.
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Self {
            missing: vec![key.into()],
            errors: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.errors.is_empty()
    }
}

/// A vendor integration.
///
/// Providers are told apart by [`ProviderMetadata::id`] and looked up through
/// a [`ProviderDirectory`](crate::ProviderDirectory), never by runtime type.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn metadata(&self) -> &ProviderMetadata;

    /// Models shipped with the integration, available without any network
    /// access.
    fn builtin_models(&self) -> &[ModelRecord];

    /// Check whether `config` is sufficient for [`fetch_models`](Self::fetch_models).
    fn validate_config(&self, config: &ProviderConfig) -> ConfigValidation;

    /// Fetch the provider's current model listing.
    async fn fetch_models(&self, config: &ProviderConfig) -> Result<Vec<ModelRecord>, Error>;
}

/// Returns the first non-blank value among `keys` in `config`.
pub fn config_value<'a>(config: &'a ProviderConfig, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| config.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_reports_missing_keys() {
        assert!(ConfigValidation::ok().is_ok());
        let missing = ConfigValidation::missing("api_key");
        assert!(!missing.is_ok());
        assert_eq!(missing.missing, vec!["api_key".to_string()]);
    }

    #[test]
    fn config_value_skips_blank_entries() {
        let mut config = ProviderConfig::new();
        config.insert("api_key".into(), "   ".into());
        config.insert("access_token".into(), "tok".into());

        assert_eq!(
            config_value(&config, &["api_key", "access_token"]),
            Some("tok")
        );
        assert_eq!(config_value(&config, &["base_url"]), None);
    }
}
