//! Stored provider configuration (credentials, endpoints).

use modelpick_registry::ProviderConfig;
use modelpick_store::KeyValueStore;

use crate::error::Result;

pub fn provider_config_key(provider_id: &str) -> String {
    format!("provider:{provider_id}")
}

/// The stored config for `provider_id`, empty if none.
pub async fn load_provider_config(
    store: &dyn KeyValueStore,
    provider_id: &str,
) -> Result<ProviderConfig> {
    Ok(store
        .get(&provider_config_key(provider_id))
        .await?
        .unwrap_or_default())
}

pub async fn save_provider_config(
    store: &dyn KeyValueStore,
    provider_id: &str,
    config: ProviderConfig,
) -> Result<()> {
    store.set(&provider_config_key(provider_id), config).await?;
    Ok(())
}

pub async fn remove_provider_config(store: &dyn KeyValueStore, provider_id: &str) -> Result<()> {
    store.remove(&provider_config_key(provider_id)).await?;
    Ok(())
}

/// Whether anything non-blank is stored for `provider_id`.
pub async fn has_stored_credentials(store: &dyn KeyValueStore, provider_id: &str) -> Result<bool> {
    let config = load_provider_config(store, provider_id).await?;
    Ok(config.values().any(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use modelpick_store::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn blank_values_are_not_credentials() {
        let store = MemoryStore::new();
        assert!(!has_stored_credentials(&store, "acme").await.expect("check"));

        let mut config = ProviderConfig::new();
        config.insert("api_key".into(), "  ".into());
        save_provider_config(&store, "acme", config).await.expect("save");
        assert!(!has_stored_credentials(&store, "acme").await.expect("check"));

        let mut config = ProviderConfig::new();
        config.insert("api_key".into(), "sk-1".into());
        save_provider_config(&store, "acme", config).await.expect("save");
        assert!(has_stored_credentials(&store, "acme").await.expect("check"));
        assert_eq!(
            load_provider_config(&store, "acme").await.expect("load")["api_key"],
            "sk-1"
        );

        remove_provider_config(&store, "acme").await.expect("remove");
        assert!(load_provider_config(&store, "acme").await.expect("load").is_empty());
    }
}
