//! Reading and writing a provider's model list through the storage port.
//!
//! Each provider's list lives under `models:<provider_id>` as a single string
//! field holding a versioned JSON envelope, so flat string-map backends can
//! store it unchanged.

use modelpick_registry::ModelRecord;
use modelpick_store::{Entry, KeyValueStore};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ENVELOPE_VERSION: u32 = 1;

/// Field of the stored entry holding the envelope JSON.
pub const ENVELOPE_FIELD: &str = "data";

pub fn models_key(provider_id: &str) -> String {
    format!("models:{provider_id}")
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    models: Vec<ModelRecord>,
}

/// Persisted `api`/`user` models for `provider_id`. Empty when nothing is
/// stored.
pub async fn get_persisted_models(
    store: &dyn KeyValueStore,
    provider_id: &str,
) -> Result<Vec<ModelRecord>> {
    let key = models_key(provider_id);
    let Some(entry) = store.get(&key).await? else {
        return Ok(Vec::new());
    };
    decode_entry(&key, &entry)
}

/// Store the `api`/`user` subset of `models` for `provider_id`.
pub async fn set_persisted_models(
    store: &dyn KeyValueStore,
    provider_id: &str,
    models: &[ModelRecord],
) -> Result<()> {
    let envelope = Envelope {
        version: ENVELOPE_VERSION,
        models: models
            .iter()
            .filter(|record| record.origin.is_persisted())
            .cloned()
            .collect(),
    };

    let mut entry = Entry::new();
    entry.insert(ENVELOPE_FIELD.to_string(), serde_json::to_string(&envelope)?);
    store.set(&models_key(provider_id), entry).await?;
    Ok(())
}

pub async fn clear_persisted_models(store: &dyn KeyValueStore, provider_id: &str) -> Result<()> {
    store.remove(&models_key(provider_id)).await?;
    Ok(())
}

fn decode_entry(key: &str, entry: &Entry) -> Result<Vec<ModelRecord>> {
    let raw = entry.get(ENVELOPE_FIELD).ok_or_else(|| Error::MissingField {
        key: key.to_string(),
        field: ENVELOPE_FIELD,
    })?;
    let envelope: Envelope = serde_json::from_str(raw)?;
    if envelope.version != ENVELOPE_VERSION {
        return Err(Error::UnsupportedVersion {
            key: key.to_string(),
            version: envelope.version,
        });
    }

    Ok(envelope
        .models
        .into_iter()
        .filter(|record| record.origin.is_persisted())
        .collect())
}
