//! Read-only view of the catalog handed to UI code.

use std::collections::BTreeMap;

use modelpick_registry::ModelRecord;
use serde::Serialize;

use crate::state::{CatalogState, ProviderCatalogState, ProviderStatus};

/// A model together with the provider that offers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogModel {
    pub provider_id: String,
    pub provider_name: String,
    #[serde(flatten)]
    pub record: ModelRecord,
}

impl CatalogModel {
    /// `provider:model`, the form model pickers hand back to hosts.
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.provider_id, self.record.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSnapshot {
    pub provider_id: String,
    pub provider_name: String,
    pub status: ProviderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every known model, hidden ones included, in catalog order.
    pub models: Vec<CatalogModel>,
}

impl ProviderSnapshot {
    fn from_state(state: &ProviderCatalogState) -> Self {
        Self {
            provider_id: state.provider_id.clone(),
            provider_name: state.provider_name.clone(),
            status: state.status,
            error: state.error.clone(),
            models: state
                .models
                .values()
                .map(|record| CatalogModel {
                    provider_id: state.provider_id.clone(),
                    provider_name: state.provider_name.clone(),
                    record: record.clone(),
                })
                .collect(),
        }
    }

    pub fn visible_models(&self) -> impl Iterator<Item = &CatalogModel> {
        self.models.iter().filter(|model| model.record.visible)
    }

    pub fn model(&self, model_id: &str) -> Option<&CatalogModel> {
        self.models.iter().find(|model| model.record.id == model_id)
    }

    pub fn model_ids(&self) -> Vec<&str> {
        self.models.iter().map(|model| model.record.id.as_str()).collect()
    }
}

/// Provider-keyed view of the catalog. Immutable; a new snapshot is built
/// after every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CatalogSnapshot {
    providers: BTreeMap<String, ProviderSnapshot>,
}

impl CatalogSnapshot {
    pub fn from_state(state: &CatalogState) -> Self {
        Self {
            providers: state
                .providers()
                .map(|provider| {
                    (
                        provider.provider_id.clone(),
                        ProviderSnapshot::from_state(provider),
                    )
                })
                .collect(),
        }
    }

    pub fn provider(&self, provider_id: &str) -> Option<&ProviderSnapshot> {
        self.providers.get(provider_id)
    }

    /// Providers ordered by id.
    pub fn providers(&self) -> impl Iterator<Item = &ProviderSnapshot> {
        self.providers.values()
    }

    /// Visible models across every provider.
    pub fn visible_models(&self) -> impl Iterator<Item = &CatalogModel> {
        self.providers.values().flat_map(ProviderSnapshot::visible_models)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_keeps_model_order_and_provider_metadata() {
        let mut provider = ProviderCatalogState::new("acme", "Acme AI");
        for id in ["zeta", "alpha"] {
            provider
                .models
                .insert(id.to_string(), ModelRecord::new(id, id.to_uppercase()));
        }
        let mut hidden = ModelRecord::new("old", "Old");
        hidden.visible = false;
        provider.models.insert("old".to_string(), hidden);

        let state = CatalogState::default().with_provider(provider);
        let snapshot = CatalogSnapshot::from_state(&state);
        let acme = snapshot.provider("acme").expect("acme");

        assert_eq!(acme.model_ids(), vec!["zeta", "alpha", "old"]);
        assert_eq!(acme.visible_models().count(), 2);
        assert_eq!(acme.models[0].provider_name, "Acme AI");
        assert_eq!(acme.models[1].qualified_id(), "acme:alpha");
    }

    #[test]
    fn serializes_status_in_kebab_case() {
        let state = CatalogState::default().with_provider(
            ProviderCatalogState::new("acme", "Acme").with_status(ProviderStatus::MissingConfig),
        );
        let json = serde_json::to_value(CatalogSnapshot::from_state(&state)).expect("json");
        assert_eq!(json["acme"]["status"], "missing-config");
        assert!(json["acme"].get("error").is_none());
    }
}
