//! Reconciliation of builtin, persisted, fetched and user-added models.
//!
//! Every function here is pure: it takes the current provider state and
//! returns the next one. Callers decide when "nothing changed" (`None`).

use std::collections::HashSet;

use indexmap::IndexMap;
use modelpick_registry::{ModelOrigin, ModelRecord};

use crate::state::ProviderCatalogState;

/// Builtins as stored in the catalog: origin `builtin`, visible.
pub fn seed_builtins(builtins: &[ModelRecord]) -> IndexMap<String, ModelRecord> {
    builtins
        .iter()
        .map(|record| {
            let mut record = record.clone();
            record.origin = ModelOrigin::Builtin;
            record.visible = true;
            (record.id.clone(), record)
        })
        .collect()
}

/// Fold persisted records into `state` and mark it hydrated.
///
/// A persisted record replaces an existing one with the same id, except that
/// an existing `discovered_at` survives when the persisted record has none.
pub fn merge_persisted(
    state: &ProviderCatalogState,
    persisted: Vec<ModelRecord>,
) -> ProviderCatalogState {
    let mut next = state.clone();
    for mut record in persisted {
        if let Some(existing) = next.models.get(&record.id)
            && record.discovered_at.is_none()
        {
            record.discovered_at = existing.discovered_at;
        }
        next.models.insert(record.id.clone(), record);
    }
    next.hydrated = true;
    next
}

/// Fold a successful live fetch into `state`.
///
/// - fetched records become `api`-origin and visible;
/// - `discovered_at` is inherited, or `now` for first sightings;
/// - `api` records missing from the batch are hidden, never removed;
/// - `builtin` and `user` records are left alone even if fetched again.
pub fn merge_api(
    state: &ProviderCatalogState,
    fetched: Vec<ModelRecord>,
    now: u64,
) -> ProviderCatalogState {
    let mut next = state.clone();
    let mut seen = HashSet::with_capacity(fetched.len());

    for mut record in fetched {
        seen.insert(record.id.clone());
        let discovered_at = match next.models.get(&record.id) {
            Some(existing) if existing.origin != ModelOrigin::Api => continue,
            Some(existing) => existing.discovered_at.unwrap_or(now),
            None => now,
        };
        record.origin = ModelOrigin::Api;
        record.visible = true;
        record.discovered_at = Some(discovered_at);
        record.updated_at = Some(now);
        next.models.insert(record.id.clone(), record);
    }

    for record in next.models.values_mut() {
        if record.origin == ModelOrigin::Api && !seen.contains(&record.id) {
            record.visible = false;
            record.updated_at = Some(now);
        }
    }

    next.last_updated_at = Some(now);
    next
}

/// Add a hand-entered model. `None` if any record already has this exact id.
pub fn add_user_model(
    state: &ProviderCatalogState,
    model_id: &str,
    now: u64,
) -> Option<ProviderCatalogState> {
    if state.models.contains_key(model_id) {
        return None;
    }

    let mut record = ModelRecord::new(model_id, model_id).with_origin(ModelOrigin::User);
    record.discovered_at = Some(now);
    record.updated_at = Some(now);

    let mut next = state.clone();
    next.models.insert(model_id.to_string(), record);
    Some(next)
}

/// Remove a hand-entered model. `None` unless the record exists with origin
/// `user`.
pub fn remove_user_model(
    state: &ProviderCatalogState,
    model_id: &str,
) -> Option<ProviderCatalogState> {
    match state.models.get(model_id) {
        Some(record) if record.origin == ModelOrigin::User => {
            let mut next = state.clone();
            next.models.shift_remove(model_id);
            Some(next)
        }
        _ => None,
    }
}

/// Records that belong in storage (`api` and `user` origins), in catalog
/// order.
pub fn persistable_models(state: &ProviderCatalogState) -> Vec<ModelRecord> {
    state
        .models
        .values()
        .filter(|record| record.origin.is_persisted())
        .cloned()
        .collect()
}
