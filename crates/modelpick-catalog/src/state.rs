//! Catalog state and the store that owns it.
//!
//! State is immutable once published: every update builds a new
//! [`CatalogState`] that shares untouched provider entries with the previous
//! one. Anyone holding an older `Arc<CatalogState>` keeps a consistent, if
//! stale, view.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use modelpick_registry::ModelRecord;
use parking_lot::Mutex;
use serde::Serialize;

use crate::snapshot::CatalogSnapshot;

/// Per-provider lifecycle.
///
/// `Idle` is left on the first refresh attempt and never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
    MissingConfig,
}

impl ProviderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderStatus::Idle => "idle",
            ProviderStatus::Loading => "loading",
            ProviderStatus::Ready => "ready",
            ProviderStatus::Error => "error",
            ProviderStatus::MissingConfig => "missing-config",
        }
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Background work currently running for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PendingWork {
    pub hydrate: bool,
    pub refresh: bool,
}

/// Kind of background work, used to flip [`PendingWork`] flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    Hydrate,
    Refresh,
}

/// Working state for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCatalogState {
    pub provider_id: String,
    pub provider_name: String,
    pub status: ProviderStatus,
    /// Set iff `status` is [`ProviderStatus::Error`].
    pub error: Option<String>,
    /// Models keyed by id, in first-seen order.
    pub models: IndexMap<String, ModelRecord>,
    pub pending: PendingWork,
    /// Persisted models have been merged in. Flips to `true` once.
    pub hydrated: bool,
    pub last_updated_at: Option<u64>,
}

impl ProviderCatalogState {
    pub fn new(provider_id: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider_name: provider_name.into(),
            status: ProviderStatus::Idle,
            error: None,
            models: IndexMap::new(),
            pending: PendingWork::default(),
            hydrated: false,
            last_updated_at: None,
        }
    }

    /// Set the status, keeping `error` consistent with it.
    pub fn with_status(mut self, status: ProviderStatus) -> Self {
        self.status = status;
        self.error = None;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.status = ProviderStatus::Error;
        self.error = Some(message.into());
        self
    }

    pub fn with_pending(mut self, kind: WorkKind, active: bool) -> Self {
        match kind {
            WorkKind::Hydrate => self.pending.hydrate = active,
            WorkKind::Refresh => self.pending.refresh = active,
        }
        self
    }

    pub fn is_pending(&self, kind: WorkKind) -> bool {
        match kind {
            WorkKind::Hydrate => self.pending.hydrate,
            WorkKind::Refresh => self.pending.refresh,
        }
    }

    pub fn model(&self, model_id: &str) -> Option<&ModelRecord> {
        self.models.get(model_id)
    }
}

/// Root state: provider id → provider state.
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    providers: BTreeMap<String, Arc<ProviderCatalogState>>,
}

impl CatalogState {
    pub fn provider(&self, provider_id: &str) -> Option<&Arc<ProviderCatalogState>> {
        self.providers.get(provider_id)
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.providers.contains_key(provider_id)
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<ProviderCatalogState>> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// A copy of `self` with `state` stored under its provider id. Other
    /// providers are shared, not cloned.
    pub fn with_provider(&self, state: ProviderCatalogState) -> Self {
        let mut providers = self.providers.clone();
        providers.insert(state.provider_id.clone(), Arc::new(state));
        Self { providers }
    }
}

/// Zero-argument change callback.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

struct Published {
    state: Arc<CatalogState>,
    /// `None` after an update until the next read.
    snapshot: Option<Arc<CatalogSnapshot>>,
}

/// Owner of the catalog state tree.
///
/// All mutation funnels through [`StateStore::update_state`]; readers get
/// shared, immutable views.
pub struct StateStore {
    published: Mutex<Published>,
    listeners: Arc<Mutex<Listeners>>,
    version: AtomicU64,
}

impl StateStore {
    pub fn new(initial: CatalogState) -> Self {
        Self {
            published: Mutex::new(Published {
                state: Arc::new(initial),
                snapshot: None,
            }),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            version: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> Arc<CatalogState> {
        Arc::clone(&self.published.lock().state)
    }

    /// Number of updates that changed the state.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The current snapshot, rebuilt only if the state changed since the last
    /// call.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let mut published = self.published.lock();
        if let Some(snapshot) = &published.snapshot {
            return Arc::clone(snapshot);
        }
        let snapshot = Arc::new(CatalogSnapshot::from_state(&published.state));
        published.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Apply `updater` to the current state.
    ///
    /// Returning the same `Arc` that was passed in means "no change": nothing
    /// is published and no listener runs. Returns whether the state changed.
    pub fn update_state<F>(&self, updater: F) -> bool
    where
        F: FnOnce(&Arc<CatalogState>) -> Arc<CatalogState>,
    {
        {
            let mut published = self.published.lock();
            let next = updater(&published.state);
            if Arc::ptr_eq(&next, &published.state) {
                return false;
            }
            published.state = next;
            published.snapshot = None;
            self.version.fetch_add(1, Ordering::AcqRel);
        }
        self.notify();
        true
    }

    /// Register `listener`. Registering the same `Arc` twice is a no-op and
    /// yields a handle to the existing registration.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let mut listeners = self.listeners.lock();
        let id = match listeners
            .entries
            .iter()
            .find(|(_, existing)| Arc::ptr_eq(existing, &listener))
        {
            Some((id, _)) => *id,
            None => {
                let id = listeners.next_id;
                listeners.next_id += 1;
                listeners.entries.push((id, listener));
                id
            }
        };
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

/// Handle returned by [`StateStore::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter() -> (Listener, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let listener: Listener = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (listener, count)
    }

    #[test]
    fn identical_state_skips_notification() {
        let store = StateStore::new(CatalogState::default());
        let (listener, count) = counter();
        let _subscription = store.subscribe(listener);

        assert!(!store.update_state(Arc::clone));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(store.version(), 0);

        assert!(store.update_state(|state| {
            Arc::new(state.with_provider(ProviderCatalogState::new("acme", "Acme")))
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn snapshot_is_memoized_until_update() {
        let store = StateStore::new(CatalogState::default());
        let first = store.snapshot();
        assert!(Arc::ptr_eq(&first, &store.snapshot()));

        store.update_state(|state| {
            Arc::new(state.with_provider(ProviderCatalogState::new("acme", "Acme")))
        });
        let second = store.snapshot();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.provider("acme").is_some());
        assert!(first.provider("acme").is_none());
    }

    #[test]
    fn duplicate_subscriptions_collapse() {
        let store = StateStore::new(CatalogState::default());
        let (listener, count) = counter();
        let first = store.subscribe(Arc::clone(&listener));
        let _second = store.subscribe(listener);
        assert_eq!(store.listener_count(), 1);

        store.update_state(|state| {
            Arc::new(state.with_provider(ProviderCatalogState::new("acme", "Acme")))
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);

        first.unsubscribe();
        assert_eq!(store.listener_count(), 0);
        store.update_state(|state| {
            Arc::new(state.with_provider(ProviderCatalogState::new("beta", "Beta")))
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn untouched_providers_are_shared() {
        let state = CatalogState::default()
            .with_provider(ProviderCatalogState::new("acme", "Acme"))
            .with_provider(ProviderCatalogState::new("beta", "Beta"));
        let next = state.with_provider(
            ProviderCatalogState::new("beta", "Beta").with_status(ProviderStatus::Ready),
        );

        assert!(Arc::ptr_eq(
            state.provider("acme").expect("acme"),
            next.provider("acme").expect("acme")
        ));
        assert_eq!(
            state.provider("beta").expect("beta").status,
            ProviderStatus::Idle
        );
    }

    #[test]
    fn listener_may_read_the_store() {
        let store = Arc::new(StateStore::new(CatalogState::default()));
        let seen = Arc::new(AtomicUsize::new(0));
        let reader = Arc::clone(&store);
        let providers = Arc::clone(&seen);
        let _subscription = store.subscribe(Arc::new(move || {
            providers.store(reader.snapshot().len(), Ordering::SeqCst);
        }));

        store.update_state(|state| {
            Arc::new(state.with_provider(ProviderCatalogState::new("acme", "Acme")))
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
