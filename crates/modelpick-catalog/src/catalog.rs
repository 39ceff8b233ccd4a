//! The catalog: hydration, refresh, provider-set sync and user models on top
//! of the [`StateStore`].

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use modelpick_registry::{ModelProvider, ProviderConfig, ProviderDirectory};
use modelpick_store::KeyValueStore;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config;
use crate::error::Error;
use crate::merge;
use crate::persistence;
use crate::snapshot::CatalogSnapshot;
use crate::state::{
    CatalogState, Listener, ProviderCatalogState, ProviderStatus, StateStore, Subscription,
    WorkKind,
};
use crate::telemetry::{CatalogTelemetry, NoopTelemetry, StorageOperation, Telemetry};

/// Source of "now" in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Fetch even when the stored configuration does not validate.
    pub force: bool,
}

impl RefreshOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Configures and builds a [`Catalog`].
pub struct CatalogBuilder {
    directory: Arc<dyn ProviderDirectory>,
    storage: Arc<dyn KeyValueStore>,
    telemetry: Arc<dyn CatalogTelemetry>,
    clock: Clock,
}

impl CatalogBuilder {
    pub fn telemetry(mut self, telemetry: impl CatalogTelemetry + 'static) -> Self {
        self.telemetry = Arc::new(telemetry);
        self
    }

    pub fn telemetry_arc(mut self, telemetry: Arc<dyn CatalogTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Build the catalog, seeding state for every provider the directory
    /// currently lists.
    pub fn build(self) -> Catalog {
        let providers = self.directory.providers();
        let initial = providers.iter().fold(CatalogState::default(), |state, provider| {
            state.with_provider(initial_state(&provider.metadata().id, Some(provider.as_ref())))
        });
        let signature = signature_of(providers.iter().map(|p| p.metadata().id.clone()).collect());

        Catalog {
            inner: Arc::new(Inner {
                directory: self.directory,
                storage: self.storage,
                telemetry: Telemetry::new(self.telemetry),
                clock: self.clock,
                store: StateStore::new(initial),
                hydrations: Mutex::new(HashMap::new()),
                refreshes: Mutex::new(HashSet::new()),
                sync: ProviderSync {
                    signature: Mutex::new(signature),
                    dirty: AtomicBool::new(false),
                    spawned: AtomicBool::new(false),
                },
            }),
        }
    }
}

/// In-memory, per-provider model catalog.
///
/// Cheap to clone; clones share the same state.
///
/// # Example
///
/// ```ignore
/// let catalog = Catalog::builder(registry, storage)
///     .telemetry(TracingTelemetry)
///     .build();
/// catalog.initialize(true).await;
/// for model in catalog.snapshot().visible_models() {
///     println!("{}", model.qualified_id());
/// }
/// ```
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<Inner>,
}

impl Catalog {
    pub fn builder(
        directory: Arc<dyn ProviderDirectory>,
        storage: Arc<dyn KeyValueStore>,
    ) -> CatalogBuilder {
        CatalogBuilder {
            directory,
            storage,
            telemetry: Arc::new(NoopTelemetry),
            clock: Arc::new(now_ms),
        }
    }

    pub fn directory(&self) -> &Arc<dyn ProviderDirectory> {
        &self.inner.directory
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.storage
    }

    /// Call `listener` after every state change.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.store.subscribe(listener)
    }

    /// The current snapshot.
    ///
    /// If providers were registered since the last sync, a sync is scheduled
    /// and the new providers show up in a later snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.inner.check_provider_signature();
        self.inner.store.snapshot()
    }

    /// The raw state tree, shared.
    pub fn state(&self) -> Arc<CatalogState> {
        self.inner.store.state()
    }

    /// An owned copy of one provider's state.
    pub fn provider_state(&self, provider_id: &str) -> Option<ProviderCatalogState> {
        self.inner
            .store
            .state()
            .provider(provider_id)
            .map(|state| ProviderCatalogState::clone(state))
    }

    /// Fold newly registered providers into state now instead of waiting for
    /// the deferred sync.
    pub fn sync_providers(&self) {
        self.inner.sync.dirty.store(false, Ordering::Release);
        self.inner.sync_providers();
    }

    /// Hydrate every known provider; with `prefetch`, also refresh every
    /// provider that has stored credentials.
    pub async fn initialize(&self, prefetch: bool) {
        self.sync_providers();
        let ids = self.inner.directory.provider_ids();
        join_all(ids.iter().map(|id| self.inner.ensure_persisted_loaded(id))).await;

        if !prefetch {
            return;
        }
        let ids = self.inner.credentialed(&ids).await;
        debug!(providers = ids.len(), "prefetching providers with credentials");
        join_all(
            ids.iter()
                .map(|id| self.inner.refresh(id, RefreshOptions::default())),
        )
        .await;
    }

    /// Load persisted models for `provider_id`, once per catalog lifetime.
    pub async fn ensure_persisted_loaded(&self, provider_id: &str) {
        self.inner.drain_pending_sync();
        self.inner.ensure_persisted_loaded(provider_id).await;
    }

    /// Refresh `provider_id` from its live listing.
    ///
    /// Returns immediately if a refresh for this provider is already running
    /// or the provider is not registered. Inside a tokio runtime the refresh
    /// runs as its own task: dropping the returned future (for example on a
    /// caller-side timeout) stops the wait, not the refresh.
    pub async fn refresh(&self, provider_id: &str, options: RefreshOptions) {
        self.inner.drain_pending_sync();
        self.inner.refresh(provider_id, options).await;
    }

    /// Refresh every registered provider that has stored credentials.
    pub async fn refresh_all(&self) {
        self.inner.drain_pending_sync();
        let ids = self.inner.directory.provider_ids();
        let ids = self.inner.credentialed(&ids).await;
        join_all(
            ids.iter()
                .map(|id| self.inner.refresh(id, RefreshOptions::default())),
        )
        .await;
    }

    /// Add a hand-entered model id. No-op if any model with exactly this id
    /// exists for the provider.
    pub async fn add_user_model(&self, provider_id: &str, model_id: &str) {
        let inner = &self.inner;
        inner.drain_pending_sync();
        inner.ensure_persisted_loaded(provider_id).await;

        let now = (inner.clock)();
        let added = inner.update_provider(provider_id, |state| {
            merge::add_user_model(state, model_id, now)
        });
        if !added {
            debug!(provider = provider_id, model = model_id, "model already present");
            return;
        }

        inner.persist(provider_id).await;
        inner.telemetry.user_model_added(provider_id, model_id);
    }

    /// Remove a hand-entered model. Builtin and API models are left alone.
    pub async fn remove_user_model(&self, provider_id: &str, model_id: &str) {
        let inner = &self.inner;
        inner.drain_pending_sync();
        inner.ensure_persisted_loaded(provider_id).await;

        let removed =
            inner.update_provider(provider_id, |state| merge::remove_user_model(state, model_id));
        if removed {
            inner.persist(provider_id).await;
        }
    }
}

struct ProviderSync {
    /// Provider-id signature the state was last synced against.
    signature: Mutex<String>,
    /// The provider set changed and state has not caught up yet.
    dirty: AtomicBool,
    /// A sync task is queued on the runtime.
    spawned: AtomicBool,
}

struct Inner {
    directory: Arc<dyn ProviderDirectory>,
    storage: Arc<dyn KeyValueStore>,
    telemetry: Telemetry,
    clock: Clock,
    store: StateStore,
    hydrations: Mutex<HashMap<String, Shared<BoxFuture<'static, ()>>>>,
    refreshes: Mutex<HashSet<String>>,
    sync: ProviderSync,
}

impl Inner {
    /// Replace one provider's state. `update` returning `None`, or a value
    /// equal to the current one, publishes nothing.
    fn update_provider<F>(&self, provider_id: &str, update: F) -> bool
    where
        F: FnOnce(&ProviderCatalogState) -> Option<ProviderCatalogState>,
    {
        self.store.update_state(|state| {
            let Some(current) = state.provider(provider_id) else {
                return Arc::clone(state);
            };
            match update(current) {
                Some(next) if next != **current => Arc::new(state.with_provider(next)),
                _ => Arc::clone(state),
            }
        })
    }

    fn ensure_state(&self, provider_id: &str) {
        let provider = self.directory.provider(provider_id);
        self.store.update_state(|state| {
            if state.contains(provider_id) {
                return Arc::clone(state);
            }
            Arc::new(state.with_provider(initial_state(provider_id, provider.as_deref())))
        });
    }

    fn is_hydrated(&self, provider_id: &str) -> bool {
        self.store
            .state()
            .provider(provider_id)
            .is_some_and(|state| state.hydrated)
    }

    async fn ensure_persisted_loaded(self: &Arc<Self>, provider_id: &str) {
        self.ensure_state(provider_id);

        let in_flight = {
            let mut hydrations = self.hydrations.lock();
            match hydrations.get(provider_id) {
                Some(in_flight) => in_flight.clone(),
                None if self.is_hydrated(provider_id) => return,
                None => {
                    let slot = InFlight::new(self, provider_id, WorkKind::Hydrate);
                    let inner = Arc::clone(self);
                    let id = provider_id.to_string();
                    let task = detach(
                        async move {
                            let _slot = slot;
                            inner.hydrate(&id).await;
                        }
                        .boxed(),
                    )
                    .shared();
                    hydrations.insert(provider_id.to_string(), task.clone());
                    task
                }
            }
        };
        in_flight.await;
    }

    async fn hydrate(&self, provider_id: &str) {
        self.update_provider(provider_id, |state| {
            Some(state.clone().with_pending(WorkKind::Hydrate, true))
        });
        let _pending = PendingGuard::new(self, provider_id, WorkKind::Hydrate);

        let persisted =
            match persistence::get_persisted_models(self.storage.as_ref(), provider_id).await {
                Ok(models) => models,
                Err(err) => {
                    self.report_storage_error(provider_id, StorageOperation::LoadModels, &err);
                    Vec::new()
                }
            };
        debug!(
            provider = provider_id,
            count = persisted.len(),
            "hydrating persisted models"
        );

        self.update_provider(provider_id, |state| {
            Some(merge::merge_persisted(state, persisted).with_pending(WorkKind::Hydrate, false))
        });
    }

    async fn refresh(self: &Arc<Self>, provider_id: &str, options: RefreshOptions) {
        let task = {
            let mut refreshes = self.refreshes.lock();
            if refreshes.contains(provider_id) {
                debug!(provider = provider_id, "refresh already in flight");
                return;
            }
            let Some(provider) = self.directory.provider(provider_id) else {
                debug!(provider = provider_id, "refresh skipped for unregistered provider");
                return;
            };
            refreshes.insert(provider_id.to_string());

            let slot = InFlight::new(self, provider_id, WorkKind::Refresh);
            let inner = Arc::clone(self);
            let id = provider_id.to_string();
            detach(
                async move {
                    let _slot = slot;
                    let outcome = AssertUnwindSafe(inner.run_refresh(&id, provider, options))
                        .catch_unwind()
                        .await;
                    if outcome.is_err() {
                        warn!(provider = %id, "provider panicked during refresh");
                        inner.update_provider(&id, |state| {
                            Some(state.clone().with_error("provider panicked during refresh"))
                        });
                    }
                }
                .boxed(),
            )
        };
        task.await;
    }

    async fn run_refresh(
        self: &Arc<Self>,
        provider_id: &str,
        provider: Arc<dyn ModelProvider>,
        options: RefreshOptions,
    ) {
        self.ensure_persisted_loaded(provider_id).await;

        let config = match config::load_provider_config(self.storage.as_ref(), provider_id).await {
            Ok(config) => config,
            Err(err) => {
                self.report_storage_error(provider_id, StorageOperation::LoadConfig, &err);
                ProviderConfig::new()
            }
        };

        let validation = provider.validate_config(&config);
        if !validation.is_ok() && !options.force {
            info!(
                provider = provider_id,
                missing = ?validation.missing,
                "provider configuration incomplete"
            );
            self.update_provider(provider_id, |state| {
                Some(state.clone().with_status(ProviderStatus::MissingConfig))
            });
            return;
        }

        self.update_provider(provider_id, |state| {
            Some(
                state
                    .clone()
                    .with_status(ProviderStatus::Loading)
                    .with_pending(WorkKind::Refresh, true),
            )
        });
        let _pending = PendingGuard::new(self, provider_id, WorkKind::Refresh);
        self.telemetry.fetch_start(provider_id);

        match provider.fetch_models(&config).await {
            Ok(models) => {
                let count = models.len();
                let now = (self.clock)();
                self.update_provider(provider_id, |state| {
                    Some(merge::merge_api(state, models, now))
                });
                self.persist(provider_id).await;
                self.update_provider(provider_id, |state| {
                    Some(
                        state
                            .clone()
                            .with_status(ProviderStatus::Ready)
                            .with_pending(WorkKind::Refresh, false),
                    )
                });
                self.telemetry.fetch_success(provider_id, count);
            }
            Err(err) => {
                let message = err.to_string();
                self.update_provider(provider_id, |state| {
                    Some(
                        state
                            .clone()
                            .with_error(message.as_str())
                            .with_pending(WorkKind::Refresh, false),
                    )
                });
                self.telemetry.fetch_error(provider_id, &message);
            }
        }
    }

    /// Ids among `ids` with stored credentials, in input order.
    async fn credentialed(&self, ids: &[String]) -> Vec<String> {
        let checks = join_all(ids.iter().map(|id| async move {
            match config::has_stored_credentials(self.storage.as_ref(), id).await {
                Ok(true) => Some(id.clone()),
                Ok(false) => None,
                Err(err) => {
                    self.report_storage_error(id, StorageOperation::LoadConfig, &err);
                    None
                }
            }
        }))
        .await;
        checks.into_iter().flatten().collect()
    }

    /// Write the provider's api/user models back to storage.
    async fn persist(&self, provider_id: &str) {
        let models = self
            .store
            .state()
            .provider(provider_id)
            .map(|state| merge::persistable_models(state))
            .unwrap_or_default();
        if let Err(err) =
            persistence::set_persisted_models(self.storage.as_ref(), provider_id, &models).await
        {
            self.report_storage_error(provider_id, StorageOperation::SaveModels, &err);
        }
    }

    fn report_storage_error(&self, provider_id: &str, operation: StorageOperation, err: &Error) {
        self.telemetry
            .storage_error(provider_id, operation, &err.to_string());
    }

    fn check_provider_signature(self: &Arc<Self>) {
        let signature = signature_of(self.directory.provider_ids());
        if *self.sync.signature.lock() == signature {
            return;
        }
        self.sync.dirty.store(true, Ordering::Release);

        // Without a runtime the next catalog operation drains the flag.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if self.sync.spawned.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("provider set changed, scheduling sync");
        let inner = Arc::clone(self);
        handle.spawn(async move {
            inner.sync.spawned.store(false, Ordering::Release);
            inner.drain_pending_sync();
        });
    }

    fn drain_pending_sync(&self) {
        if self.sync.dirty.swap(false, Ordering::AcqRel) {
            self.sync_providers();
        }
    }

    fn sync_providers(&self) {
        let providers = self.directory.providers();
        let signature = signature_of(providers.iter().map(|p| p.metadata().id.clone()).collect());

        let changed = self.store.update_state(|state| {
            let missing: Vec<&Arc<dyn ModelProvider>> = providers
                .iter()
                .filter(|provider| !state.contains(&provider.metadata().id))
                .collect();
            if missing.is_empty() {
                return Arc::clone(state);
            }
            let next = missing.into_iter().fold(CatalogState::clone(state), |next, provider| {
                next.with_provider(initial_state(&provider.metadata().id, Some(provider.as_ref())))
            });
            Arc::new(next)
        });
        if changed {
            debug!("new providers added to catalog");
        }
        *self.sync.signature.lock() = signature;
    }
}

/// Clears a pending-work flag when dropped, whichever way the work ended.
struct PendingGuard<'a> {
    inner: &'a Inner,
    provider_id: &'a str,
    kind: WorkKind,
}

impl<'a> PendingGuard<'a> {
    fn new(inner: &'a Inner, provider_id: &'a str, kind: WorkKind) -> Self {
        Self {
            inner,
            provider_id,
            kind,
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let kind = self.kind;
        self.inner.update_provider(self.provider_id, |state| {
            state
                .is_pending(kind)
                .then(|| state.clone().with_pending(kind, false))
        });
    }
}

/// Holds a provider's slot in the hydration or refresh in-flight table and
/// frees it when the work ends, however it ends.
struct InFlight {
    inner: Arc<Inner>,
    id: String,
    kind: WorkKind,
}

impl InFlight {
    fn new(inner: &Arc<Inner>, id: &str, kind: WorkKind) -> Self {
        Self {
            inner: Arc::clone(inner),
            id: id.to_string(),
            kind,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        match self.kind {
            WorkKind::Hydrate => {
                let finished = self.inner.hydrations.lock().remove(&self.id);
                drop(finished);
            }
            WorkKind::Refresh => {
                self.inner.refreshes.lock().remove(&self.id);
            }
        }
    }
}

/// Start `work` so that it runs to completion even if every caller stops
/// waiting. On a tokio runtime it is spawned right away; without one it runs
/// inside the returned future.
fn detach(work: BoxFuture<'static, ()>) -> BoxFuture<'static, ()> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let task = handle.spawn(work);
            async move {
                if let Err(err) = task.await {
                    warn!(error = %err, "catalog task ended abnormally");
                }
            }
            .boxed()
        }
        Err(_) => work,
    }
}

fn initial_state(provider_id: &str, provider: Option<&dyn ModelProvider>) -> ProviderCatalogState {
    let name = provider
        .map(|provider| provider.metadata().name.clone())
        .unwrap_or_else(|| provider_id.to_string());
    let mut state = ProviderCatalogState::new(provider_id, name);
    if let Some(provider) = provider {
        state.models = merge::seed_builtins(provider.builtin_models());
    }
    state
}

fn signature_of(mut ids: Vec<String>) -> String {
    ids.sort();
    ids.join("\n")
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
