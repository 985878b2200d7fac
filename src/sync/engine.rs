use std::{
    collections::BTreeMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use futures::StreamExt;
use tokio::{
    sync::{RwLock, watch},
    time::sleep,
};
use tracing::{debug, info, warn};

use super::{
    Entity,
    cache::{CollectionCache, SyncStatus},
    error::SyncError,
    groups::{self, GroupsSnapshot},
    retry::RetryPolicy,
    subscription::{Subscription, SubscriptionShared},
};
use crate::dao::{
    document_store::{CollectionName, DocumentStore, SnapshotStream},
    models::{DocumentModel, FixtureEntity, ResultEntity, TeamEntity},
};

/// Shared handle to the engine.
pub type SharedEngine = Arc<SyncEngine>;

/// Settings fixed for the lifetime of an engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Backoff and deadline applied to every remote call.
    pub retry: RetryPolicy,
    /// Group labels always present in the groups view.
    pub group_labels: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            group_labels: vec!["A".into(), "B".into(), "C".into()],
        }
    }
}

/// Values shown for a collection that is empty remotely or could not be loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionDefaults {
    /// Default groups view; teams take the label they are listed under.
    pub groups: GroupsSnapshot,
    /// Default fixtures.
    pub fixtures: Vec<FixtureEntity>,
    /// Default results.
    pub results: Vec<ResultEntity>,
}

/// Where the contents reported by a load came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Documents listed from the store.
    Remote,
    /// The store collection was empty, or unreachable before any successful load.
    Default,
    /// The store was unreachable; contents of the last successful sync were kept.
    LastKnownGood,
}

/// Outcome of loading one collection.
#[derive(Debug)]
pub struct Loaded<E> {
    /// In-memory contents after the load, ordered by key.
    pub entities: Vec<E>,
    /// Origin of `entities`.
    pub source: LoadSource,
    /// Failure that forced a fallback, if any.
    pub error: Option<SyncError>,
}

impl<E> Loaded<E> {
    /// Whether the collection now mirrors the store.
    pub fn is_synced(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of [`SyncEngine::load_all`].
#[derive(Debug)]
#[allow(missing_docs)]
pub struct LoadReport {
    pub teams: Loaded<TeamEntity>,
    pub fixtures: Loaded<FixtureEntity>,
    pub results: Loaded<ResultEntity>,
    /// Groups view of `teams`.
    pub groups: GroupsSnapshot,
}

impl LoadReport {
    /// Whether every collection loaded from the store.
    pub fn is_complete(&self) -> bool {
        self.teams.is_synced() && self.fixtures.is_synced() && self.results.is_synced()
    }
}

/// Per-collection caches, addressed through [`Entity::cache`].
pub struct Collections {
    pub(crate) teams: CollectionCache<TeamEntity>,
    pub(crate) fixtures: CollectionCache<FixtureEntity>,
    pub(crate) results: CollectionCache<ResultEntity>,
}

/// Keeps the in-memory tournament state consistent with a remote document store.
///
/// Mutations and loads are serialized per collection. A mutation is applied in memory first,
/// then written remotely, and rolled back if the write fails unless a newer full-collection
/// replacement (load or live snapshot) landed in between.
pub struct SyncEngine {
    settings: SyncSettings,
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    degraded: watch::Sender<bool>,
    closed: AtomicBool,
    collections: Collections,
    subscriptions: DashMap<u64, Arc<SubscriptionShared>>,
    next_subscription: AtomicU64,
}

impl SyncEngine {
    /// Create an engine with empty, unloaded collections and no store (degraded).
    pub fn open(settings: SyncSettings) -> SharedEngine {
        let (degraded, _rx) = watch::channel(true);
        Arc::new(Self {
            settings,
            store: RwLock::new(None),
            degraded,
            closed: AtomicBool::new(false),
            collections: Collections {
                teams: CollectionCache::new(CollectionName::Teams),
                fixtures: CollectionCache::new(CollectionName::Fixtures),
                results: CollectionCache::new(CollectionName::Results),
            },
            subscriptions: DashMap::new(),
            next_subscription: AtomicU64::new(1),
        })
    }

    /// Configured group labels.
    pub fn group_labels(&self) -> &[String] {
        &self.settings.group_labels
    }

    /// Install a store and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn DocumentStore>) -> Result<(), SyncError> {
        self.ensure_open()?;
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
        Ok(())
    }

    /// Drop the store, tear down every subscription and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
        self.close_subscriptions().await;
    }

    /// Installed store, if any.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        self.store.read().await.clone()
    }

    /// Whether no store is installed.
    pub async fn is_degraded(&self) -> bool {
        self.store.read().await.is_none()
    }

    /// Subscribe to degraded mode changes.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Whether [`SyncEngine::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// End the engine lifecycle: later operations fail with [`SyncError::Closed`] and no
    /// subscription callback runs once this returns.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.clear_store().await;
        info!("sync engine closed");
    }

    /// Load the three collections concurrently, falling back to `defaults` per collection.
    pub async fn load_all(&self, defaults: CollectionDefaults) -> Result<LoadReport, SyncError> {
        self.ensure_open()?;
        let CollectionDefaults {
            groups: default_groups,
            fixtures,
            results,
        } = defaults;

        let (teams, fixtures, results) = tokio::join!(
            self.load(groups::flatten(&default_groups)),
            self.load(fixtures),
            self.load(results),
        );
        let groups = groups::group_teams(self.group_labels(), teams.entities.iter().cloned());

        Ok(LoadReport {
            teams,
            fixtures,
            results,
            groups,
        })
    }

    /// Load one collection, replacing its in-memory contents as a whole.
    pub async fn load<E: Entity>(&self, defaults: Vec<E>) -> Loaded<E> {
        let collection = E::COLLECTION;
        let cache = E::cache(&self.collections);
        let _gate = cache.lock_gate().await;
        cache.begin_load().await;

        let listed = match self.current_store().await {
            Ok(store) => {
                self.settings
                    .retry
                    .run(collection, "list", || store.list(collection))
                    .await
            }
            Err(err) => Err(err),
        };

        match listed {
            Ok(documents) if documents.is_empty() => {
                debug!(%collection, "remote collection empty; seeding defaults");
                Loaded {
                    entities: cache.finish_load(defaults).await,
                    source: LoadSource::Default,
                    error: None,
                }
            }
            Ok(documents) => {
                let entities = documents.into_iter().map(E::from_document).collect();
                let entities = cache.finish_load(entities).await;
                info!(%collection, count = entities.len(), "collection loaded");
                Loaded {
                    entities,
                    source: LoadSource::Remote,
                    error: None,
                }
            }
            Err(err) => {
                let (entities, kept) = cache.fail_load(defaults).await;
                let source = if kept {
                    LoadSource::LastKnownGood
                } else {
                    LoadSource::Default
                };
                warn!(%collection, error = %err, ?source, "collection load failed; using fallback");
                Loaded {
                    entities,
                    source,
                    error: Some(err),
                }
            }
        }
    }

    /// Create or fully overwrite `entity`.
    pub async fn upsert<E: Entity>(&self, entity: E) -> Result<E, SyncError> {
        let collection = E::COLLECTION;
        let cache = E::cache(&self.collections);
        let _gate = cache.lock_gate().await;
        let store = self.current_store().await?;

        let key = entity.key().to_string();
        let document = entity.to_document();
        let pending = cache.begin_mutation(&key, Some(entity.clone())).await;

        let written = self
            .settings
            .retry
            .run(collection, "put", || store.put(collection, document.clone()))
            .await;

        if let Err(err) = written {
            let undone = cache.rollback(pending).await;
            cache.settle().await;
            warn!(%collection, key, error = %err, undone, "upsert failed");
            return Err(err);
        }

        cache.settle().await;
        debug!(%collection, key, "upserted");
        Ok(entity)
    }

    /// Remove `key` locally and remotely. Returns whether it existed in either place; a key
    /// absent from both is left alone.
    pub async fn delete<E: Entity>(&self, key: &str) -> Result<bool, SyncError> {
        let collection = E::COLLECTION;
        let cache = E::cache(&self.collections);
        let _gate = cache.lock_gate().await;
        let store = self.current_store().await?;

        let pending = cache.begin_mutation(key, None).await;
        let cached = pending.had_value();

        let removed = self
            .settings
            .retry
            .run(collection, "delete", || store.delete(collection, key.to_string()))
            .await;

        match removed {
            Ok(remote) => {
                cache.settle().await;
                debug!(%collection, key, cached, remote, "deleted");
                Ok(cached || remote)
            }
            Err(err) => {
                let undone = cache.rollback(pending).await;
                cache.settle().await;
                warn!(%collection, key, error = %err, undone, "delete failed");
                Err(err)
            }
        }
    }

    /// Make the remote team collection match `snapshot`: stale teams are deleted first, then
    /// teams that differ from their remote document are written. Returns the normalized
    /// snapshot now held in memory.
    pub async fn replace_groups_all(&self, snapshot: GroupsSnapshot) -> Result<GroupsSnapshot, SyncError> {
        let _gate = self.collections.teams.lock_gate().await;
        let store = self.current_store().await?;
        self.replace_teams(store.as_ref(), &snapshot).await
    }

    /// Edit the cached groups view and make the remote team collection match the result, all
    /// under the teams write gate, so concurrent edits each see the previous one. `edit`
    /// returns `None` to leave both sides untouched.
    pub async fn edit_groups<T, F>(&self, edit: F) -> Result<Option<(T, GroupsSnapshot)>, SyncError>
    where
        F: FnOnce(&mut GroupsSnapshot) -> Option<T>,
    {
        let cache = &self.collections.teams;
        let _gate = cache.lock_gate().await;
        let store = self.current_store().await?;

        let mut current = groups::group_teams(self.group_labels(), cache.snapshot().await);
        let Some(outcome) = edit(&mut current) else {
            return Ok(None);
        };
        let replaced = self.replace_teams(store.as_ref(), &current).await?;
        Ok(Some((outcome, replaced)))
    }

    /// Body of a groups replacement; the caller holds the teams write gate.
    async fn replace_teams(
        &self,
        store: &dyn DocumentStore,
        snapshot: &GroupsSnapshot,
    ) -> Result<GroupsSnapshot, SyncError> {
        let collection = CollectionName::Teams;
        let cache = &self.collections.teams;

        let normalized = groups::normalize(self.group_labels(), snapshot);
        let desired = groups::flatten(&normalized);
        let pending = cache.begin_replace(desired.clone()).await;

        match self.rewrite_teams(store, &desired).await {
            Ok(()) => {
                cache.settle().await;
                Ok(normalized)
            }
            Err(err) => {
                warn!(%collection, error = %err, "group replacement failed; reconciling with store");
                let relisted = self
                    .settings
                    .retry
                    .run(collection, "list", || store.list(collection))
                    .await;
                match relisted {
                    Ok(documents) => {
                        cache
                            .apply_remote(documents.into_iter().map(TeamEntity::from_document).collect())
                            .await;
                    }
                    Err(list_err) => {
                        let restored = cache.restore(pending).await;
                        warn!(%collection, error = %list_err, restored, "reconciliation failed; restored previous teams");
                    }
                }
                cache.settle().await;
                Err(err)
            }
        }
    }

    async fn rewrite_teams(&self, store: &dyn DocumentStore, desired: &[TeamEntity]) -> Result<(), SyncError> {
        let collection = CollectionName::Teams;
        let retry = &self.settings.retry;

        let remote: BTreeMap<String, TeamEntity> = retry
            .run(collection, "list", || store.list(collection))
            .await?
            .into_iter()
            .map(|document| {
                let team = TeamEntity::from_document(document);
                (team.key.clone(), team)
            })
            .collect();
        let wanted: BTreeMap<&str, &TeamEntity> =
            desired.iter().map(|team| (team.key.as_str(), team)).collect();

        let stale: Vec<&String> = remote.keys().filter(|key| !wanted.contains_key(key.as_str())).collect();
        for key in &stale {
            retry
                .run(collection, "delete", || store.delete(collection, key.to_string()))
                .await?;
        }

        let mut written = 0;
        for team in desired {
            if remote.get(&team.key) == Some(team) {
                continue;
            }
            let document = team.to_document();
            retry
                .run(collection, "put", || store.put(collection, document.clone()))
                .await?;
            written += 1;
        }

        info!(%collection, deleted = stale.len(), written, "groups replaced");
        Ok(())
    }

    /// Listen to remote changes of `E`'s collection. Every snapshot replaces the in-memory
    /// collection, then `on_change` receives the new contents.
    ///
    /// The listener reopens the watch with backoff when the stream breaks, and stops when the
    /// store is cleared or the engine closes.
    pub async fn subscribe<E, F>(self: &Arc<Self>, on_change: F) -> Result<Subscription, SyncError>
    where
        E: Entity,
        F: Fn(Vec<E>) + Send + Sync + 'static,
    {
        let collection = E::COLLECTION;
        let store = self.current_store().await?;
        let stream = self
            .settings
            .retry
            .run(collection, "watch", || store.watch(collection))
            .await?;
        self.ensure_open()?;

        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(SubscriptionShared::new(id, collection));
        self.subscriptions.insert(id, shared.clone());

        let task = tokio::spawn(listen::<E, F>(
            Arc::downgrade(self),
            shared.clone(),
            stream,
            on_change,
        ));
        shared.attach(task.abort_handle());
        info!(%collection, id, "subscribed to remote changes");

        Ok(Subscription::new(shared, Arc::downgrade(self)))
    }

    /// Current contents of `E`'s collection, ordered by key.
    pub async fn snapshot<E: Entity>(&self) -> Vec<E> {
        E::cache(&self.collections).snapshot().await
    }

    /// Cached entity stored under `key`.
    pub async fn get<E: Entity>(&self, key: &str) -> Option<E> {
        E::cache(&self.collections).get(key).await
    }

    /// Teams grouped by label.
    pub async fn groups(&self) -> GroupsSnapshot {
        let teams = self.collections.teams.snapshot().await;
        groups::group_teams(self.group_labels(), teams)
    }

    /// Lifecycle state of `E`'s collection.
    pub fn status<E: Entity>(&self) -> SyncStatus {
        E::cache(&self.collections).status()
    }

    /// Lifecycle state of every collection.
    pub fn statuses(&self) -> [(CollectionName, SyncStatus); 3] {
        [
            (CollectionName::Teams, self.collections.teams.status()),
            (CollectionName::Fixtures, self.collections.fixtures.status()),
            (CollectionName::Results, self.collections.results.status()),
        ]
    }

    /// Watch the lifecycle state of `E`'s collection.
    pub fn status_watcher<E: Entity>(&self) -> watch::Receiver<SyncStatus> {
        E::cache(&self.collections).status_watcher()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub(crate) fn forget_subscription(&self, id: u64) {
        self.subscriptions.remove(&id);
    }

    fn ensure_open(&self) -> Result<(), SyncError> {
        if self.is_closed() {
            Err(SyncError::Closed)
        } else {
            Ok(())
        }
    }

    async fn current_store(&self) -> Result<Arc<dyn DocumentStore>, SyncError> {
        self.ensure_open()?;
        let guard = self.store.read().await;
        guard.as_ref().cloned().ok_or(SyncError::Degraded)
    }

    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    async fn close_subscriptions(&self) {
        let active: Vec<Arc<SubscriptionShared>> = self
            .subscriptions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.subscriptions.clear();
        for shared in active {
            shared.shutdown().await;
        }
    }

    async fn apply_snapshot<E: Entity>(&self, entities: Vec<E>) -> Vec<E> {
        E::cache(&self.collections).apply_remote(entities).await
    }

    /// Reopen a broken watch, retrying transient failures until it works or the subscription
    /// can no longer run.
    async fn reopen_watch(&self, shared: &SubscriptionShared) -> Option<SnapshotStream> {
        let collection = shared.collection();
        loop {
            if !shared.is_alive().await {
                return None;
            }
            let store = match self.current_store().await {
                Ok(store) => store,
                Err(err) => {
                    debug!(%collection, error = %err, "watch not reopened");
                    return None;
                }
            };
            match self
                .settings
                .retry
                .run(collection, "watch", || store.watch(collection))
                .await
            {
                Ok(stream) => return Some(stream),
                Err(err) if err.is_retryable() => {
                    warn!(%collection, error = %err, "reopening watch failed; will retry");
                    sleep(self.settings.retry.max_delay).await;
                }
                Err(err) => {
                    warn!(%collection, error = %err, "watch cannot be reopened");
                    return None;
                }
            }
        }
    }
}

async fn listen<E, F>(
    engine: Weak<SyncEngine>,
    shared: Arc<SubscriptionShared>,
    mut stream: SnapshotStream,
    on_change: F,
) where
    E: Entity,
    F: Fn(Vec<E>) + Send + Sync + 'static,
{
    let collection = shared.collection();
    loop {
        while let Some(item) = stream.next().await {
            let documents = match item {
                Ok(documents) => documents,
                Err(err) => {
                    warn!(%collection, error = %err, "watch stream failed");
                    break;
                }
            };
            let Some(engine) = engine.upgrade() else {
                return;
            };
            let Some(_alive) = shared.enter().await else {
                return;
            };
            let entities = documents.into_iter().map(E::from_document).collect();
            let current = engine.apply_snapshot::<E>(entities).await;
            on_change(current);
        }

        let Some(engine) = engine.upgrade() else {
            return;
        };
        match engine.reopen_watch(&shared).await {
            Some(next) => stream = next,
            None => {
                engine.forget_subscription(shared.id());
                debug!(%collection, id = shared.id(), "subscription ended");
                return;
            }
        }
    }
}
