use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock, watch};
use tracing::debug;

use crate::dao::{document_store::CollectionName, models::DocumentModel};

/// Lifecycle of one in-memory collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never loaded, or the last load failed and defaults are shown.
    Unloaded,
    /// A load is in flight.
    Loading,
    /// In-memory state mirrors the store.
    Synced,
    /// A mutation is in flight.
    Syncing,
}

struct CacheState<E> {
    entries: BTreeMap<String, E>,
    /// Bumped on every full-collection replacement.
    generation: u64,
    /// Set once a load or live snapshot succeeded.
    loaded: bool,
    busy: bool,
}

/// Record of an optimistic change, consumed by [`CollectionCache::rollback`].
pub(crate) struct Pending<E> {
    key: String,
    previous: Option<E>,
    generation: u64,
}

impl<E> Pending<E> {
    /// Whether the key held a value before the change.
    pub(crate) fn had_value(&self) -> bool {
        self.previous.is_some()
    }
}

/// Record of an optimistic full replacement, consumed by [`CollectionCache::restore`].
pub(crate) struct PendingReplace<E> {
    previous: BTreeMap<String, E>,
    generation: u64,
}

/// In-memory copy of one collection plus its write gate and status channel.
pub struct CollectionCache<E> {
    collection: CollectionName,
    state: RwLock<CacheState<E>>,
    status: watch::Sender<SyncStatus>,
    gate: Mutex<()>,
}

impl<E> CollectionCache<E>
where
    E: DocumentModel + Clone,
{
    pub(crate) fn new(collection: CollectionName) -> Self {
        let (status, _rx) = watch::channel(SyncStatus::Unloaded);
        Self {
            collection,
            state: RwLock::new(CacheState {
                entries: BTreeMap::new(),
                generation: 0,
                loaded: false,
                busy: false,
            }),
            status,
            gate: Mutex::new(()),
        }
    }

    /// Wait for exclusive mutating access. Tokio mutexes are fair, so callers are served in
    /// arrival order.
    pub(crate) async fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    pub(crate) async fn snapshot(&self) -> Vec<E> {
        let guard = self.state.read().await;
        guard.entries.values().cloned().collect()
    }

    pub(crate) async fn get(&self, key: &str) -> Option<E> {
        let guard = self.state.read().await;
        guard.entries.get(key).cloned()
    }

    pub(crate) fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub(crate) fn status_watcher(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub(crate) async fn begin_load(&self) {
        let mut guard = self.state.write().await;
        guard.busy = true;
        self.set_status(SyncStatus::Loading);
    }

    /// Replace the whole collection with a successful load or seeded default.
    pub(crate) async fn finish_load(&self, entities: Vec<E>) -> Vec<E> {
        let mut guard = self.state.write().await;
        guard.entries = index(entities);
        guard.generation += 1;
        guard.loaded = true;
        guard.busy = false;
        self.set_status(SyncStatus::Synced);
        guard.entries.values().cloned().collect()
    }

    /// Settle a failed load: keep the last synced contents when there are any, otherwise
    /// show `defaults`.
    pub(crate) async fn fail_load(&self, defaults: Vec<E>) -> (Vec<E>, bool) {
        let mut guard = self.state.write().await;
        let kept = guard.loaded;
        if !kept {
            guard.entries = index(defaults);
            guard.generation += 1;
        }
        guard.busy = false;
        self.set_status(SyncStatus::Unloaded);
        (guard.entries.values().cloned().collect(), kept)
    }

    /// Apply a full snapshot pushed by the store.
    pub(crate) async fn apply_remote(&self, entities: Vec<E>) -> Vec<E> {
        let mut guard = self.state.write().await;
        guard.entries = index(entities);
        guard.generation += 1;
        guard.loaded = true;
        // An in-flight mutation keeps reporting `Syncing` until it settles.
        if !guard.busy {
            self.set_status(SyncStatus::Synced);
        }
        debug!(collection = %self.collection, size = guard.entries.len(), "applied remote snapshot");
        guard.entries.values().cloned().collect()
    }

    /// Optimistically set (`Some`) or remove (`None`) `key`.
    pub(crate) async fn begin_mutation(&self, key: &str, value: Option<E>) -> Pending<E> {
        let mut guard = self.state.write().await;
        let previous = match value {
            Some(entity) => guard.entries.insert(key.to_string(), entity),
            None => guard.entries.remove(key),
        };
        guard.busy = true;
        self.set_status(SyncStatus::Syncing);
        Pending {
            key: key.to_string(),
            previous,
            generation: guard.generation,
        }
    }

    /// Optimistically replace every entry.
    pub(crate) async fn begin_replace(&self, entities: Vec<E>) -> PendingReplace<E> {
        let mut guard = self.state.write().await;
        let previous = std::mem::replace(&mut guard.entries, index(entities));
        guard.busy = true;
        self.set_status(SyncStatus::Syncing);
        PendingReplace {
            previous,
            generation: guard.generation,
        }
    }

    /// Undo an optimistic change unless a newer full replacement superseded it.
    /// Returns whether the change was undone.
    pub(crate) async fn rollback(&self, pending: Pending<E>) -> bool {
        let mut guard = self.state.write().await;
        if guard.generation != pending.generation {
            return false;
        }
        match pending.previous {
            Some(entity) => {
                guard.entries.insert(pending.key, entity);
            }
            None => {
                guard.entries.remove(&pending.key);
            }
        }
        true
    }

    /// Undo an optimistic replacement unless a newer full replacement superseded it.
    pub(crate) async fn restore(&self, pending: PendingReplace<E>) -> bool {
        let mut guard = self.state.write().await;
        if guard.generation != pending.generation {
            return false;
        }
        guard.entries = pending.previous;
        true
    }

    /// Leave `Syncing` once a mutation completed, successfully or not.
    pub(crate) async fn settle(&self) {
        let mut guard = self.state.write().await;
        guard.busy = false;
        let status = if guard.loaded {
            SyncStatus::Synced
        } else {
            SyncStatus::Unloaded
        };
        self.set_status(status);
    }

    fn set_status(&self, status: SyncStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

fn index<E: DocumentModel>(entities: Vec<E>) -> BTreeMap<String, E> {
    entities
        .into_iter()
        .map(|entity| (entity.key().to_string(), entity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::FixtureEntity;

    fn fixture(key: &str, label: &str) -> FixtureEntity {
        FixtureEntity {
            key: key.into(),
            label: label.into(),
            ..FixtureEntity::default()
        }
    }

    #[tokio::test]
    async fn rollback_restores_previous_value() {
        let cache = CollectionCache::new(CollectionName::Fixtures);
        cache.finish_load(vec![fixture("f1", "A vs B")]).await;

        let pending = cache.begin_mutation("f1", Some(fixture("f1", "C vs D"))).await;
        assert_eq!(cache.status(), SyncStatus::Syncing);
        assert!(cache.rollback(pending).await);
        cache.settle().await;

        assert_eq!(cache.get("f1").await.unwrap().label, "A vs B");
        assert_eq!(cache.status(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn rollback_yields_to_newer_remote_snapshot() {
        let cache = CollectionCache::new(CollectionName::Fixtures);
        let pending = cache.begin_mutation("f1", Some(fixture("f1", "mine"))).await;
        cache.apply_remote(vec![fixture("f2", "theirs")]).await;
        assert_eq!(cache.status(), SyncStatus::Syncing);

        assert!(!cache.rollback(pending).await);
        cache.settle().await;

        let keys: Vec<_> = cache.snapshot().await.into_iter().map(|f| f.key).collect();
        assert_eq!(keys, vec!["f2"]);
        assert_eq!(cache.status(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn failed_first_load_shows_defaults_and_later_failures_keep_last_good() {
        let cache = CollectionCache::new(CollectionName::Fixtures);
        cache.begin_load().await;
        assert_eq!(cache.status(), SyncStatus::Loading);
        let (shown, kept) = cache.fail_load(vec![fixture("d", "default")]).await;
        assert!(!kept);
        assert_eq!(shown, vec![fixture("d", "default")]);
        assert_eq!(cache.status(), SyncStatus::Unloaded);

        cache.finish_load(vec![fixture("f1", "real")]).await;
        let (shown, kept) = cache.fail_load(vec![fixture("d", "default")]).await;
        assert!(kept);
        assert_eq!(shown, vec![fixture("f1", "real")]);
    }

    #[tokio::test]
    async fn mutation_before_first_load_settles_back_to_unloaded() {
        let cache: CollectionCache<FixtureEntity> = CollectionCache::new(CollectionName::Fixtures);
        let _pending = cache.begin_mutation("f1", None).await;
        cache.settle().await;
        assert_eq!(cache.status(), SyncStatus::Unloaded);
    }
}
