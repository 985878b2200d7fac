//! Fault-injecting store wrapper and fixtures shared by the engine and service tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::time::sleep;

use super::{RetryPolicy, SharedEngine, SyncEngine, SyncSettings};
use crate::dao::{
    document_store::{CollectionName, DocumentStore, MemoryDocumentStore, RawDocument, SnapshotStream},
    models::{DEFAULT_TEAM_GLYPH, DocumentModel, FixtureEntity, TeamEntity},
    storage::{StorageError, StorageResult},
};

/// Operations recorded by [`FlakyStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Put(CollectionName, String),
    Delete(CollectionName, String),
}

/// In-memory store whose next calls can be made to fail or lag.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryDocumentStore,
    passing_lists: AtomicU32,
    failing_lists: AtomicU32,
    failing_puts: AtomicU32,
    failing_deletes: AtomicU32,
    rejecting: AtomicBool,
    write_delay_ms: AtomicU64,
    calls: Mutex<Vec<Call>>,
}

impl FlakyStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_lists(&self, count: u32) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Let the next `passing` lists through, then fail `count` of them.
    pub(crate) fn fail_lists_after(&self, passing: u32, count: u32) {
        self.passing_lists.store(passing, Ordering::SeqCst);
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_puts(&self, count: u32) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletes(&self, count: u32) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }

    /// Make injected failures permanent rejections instead of outages.
    pub(crate) fn reject(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub(crate) fn delay_writes(&self, delay: Duration) {
        self.write_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Writes issued through the trait, in call order.
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Decoded remote contents of `E`'s collection.
    pub(crate) async fn remote<E: DocumentModel>(&self) -> Vec<E> {
        self.inner
            .documents(E::COLLECTION)
            .await
            .into_iter()
            .map(E::from_document)
            .collect()
    }

    /// Write directly, bypassing fault injection and the call log.
    pub(crate) async fn seed<E: DocumentModel>(&self, entities: &[E]) {
        for entity in entities {
            self.inner.put(E::COLLECTION, entity.to_document()).await.unwrap();
        }
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn failure(&self, operation: &str) -> StorageError {
        if self.rejecting.load(Ordering::SeqCst) {
            StorageError::rejected(format!("{operation} refused"))
        } else {
            StorageError::unavailable(format!("{operation} failed"), std::io::Error::other("injected"))
        }
    }

    fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms.load(Ordering::SeqCst))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DocumentStore for FlakyStore {
    fn list(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
        if !Self::take(&self.passing_lists) && Self::take(&self.failing_lists) {
            let err = self.failure("list");
            return Box::pin(async move { Err(err) });
        }
        self.inner.list(collection)
    }

    fn put(&self, collection: CollectionName, document: RawDocument) -> BoxFuture<'static, StorageResult<()>> {
        self.record(Call::Put(collection, document.key.clone()));
        let delay = self.write_delay();
        let failure = Self::take(&self.failing_puts).then(|| self.failure("put"));
        let write = self.inner.put(collection, document);
        Box::pin(async move {
            sleep(delay).await;
            match failure {
                Some(err) => Err(err),
                None => write.await,
            }
        })
    }

    fn delete(&self, collection: CollectionName, key: String) -> BoxFuture<'static, StorageResult<bool>> {
        self.record(Call::Delete(collection, key.clone()));
        let delay = self.write_delay();
        let failure = Self::take(&self.failing_deletes).then(|| self.failure("delete"));
        let removal = self.inner.delete(collection, key);
        Box::pin(async move {
            sleep(delay).await;
            match failure {
                Some(err) => Err(err),
                None => removal.await,
            }
        })
    }

    fn watch(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<SnapshotStream>> {
        self.inner.watch(collection)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

/// Retry policy short enough for tests.
pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        call_timeout: Duration::from_millis(500),
    }
}

/// Engine with default labels and fast retries, wired to a fresh [`FlakyStore`].
pub(crate) async fn engine_with_store() -> (SharedEngine, Arc<FlakyStore>) {
    let engine = SyncEngine::open(SyncSettings {
        retry: fast_retry(),
        ..SyncSettings::default()
    });
    let store = FlakyStore::new();
    engine.install_store(store.clone()).await.unwrap();
    (engine, store)
}

pub(crate) fn team(key: &str, name: &str, group: &str, points: u32) -> TeamEntity {
    TeamEntity {
        key: key.into(),
        name: name.into(),
        group: group.into(),
        glyph: DEFAULT_TEAM_GLYPH.into(),
        points,
        ..TeamEntity::default()
    }
}

pub(crate) fn fixture(key: &str, label: &str) -> FixtureEntity {
    FixtureEntity {
        key: key.into(),
        label: label.into(),
        date: "2025-06-01".into(),
        time: "18:00".into(),
        created_at: 1,
    }
}
