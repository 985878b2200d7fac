use std::sync::{Arc, OnceLock, Weak};

use tokio::{
    sync::{Mutex, MutexGuard},
    task::AbortHandle,
};
use tracing::debug;

use super::engine::SyncEngine;
use crate::dao::document_store::CollectionName;

/// State shared between a [`Subscription`] handle, the engine registry and the watch task.
pub(crate) struct SubscriptionShared {
    id: u64,
    collection: CollectionName,
    /// Held while a snapshot is applied; `false` once torn down.
    alive: Mutex<bool>,
    task: OnceLock<AbortHandle>,
}

impl SubscriptionShared {
    pub(crate) fn new(id: u64, collection: CollectionName) -> Self {
        Self {
            id,
            collection,
            alive: Mutex::new(true),
            task: OnceLock::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn collection(&self) -> CollectionName {
        self.collection
    }

    pub(crate) fn attach(&self, task: AbortHandle) {
        if self.task.set(task).is_err() {
            debug!(id = self.id, "subscription task already attached");
        }
    }

    /// Guard to hold while applying a snapshot, or `None` once torn down.
    pub(crate) async fn enter(&self) -> Option<MutexGuard<'_, bool>> {
        let guard = self.alive.lock().await;
        (*guard).then_some(guard)
    }

    pub(crate) async fn is_alive(&self) -> bool {
        *self.alive.lock().await
    }

    /// Tear down, waiting for an in-progress apply to finish first.
    pub(crate) async fn shutdown(&self) {
        *self.alive.lock().await = false;
        self.abort_task();
    }

    /// Tear down without waiting; an apply already running may still complete.
    fn shutdown_now(&self) {
        if let Ok(mut alive) = self.alive.try_lock() {
            *alive = false;
        }
        self.abort_task();
    }

    fn abort_task(&self) {
        if let Some(task) = self.task.get() {
            task.abort();
        }
    }
}

/// Handle to a live collection subscription.
///
/// [`Subscription::close`] guarantees that no callback runs and no in-memory change is
/// applied once it returns. Dropping the handle aborts the listener without waiting.
pub struct Subscription {
    shared: Arc<SubscriptionShared>,
    engine: Weak<SyncEngine>,
}

impl Subscription {
    pub(crate) fn new(shared: Arc<SubscriptionShared>, engine: Weak<SyncEngine>) -> Self {
        Self { shared, engine }
    }

    /// Collection this subscription listens to.
    pub fn collection(&self) -> CollectionName {
        self.shared.collection()
    }

    /// Deregister the listener. Must not be called from inside its own callback.
    pub async fn close(self) {
        self.shared.shutdown().await;
        self.deregister();
    }

    fn deregister(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.forget_subscription(self.shared.id());
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.shutdown_now();
        self.deregister();
    }
}
