//! In-process document store, used when no database is configured and as the test double
//! for the sync engine.

use std::{collections::BTreeMap, sync::Arc};

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tokio::sync::{
    RwLock,
    broadcast::{self, error::RecvError},
};

use super::{CollectionName, DocumentStore, RawDocument, SnapshotStream};
use crate::dao::storage::{StorageError, StorageResult};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

type Collections = BTreeMap<CollectionName, BTreeMap<String, Map<String, Value>>>;

#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<CollectionName>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                collections: RwLock::new(BTreeMap::new()),
                changes,
            }),
        }
    }

    /// Current contents of `collection`, ordered by key.
    pub async fn documents(&self, collection: CollectionName) -> Vec<RawDocument> {
        self.inner.snapshot(collection).await
    }
}

impl MemoryInner {
    async fn snapshot(&self, collection: CollectionName) -> Vec<RawDocument> {
        let guard = self.collections.read().await;
        guard
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(key, fields)| RawDocument {
                        key: key.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notify(&self, collection: CollectionName) {
        let _ = self.changes.send(collection);
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn list(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.snapshot(collection).await) })
    }

    fn put(
        &self,
        collection: CollectionName,
        document: RawDocument,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            {
                let mut guard = inner.collections.write().await;
                guard
                    .entry(collection)
                    .or_default()
                    .insert(document.key, document.fields);
            }
            inner.notify(collection);
            Ok(())
        })
    }

    fn delete(&self, collection: CollectionName, key: String) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let removed = {
                let mut guard = inner.collections.write().await;
                guard
                    .get_mut(&collection)
                    .and_then(|documents| documents.remove(&key))
                    .is_some()
            };
            if removed {
                inner.notify(collection);
            }
            Ok(removed)
        })
    }

    fn watch(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<SnapshotStream>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            // Subscribe before taking the first snapshot so no change slips between them.
            let mut changes = inner.changes.subscribe();
            let stream = async_stream::stream! {
                yield Ok::<_, StorageError>(inner.snapshot(collection).await);
                loop {
                    match changes.recv().await {
                        Ok(changed) if changed == collection => {
                            yield Ok(inner.snapshot(collection).await);
                        }
                        Ok(_) => continue,
                        // Snapshots are full replacements, so catching up is a single resend.
                        Err(RecvError::Lagged(_)) => yield Ok(inner.snapshot(collection).await),
                        Err(RecvError::Closed) => break,
                    }
                }
            };
            Ok(Box::pin(stream) as SnapshotStream)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    fn doc(key: &str, name: &str) -> RawDocument {
        let Value::Object(fields) = json!({ "name": name }) else {
            unreachable!()
        };
        RawDocument {
            key: key.into(),
            fields,
        }
    }

    #[tokio::test]
    async fn put_overwrites_and_delete_reports_presence() {
        let store = MemoryDocumentStore::new();
        store.put(CollectionName::Teams, doc("t1", "Alpha")).await.unwrap();
        store.put(CollectionName::Teams, doc("t1", "Alpha II")).await.unwrap();

        let listed = store.list(CollectionName::Teams).await.unwrap();
        assert_eq!(listed, vec![doc("t1", "Alpha II")]);
        assert!(store.list(CollectionName::Fixtures).await.unwrap().is_empty());

        assert!(store.delete(CollectionName::Teams, "t1".into()).await.unwrap());
        assert!(!store.delete(CollectionName::Teams, "t1".into()).await.unwrap());
    }

    #[tokio::test]
    async fn watch_emits_initial_and_changed_snapshots() {
        let store = MemoryDocumentStore::new();
        store.put(CollectionName::Results, doc("r1", "x")).await.unwrap();

        let mut stream = store.watch(CollectionName::Results).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        store.put(CollectionName::Fixtures, doc("f1", "ignored")).await.unwrap();
        store.put(CollectionName::Results, doc("r2", "y")).await.unwrap();

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
    }
}
