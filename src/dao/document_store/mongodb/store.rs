use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::open_database,
    error::{MongoDaoError, MongoResult},
    models::{MongoDocument, doc_id},
};
use crate::dao::{
    document_store::{CollectionName, DocumentStore, RawDocument, SnapshotStream},
    storage::{StorageError, StorageResult},
};

/// Document store backed by MongoDB, one MongoDB collection per tournament collection.
///
/// Watching relies on change streams and therefore on a replica set deployment.
#[derive(Clone)]
pub struct MongoDocumentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = open_database(&self.config).await?;
        let previous = {
            let mut guard = self.state.write().await;
            guard.database = database;
            std::mem::replace(&mut guard.client, client)
        };
        previous.shutdown().await;
        Ok(())
    }
}

impl MongoDocumentStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection(&self, collection: CollectionName) -> Collection<MongoDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoDocument>(collection.as_str())
    }

    async fn list_documents(&self, collection: CollectionName) -> MongoResult<Vec<RawDocument>> {
        let documents: Vec<MongoDocument> = self
            .collection(collection)
            .await
            .find(doc! {})
            .sort(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::List { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List { collection, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save(&self, collection: CollectionName, document: RawDocument) -> MongoResult<()> {
        let key = document.key.clone();
        let document: MongoDocument = document.into();
        self.collection(collection)
            .await
            .replace_one(doc_id(&key), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Put {
                collection,
                key,
                source,
            })?;
        Ok(())
    }

    async fn remove(&self, collection: CollectionName, key: String) -> MongoResult<bool> {
        let result = self
            .collection(collection)
            .await
            .delete_one(doc_id(&key))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection,
                key,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }
}

impl DocumentStore for MongoDocumentStore {
    fn list(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.list_documents(collection).await.map_err(Into::into) })
    }

    fn put(
        &self,
        collection: CollectionName,
        document: RawDocument,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(collection, document).await.map_err(Into::into) })
    }

    fn delete(&self, collection: CollectionName, key: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.remove(collection, key).await.map_err(Into::into) })
    }

    fn watch(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<SnapshotStream>> {
        let store = self.clone();
        Box::pin(async move {
            // Open the change stream first so edits made during the initial listing still
            // produce an event.
            let mut changes = store
                .collection(collection)
                .await
                .watch()
                .await
                .map_err(|source| MongoDaoError::Watch { collection, source })?;
            let initial = store.list_documents(collection).await?;

            let stream = async_stream::stream! {
                yield Ok::<_, StorageError>(initial);
                loop {
                    match changes.try_next().await {
                        Ok(Some(event)) => {
                            debug!(%collection, operation = ?event.operation_type, "MongoDB change event");
                            match store.list_documents(collection).await {
                                Ok(documents) => yield Ok(documents),
                                Err(err) => {
                                    yield Err(err.into());
                                    break;
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(source) => {
                            yield Err(MongoDaoError::Watch { collection, source }.into());
                            break;
                        }
                    }
                }
            };

            Ok(Box::pin(stream) as SnapshotStream)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
