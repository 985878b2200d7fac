#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::fmt;

use futures::{future::BoxFuture, stream::BoxStream};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::storage::{StorageError, StorageResult};

pub use memory::MemoryDocumentStore;

/// Named collections held by the remote document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionName {
    /// Registered teams (carry their group label).
    Teams,
    /// Scheduled matches.
    Fixtures,
    /// Match results.
    Results,
}

impl CollectionName {
    /// Every collection, in load order.
    pub const ALL: [CollectionName; 3] = [
        CollectionName::Teams,
        CollectionName::Fixtures,
        CollectionName::Results,
    ];

    /// Name of the collection in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Teams => "teams",
            CollectionName::Fixtures => "fixtures",
            CollectionName::Results => "results",
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat key/value document as exchanged with the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Key unique within the collection.
    pub key: String,
    /// Document body without backend bookkeeping fields.
    pub fields: Map<String, Value>,
}

/// Stream of full collection snapshots pushed by [`DocumentStore::watch`].
pub type SnapshotStream = BoxStream<'static, StorageResult<Vec<RawDocument>>>;

/// The four primitives the sync engine needs from a document database, plus connection
/// upkeep used by the storage supervisor.
pub trait DocumentStore: Send + Sync {
    /// Fetch every document of `collection`.
    fn list(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>>;
    /// Create or fully overwrite a document by key.
    fn put(&self, collection: CollectionName, document: RawDocument)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a document by key, returning whether it existed.
    fn delete(&self, collection: CollectionName, key: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Watch `collection`, yielding its full contents now and after every change.
    fn watch(&self, collection: CollectionName) -> BoxFuture<'static, StorageResult<SnapshotStream>> {
        let _ = collection;
        Box::pin(async { Err(StorageError::Unsupported { operation: "watch" }) })
    }
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
