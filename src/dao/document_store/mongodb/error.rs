use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::document_store::CollectionName;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("failed to list MongoDB collections")]
    ListCollections {
        #[source]
        source: MongoError,
    },
    #[error("failed to create collection `{collection}`")]
    CreateCollection {
        collection: CollectionName,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to list collection `{collection}`")]
    List {
        collection: CollectionName,
        #[source]
        source: MongoError,
    },
    #[error("failed to write `{key}` into collection `{collection}`")]
    Put {
        collection: CollectionName,
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete `{key}` from collection `{collection}`")]
    Delete {
        collection: CollectionName,
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to open change stream on collection `{collection}`")]
    Watch {
        collection: CollectionName,
        #[source]
        source: MongoError,
    },
}
