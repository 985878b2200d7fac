use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::document_store::RawDocument;

/// Stored shape of a document: the key becomes `_id`, every other field stays flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDocument {
    #[serde(rename = "_id")]
    pub key: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl From<RawDocument> for MongoDocument {
    fn from(value: RawDocument) -> Self {
        Self {
            key: value.key,
            fields: value.fields,
        }
    }
}

impl From<MongoDocument> for RawDocument {
    fn from(value: MongoDocument) -> Self {
        Self {
            key: value.key,
            fields: value.fields,
        }
    }
}

pub fn doc_id(key: &str) -> Document {
    doc! {"_id": key}
}
