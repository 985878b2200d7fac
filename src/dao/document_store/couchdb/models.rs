use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::document_store::{CollectionName, RawDocument};

pub const KEY_SEPARATOR: &str = "::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseInfo {
    pub update_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    #[serde(default)]
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
}

/// Only the revision is needed before overwriting or deleting a document.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CouchDocument {
    pub fn from_raw(collection: CollectionName, document: RawDocument, rev: Option<String>) -> Self {
        Self {
            id: doc_id(collection, &document.key),
            rev,
            fields: strip_reserved(document.fields),
        }
    }

    /// Convert back into a store document, `None` when the id belongs to another collection.
    pub fn into_raw(self, collection: CollectionName) -> Option<RawDocument> {
        let key = self.id.strip_prefix(&collection_prefix(collection))?.to_string();
        Some(RawDocument {
            key,
            fields: strip_reserved(self.fields),
        })
    }
}

/// CouchDB reserves top-level fields starting with an underscore.
fn strip_reserved(mut fields: Map<String, Value>) -> Map<String, Value> {
    fields.retain(|name, _| !name.starts_with('_'));
    fields
}

pub fn collection_prefix(collection: CollectionName) -> String {
    format!("{}{}", collection.as_str(), KEY_SEPARATOR)
}

pub fn doc_id(collection: CollectionName, key: &str) -> String {
    format!("{}{}", collection_prefix(collection), key)
}

/// Render a sequence token as the `since` query parameter expects it.
pub fn seq_param(seq: &Value) -> String {
    match seq {
        Value::String(token) => token.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn documents_map_to_prefixed_ids_and_back() {
        let Value::Object(fields) = json!({"name": "Alpha", "_deleted": false}) else {
            unreachable!()
        };
        let raw = RawDocument {
            key: "t1".into(),
            fields,
        };

        let doc = CouchDocument::from_raw(CollectionName::Teams, raw, Some("1-abc".into()));
        assert_eq!(doc.id, "teams::t1");
        assert!(!doc.fields.contains_key("_deleted"));

        assert!(doc.clone().into_raw(CollectionName::Fixtures).is_none());
        let back = doc.into_raw(CollectionName::Teams).unwrap();
        assert_eq!(back.key, "t1");
        assert_eq!(back.fields.get("name"), Some(&json!("Alpha")));
    }

    #[test]
    fn sequence_tokens_render_without_quotes() {
        assert_eq!(seq_param(&json!("12-g1AAAA")), "12-g1AAAA");
        assert_eq!(seq_param(&json!(42)), "42");
    }
}
