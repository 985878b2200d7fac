use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, serde_as};
use tracing::error;

use crate::dao::document_store::{CollectionName, RawDocument};

/// Glyph shown next to a team when its document does not carry one.
pub const DEFAULT_TEAM_GLYPH: &str = "⚽";

/// Mapping between a persisted model and the flat documents held by the store.
///
/// Decoding is tolerant: missing or malformed fields fall back to their defaults so that a
/// single damaged document never fails a whole collection load.
pub trait DocumentModel: Sized {
    /// Collection the model lives in.
    const COLLECTION: CollectionName;

    /// Key identifying the entity within its collection.
    fn key(&self) -> &str;

    /// Encode into a store document.
    fn to_document(&self) -> RawDocument;

    /// Decode from a store document, substituting defaults for bad fields.
    fn from_document(document: RawDocument) -> Self;
}

/// Registered team, persisted in the `teams` collection.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamEntity {
    /// Document key.
    #[serde(skip)]
    pub key: String,
    /// Display name chosen at registration.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub name: String,
    /// Contact address given at registration.
    #[serde(rename = "email", default)]
    #[serde_as(as = "DefaultOnError")]
    pub contact: String,
    /// Group label the team plays in.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub group: String,
    /// Display glyph.
    #[serde(rename = "logo", default)]
    #[serde_as(as = "DefaultOnError")]
    pub glyph: String,
    /// Matches played.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub played: u32,
    /// Matches won.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub win: u32,
    /// Matches drawn.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub draw: u32,
    /// Matches lost.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub loss: u32,
    /// Standing points.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub points: u32,
    /// Creation timestamp in milliseconds since the Unix epoch.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub created_at: u64,
}

/// Scheduled match, persisted in the `fixtures` collection.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FixtureEntity {
    /// Document key.
    #[serde(skip)]
    pub key: String,
    /// Free text label, conventionally "home vs away".
    #[serde(rename = "match", default)]
    #[serde_as(as = "DefaultOnError")]
    pub label: String,
    /// Scheduled date as typed by the admin.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub date: String,
    /// Scheduled time as typed by the admin.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub time: String,
    /// Creation timestamp in milliseconds since the Unix epoch.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub created_at: u64,
}

/// Final score of a match, persisted in the `results` collection.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntity {
    /// Document key.
    #[serde(skip)]
    pub key: String,
    /// Home team label.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub home: String,
    /// Away team label.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub away: String,
    /// Goals scored by the home team.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub home_score: u32,
    /// Goals scored by the away team.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub away_score: u32,
    /// Creation timestamp in milliseconds since the Unix epoch.
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub created_at: u64,
}

impl DocumentModel for TeamEntity {
    const COLLECTION: CollectionName = CollectionName::Teams;

    fn key(&self) -> &str {
        &self.key
    }

    fn to_document(&self) -> RawDocument {
        encode(Self::COLLECTION, &self.key, self)
    }

    fn from_document(document: RawDocument) -> Self {
        let mut team: Self = decode(Self::COLLECTION, document);
        if team.glyph.is_empty() {
            team.glyph = DEFAULT_TEAM_GLYPH.to_string();
        }
        team
    }
}

impl DocumentModel for FixtureEntity {
    const COLLECTION: CollectionName = CollectionName::Fixtures;

    fn key(&self) -> &str {
        &self.key
    }

    fn to_document(&self) -> RawDocument {
        encode(Self::COLLECTION, &self.key, self)
    }

    fn from_document(document: RawDocument) -> Self {
        decode(Self::COLLECTION, document)
    }
}

impl DocumentModel for ResultEntity {
    const COLLECTION: CollectionName = CollectionName::Results;

    fn key(&self) -> &str {
        &self.key
    }

    fn to_document(&self) -> RawDocument {
        encode(Self::COLLECTION, &self.key, self)
    }

    fn from_document(document: RawDocument) -> Self {
        decode(Self::COLLECTION, document)
    }
}

fn encode<T: Serialize>(collection: CollectionName, key: &str, model: &T) -> RawDocument {
    let fields = match serde_json::to_value(model) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            error!(%collection, key, kind = ?other, "model did not encode to an object");
            Map::new()
        }
        Err(err) => {
            error!(%collection, key, error = %err, "failed to encode model");
            Map::new()
        }
    };

    RawDocument {
        key: key.to_string(),
        fields,
    }
}

trait Keyed {
    fn set_key(&mut self, key: String);
}

impl Keyed for TeamEntity {
    fn set_key(&mut self, key: String) {
        self.key = key;
    }
}

impl Keyed for FixtureEntity {
    fn set_key(&mut self, key: String) {
        self.key = key;
    }
}

impl Keyed for ResultEntity {
    fn set_key(&mut self, key: String) {
        self.key = key;
    }
}

fn decode<T>(collection: CollectionName, document: RawDocument) -> T
where
    T: DeserializeOwned + Default + Keyed,
{
    let RawDocument { key, fields } = document;
    let mut model = match serde_json::from_value::<T>(Value::Object(fields)) {
        Ok(model) => model,
        Err(err) => {
            error!(%collection, key, error = %err, "undecodable document; using defaults");
            T::default()
        }
    };
    model.set_key(key);
    model
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(key: &str, value: Value) -> RawDocument {
        let Value::Object(fields) = value else {
            panic!("test documents must be objects");
        };
        RawDocument {
            key: key.into(),
            fields,
        }
    }

    #[test]
    fn team_decodes_original_field_names() {
        let team = TeamEntity::from_document(raw(
            "t1",
            json!({
                "name": "Alpha",
                "email": "alpha@example.com",
                "group": "A",
                "logo": "🔥",
                "played": 2,
                "win": 1,
                "draw": 1,
                "loss": 0,
                "points": 4,
                "createdAt": 1700000000000u64,
            }),
        ));

        assert_eq!(team.key, "t1");
        assert_eq!(team.contact, "alpha@example.com");
        assert_eq!(team.glyph, "🔥");
        assert_eq!(team.points, 4);
        assert_eq!(team.created_at, 1_700_000_000_000);
    }

    #[test]
    fn malformed_fields_fall_back_to_defaults() {
        let team = TeamEntity::from_document(raw(
            "t2",
            json!({
                "name": 42,
                "group": "B",
                "points": "7",
                "win": -3,
                "draw": "lots",
                "loss": null,
            }),
        ));

        assert_eq!(team.name, "");
        assert_eq!(team.group, "B");
        assert_eq!(team.points, 7);
        assert_eq!(team.win, 0);
        assert_eq!(team.draw, 0);
        assert_eq!(team.loss, 0);
        assert_eq!(team.glyph, DEFAULT_TEAM_GLYPH);
    }

    #[test]
    fn fixture_and_result_round_trip_through_documents() {
        let fixture = FixtureEntity {
            key: "f1".into(),
            label: "Alpha vs Beta".into(),
            date: "2025-06-01".into(),
            time: "18:00".into(),
            created_at: 5,
        };
        let document = fixture.to_document();
        assert_eq!(document.fields.get("match"), Some(&json!("Alpha vs Beta")));
        assert_eq!(FixtureEntity::from_document(document), fixture);

        let result = ResultEntity::from_document(raw(
            "r1",
            json!({"home": "Alpha", "away": "Beta", "homeScore": "3", "awayScore": 1}),
        ));
        assert_eq!(result.home_score, 3);
        assert_eq!(result.away_score, 1);
        assert_eq!(
            result.to_document().fields.get("homeScore"),
            Some(&json!(3))
        );
    }
}
