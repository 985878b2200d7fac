use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::TeamEntity,
    dto::{
        format_epoch_millis,
        validation::{validate_group_label, validate_not_blank},
    },
    sync::{LoadReport, LoadSource, Loaded},
};

/// Registration form submitted by a team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterTeamRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
    /// Contact address.
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
}

/// Partial update of a team; omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    /// Moves the team to another group.
    #[validate(custom(function = "validate_group_label"))]
    pub group: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub glyph: Option<String>,
    pub played: Option<u32>,
    pub win: Option<u32>,
    pub draw: Option<u32>,
    pub loss: Option<u32>,
    pub points: Option<u32>,
}

/// Team entry inside a full groups replacement.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GroupMemberInput {
    #[validate(length(min = 1, max = 64))]
    pub key: String,
    #[validate(length(max = 64))]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Defaults to the configured glyph when omitted.
    #[serde(default)]
    pub glyph: String,
    #[serde(default)]
    pub played: u32,
    #[serde(default)]
    pub win: u32,
    #[serde(default)]
    pub draw: u32,
    #[serde(default)]
    pub loss: u32,
    #[serde(default)]
    pub points: u32,
    /// Creation time in milliseconds since the Unix epoch; set to now when omitted.
    #[serde(default)]
    pub created_at: Option<u64>,
}

/// One group of a full groups replacement.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GroupInput {
    #[validate(custom(function = "validate_group_label"))]
    pub label: String,
    #[validate(nested)]
    pub teams: Vec<GroupMemberInput>,
}

/// Full groups snapshot replacing every stored team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReplaceGroupsRequest {
    #[validate(nested)]
    pub groups: Vec<GroupInput>,
}

/// Admin view of a team, including its contact address.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct TeamView {
    pub key: String,
    pub name: String,
    pub email: String,
    pub group: String,
    pub glyph: String,
    pub played: u32,
    pub win: u32,
    pub draw: u32,
    pub loss: u32,
    pub points: u32,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<TeamEntity> for TeamView {
    fn from(team: TeamEntity) -> Self {
        Self {
            key: team.key,
            name: team.name,
            email: team.contact,
            group: team.group,
            glyph: team.glyph,
            played: team.played,
            win: team.win,
            draw: team.draw,
            loss: team.loss,
            points: team.points,
            created_at: format_epoch_millis(team.created_at),
        }
    }
}

/// Group of teams in admin responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupView {
    pub label: String,
    pub teams: Vec<TeamView>,
}

/// Groups as stored after a replacement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupsSnapshotResponse {
    pub groups: Vec<GroupView>,
}

/// Fixture to schedule.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateFixtureRequest {
    /// Match label, conventionally "home vs away".
    #[serde(rename = "match")]
    #[validate(length(min = 1, max = 128), custom(function = "validate_not_blank"))]
    pub label: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub date: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub time: String,
}

/// Partial update of a fixture.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateFixtureRequest {
    #[serde(rename = "match")]
    #[validate(length(min = 1, max = 128), custom(function = "validate_not_blank"))]
    pub label: Option<String>,
    #[validate(length(max = 32))]
    pub date: Option<String>,
    #[validate(length(max = 32))]
    pub time: Option<String>,
}

/// Result to record.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateResultRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub home: String,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub away: String,
    pub home_score: u32,
    pub away_score: u32,
}

/// Partial update of a result.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateResultRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub home: Option<String>,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub away: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

/// Origin of a reloaded collection.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadOrigin {
    /// Listed from the store.
    Remote,
    /// Configured default.
    Default,
    /// Kept from the last successful sync.
    LastKnownGood,
}

impl From<LoadSource> for LoadOrigin {
    fn from(value: LoadSource) -> Self {
        match value {
            LoadSource::Remote => LoadOrigin::Remote,
            LoadSource::Default => LoadOrigin::Default,
            LoadSource::LastKnownGood => LoadOrigin::LastKnownGood,
        }
    }
}

/// Outcome of reloading one collection.
#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionReload {
    pub count: usize,
    pub origin: LoadOrigin,
    /// Failure that forced a fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<E> From<&Loaded<E>> for CollectionReload {
    fn from(loaded: &Loaded<E>) -> Self {
        Self {
            count: loaded.entities.len(),
            origin: loaded.source.into(),
            error: loaded.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Outcome of `POST /admin/reload`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    pub teams: CollectionReload,
    pub fixtures: CollectionReload,
    pub results: CollectionReload,
}

impl From<&LoadReport> for ReloadResponse {
    fn from(report: &LoadReport) -> Self {
        Self {
            teams: (&report.teams).into(),
            fixtures: (&report.fixtures).into(),
            results: (&report.results).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn registration_requires_a_name_and_a_valid_email() {
        let ok: RegisterTeamRequest =
            serde_json::from_value(json!({"name": "Alpha", "email": "a@example.com"})).unwrap();
        assert!(ok.validate().is_ok());

        let no_email: RegisterTeamRequest = serde_json::from_value(json!({"name": "Alpha"})).unwrap();
        assert!(no_email.validate().is_ok());

        let blank: RegisterTeamRequest = serde_json::from_value(json!({"name": "  "})).unwrap();
        assert!(blank.validate().is_err());

        let bad_email: RegisterTeamRequest =
            serde_json::from_value(json!({"name": "Alpha", "email": "nope"})).unwrap();
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn nested_group_members_are_validated() {
        let request: ReplaceGroupsRequest = serde_json::from_value(json!({
            "groups": [{"label": "A", "teams": [{"key": "", "name": "Alpha"}]}]
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: ReplaceGroupsRequest = serde_json::from_value(json!({
            "groups": [{"label": "A", "teams": [{"key": "t1", "name": "Alpha", "points": 3}]}]
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn fixture_label_uses_the_match_field() {
        let request: CreateFixtureRequest =
            serde_json::from_value(json!({"match": "Alpha vs Beta", "date": "2025-06-01"})).unwrap();
        assert_eq!(request.label, "Alpha vs Beta");
        assert!(request.validate().is_ok());
    }
}
