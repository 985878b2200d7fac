use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::{
        document_store::CollectionName,
        models::{FixtureEntity, ResultEntity, TeamEntity},
    },
    dto::format_epoch_millis,
    sync::SyncStatus,
};

/// One row of a group standings table.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct StandingRow {
    pub key: String,
    pub name: String,
    pub glyph: String,
    pub played: u32,
    pub win: u32,
    pub draw: u32,
    pub loss: u32,
    pub points: u32,
}

impl From<TeamEntity> for StandingRow {
    fn from(team: TeamEntity) -> Self {
        Self {
            key: team.key,
            name: team.name,
            glyph: team.glyph,
            played: team.played,
            win: team.win,
            draw: team.draw,
            loss: team.loss,
            points: team.points,
        }
    }
}

/// Standings of a single group, best team first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupStandings {
    pub label: String,
    pub teams: Vec<StandingRow>,
}

/// Every group in display order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupsResponse {
    pub groups: Vec<GroupStandings>,
}

/// A scheduled match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FixtureView {
    pub key: String,
    /// Match label, conventionally "home vs away".
    #[serde(rename = "match")]
    pub label: String,
    pub date: String,
    pub time: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<FixtureEntity> for FixtureView {
    fn from(fixture: FixtureEntity) -> Self {
        Self {
            key: fixture.key,
            label: fixture.label,
            date: fixture.date,
            time: fixture.time,
            created_at: format_epoch_millis(fixture.created_at),
        }
    }
}

/// Scheduled matches, ordered by key.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FixturesResponse {
    pub fixtures: Vec<FixtureView>,
}

/// A final score.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResultView {
    pub key: String,
    pub home: String,
    pub away: String,
    pub home_score: u32,
    pub away_score: u32,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<ResultEntity> for ResultView {
    fn from(result: ResultEntity) -> Self {
        Self {
            key: result.key,
            home: result.home,
            away: result.away,
            home_score: result.home_score,
            away_score: result.away_score,
            created_at: format_epoch_millis(result.created_at),
        }
    }
}

/// Match results, ordered by key.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResultsResponse {
    pub results: Vec<ResultView>,
}

/// Publicly visible sync state of a collection.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleSyncStatus {
    /// Defaults shown; no successful load yet or the last load failed.
    Unloaded,
    /// Loading from the store.
    Loading,
    /// Mirrors the store.
    Synced,
    /// A change is being written.
    Syncing,
}

impl From<SyncStatus> for VisibleSyncStatus {
    fn from(value: SyncStatus) -> Self {
        match value {
            SyncStatus::Unloaded => VisibleSyncStatus::Unloaded,
            SyncStatus::Loading => VisibleSyncStatus::Loading,
            SyncStatus::Synced => VisibleSyncStatus::Synced,
            SyncStatus::Syncing => VisibleSyncStatus::Syncing,
        }
    }
}

/// Sync state of one collection.
#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionStatus {
    /// `teams`, `fixtures` or `results`.
    pub collection: String,
    pub status: VisibleSyncStatus,
}

impl From<(CollectionName, SyncStatus)> for CollectionStatus {
    fn from((collection, status): (CollectionName, SyncStatus)) -> Self {
        Self {
            collection: collection.as_str().to_string(),
            status: status.into(),
        }
    }
}

/// Sync state of the backend.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncStatusResponse {
    /// Whether the backend runs without a storage connection.
    pub degraded: bool,
    pub collections: Vec<CollectionStatus>,
}
