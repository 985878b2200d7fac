use serde::Serialize;
use tracing::warn;

use crate::{
    config::SyncMode,
    dao::models::{FixtureEntity, ResultEntity, TeamEntity},
    dto::sse::{
        FixturesChangedEvent, GroupsChangedEvent, ResultsChangedEvent, ServerEvent, SystemStatus,
    },
    services::public_service,
    state::SharedState,
    sync::groups,
};

const EVENT_GROUPS_CHANGED: &str = "groups_changed";
const EVENT_FIXTURES_CHANGED: &str = "fixtures_changed";
const EVENT_RESULTS_CHANGED: &str = "results_changed";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Broadcast the standings built from `teams`.
pub fn broadcast_teams(state: &SharedState, teams: Vec<TeamEntity>) {
    let config = state.config();
    let snapshot = groups::group_teams(config.group_labels(), teams);
    let payload = GroupsChangedEvent {
        groups: public_service::standings(snapshot),
    };
    send_public_event(state, EVENT_GROUPS_CHANGED, &payload);
}

/// Broadcast the full fixtures list.
pub fn broadcast_fixtures(state: &SharedState, fixtures: Vec<FixtureEntity>) {
    let payload = FixturesChangedEvent {
        fixtures: fixtures.into_iter().map(Into::into).collect(),
    };
    send_public_event(state, EVENT_FIXTURES_CHANGED, &payload);
}

/// Broadcast the full results list.
pub fn broadcast_results(state: &SharedState, results: Vec<ResultEntity>) {
    let payload = ResultsChangedEvent {
        results: results.into_iter().map(Into::into).collect(),
    };
    send_public_event(state, EVENT_RESULTS_CHANGED, &payload);
}

/// Broadcast a degraded mode change.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_public_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Publish the teams after a local change. Live subscriptions already publish every remote
/// snapshot, so this only runs in the other modes.
pub async fn teams_changed(state: &SharedState) {
    if publishes_locally(state) {
        let teams = state.engine().snapshot::<TeamEntity>().await;
        broadcast_teams(state, teams);
    }
}

/// Publish the fixtures after a local change.
pub async fn fixtures_changed(state: &SharedState) {
    if publishes_locally(state) {
        let fixtures = state.engine().snapshot::<FixtureEntity>().await;
        broadcast_fixtures(state, fixtures);
    }
}

/// Publish the results after a local change.
pub async fn results_changed(state: &SharedState) {
    if publishes_locally(state) {
        let results = state.engine().snapshot::<ResultEntity>().await;
        broadcast_results(state, results);
    }
}

/// Publish every collection, e.g. after a reload.
pub async fn everything_changed(state: &SharedState) {
    let engine = state.engine();
    broadcast_teams(state, engine.snapshot::<TeamEntity>().await);
    broadcast_fixtures(state, engine.snapshot::<FixtureEntity>().await);
    broadcast_results(state, engine.snapshot::<ResultEntity>().await);
}

fn publishes_locally(state: &SharedState) -> bool {
    state.config().sync_mode() != SyncMode::Live
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}
