//! Admin edits. Every change goes through the sync engine, which applies it in memory and
//! writes it to the store.

use tracing::info;
use uuid::Uuid;

use crate::{
    config::SyncMode,
    dao::models::{FixtureEntity, ResultEntity, TeamEntity},
    dto::{
        admin::{
            CreateFixtureRequest, CreateResultRequest, GroupView, GroupsSnapshotResponse,
            ReloadResponse, ReplaceGroupsRequest, TeamView, UpdateFixtureRequest,
            UpdateResultRequest, UpdateTeamRequest,
        },
        now_epoch_millis,
        public::{FixtureView, ResultView},
    },
    error::ServiceError,
    services::sse_events,
    state::SharedState,
    sync::GroupsSnapshot,
};

/// Apply a partial update to a team.
pub async fn update_team(
    state: &SharedState,
    key: &str,
    request: UpdateTeamRequest,
) -> Result<TeamView, ServiceError> {
    let current = state
        .engine()
        .get::<TeamEntity>(key)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("team `{key}`")))?;

    let team = save_team(state, apply_team_patch(current, request)).await?;
    sse_events::teams_changed(state).await;
    Ok(team.into())
}

/// Delete a team; deleting an unknown team is a no-op.
pub async fn delete_team(state: &SharedState, key: &str) -> Result<(), ServiceError> {
    let removed = match state.config().sync_mode() {
        SyncMode::BulkRewrite => {
            state
                .engine()
                .edit_groups(|groups| detach(groups, key))
                .await?
                .is_some()
        }
        _ => state.engine().delete::<TeamEntity>(key).await?,
    };

    if removed {
        info!(key, "team deleted");
        sse_events::teams_changed(state).await;
    }
    Ok(())
}

/// Replace every team with the submitted groups snapshot.
pub async fn replace_groups(
    state: &SharedState,
    request: ReplaceGroupsRequest,
) -> Result<GroupsSnapshotResponse, ServiceError> {
    let config = state.config();
    let created_at = now_epoch_millis();

    let mut snapshot = GroupsSnapshot::new();
    for group in request.groups {
        let label = group.label.trim().to_string();
        let members = snapshot.entry(label.clone()).or_default();
        for member in group.teams {
            let glyph = if member.glyph.trim().is_empty() {
                config.default_glyph().to_string()
            } else {
                member.glyph
            };
            members.push(TeamEntity {
                key: member.key,
                name: member.name.trim().to_string(),
                contact: member.email.trim().to_string(),
                group: label.clone(),
                glyph,
                played: member.played,
                win: member.win,
                draw: member.draw,
                loss: member.loss,
                points: member.points,
                created_at: member.created_at.unwrap_or(created_at),
            });
        }
    }

    let replaced = state.engine().replace_groups_all(snapshot).await?;
    sse_events::teams_changed(state).await;

    Ok(GroupsSnapshotResponse {
        groups: replaced
            .into_iter()
            .map(|(label, teams)| GroupView {
                label,
                teams: teams.into_iter().map(Into::into).collect(),
            })
            .collect(),
    })
}

/// Schedule a new fixture.
pub async fn create_fixture(
    state: &SharedState,
    request: CreateFixtureRequest,
) -> Result<FixtureView, ServiceError> {
    let fixture = FixtureEntity {
        key: new_key(),
        label: request.label.trim().to_string(),
        date: request.date.trim().to_string(),
        time: request.time.trim().to_string(),
        created_at: now_epoch_millis(),
    };

    let fixture = state.engine().upsert(fixture).await?;
    sse_events::fixtures_changed(state).await;
    Ok(fixture.into())
}

/// Apply a partial update to a fixture.
pub async fn update_fixture(
    state: &SharedState,
    key: &str,
    request: UpdateFixtureRequest,
) -> Result<FixtureView, ServiceError> {
    let mut fixture = state
        .engine()
        .get::<FixtureEntity>(key)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("fixture `{key}`")))?;

    if let Some(label) = request.label {
        fixture.label = label.trim().to_string();
    }
    if let Some(date) = request.date {
        fixture.date = date.trim().to_string();
    }
    if let Some(time) = request.time {
        fixture.time = time.trim().to_string();
    }

    let fixture = state.engine().upsert(fixture).await?;
    sse_events::fixtures_changed(state).await;
    Ok(fixture.into())
}

/// Delete a fixture; deleting an unknown fixture is a no-op.
pub async fn delete_fixture(state: &SharedState, key: &str) -> Result<(), ServiceError> {
    if state.engine().delete::<FixtureEntity>(key).await? {
        sse_events::fixtures_changed(state).await;
    }
    Ok(())
}

/// Record a new result.
pub async fn create_result(
    state: &SharedState,
    request: CreateResultRequest,
) -> Result<ResultView, ServiceError> {
    let result = ResultEntity {
        key: new_key(),
        home: request.home.trim().to_string(),
        away: request.away.trim().to_string(),
        home_score: request.home_score,
        away_score: request.away_score,
        created_at: now_epoch_millis(),
    };

    let result = state.engine().upsert(result).await?;
    sse_events::results_changed(state).await;
    Ok(result.into())
}

/// Apply a partial update to a result.
pub async fn update_result(
    state: &SharedState,
    key: &str,
    request: UpdateResultRequest,
) -> Result<ResultView, ServiceError> {
    let mut result = state
        .engine()
        .get::<ResultEntity>(key)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("result `{key}`")))?;

    if let Some(home) = request.home {
        result.home = home.trim().to_string();
    }
    if let Some(away) = request.away {
        result.away = away.trim().to_string();
    }
    result.home_score = request.home_score.unwrap_or(result.home_score);
    result.away_score = request.away_score.unwrap_or(result.away_score);

    let result = state.engine().upsert(result).await?;
    sse_events::results_changed(state).await;
    Ok(result.into())
}

/// Delete a result; deleting an unknown result is a no-op.
pub async fn delete_result(state: &SharedState, key: &str) -> Result<(), ServiceError> {
    if state.engine().delete::<ResultEntity>(key).await? {
        sse_events::results_changed(state).await;
    }
    Ok(())
}

/// Reload every collection from the store, falling back to the configured defaults.
pub async fn reload(state: &SharedState) -> Result<ReloadResponse, ServiceError> {
    let defaults = state.config().defaults().clone();
    let report = state.engine().load_all(defaults).await?;
    sse_events::everything_changed(state).await;
    Ok((&report).into())
}

/// Persist `team` the way the configured mode writes teams: key by key, or as a rewrite of
/// the whole groups snapshot in bulk-rewrite mode.
pub(crate) async fn save_team(state: &SharedState, team: TeamEntity) -> Result<TeamEntity, ServiceError> {
    let engine = state.engine();
    if state.config().sync_mode() != SyncMode::BulkRewrite {
        return Ok(engine.upsert(team).await?);
    }

    let saved = team.clone();
    let edited = engine
        .edit_groups(move |groups| {
            detach(groups, &team.key);
            groups.entry(team.group.clone()).or_default().push(team);
            Some(())
        })
        .await?;

    Ok(edited
        .and_then(|((), replaced)| {
            replaced
                .into_values()
                .flatten()
                .find(|member| member.key == saved.key)
        })
        .unwrap_or(saved))
}

fn apply_team_patch(mut team: TeamEntity, patch: UpdateTeamRequest) -> TeamEntity {
    let UpdateTeamRequest {
        name,
        email,
        group,
        glyph,
        played,
        win,
        draw,
        loss,
        points,
    } = patch;

    if let Some(name) = name {
        team.name = name.trim().to_string();
    }
    if let Some(email) = email {
        team.contact = email.trim().to_string();
    }
    if let Some(group) = group {
        team.group = group.trim().to_string();
    }
    if let Some(glyph) = glyph {
        team.glyph = glyph;
    }
    team.played = played.unwrap_or(team.played);
    team.win = win.unwrap_or(team.win);
    team.draw = draw.unwrap_or(team.draw);
    team.loss = loss.unwrap_or(team.loss);
    team.points = points.unwrap_or(team.points);
    team
}

/// Remove `key` from whichever group lists it.
fn detach(groups: &mut GroupsSnapshot, key: &str) -> Option<TeamEntity> {
    groups.values_mut().find_map(|members| {
        let index = members.iter().position(|member| member.key == key)?;
        Some(members.remove(index))
    })
}

fn new_key() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::admin::{GroupInput, GroupMemberInput},
        state::AppState,
        sync::test_support::{FlakyStore, team},
    };

    async fn state_with(mode: &str) -> (SharedState, Arc<FlakyStore>) {
        let config = AppConfig::from_json(&format!(r#"{{"syncMode": "{mode}"}}"#)).unwrap();
        let state = AppState::new(config);
        let store = FlakyStore::new();
        state.engine().install_store(store.clone()).await.unwrap();
        (state, store)
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let patched = apply_team_patch(
            team("t1", "Alpha", "A", 3),
            UpdateTeamRequest {
                name: Some("  Alpha FC ".into()),
                win: Some(1),
                ..UpdateTeamRequest::default()
            },
        );

        assert_eq!(patched.name, "Alpha FC");
        assert_eq!(patched.win, 1);
        assert_eq!(patched.points, 3);
        assert_eq!(patched.group, "A");
    }

    #[tokio::test]
    async fn updating_an_unknown_team_is_not_found() {
        let (state, _store) = state_with("one_shot").await;
        let err = update_team(&state, "ghost", UpdateTeamRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn bulk_rewrite_moves_a_team_between_groups() {
        let (state, store) = state_with("bulk_rewrite").await;
        store.seed(&[team("t1", "Alpha", "A", 0), team("t2", "Beta", "B", 0)]).await;
        state.engine().load_all(Default::default()).await.unwrap();

        let updated = update_team(
            &state,
            "t1",
            UpdateTeamRequest {
                group: Some("C".into()),
                points: Some(3),
                ..UpdateTeamRequest::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.group, "C");
        let groups = state.engine().groups().await;
        assert!(groups["A"].is_empty());
        assert_eq!(groups["C"][0].points, 3);
        let remote = store.remote::<TeamEntity>().await;
        assert_eq!(remote.len(), 2);
        assert!(remote.iter().any(|t| t.key == "t1" && t.group == "C"));
    }

    #[tokio::test]
    async fn deleting_unknown_entities_is_a_no_op() {
        let (state, store) = state_with("one_shot").await;
        delete_team(&state, "ghost").await.unwrap();
        delete_fixture(&state, "ghost").await.unwrap();
        delete_result(&state, "ghost").await.unwrap();
        assert!(store.remote::<TeamEntity>().await.is_empty());
    }

    #[tokio::test]
    async fn fixtures_and_results_are_created_then_patched() {
        let (state, store) = state_with("one_shot").await;
        let created = create_fixture(
            &state,
            CreateFixtureRequest {
                label: "Alpha vs Beta".into(),
                date: "2025-06-01".into(),
                time: "18:00".into(),
            },
        )
        .await
        .unwrap();

        let updated = update_fixture(
            &state,
            &created.key,
            UpdateFixtureRequest {
                time: Some("20:00".into()),
                ..UpdateFixtureRequest::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.label, "Alpha vs Beta");
        assert_eq!(updated.time, "20:00");

        let result = create_result(
            &state,
            CreateResultRequest {
                home: "Alpha".into(),
                away: "Beta".into(),
                home_score: 2,
                away_score: 2,
            },
        )
        .await
        .unwrap();
        let result = update_result(
            &state,
            &result.key,
            UpdateResultRequest {
                away_score: Some(3),
                ..UpdateResultRequest::default()
            },
        )
        .await
        .unwrap();
        assert_eq!((result.home_score, result.away_score), (2, 3));

        assert_eq!(store.remote::<FixtureEntity>().await[0].time, "20:00");
        assert_eq!(store.remote::<ResultEntity>().await[0].away_score, 3);
    }

    #[tokio::test]
    async fn replace_groups_fills_glyphs_and_reports_every_group() {
        let (state, _store) = state_with("bulk_rewrite").await;
        let response = replace_groups(
            &state,
            ReplaceGroupsRequest {
                groups: vec![GroupInput {
                    label: "B".into(),
                    teams: vec![GroupMemberInput {
                        key: "t1".into(),
                        name: "Alpha".into(),
                        email: String::new(),
                        glyph: String::new(),
                        played: 1,
                        win: 1,
                        draw: 0,
                        loss: 0,
                        points: 3,
                        created_at: Some(5),
                    }],
                }],
            },
        )
        .await
        .unwrap();

        let labels: Vec<_> = response.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
        assert_eq!(response.groups[1].teams[0].glyph, state.config().default_glyph());
    }

    #[tokio::test]
    async fn writes_fail_fast_when_degraded() {
        let state = AppState::new(AppConfig::default());
        let err = create_result(
            &state,
            CreateResultRequest {
                home: "Alpha".into(),
                away: "Beta".into(),
                home_score: 1,
                away_score: 0,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
