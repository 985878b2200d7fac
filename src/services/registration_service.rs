use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::TeamEntity,
    dto::{admin::{RegisterTeamRequest, TeamView}, now_epoch_millis},
    error::ServiceError,
    services::{admin_service, sse_events},
    state::SharedState,
    sync::groups,
};

/// Register a team in the least populated configured group.
pub async fn register_team(
    state: &SharedState,
    request: RegisterTeamRequest,
) -> Result<TeamView, ServiceError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("team name must not be blank".into()));
    }
    let contact = request
        .email
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let config = state.config();
    let current = state.engine().groups().await;
    let group = {
        let mut rng = rand::rng();
        groups::least_populated(config.group_labels(), &current, &mut rng).cloned()
    }
    .ok_or_else(|| ServiceError::InvalidInput("no group is configured".into()))?;

    let team = TeamEntity {
        key: Uuid::new_v4().simple().to_string(),
        name,
        contact,
        group,
        glyph: config.default_glyph().to_string(),
        created_at: now_epoch_millis(),
        ..TeamEntity::default()
    };

    let team = admin_service::save_team(state, team).await?;
    info!(key = %team.key, group = %team.group, "team registered");
    sse_events::teams_changed(state).await;
    Ok(team.into())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        state::AppState,
        sync::test_support::{FlakyStore, team},
    };

    fn request(name: &str) -> RegisterTeamRequest {
        RegisterTeamRequest {
            name: name.into(),
            email: Some(" captain@example.com ".into()),
        }
    }

    #[tokio::test]
    async fn registration_fills_the_emptiest_group() {
        let state = AppState::new(AppConfig::from_json(r#"{"syncMode": "one_shot"}"#).unwrap());
        let store = FlakyStore::new();
        store
            .seed(&[team("t1", "Alpha", "A", 0), team("t2", "Beta", "B", 0)])
            .await;
        state.engine().install_store(store.clone()).await.unwrap();
        state.engine().load_all(Default::default()).await.unwrap();

        let registered = register_team(&state, request("  Gamma ")).await.unwrap();

        assert_eq!(registered.group, "C");
        assert_eq!(registered.name, "Gamma");
        assert_eq!(registered.email, "captain@example.com");
        assert_eq!(registered.glyph, state.config().default_glyph());
        assert_eq!(store.remote::<TeamEntity>().await.len(), 3);
    }

    #[tokio::test]
    async fn bulk_rewrite_registration_keeps_existing_teams() {
        let state = AppState::new(AppConfig::from_json(r#"{"syncMode": "bulk_rewrite"}"#).unwrap());
        let store = FlakyStore::new();
        store.seed(&[team("t1", "Alpha", "A", 3)]).await;
        state.engine().install_store(store.clone()).await.unwrap();
        state.engine().load_all(Default::default()).await.unwrap();

        let registered = register_team(&state, request("Beta")).await.unwrap();

        assert_ne!(registered.group, "A");
        let remote = store.remote::<TeamEntity>().await;
        assert_eq!(remote.len(), 2);
        assert!(remote.iter().any(|t| t.key == "t1" && t.points == 3));
    }

    #[tokio::test]
    async fn concurrent_bulk_rewrite_registrations_are_all_kept() {
        let state = AppState::new(AppConfig::from_json(r#"{"syncMode": "bulk_rewrite"}"#).unwrap());
        let store = FlakyStore::new();
        store.seed(&[team("t1", "Alpha", "A", 3)]).await;
        state.engine().install_store(store.clone()).await.unwrap();
        state.engine().load_all(Default::default()).await.unwrap();
        store.delay_writes(Duration::from_millis(30));

        let handles: Vec<_> = ["Beta", "Gamma", "Delta"]
            .into_iter()
            .map(|name| {
                let state = state.clone();
                tokio::spawn(async move { register_team(&state, request(name)).await })
            })
            .collect();
        let mut registered = vec!["t1".to_string()];
        for handle in handles {
            registered.push(handle.await.unwrap().unwrap().key);
        }

        let remote = store.remote::<TeamEntity>().await;
        assert_eq!(remote.len(), 4);
        for key in &registered {
            assert!(remote.iter().any(|t| &t.key == key), "team {key} missing remotely");
            assert!(state.engine().get::<TeamEntity>(key).await.is_some());
        }
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let state = AppState::new(AppConfig::default());
        let err = register_team(&state, request("   ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
