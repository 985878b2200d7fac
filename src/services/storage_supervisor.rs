use std::{
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

use crate::{
    config::SyncMode,
    dao::{document_store::DocumentStore, storage::StorageError},
    services::sse_events,
    state::{AppState, SharedState},
    sync::{Entity, Subscription, SyncError},
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, load the tournament state and keep the engine in degraded
/// mode while the backend is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn DocumentStore>, StorageError>> + Send,
{
    let engine = state.engine().clone();
    let mut delay = INITIAL_DELAY;

    while !engine.is_closed() {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        if engine.install_store(store.clone()).await.is_err() {
            return;
        }
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;
        bootstrap_logged(&state).await;

        loop {
            if engine.is_closed() {
                return;
            }
            if store.health_check().await.is_ok() {
                sleep(HEALTH_POLL_INTERVAL).await;
                continue;
            }

            let mut attempt = 0;
            let mut reconnect_delay = INITIAL_DELAY;
            let mut reconnected = false;

            while attempt < MAX_RECONNECT_ATTEMPTS {
                match store.try_reconnect().await {
                    Ok(()) => {
                        info!("storage reconnection succeeded after health check failure");
                        reconnected = true;
                        break;
                    }
                    Err(reconnect_err) => {
                        if attempt == 0 {
                            warn!(
                                attempt, error = %reconnect_err,
                                "storage reconnect first attempt failed; entering degraded mode"
                            );
                            state.close_live_subscriptions().await;
                            engine.clear_store().await;
                        } else {
                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                        }
                        attempt += 1;
                        sleep(reconnect_delay).await;
                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                    }
                }
            }

            if !reconnected {
                warn!("exhausted storage reconnect attempts; staying in degraded mode");
                break;
            }
            if engine.is_degraded().await {
                if engine.install_store(store.clone()).await.is_err() {
                    return;
                }
                bootstrap_logged(&state).await;
            }
            sleep(HEALTH_POLL_INTERVAL).await;
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Load every collection and, in live mode, follow remote changes of each of them. The first
/// live snapshot of a collection replaces whatever the load seeded, defaults included.
pub async fn bootstrap(state: &SharedState) -> Result<(), SyncError> {
    let config = state.config();
    let engine = state.engine();

    let report = engine.load_all(config.defaults().clone()).await?;
    if !report.is_complete() {
        warn!("some collections could not be loaded; serving fallback data");
    }
    sse_events::everything_changed(state).await;

    if config.sync_mode() == SyncMode::Live {
        let publisher = Arc::downgrade(state);
        let subscriptions = vec![
            subscribe(state, publisher.clone(), sse_events::broadcast_teams).await?,
            subscribe(state, publisher.clone(), sse_events::broadcast_fixtures).await?,
            subscribe(state, publisher, sse_events::broadcast_results).await?,
        ];
        state.replace_live_subscriptions(subscriptions).await;
    }
    Ok(())
}

/// Forward degraded mode changes to the public SSE stream.
pub fn forward_status_changes(state: &SharedState) -> JoinHandle<()> {
    let mut watcher = state.engine().degraded_watcher();
    let state = Arc::downgrade(state);
    tokio::spawn(async move {
        while watcher.changed().await.is_ok() {
            let degraded = *watcher.borrow_and_update();
            let Some(state) = state.upgrade() else {
                break;
            };
            sse_events::broadcast_system_status(&state, degraded);
        }
    })
}

async fn bootstrap_logged(state: &SharedState) {
    if let Err(err) = bootstrap(state).await {
        warn!(error = %err, "failed to bootstrap tournament state");
    }
}

async fn subscribe<E: Entity>(
    state: &SharedState,
    publisher: Weak<AppState>,
    publish: fn(&SharedState, Vec<E>),
) -> Result<Subscription, SyncError> {
    state
        .engine()
        .subscribe::<E, _>(move |entities| {
            if let Some(state) = publisher.upgrade() {
                publish(&state, entities);
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::{FixtureEntity, TeamEntity},
        sync::{
            SyncStatus,
            test_support::{FlakyStore, fixture, team},
        },
    };

    #[tokio::test]
    async fn connects_loads_and_follows_live_changes() {
        let state = AppState::new(AppConfig::default());
        let store = FlakyStore::new();
        store.seed(&[team("t1", "Alpha", "A", 0)]).await;

        let connected = store.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store: Arc<dyn DocumentStore> = connected.clone();
            async move { Ok(store) }
        }));

        timeout(Duration::from_secs(3), async {
            while state.engine().subscription_count() < 3 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(!state.is_degraded().await);
        assert_eq!(state.engine().status::<TeamEntity>(), SyncStatus::Synced);

        let mut events = state.public_sse().subscribe();
        store.seed(&[fixture("f1", "Alpha vs Beta")]).await;
        timeout(Duration::from_secs(1), async {
            loop {
                let event = events.recv().await.unwrap();
                if event.event.as_deref() == Some("fixtures_changed") && event.data.contains("f1") {
                    break;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(state.engine().snapshot::<FixtureEntity>().await.len(), 1);

        supervisor.abort();
        state.engine().close().await;
    }

    #[tokio::test]
    async fn stays_degraded_while_the_backend_is_unreachable() {
        let state = AppState::new(AppConfig::default());
        let supervisor = tokio::spawn(run(state.clone(), || async {
            Err::<Arc<dyn DocumentStore>, _>(StorageError::unavailable(
                "connect".into(),
                std::io::Error::other("refused"),
            ))
        }));

        sleep(Duration::from_millis(50)).await;
        assert!(state.is_degraded().await);
        assert_eq!(state.engine().subscription_count(), 0);
        supervisor.abort();
    }

    #[tokio::test]
    async fn one_shot_bootstrap_does_not_subscribe() {
        let state = AppState::new(AppConfig::from_json(r#"{"syncMode": "one_shot"}"#).unwrap());
        let store = FlakyStore::new();
        store.seed(&[team("t1", "Alpha", "A", 0)]).await;
        state.engine().install_store(store).await.unwrap();

        bootstrap(&state).await.unwrap();

        assert_eq!(state.engine().subscription_count(), 0);
        assert_eq!(state.engine().groups().await["A"].len(), 1);
        assert!(
            state
                .engine()
                .statuses()
                .iter()
                .all(|(_, status)| *status == SyncStatus::Synced)
        );
    }

    #[tokio::test]
    async fn live_snapshot_of_an_empty_collection_clears_seeded_defaults() {
        let state = AppState::new(
            AppConfig::from_json(
                r#"{"syncMode": "live", "defaults": {"fixtures": [{"key": "f0", "match": "TBD"}]}}"#,
            )
            .unwrap(),
        );
        let store = FlakyStore::new();
        state.engine().install_store(store.clone()).await.unwrap();

        let report = state.engine().load_all(state.config().defaults().clone()).await.unwrap();
        assert_eq!(report.fixtures.entities.len(), 1);

        bootstrap(&state).await.unwrap();
        timeout(Duration::from_secs(1), async {
            while !state.engine().snapshot::<FixtureEntity>().await.is_empty() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(store.remote::<FixtureEntity>().await.is_empty());
        assert_eq!(state.engine().status::<FixtureEntity>(), SyncStatus::Synced);
        state.engine().close().await;
    }

    #[tokio::test]
    async fn degraded_changes_reach_the_public_stream() {
        let state = AppState::new(AppConfig::default());
        let mut events = state.public_sse().subscribe();
        let forwarder = forward_status_changes(&state);

        state.engine().install_store(FlakyStore::new()).await.unwrap();
        let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        assert_eq!(event.event.as_deref(), Some("system_status"));
        assert!(event.data.contains("false"));

        state.engine().clear_store().await;
        let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        assert!(event.data.contains("true"));

        forwarder.abort();
    }
}
