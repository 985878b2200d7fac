use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState, sync::SyncStatus};

/// Respond with the storage connectivity and sync state while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let engine = state.engine();
    match engine.store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    if engine.is_degraded().await {
        HealthResponse::degraded()
    } else {
        let synced = engine
            .statuses()
            .iter()
            .all(|(_, status)| *status == SyncStatus::Synced);
        HealthResponse::ok(synced)
    }
}
