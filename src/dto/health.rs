use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether every collection currently mirrors the store.
    pub synced: bool,
}

impl HealthResponse {
    /// Storage reachable.
    pub fn ok(synced: bool) -> Self {
        Self {
            status: "ok".to_string(),
            synced,
        }
    }

    /// Running without storage; views show cached or default data.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
            synced: false,
        }
    }
}
