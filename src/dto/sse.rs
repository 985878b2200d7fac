use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::public::{FixtureView, GroupStandings, ResultView};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast with the full standings whenever the teams collection changes.
pub struct GroupsChangedEvent {
    pub groups: Vec<GroupStandings>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast with every fixture whenever the fixtures collection changes.
pub struct FixturesChangedEvent {
    pub fixtures: Vec<FixtureView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast with every result whenever the results collection changes.
pub struct ResultsChangedEvent {
    pub results: Vec<ResultView>,
}
