use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        admin::{RegisterTeamRequest, TeamView},
        public::{FixturesResponse, GroupsResponse, ResultsResponse, SyncStatusResponse},
    },
    error::AppError,
    services::{public_service, registration_service},
    state::SharedState,
};

/// Public endpoints: tournament views and team registration.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/groups", get(get_groups))
        .route("/fixtures", get(get_fixtures))
        .route("/results", get(get_results))
        .route("/sync/status", get(get_sync_status))
        .route("/teams", post(register_team))
}

#[utoipa::path(
    get,
    path = "/groups",
    tag = "public",
    responses((status = 200, description = "Standings of every group", body = GroupsResponse))
)]
/// Return the standings of every group, configured groups first.
pub async fn get_groups(State(state): State<SharedState>) -> Json<GroupsResponse> {
    Json(public_service::get_groups(&state).await)
}

#[utoipa::path(
    get,
    path = "/fixtures",
    tag = "public",
    responses((status = 200, description = "Scheduled matches", body = FixturesResponse))
)]
/// Return the scheduled matches.
pub async fn get_fixtures(State(state): State<SharedState>) -> Json<FixturesResponse> {
    Json(public_service::get_fixtures(&state).await)
}

#[utoipa::path(
    get,
    path = "/results",
    tag = "public",
    responses((status = 200, description = "Match results", body = ResultsResponse))
)]
/// Return the recorded results.
pub async fn get_results(State(state): State<SharedState>) -> Json<ResultsResponse> {
    Json(public_service::get_results(&state).await)
}

#[utoipa::path(
    get,
    path = "/sync/status",
    tag = "public",
    responses((status = 200, description = "Sync state of each collection", body = SyncStatusResponse))
)]
/// Return whether the backend is degraded and the sync state of each collection.
pub async fn get_sync_status(State(state): State<SharedState>) -> Json<SyncStatusResponse> {
    Json(public_service::get_sync_status(&state).await)
}

#[utoipa::path(
    post,
    path = "/teams",
    tag = "public",
    request_body = RegisterTeamRequest,
    responses(
        (status = 201, description = "Team registered", body = TeamView),
        (status = 400, description = "Invalid registration"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Register a team; it joins the least populated group.
pub async fn register_team(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterTeamRequest>>,
) -> Result<(StatusCode, Json<TeamView>), AppError> {
    let team = registration_service::register_team(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(team)))
}
