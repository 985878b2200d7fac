use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        admin::{
            CreateFixtureRequest, CreateResultRequest, GroupsSnapshotResponse, ReloadResponse,
            ReplaceGroupsRequest, TeamView, UpdateFixtureRequest, UpdateResultRequest,
            UpdateTeamRequest,
        },
        public::{FixtureView, ResultView},
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

/// Admin endpoints editing teams, groups, fixtures and results.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/teams/{key}", put(update_team).delete(delete_team))
        .route("/admin/groups", put(replace_groups))
        .route("/admin/fixtures", post(create_fixture))
        .route("/admin/fixtures/{key}", put(update_fixture).delete(delete_fixture))
        .route("/admin/results", post(create_result))
        .route("/admin/results/{key}", put(update_result).delete(delete_result))
        .route("/admin/reload", post(reload))
}

/// Apply a partial update to a team.
#[utoipa::path(
    put,
    path = "/admin/teams/{key}",
    tag = "admin",
    params(("key" = String, Path, description = "Key of the team to update")),
    request_body = UpdateTeamRequest,
    responses(
        (status = 200, description = "Team updated", body = TeamView),
        (status = 404, description = "Unknown team")
    )
)]
pub async fn update_team(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Valid(Json(payload)): Valid<Json<UpdateTeamRequest>>,
) -> Result<Json<TeamView>, AppError> {
    Ok(Json(admin_service::update_team(&state, &key, payload).await?))
}

/// Delete a team.
#[utoipa::path(
    delete,
    path = "/admin/teams/{key}",
    tag = "admin",
    params(("key" = String, Path, description = "Key of the team to delete")),
    responses((status = 204, description = "Team deleted or already absent"))
)]
pub async fn delete_team(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    admin_service::delete_team(&state, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace every team with a full groups snapshot.
#[utoipa::path(
    put,
    path = "/admin/groups",
    tag = "admin",
    request_body = ReplaceGroupsRequest,
    responses(
        (status = 200, description = "Groups replaced", body = GroupsSnapshotResponse),
        (status = 502, description = "Storage rejected the rewrite"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn replace_groups(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ReplaceGroupsRequest>>,
) -> Result<Json<GroupsSnapshotResponse>, AppError> {
    Ok(Json(admin_service::replace_groups(&state, payload).await?))
}

/// Schedule a fixture.
#[utoipa::path(
    post,
    path = "/admin/fixtures",
    tag = "admin",
    request_body = CreateFixtureRequest,
    responses((status = 201, description = "Fixture created", body = FixtureView))
)]
pub async fn create_fixture(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateFixtureRequest>>,
) -> Result<(StatusCode, Json<FixtureView>), AppError> {
    let fixture = admin_service::create_fixture(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(fixture)))
}

/// Apply a partial update to a fixture.
#[utoipa::path(
    put,
    path = "/admin/fixtures/{key}",
    tag = "admin",
    params(("key" = String, Path, description = "Key of the fixture to update")),
    request_body = UpdateFixtureRequest,
    responses(
        (status = 200, description = "Fixture updated", body = FixtureView),
        (status = 404, description = "Unknown fixture")
    )
)]
pub async fn update_fixture(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Valid(Json(payload)): Valid<Json<UpdateFixtureRequest>>,
) -> Result<Json<FixtureView>, AppError> {
    Ok(Json(admin_service::update_fixture(&state, &key, payload).await?))
}

/// Delete a fixture.
#[utoipa::path(
    delete,
    path = "/admin/fixtures/{key}",
    tag = "admin",
    params(("key" = String, Path, description = "Key of the fixture to delete")),
    responses((status = 204, description = "Fixture deleted or already absent"))
)]
pub async fn delete_fixture(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    admin_service::delete_fixture(&state, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record a result.
#[utoipa::path(
    post,
    path = "/admin/results",
    tag = "admin",
    request_body = CreateResultRequest,
    responses((status = 201, description = "Result created", body = ResultView))
)]
pub async fn create_result(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateResultRequest>>,
) -> Result<(StatusCode, Json<ResultView>), AppError> {
    let result = admin_service::create_result(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Apply a partial update to a result.
#[utoipa::path(
    put,
    path = "/admin/results/{key}",
    tag = "admin",
    params(("key" = String, Path, description = "Key of the result to update")),
    request_body = UpdateResultRequest,
    responses(
        (status = 200, description = "Result updated", body = ResultView),
        (status = 404, description = "Unknown result")
    )
)]
pub async fn update_result(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Valid(Json(payload)): Valid<Json<UpdateResultRequest>>,
) -> Result<Json<ResultView>, AppError> {
    Ok(Json(admin_service::update_result(&state, &key, payload).await?))
}

/// Delete a result.
#[utoipa::path(
    delete,
    path = "/admin/results/{key}",
    tag = "admin",
    params(("key" = String, Path, description = "Key of the result to delete")),
    responses((status = 204, description = "Result deleted or already absent"))
)]
pub async fn delete_result(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    admin_service::delete_result(&state, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reload every collection from the store.
#[utoipa::path(
    post,
    path = "/admin/reload",
    tag = "admin",
    responses((status = 200, description = "Origin of each reloaded collection", body = ReloadResponse))
)]
pub async fn reload(State(state): State<SharedState>) -> Result<Json<ReloadResponse>, AppError> {
    Ok(Json(admin_service::reload(&state).await?))
}
