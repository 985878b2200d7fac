use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for GameOn Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::get_groups,
        crate::routes::public::get_fixtures,
        crate::routes::public::get_results,
        crate::routes::public::get_sync_status,
        crate::routes::public::register_team,
        crate::routes::admin::update_team,
        crate::routes::admin::delete_team,
        crate::routes::admin::replace_groups,
        crate::routes::admin::create_fixture,
        crate::routes::admin::update_fixture,
        crate::routes::admin::delete_fixture,
        crate::routes::admin::create_result,
        crate::routes::admin::update_result,
        crate::routes::admin::delete_result,
        crate::routes::admin::reload,
        crate::routes::sse::public_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::public::GroupsResponse,
            crate::dto::public::FixturesResponse,
            crate::dto::public::ResultsResponse,
            crate::dto::public::SyncStatusResponse,
            crate::dto::admin::RegisterTeamRequest,
            crate::dto::admin::TeamView,
            crate::dto::admin::ReplaceGroupsRequest,
            crate::dto::admin::GroupsSnapshotResponse,
            crate::dto::admin::ReloadResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::GroupsChangedEvent,
            crate::dto::sse::FixturesChangedEvent,
            crate::dto::sse::ResultsChangedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Tournament views and team registration"),
        (name = "admin", description = "Tournament administration"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
