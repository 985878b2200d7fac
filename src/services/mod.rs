/// Admin edits of teams, fixtures and results.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Public service for read-only tournament views.
pub mod public_service;
/// Team registration and group assignment.
pub mod registration_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor driving loads and live subscriptions.
pub mod storage_supervisor;
