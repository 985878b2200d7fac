//! Library crate for gameon-back: a tournament backend that keeps teams, fixtures and results
//! in memory and in step with a remote document store.

/// Runtime configuration.
pub mod config;
/// Storage layer: document model and store backends.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Application services behind the routes.
pub mod services;
/// Shared application state.
pub mod state;
/// Engine synchronizing the in-memory state with the store.
pub mod sync;
