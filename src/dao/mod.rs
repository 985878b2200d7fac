/// Document store abstraction and its backends.
pub mod document_store;
/// Persisted tournament models and their document mapping.
pub mod models;
/// Storage error shared by every backend.
pub mod storage;
