use thiserror::Error;

use crate::dao::{document_store::CollectionName, storage::StorageError};

/// Coarse classification of a [`SyncError`] so callers can decide how to react (offer a
/// retry, report a bug, ignore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFailureKind {
    /// Store unreachable, slow, or not installed; the same call may succeed later.
    Transient,
    /// Store refused the request; retrying unchanged will fail again.
    Rejected,
    /// Store lacks the primitive (e.g. watching).
    Unsupported,
    /// Engine lifecycle already ended.
    Closed,
}

/// Typed failure returned by every engine operation instead of a panic or a silent default.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No store is installed.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// [`super::SyncEngine::close`] was called.
    #[error("sync engine is closed")]
    Closed,
    /// Every attempt of a remote call exceeded its deadline.
    #[error("{operation} on `{collection}` timed out after {attempts} attempt(s)")]
    Timeout {
        collection: CollectionName,
        operation: &'static str,
        attempts: u32,
    },
    /// The store reported an error.
    #[error("{operation} on `{collection}` failed after {attempts} attempt(s)")]
    Storage {
        collection: CollectionName,
        operation: &'static str,
        attempts: u32,
        #[source]
        source: StorageError,
    },
}

impl SyncError {
    /// Classify the failure.
    pub fn kind(&self) -> SyncFailureKind {
        match self {
            SyncError::Degraded | SyncError::Timeout { .. } => SyncFailureKind::Transient,
            SyncError::Closed => SyncFailureKind::Closed,
            SyncError::Storage { source, .. } => match source {
                StorageError::Unavailable { .. } => SyncFailureKind::Transient,
                StorageError::Rejected { .. } => SyncFailureKind::Rejected,
                StorageError::Unsupported { .. } => SyncFailureKind::Unsupported,
            },
        }
    }

    /// Whether re-issuing the operation later is worthwhile.
    pub fn is_retryable(&self) -> bool {
        self.kind() == SyncFailureKind::Transient
    }
}
