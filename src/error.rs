use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::sync::{SyncError, SyncFailureKind};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The sync engine could not complete the operation.
    #[error(transparent)]
    Sync(SyncError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<SyncError> for ServiceError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Degraded => ServiceError::Degraded,
            other => ServiceError::Sync(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The storage backend refused the request.
    #[error("storage rejected request: {0}")]
    BadGateway(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Sync(source) => {
                let message = error_chain(&source);
                match source.kind() {
                    SyncFailureKind::Transient => AppError::ServiceUnavailable(message),
                    SyncFailureKind::Rejected => AppError::BadGateway(message),
                    SyncFailureKind::Unsupported | SyncFailureKind::Closed => {
                        AppError::Internal(message)
                    }
                }
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{document_store::CollectionName, storage::StorageError};

    #[test]
    fn sync_failures_map_to_http_statuses() {
        let degraded: AppError = ServiceError::from(SyncError::Degraded).into();
        assert_eq!(degraded.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let timeout: AppError = ServiceError::from(SyncError::Timeout {
            collection: CollectionName::Teams,
            operation: "put",
            attempts: 3,
        })
        .into();
        assert_eq!(timeout.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let rejected: AppError = ServiceError::from(SyncError::Storage {
            collection: CollectionName::Results,
            operation: "put",
            attempts: 1,
            source: StorageError::rejected("forbidden"),
        })
        .into();
        assert!(rejected.to_string().contains("forbidden"));
        assert_eq!(rejected.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
