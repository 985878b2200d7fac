//! Error types shared by the CouchDB storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The configured base URL cannot address documents.
    #[error("invalid CouchDB base URL `{url}`")]
    InvalidBaseUrl { url: String },
    /// CouchDB rejected a GET against the target database.
    #[error("failed to query CouchDB database `{database}`")]
    DatabaseQuery {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a database creation request.
    #[error("failed to create CouchDB database `{database}`")]
    DatabaseCreate {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Decoding a JSON value into the expected model failed.
    #[error("failed to deserialize CouchDB value for `{path}`")]
    DeserializeValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CouchDaoError {
    /// Whether CouchDB refused the request itself, as opposed to being unreachable.
    ///
    /// Conflicts, timeouts and throttling are left out: they clear up on a later attempt.
    pub fn is_rejection(&self) -> bool {
        match self {
            CouchDaoError::RequestStatus { status, .. }
            | CouchDaoError::DatabaseStatus { status, .. } => {
                status.is_client_error()
                    && !matches!(
                        *status,
                        StatusCode::CONFLICT
                            | StatusCode::REQUEST_TIMEOUT
                            | StatusCode::TOO_MANY_REQUESTS
                    )
            }
            CouchDaoError::MissingEnvVar { .. } | CouchDaoError::InvalidBaseUrl { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_rejections_except_retryable_ones() {
        let forbidden = CouchDaoError::RequestStatus {
            path: "teams::a".into(),
            status: StatusCode::FORBIDDEN,
        };
        assert!(forbidden.is_rejection());

        let conflict = CouchDaoError::RequestStatus {
            path: "teams::a".into(),
            status: StatusCode::CONFLICT,
        };
        assert!(!conflict.is_rejection());

        let server = CouchDaoError::RequestStatus {
            path: "teams::a".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert!(!server.is_rejection());
    }
}
