//! Engine error types.

use thiserror::Error;

/// Error type for the session engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The identity endpoint explicitly rejected the credential
    #[error("credential rejected by identity endpoint")]
    AuthRejected,

    /// No response received (connection refused, timed out)
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The endpoint answered with an unexpected status code
    #[error("identity endpoint returned HTTP {0}")]
    Endpoint(u16),

    /// The identity endpoint returned a role id the client does not know
    #[error("unknown role id: {0}")]
    UnknownRole(i64),

    /// Invalid transition in the reconcile state machine
    #[error("invalid reconciler transition: {0}")]
    InvalidTransition(String),

    /// Storage error
    #[error("storage error: {0}")]
    Store(#[from] credential_store::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// True when the backend authoritatively refused the credential.
    ///
    /// Everything else is ambiguous from the client's point of view and is
    /// handled non-destructively.
    pub fn is_rejection(&self) -> bool {
        matches!(self, EngineError::AuthRejected)
    }

    /// True when the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::NetworkUnavailable => true,
            EngineError::Endpoint(status) => *status >= 500,
            EngineError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
