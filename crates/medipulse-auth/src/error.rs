//! Error types for the authenticated request pipeline.

use thiserror::Error;

/// Why a token refresh could not produce a new access token.
///
/// `Clone` so the same failure can be handed to every caller that was
/// waiting on the refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The session holds no refresh token
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The refresh endpoint answered with a non-success status
    #[error("Refresh rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The refresh call never reached the server or the connection failed
    #[error("Refresh request failed: {0}")]
    Network(String),

    /// The refresh call did not settle within the configured bound
    #[error("Refresh timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },

    /// The refresh endpoint answered 2xx with an unusable body
    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    /// The task driving the refresh was dropped before it settled
    #[error("Refresh abandoned before completion")]
    Abandoned,
}

/// Error type for API calls made through the client.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token refresh failed; the session has been cleared
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    /// 401 on a request that was already retried with a fresh token
    #[error("Unauthorized after token refresh: {body}")]
    Unauthorized { body: String },

    /// Login or registration rejected by the server
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// HTTP client error
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Network unavailable (transient error, can retry)
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Request timed out
    #[error("Operation timed out")]
    Timeout,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] medipulse_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// True for an HTTP 401 that has not been classified yet.
    pub fn is_unauthorized_status(&self) -> bool {
        matches!(self, AuthError::Http { status: 401, .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Http { status, .. } => Some(*status),
            AuthError::Unauthorized { .. } => Some(401),
            AuthError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network unavailable
    /// - Timeouts
    /// - 5xx responses
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable(_) => true,
            AuthError::Timeout => true,
            AuthError::Http { status, .. } => *status >= 500,
            AuthError::Request(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
