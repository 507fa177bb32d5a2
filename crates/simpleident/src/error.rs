//! Error types for the identity provider.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! `StoreError` covers the record store; `OAuthError` is the protocol-level taxonomy
//! surfaced to HTTP callers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors from the record store layer.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// No record with the requested identifier (or matching the predicate)
    #[error("record not found")]
    NotFound,

    /// A record with this identifier already exists
    #[error("record already exists")]
    AlreadyExists,

    /// Persistence medium failure (open, write, rename)
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted document could not be encoded or decoded
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the OAuth 2.0 protocol engine and the surrounding endpoints.
#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    /// Malformed request (bad header, unparsable parameter)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown client, unparsable client id, or client mismatch
    #[error("invalid client")]
    InvalidClient,

    /// Redirect URI is unparsable, carries a fragment, or is not under the callback URL
    #[error("invalid redirect_uri: {0}")]
    InvalidRedirectUri(String),

    /// `response_type` other than `code`
    #[error("unsupported response_type: {0}")]
    UnsupportedResponseType(String),

    /// `grant_type` other than `authorization_code`
    #[error("unsupported grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Authorization code unknown, expired, consumed, or bound to another redirect
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// Second authorize leg without a completed first leg
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// Wrong credentials, or an unknown/expired bearer token
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Resource already exists
    #[error("already exists: {resource}")]
    AlreadyExists {
        /// Description of the conflicting resource
        resource: String,
    },

    /// Error from the record store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Random generation, hashing, or other internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl OAuthError {
    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid redirect URI error.
    #[must_use]
    pub fn invalid_redirect_uri(message: impl Into<String>) -> Self {
        Self::InvalidRedirectUri(message.into())
    }

    /// Create an invalid grant error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }

    /// Create an invalid session error.
    #[must_use]
    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::InvalidSession(message.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create an already exists error.
    #[must_use]
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists { resource: resource.into() }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true for failures of the server itself rather than of the request.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::Store(StoreError::Io(_) | StoreError::Serialization(_))
        )
    }

    /// HTTP status used when this error is returned directly.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidRedirectUri(_)
            | Self::UnsupportedResponseType(_)
            | Self::UnsupportedGrantType(_)
            | Self::InvalidGrant(_)
            | Self::InvalidSession(_) => StatusCode::BAD_REQUEST,
            Self::InvalidClient | Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound { .. } | Self::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } | Self::Store(StoreError::AlreadyExists) => {
                StatusCode::CONFLICT
            }
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OAuth 2.0 error code (RFC 6749 §4.1.2.1, §5.2; RFC 6750 §3.1).
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::InvalidRedirectUri(_) | Self::InvalidSession(_) => {
                "invalid_request"
            }
            Self::InvalidClient => "invalid_client",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::Unauthorized => "invalid_token",
            Self::NotFound { .. } | Self::Store(StoreError::NotFound) => "not_found",
            Self::AlreadyExists { .. } | Self::Store(StoreError::AlreadyExists) => {
                "already_exists"
            }
            Self::Store(_) | Self::Internal(_) => "server_error",
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let description = if self.is_internal() {
            tracing::error!(error = %self, "Request failed with internal error");
            "internal server error".to_string()
        } else {
            tracing::debug!(error = %self, "Request rejected");
            self.to_string()
        };

        (
            self.status_code(),
            Json(serde_json::json!({
                "error": self.error_code(),
                "error_description": description
            })),
        )
            .into_response()
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for protocol operations.
pub type OAuthResult<T> = Result<T, OAuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(OAuthError::InvalidClient.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(OAuthError::invalid_grant("expired").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(OAuthError::Unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            OAuthError::from(StoreError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OAuthError::internal("rng failed").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            OAuthError::UnsupportedGrantType("refresh_token".into()).error_code(),
            "unsupported_grant_type"
        );
        assert_eq!(OAuthError::invalid_redirect_uri("fragment").error_code(), "invalid_request");
        assert_eq!(OAuthError::internal("boom").error_code(), "server_error");
    }

    #[test]
    fn test_internal_classification() {
        let io = std::io::Error::other("disk full");
        assert!(OAuthError::from(StoreError::Io(io)).is_internal());
        assert!(OAuthError::internal("rng").is_internal());
        assert!(!OAuthError::from(StoreError::NotFound).is_internal());
        assert!(!OAuthError::InvalidClient.is_internal());
    }
}
