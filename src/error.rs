//! Error Handling
//!
//! The error taxonomy surfaced by the authentication façade and its mapping
//! onto HTTP responses.
//!
//! Component errors ([`PasswordError`], [`StoreError`], [`CacheError`]) are
//! lifted into [`AuthError`] with `?`. Each `AuthError` belongs to an
//! [`ErrorKind`], which fixes the HTTP status. Infrastructure failures are
//! always `Internal`; they are never reported as an authentication failure.
//!
//! Client responses carry a safe message only. Internal details are logged,
//! and exposed in the body only when [`ErrorConfig::expose_details`] is set.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::cache::CacheError;
use crate::observability::SecurityEvent;
use crate::password::PasswordError;
use crate::store::StoreError;

// ============================================================================
// Error Configuration
// ============================================================================

/// Controls how much of an error reaches the client.
#[derive(Debug, Clone)]
pub struct ErrorConfig {
    /// Include internal details in response bodies. `false` in production.
    pub expose_details: bool,

    /// Whether to log errors when they are turned into responses
    pub log_errors: bool,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl ErrorConfig {
    pub fn production() -> Self {
        Self {
            expose_details: false,
            log_errors: true,
        }
    }

    pub fn development() -> Self {
        Self {
            expose_details: true,
            log_errors: true,
        }
    }

    /// Load from environment.
    ///
    /// Reads `RUST_ENV`, then `APP_ENV`. `"development"` or `"dev"` selects
    /// the development config; anything else, or nothing, is production.
    pub fn from_env() -> Self {
        let env = std::env::var("RUST_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .unwrap_or_default()
            .to_lowercase();

        if env == "development" || env == "dev" {
            Self::development()
        } else {
            Self::production()
        }
    }
}

static ERROR_CONFIG: std::sync::OnceLock<ErrorConfig> = std::sync::OnceLock::new();

/// Install the error configuration. Only the first call has an effect.
pub fn init(config: ErrorConfig) {
    let _ = ERROR_CONFIG.set(config);
}

/// The active error configuration (production unless [`init`] said otherwise)
pub fn config() -> &'static ErrorConfig {
    ERROR_CONFIG.get_or_init(ErrorConfig::default)
}

// ============================================================================
// Error Types
// ============================================================================

/// Outcome classification at the request boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 400 - malformed or empty request body
    BadRequest,
    /// 401 - bad credentials or no session
    Unauthorized,
    /// 404 - no such route
    NotFound,
    /// 409 - account already exists
    Conflict,
    /// 500 - store, cache, or hashing failure
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest => write!(f, "bad_request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Internal => write!(f, "internal_error"),
        }
    }
}

/// Errors returned by [`AuthService`](crate::auth::AuthService).
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, empty, or undecodable input
    #[error("invalid input: {0}")]
    WeakInput(String),

    /// Unknown user or wrong password. Deliberately indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Username is already registered
    #[error("account already exists")]
    DuplicateAccount,

    /// Signout without a session token
    #[error("not authenticated")]
    NotAuthenticated,

    /// Credential store failed or timed out
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// Session cache failed or timed out
    #[error("session cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Hashing or task failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn weak_input(message: impl Into<String>) -> Self {
        Self::WeakInput(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WeakInput(_) => ErrorKind::BadRequest,
            Self::InvalidCredentials | Self::NotAuthenticated => ErrorKind::Unauthorized,
            Self::DuplicateAccount => ErrorKind::Conflict,
            Self::StoreUnavailable(_) | Self::CacheUnavailable(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Message that is safe to show any client
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "An internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }

    fn log(&self) {
        if !config().log_errors {
            return;
        }

        let kind = self.kind();
        match kind {
            ErrorKind::Internal => match self {
                Self::StoreUnavailable(_) | Self::CacheUnavailable(_) => {
                    crate::security_event!(
                        SecurityEvent::DependencyUnavailable,
                        error_kind = %kind,
                        details = %self,
                        "Dependency unavailable"
                    );
                }
                _ => tracing::error!(error_kind = %kind, details = %self, "Internal error"),
            },
            ErrorKind::Unauthorized => {
                tracing::warn!(error_kind = %kind, message = %self, "Auth error");
            }
            _ => {
                tracing::debug!(error_kind = %kind, message = %self, "Client error");
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => Self::DuplicateAccount,
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

impl From<CacheError> for AuthError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Unavailable(msg) => Self::CacheUnavailable(msg),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("hashing task failed: {}", err))
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// JSON error body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error kind code
    pub error: String,
    /// Human-readable message
    pub message: String,
    /// Internal details (development only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();

        let kind = self.kind();
        let details = if config().expose_details && kind == ErrorKind::Internal {
            Some(self.to_string())
        } else {
            None
        };

        let body = ErrorResponse {
            error: kind.to_string(),
            message: self.public_message(),
            details,
        };

        (kind.status_code(), Json(body)).into_response()
    }
}

/// Result alias for the authentication façade
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_status_codes() {
        assert_eq!(ErrorKind::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_taxonomy() {
        assert_eq!(AuthError::weak_input("empty").kind(), ErrorKind::BadRequest);
        assert_eq!(AuthError::InvalidCredentials.kind(), ErrorKind::Unauthorized);
        assert_eq!(AuthError::NotAuthenticated.kind(), ErrorKind::Unauthorized);
        assert_eq!(AuthError::DuplicateAccount.kind(), ErrorKind::Conflict);
        assert_eq!(AuthError::StoreUnavailable("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(AuthError::CacheUnavailable("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_component_conversions() {
        assert!(matches!(
            AuthError::from(StoreError::Duplicate),
            AuthError::DuplicateAccount
        ));
        assert!(matches!(
            AuthError::from(StoreError::Unavailable("down".into())),
            AuthError::StoreUnavailable(_)
        ));
        assert!(matches!(
            AuthError::from(CacheError::Unavailable("down".into())),
            AuthError::CacheUnavailable(_)
        ));
        assert!(matches!(
            AuthError::from(PasswordError::Hash("rng".into())),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = AuthError::StoreUnavailable("connection refused at 10.0.0.5".into());
        assert_eq!(err.public_message(), "An internal error occurred");

        let err = AuthError::InvalidCredentials;
        assert_eq!(err.public_message(), "invalid username or password");
    }

    #[test]
    fn test_into_response_status() {
        let response = AuthError::DuplicateAccount.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AuthError::CacheUnavailable("timeout".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_config_modes() {
        assert!(!ErrorConfig::production().expose_details);
        assert!(ErrorConfig::development().expose_details);
    }
}
