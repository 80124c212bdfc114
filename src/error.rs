//! Error types for Postboard
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Session and ownership rejections are distinct variants so the boundary
/// layer can map each one to its own status without inspecting messages.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// No session token was presented (401)
    #[error("No session provided")]
    NoSession,

    /// Session token is unknown to the session store or has expired (401)
    #[error("Invalid or expired session")]
    InvalidOrExpiredSession,

    /// Authentication handshake failed, e.g. OAuth state mismatch (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Authenticated, but not allowed to touch this resource (403)
    #[error("Access denied")]
    Forbidden,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unprocessable entity (422)
    #[error("Unprocessable entity: {0}")]
    Unprocessable(String),

    /// Uniqueness constraint violated (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A backing store did not answer in time or is unreachable (503)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Identity provider rejected the exchange (502)
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether a caller may retry the failed operation (with backoff).
    ///
    /// Only infrastructure faults qualify; authentication and authorization
    /// rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref().is_some_and(is_sqlite_busy_code) =>
            {
                AppError::StoreUnavailable(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut => {
                AppError::StoreUnavailable("database pool timed out".to_string())
            }
            sqlx::Error::PoolClosed => {
                AppError::StoreUnavailable("database pool is closed".to_string())
            }
            sqlx::Error::Io(ref io_err) => AppError::StoreUnavailable(io_err.to_string()),
            other => AppError::Database(other),
        }
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes
fn is_sqlite_busy_code(code: &str) -> bool {
    code.parse::<i32>()
        .is_ok_and(|code| matches!(code & 0xff, 5 | 6))
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::NoSession => (StatusCode::UNAUTHORIZED, self.to_string(), "no_session"),
            AppError::InvalidOrExpiredSession => (
                StatusCode::UNAUTHORIZED,
                self.to_string(),
                "invalid_session",
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string(), "forbidden"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                msg.clone(),
                "unprocessable",
            ),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict".to_string(), "conflict"),
            AppError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable".to_string(),
                "store_unavailable",
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::IdentityProvider(_) => (
                StatusCode::BAD_GATEWAY,
                "Identity provider error".to_string(),
                "identity_provider",
            ),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        }

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        let mut response = (status, body).into_response();
        if matches!(self, AppError::StoreUnavailable(_)) {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from_static("1"),
            );
        }
        response
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
