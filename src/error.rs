use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the Hunter application
#[derive(Error, Debug)]
pub enum HunterError {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database connection failed: {0}")]
    DatabaseConnection(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // Fleet / proxy errors
    #[error("Invalid proxy endpoint: {0}")]
    InvalidEndpoint(String),

    // Marketplace errors
    #[error("Browser session failed: {0}")]
    Browser(String),

    #[error("Malformed payload: {0}")]
    Payload(String),

    // Signal lifecycle
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Authentication errors
    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    #[error("Authentication failed")]
    AuthenticationFailed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Operation timed out")]
    Timeout,

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Hunter operations
pub type Result<T> = std::result::Result<T, HunterError>;

impl HunterError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            HunterError::InvalidRequest(_)
            | HunterError::InvalidEndpoint(_)
            | HunterError::Payload(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            HunterError::MissingAuthHeader
            | HunterError::InvalidAuthHeader
            | HunterError::AuthenticationFailed => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            HunterError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            HunterError::Conflict(_) => StatusCode::CONFLICT,

            // 502 Bad Gateway
            HunterError::Browser(_)
            | HunterError::Http(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            HunterError::DatabaseConnection(_) | HunterError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 504 Gateway Timeout
            HunterError::Timeout => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            HunterError::Database(_)
            | HunterError::Io(_)
            | HunterError::InvalidConfig(_)
            | HunterError::MissingEnvVar(_)
            | HunterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Configuration problems are the only fatal class; everything else is
    /// isolated by the fleet and the hunter.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HunterError::InvalidConfig(_)
                | HunterError::MissingEnvVar(_)
                | HunterError::DatabaseConnection(_)
        )
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for HunterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for HunterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HunterError::Timeout
        } else {
            HunterError::Http(err.to_string())
        }
    }
}

impl From<url::ParseError> for HunterError {
    fn from(err: url::ParseError) -> Self {
        HunterError::InvalidConfig(err.to_string())
    }
}

impl From<serde_json::Error> for HunterError {
    fn from(err: serde_json::Error) -> Self {
        HunterError::Payload(err.to_string())
    }
}
