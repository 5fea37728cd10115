use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AppError
///
/// The single error type returned by handlers and repositories. Each variant maps
/// onto one HTTP status; internal failures are logged and reported generically.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, expired or unverifiable credentials.
    #[error("Authentication required")]
    Unauthorized,

    /// The caller is authenticated but lacks the named permission.
    #[error("Missing permission '{permission}'")]
    Forbidden { permission: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// Uniqueness or state conflicts (double votes, duplicate names, stock).
    #[error("{message}")]
    Conflict { message: String },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Upstream identity provider failure: {0}")]
    Upstream(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
        }
    }

    pub fn forbidden(permission: impl Into<String>) -> Self {
        AppError::Forbidden {
            permission: permission.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        AppError::NotFound { resource }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client; never leaks driver or storage details.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Storage(_) | AppError::Database(_) => "Internal server error".to_string(),
            AppError::Upstream(_) => "Identity provider unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::not_found("Record"),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // unique_violation
                Some("23505") => AppError::conflict("Resource already exists"),
                // foreign_key_violation
                Some("23503") => AppError::bad_request("Invalid reference to related resource"),
                // check_violation
                Some("23514") => AppError::bad_request("Invalid data provided"),
                _ => AppError::Database(err),
            },
            _ => AppError::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}
