/// Unified error types for the Optima admin backend
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for moderation operations
#[derive(Error, Debug)]
pub enum AdminError {
    /// Target id absent
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation (email, task title, category name)
    #[error("{0}")]
    Conflict(String),

    /// Malformed or missing input, detected before any store mutation
    #[error("{0}")]
    InvalidInput(String),

    /// Missing or invalid caller identity
    #[error("{0}")]
    Unauthorized(String),

    /// A commit precondition did not hold; nothing was applied
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The primary mutation was applied but its audit entry was not written
    #[error("{action} was applied but the audit trail write failed: {reason}")]
    AuditWrite { action: String, reason: String },

    /// Store I/O and other internal failures
    #[error("Internal error: {0}")]
    Internal(String),

    /// SQLite adapter errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document encode/decode errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error classes distinguished at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Unauthorized,
    Internal,
}

impl AdminError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::NotFound(_) => ErrorKind::NotFound,
            AdminError::Conflict(_) | AdminError::PreconditionFailed(_) => ErrorKind::Conflict,
            AdminError::InvalidInput(_) => ErrorKind::InvalidInput,
            AdminError::Unauthorized(_) => ErrorKind::Unauthorized,
            AdminError::AuditWrite { .. }
            | AdminError::Internal(_)
            | AdminError::Database(_)
            | AdminError::Serialization(_)
            | AdminError::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        AdminError::NotFound(format!("{} {} not found", what, id))
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Convert AdminError to HTTP response
impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        crate::metrics::record_error(&format!("{:?}", kind));

        let (status, message) = match kind {
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ErrorKind::Conflict => (StatusCode::CONFLICT, self.to_string()),
            ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, self.to_string()),
            ErrorKind::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ErrorKind::Internal => {
                tracing::error!("Request failed: {}", self);
                let message = match &self {
                    // Operators need to know the trail may be incomplete
                    AdminError::AuditWrite { .. } => self.to_string(),
                    _ => "Internal server error".to_string(), // Don't leak details
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for admin operations
pub type AdminResult<T> = Result<T, AdminError>;
