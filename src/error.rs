//! Error types for the lending server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::ApiResponse;

/// Machine-readable error codes carried in the `error` field of the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    Validation,
    NotFound,
    AlreadyReturned,
    NoCopiesAvailable,
    Conflict,
    InvalidState,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyReturned => "ALREADY_RETURNED",
            ErrorCode::NoCopiesAvailable => "NO_COPIES_AVAILABLE",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Loan {0} not found")]
    LoanNotFound(i64),

    #[error("Loan {0} belongs to another borrower")]
    NotLoanOwner(i64),

    #[error("Loan {0} was already returned")]
    AlreadyReturned(i64),

    #[error("No copies available for title {0}")]
    NoCopiesAvailable(String),

    /// Lost a compare-and-set on a unit; retried by the coordinator
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and envelope code for this error
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::Forbidden),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::Validation),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            AppError::LoanNotFound(_) => (StatusCode::BAD_REQUEST, ErrorCode::NotFound),
            AppError::NotLoanOwner(_) => (StatusCode::BAD_REQUEST, ErrorCode::Forbidden),
            AppError::AlreadyReturned(_) => (StatusCode::BAD_REQUEST, ErrorCode::AlreadyReturned),
            AppError::NoCopiesAvailable(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::NoCopiesAvailable)
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Conflict),
            AppError::InvalidState(_) => (StatusCode::CONFLICT, ErrorCode::InvalidState),
            AppError::Unavailable(_) | AppError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Unavailable)
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.status_and_code().1
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Storage unavailable".to_string()
            }
            AppError::Unavailable(msg) => {
                tracing::error!("Storage unavailable: {}", msg);
                "Storage unavailable".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidState(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body: ApiResponse<()> = ApiResponse::failure(message, code.as_str());
        (status, Json(body)).into_response()
    }
}

// Pool exhaustion and timeouts are reported as storage unavailability
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Unavailable(e.to_string())
            }
            other => AppError::Database(other),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
