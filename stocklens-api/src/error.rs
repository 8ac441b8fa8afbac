/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>` which automatically converts
/// to appropriate HTTP status codes.
///
/// # Taxonomy
///
/// The workflow's failure modes map onto distinct status codes so clients
/// can show the right notice:
/// - insufficient balance (pre-check or race-lost debit) → 402
/// - recognition failure (network or unparseable model output) → 502
/// - persistence failure (records not written, draft retained) → 500
/// - auth failures (bad credentials, unconfirmed account) → 401

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Payment required (402) - balance does not cover the analysis cost
    InsufficientBalance { balance: i64, cost: i64 },

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Persistence failure (500) - save failed, message shown to the user
    PersistenceFailed(String),

    /// Bad gateway (502) - the vision model call failed or returned an
    /// unparseable response
    RecognitionFailed(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "insufficient_balance")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::InsufficientBalance { balance, cost } => write!(
                f,
                "Insufficient balance: {} available, {} required",
                balance, cost
            ),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::PersistenceFailed(msg) => write!(f, "Persistence failed: {}", msg),
            ApiError::RecognitionFailed(msg) => write!(f, "Recognition failed: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::InsufficientBalance { balance, cost } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_balance",
                format!(
                    "Not enough tokens: each analysis costs {} and your balance is {}. Top up your account to continue.",
                    cost, balance
                ),
                None,
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::PersistenceFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence_failed",
                format!("Failed to save: {}", msg),
                None,
            ),
            ApiError::RecognitionFailed(msg) => (
                StatusCode::BAD_GATEWAY,
                "recognition_failed",
                format!("Recognition failed: {}", msg),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // Check for unique constraint violations
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return ApiError::Conflict("Email already exists".to_string());
                    }
                    return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert password errors to API errors
impl From<stocklens_shared::auth::password::PasswordError> for ApiError {
    fn from(err: stocklens_shared::auth::password::PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<stocklens_shared::auth::jwt::JwtError> for ApiError {
    fn from(err: stocklens_shared::auth::jwt::JwtError) -> Self {
        match err {
            stocklens_shared::auth::jwt::JwtError::Expired => {
                ApiError::Unauthorized("Token expired".to_string())
            }
            stocklens_shared::auth::jwt::JwtError::InvalidIssuer => {
                ApiError::Unauthorized("Invalid token issuer".to_string())
            }
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

/// Convert ledger errors to API errors
impl From<stocklens_shared::ledger::LedgerError> for ApiError {
    fn from(err: stocklens_shared::ledger::LedgerError) -> Self {
        ApiError::InternalError(format!("Ledger error: {}", err))
    }
}

/// Convert workflow errors to API errors
impl From<crate::workflow::WorkflowError> for ApiError {
    fn from(err: crate::workflow::WorkflowError) -> Self {
        use crate::workflow::WorkflowError;

        match err {
            WorkflowError::InsufficientBalance { balance, cost } => {
                ApiError::InsufficientBalance { balance, cost }
            }
            WorkflowError::Recognition(e) => ApiError::RecognitionFailed(e.to_string()),
            WorkflowError::NoActiveReview => {
                ApiError::BadRequest("No results to review".to_string())
            }
            WorkflowError::ItemIndex(index) => {
                ApiError::NotFound(format!("No result item at index {}", index))
            }
            WorkflowError::EmptySelection => {
                ApiError::BadRequest("Select at least one record to export".to_string())
            }
            WorkflowError::Ledger(e) => ApiError::InternalError(format!("Ledger error: {}", e)),
            WorkflowError::Persistence(e) => ApiError::PersistenceFailed(e.to_string()),
            WorkflowError::Export(e) => ApiError::InternalError(format!("Export error: {}", e)),
        }
    }
}
