//! Error types for the API.
//!
//! ```text
//! ValidationError ─┐
//! CoreError ───────┼──► ServiceError ──► (StatusCode, ApiError { code, message })
//! DbError ─────────┤
//! LedgerError ─────┘
//! ```
//!
//! | ServiceError        | Status | code                 |
//! |---------------------|--------|----------------------|
//! | Validation          | 400    | `VALIDATION`         |
//! | InvalidReference    | 400    | `INVALID_REFERENCE`  |
//! | InsufficientStock   | 400    | `INSUFFICIENT_STOCK` |
//! | InvalidTransition   | 400    | `INVALID_TRANSITION` |
//! | Unauthenticated     | 401    | `UNAUTHENTICATED`    |
//! | Forbidden           | 403    | `FORBIDDEN`          |
//! | NotFound            | 404    | `NOT_FOUND`          |
//! | Conflict            | 409    | `CONFLICT`           |
//! | Unexpected          | 500    | `UNEXPECTED`         |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gon_core::{CoreError, ValidationError};
use gon_db::{DbError, LedgerError};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Workflow outcome taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    /// A referenced entity is missing or belongs to another company.
    #[error("{0}")]
    InvalidReference(String),

    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Lock contention outlasted every retry.
    #[error("{0}")]
    Conflict(String),

    /// Cause is logged, never sent to the client.
    #[error("{0}")]
    Unexpected(String),
}

impl ServiceError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        ServiceError::NotFound(format!("{} not found: {}", entity, id))
    }

    pub fn invalid_reference(message: impl Into<String>) -> Self {
        ServiceError::InvalidReference(message.into())
    }

    /// Only lock contention is worth a fresh transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_)
            | ServiceError::InvalidReference(_)
            | ServiceError::InsufficientStock { .. }
            | ServiceError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Validation(_) => ErrorCode::Validation,
            ServiceError::InvalidReference(_) => ErrorCode::InvalidReference,
            ServiceError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            ServiceError::InvalidTransition(_) => ErrorCode::InvalidTransition,
            ServiceError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            ServiceError::Forbidden(_) => ErrorCode::Forbidden,
            ServiceError::NotFound(_) => ErrorCode::NotFound,
            ServiceError::Conflict(_) => ErrorCode::Conflict,
            ServiceError::Unexpected(_) => ErrorCode::Unexpected,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => ServiceError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            CoreError::InvalidQuantity(_) => ServiceError::Validation(err.to_string()),
            CoreError::StockNotFound { .. } => ServiceError::InvalidReference(err.to_string()),
            CoreError::StockItemNotFound(_) => ServiceError::NotFound(err.to_string()),
            CoreError::InvalidTransition { .. } => ServiceError::InvalidTransition(err.to_string()),
            CoreError::Forbidden(reason) => ServiceError::Forbidden(reason),
            CoreError::Validation(inner) => ServiceError::Validation(inner.to_string()),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            DbError::Busy(_) => ServiceError::Conflict(
                "The resource is being modified concurrently, try again".to_string(),
            ),
            DbError::UniqueViolation { .. } | DbError::CheckViolation { .. } => {
                ServiceError::Validation(err.to_string())
            }
            DbError::ForeignKeyViolation { .. } => ServiceError::InvalidReference(err.to_string()),
            other => ServiceError::Unexpected(other.to_string()),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(core) => core.into(),
            LedgerError::Db(db) => db.into(),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

// =============================================================================
// HTTP Response
// =============================================================================

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    InvalidReference,
    InsufficientStock,
    InvalidTransition,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Unexpected,
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            ServiceError::Unexpected(cause) => {
                error!(error = %cause, "Request failed unexpectedly");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ApiError { code, message })).into_response()
    }
}
