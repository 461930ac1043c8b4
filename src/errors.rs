use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::UserId;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// A transaction with this id is already durably recorded. Raised by the
    /// store when the uniqueness constraint fires; the engine absorbs it into
    /// the idempotent outcome, so it only reaches a client if the store is
    /// used directly.
    #[error("transaction {0} already recorded")]
    DuplicateTransaction(Uuid),

    #[error("storage error in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
}

impl LedgerError {
    pub fn storage(operation: &'static str, err: impl std::fmt::Display) -> Self {
        LedgerError::Storage {
            operation,
            message: err.to_string(),
        }
    }

    fn error_type(&self) -> &str {
        match self {
            LedgerError::InvalidArgument(_) => "validation_error",
            LedgerError::UserNotFound(_) => "not_found",
            LedgerError::DuplicateTransaction(_) => "duplicate_error",
            LedgerError::Storage { .. } => "database_error",
        }
    }
}

impl ResponseError for LedgerError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        // Storage failures carry operation detail that belongs in the logs,
        // not in the response body.
        let message = match self {
            LedgerError::Storage { .. } => "internal server error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            LedgerError::UserNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::DuplicateTransaction(_) => StatusCode::CONFLICT,
            LedgerError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
