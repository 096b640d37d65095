use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or duplicate input.
    #[error("{0}")]
    Validation(String),
    /// Bad credentials, missing token or inactive account.
    #[error("{0}")]
    Authentication(String),
    /// Caller lacks the required role or ownership.
    #[error("{0}")]
    Permission(String),
    #[error("{0}")]
    NotFound(String),
    /// A referenced record (tag, category, product) does not exist.
    #[error("{0}")]
    Reference(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        AppError::Authentication(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        AppError::Permission(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn reference(message: impl Into<String>) -> Self {
        AppError::Reference(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::Permission(_) => "permission_denied",
            AppError::NotFound(_) => "not_found",
            AppError::Reference(_) => "reference_error",
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Reference(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Database(e) => {
                log::error!("Database error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(e) => {
                log::error!("Internal error: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": message,
        }))
    }
}

/// Integrity rule broken by a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// UNIQUE index or primary key.
    Unique,
    ForeignKey,
    Check,
}

/// Classify a write error by the constraint it violated, if any.
///
/// Unique and foreign-key failures come from the driver error codes. SQLite
/// reports primary-key clashes under a separate code, and CHECK failures have no
/// portable code at all, so those two fall back to the exact driver wording.
pub fn constraint_violation(err: &DbErr) -> Option<Violation> {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => return Some(Violation::Unique),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => return Some(Violation::ForeignKey),
        _ => {}
    }

    let text = err.to_string();
    if text.contains("UNIQUE constraint failed") {
        return Some(Violation::Unique);
    }
    let check_failed = text.contains("CHECK constraint failed")
        || (text.contains("Check constraint '") && text.contains("is violated"));
    check_failed.then_some(Violation::Check)
}
