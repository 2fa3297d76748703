/// Error types for Strand Service
///
/// `ThreadError` is what the deletion engine reports. `AppError` is the
/// service-wide error, converted to an HTTP response for API clients.
use crate::db::StoreError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Result type for strand-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Thread deletion failures
#[derive(Error, Debug)]
pub enum ThreadError {
    /// Target strand absent at call time; nothing was mutated
    #[error("strand {0} not found")]
    NotFound(Uuid),

    /// A read or write failed; earlier mutations are not rolled back
    #[error("storage failure while trying to {context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    /// Caller cancelled; no storage call was issued after the check
    #[error("thread deletion cancelled before {step}")]
    Cancelled { step: &'static str },
}

impl ThreadError {
    pub(crate) fn storage(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| ThreadError::Storage { context, source }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThreadError::NotFound(_) => "not_found",
            ThreadError::Storage { .. } => "storage_error",
            ThreadError::Cancelled { .. } => "cancelled",
        }
    }
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Database operation failed
    DatabaseError(String),

    /// Validation failed
    ValidationError(String),

    /// Resource not found
    NotFound(String),

    /// Caller is not allowed to act on the resource
    Forbidden(String),

    /// Operation cancelled before completion
    Cancelled(String),

    /// Internal server error
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Cancelled(msg) => write!(f, "Cancelled: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        HttpResponse::build(status).json(serde_json::json!({
            "error": error_msg,
            "status": status.as_u16(),
        }))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<ThreadError> for AppError {
    fn from(err: ThreadError) -> Self {
        match &err {
            ThreadError::NotFound(id) => AppError::NotFound(format!("strand {}", id)),
            ThreadError::Cancelled { .. } => AppError::Cancelled(err.to_string()),
            ThreadError::Storage { .. } => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errs
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();

        AppError::ValidationError(messages.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_not_found_maps_to_404() {
        let err: AppError = ThreadError::NotFound(Uuid::nil()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_thread_storage_keeps_context() {
        let err = ThreadError::Storage {
            context: "delete strands",
            source: StoreError::Unavailable("connection reset".into()),
        };
        assert_eq!(
            err.to_string(),
            "storage failure while trying to delete strands: Storage unavailable: connection reset"
        );

        let app: AppError = err.into();
        assert_eq!(app.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_cancelled_maps_to_503() {
        let err: AppError = ThreadError::Cancelled { step: "apply deletion" }.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_maps_to_400() {
        let err = AppError::ValidationError("text too short".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
