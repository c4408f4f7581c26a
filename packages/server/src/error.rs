//! Application-level error type returned by handlers.
//!
//! All variants serialise to the [`ErrorResponse`] JSON format and map to the
//! appropriate HTTP status code.

use axum::{
    extract::rejection::{BytesRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coupon_api::ErrorResponse;
use coupon_core::{InvalidArgs, ValidationError, ValidationErrors};

use crate::storage::StorageError;

/// An error that a handler can return; converts directly to an HTTP response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// Per-field schema failures, rendered as a field → messages map.
    Validation(ValidationErrors),
    NotFound(String),
    MethodNotAllowed(String),
    UnsupportedMediaType(String),
    Internal(String),
}

/// Response extension carrying the error text, read by
/// [`crate::middleware::error_log`].
#[derive(Debug, Clone)]
pub struct ErrorContext(pub String);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::MethodNotAllowed(msg)
            | AppError::UnsupportedMediaType(msg)
            | AppError::Internal(msg) => f.write_str(msg),
            AppError::Validation(errors) => write!(f, "{errors}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let context = ErrorContext(self.to_string());
        let body = match self {
            AppError::Validation(errors) => ErrorResponse::fields(errors.into_fields()),
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::MethodNotAllowed(msg)
            | AppError::UnsupportedMediaType(msg)
            | AppError::Internal(msg) => ErrorResponse::new(msg),
        };
        let mut resp = (status, Json(body)).into_response();
        resp.extensions_mut().insert(context);
        resp
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::InvalidId(_) => AppError::BadRequest(e.to_string()),
            ValidationError::UnsupportedMediaType(_) => AppError::UnsupportedMediaType(e.to_string()),
        }
    }
}

impl From<InvalidArgs> for AppError {
    fn from(e: InvalidArgs) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self {
        AppError::Validation(e)
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::BadRequest(format!("invalid query string: {}", e.body_text()))
    }
}

/// Covers bodies over the size limit as well as transport failures.
impl From<BytesRejection> for AppError {
    fn from(e: BytesRejection) -> Self {
        AppError::BadRequest(format!("invalid request body: {}", e.body_text()))
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => AppError::NotFound("not found".into()),
            StorageError::Constraint(_) | StorageError::Internal(_) => {
                AppError::Internal(e.to_string())
            }
        }
    }
}
