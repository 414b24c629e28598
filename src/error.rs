//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Problems found while registering resources. Raised at startup only.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("resource '{resource}': {message}")]
    InvalidResource { resource: String, message: String },
    #[error("resource '{resource}' field '{field}': {message}")]
    InvalidField {
        resource: String,
        field: String,
        message: String,
    },
    #[error("duplicate resource: {0}")]
    DuplicateResource(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("schema render: {0}")]
    Schema(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },
    #[error("unknown filter field: {0}")]
    UnknownFilterField(String),
    #[error("invalid filter value for {field}: {message}")]
    FilterTypeError { field: String, message: String },
    #[error("unknown sort field: {0}")]
    UnknownSortField(String),
    #[error("invalid cursor")]
    InvalidCursor,
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("integrity error: {0}")]
    IntegrityError(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("too many requests")]
    TooManyRequests,
    #[error("{message}")]
    Hook { status: StatusCode, message: String },
    #[error("backend: {0}")]
    Backend(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Backend(_) | AppError::Db(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            AppError::Validation { .. }
            | AppError::UnknownFilterField(_)
            | AppError::FilterTypeError { .. }
            | AppError::UnknownSortField(_)
            | AppError::InvalidCursor
            | AppError::InvalidPagination(_)
            | AppError::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::IntegrityError(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::Hook { status, .. } => *status,
        }
    }

    /// Stable machine-readable kind used in the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "ConfigError",
            AppError::Validation { .. } => "ValidationError",
            AppError::UnknownFilterField(_) => "UnknownFilterField",
            AppError::FilterTypeError { .. } => "FilterTypeError",
            AppError::UnknownSortField(_) => "UnknownSortField",
            AppError::InvalidCursor => "InvalidCursor",
            AppError::InvalidPagination(_) => "InvalidPagination",
            AppError::NotFound(_) => "NotFound",
            AppError::MethodNotAllowed(_) => "MethodNotAllowed",
            AppError::IntegrityError(_) => "IntegrityError",
            AppError::UnsupportedOperation(_) => "UnsupportedOperation",
            AppError::TooManyRequests => "TooManyRequests",
            AppError::Hook { .. } => "HookError",
            AppError::Backend(_) | AppError::Db(_) | AppError::Json(_) => "InternalError",
        }
    }

    fn field_name(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } => field.as_deref(),
            AppError::UnknownFilterField(f) | AppError::UnknownSortField(f) => Some(f),
            AppError::FilterTypeError { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        let status = err.status();
        let message = if status.is_server_error() {
            // Internal details stay in the logs.
            "internal server error".to_string()
        } else {
            err.to_string()
        };
        ErrorBody {
            error: err.kind().to_string(),
            message,
            field: err.field_name().map(str::to_string),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_hide_details() {
        let err = AppError::Backend("connection refused to 10.0.0.3".into());
        let body = ErrorBody::from(&err);
        assert_eq!(body.error, "InternalError");
        assert_eq!(body.message, "internal server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn json_failures_are_internal() {
        let err = AppError::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorBody::from(&err).error, "InternalError");
    }

    #[test]
    fn client_errors_carry_field() {
        let err = AppError::FilterTypeError {
            field: "age".into(),
            message: "expected integer".into(),
        };
        let body = ErrorBody::from(&err);
        assert_eq!(body.error, "FilterTypeError");
        assert_eq!(body.field.as_deref(), Some("age"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn taxonomy_status_codes() {
        assert_eq!(AppError::NotFound("1".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::MethodNotAllowed("delete".into()).status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(AppError::IntegrityError("dup".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::UnsupportedOperation("search".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCursor.status(), StatusCode::BAD_REQUEST);
    }
}
