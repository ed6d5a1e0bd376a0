//! Unified application error model.
//! Every rejection carries a namespaced code string (e.g. `membership_user_create_118`)
//! so clients can assert on it without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// A single invalid field. Validation is fail-fast so there is never more than one.
    #[error("{code}: invalid value for '{field}'")]
    Validation { code: String, field: String },
    /// Authorization predicate denied the request.
    #[error("{code}: permission denied")]
    Forbidden { code: String },
    #[error("{code}: not found")]
    NotFound { code: String },
    /// Credential or token failure.
    #[error("{code}: {message}")]
    Auth { code: String, message: String },
    /// A prerequisite external collaborator failed; the caller may retry.
    #[error("{code}: {message}")]
    Unavailable { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Forbidden { code }
            | AppError::NotFound { code }
            | AppError::Auth { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::Validation { field, .. } => format!("invalid value for '{}'", field),
            AppError::Forbidden { .. } => "permission denied".to_string(),
            AppError::NotFound { .. } => "not found".to_string(),
            AppError::Auth { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.clone(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, field: S) -> Self { AppError::Validation { code: code.into(), field: field.into() } }
    pub fn forbidden<S: Into<String>>(code: S) -> Self { AppError::Forbidden { code: code.into() } }
    pub fn not_found<S: Into<String>>(code: S) -> Self { AppError::NotFound { code: code.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Auth { .. } => 401,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// Field name for validation errors, used by the HTTP body.
    pub fn field(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "membership_internal_error".into(), message: err.to_string() }
    }
}
