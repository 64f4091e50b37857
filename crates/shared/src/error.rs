use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::{FieldError, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    PreconditionFailed,
    Internal,
}

/// Wire error shared by the service, the HTTP layer and the clients.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Generic failure for anything the caller cannot act on.
    pub fn internal() -> Self {
        Self::new(
            ErrorCode::Internal,
            "Error interno. Intente nuevamente más tarde.",
        )
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(value: ValidationErrors) -> Self {
        Self {
            code: ErrorCode::Validation,
            message: value.to_string(),
            fields: value.into_inner(),
        }
    }
}
