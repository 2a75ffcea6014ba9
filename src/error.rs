// Boundary error envelope for the HTTP API; internal components return
// anyhow::Result and are converted into a CoreError at the component edge.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Language-neutral error kinds from the ingestion-and-retrieval core's
/// error handling design: each maps to a stable `code` string and an HTTP
/// status code.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("relay policy denied: {0}")]
    PolicyDenied(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("degraded: {0}")]
    Degraded(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Transient(_) => "transient_error",
            CoreError::PolicyDenied(_) => "policy_denied",
            CoreError::ResourceExhausted(_) => "resource_exhausted",
            CoreError::Degraded(_) => "degraded",
            CoreError::Fatal(_) => "fatal_error",
            CoreError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::PolicyDenied(_) => StatusCode::FORBIDDEN,
            CoreError::ResourceExhausted(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Degraded(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: String,
    code: String,
    details: Option<serde_json::Value>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorEnvelope {
            error: self.to_string(),
            code: self.code().to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_handling_design() {
        assert_eq!(CoreError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(CoreError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(CoreError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            CoreError::ResourceExhausted("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(CoreError::Fatal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(CoreError::Conflict("x".into()).code(), "conflict");
        assert_eq!(CoreError::Degraded("x".into()).code(), "degraded");
    }
}
