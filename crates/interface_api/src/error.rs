//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain_ledger::EngineError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    /// Points still spendable, present on insufficient_points errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut available = None;

        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::InsufficientPoints { available: have, .. } => {
                available = Some(*have);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "insufficient_points",
                    self.to_string(),
                )
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone()),
            ApiError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone()),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
            available,
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            EngineError::Rule(inner) => ApiError::Validation(inner.to_string()),
            EngineError::RuleOverlap { existing } => ApiError::Conflict(match existing {
                Some(id) => format!("Rule validity overlaps existing rule {id}"),
                None => "Rule validity overlaps an existing rule".to_string(),
            }),
            EngineError::Insufficient(inner) => ApiError::InsufficientPoints {
                requested: inner.requested.value(),
                available: inner.available.value(),
            },
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity} not found: {id}"))
            }
            EngineError::Duplicate { entity, detail } => {
                ApiError::Conflict(format!("Duplicate {entity}: {detail}"))
            }
            EngineError::RetryExhausted { attempts } => ApiError::Conflict(format!(
                "Operation conflicted with concurrent requests after {attempts} attempts"
            )),
            EngineError::Points(inner) => ApiError::Internal(inner.to_string()),
            EngineError::Store(inner) => ApiError::Database(inner.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}
