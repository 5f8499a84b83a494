//! API error taxonomy and its mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use beacon_auth::AuthError;
use beacon_store::StoreError;

use crate::hub::HubError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Field-level validation failures, reported as a field-to-message map.
    #[error("validation failed")]
    Validation(Vec<(&'static str, &'static str)>),

    /// Anything the client cannot fix. The detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Self::Validation(fields) => {
                let map: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(field, msg)| (field.to_string(), json!(msg)))
                    .collect();
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": map }))
            }
            Self::Internal(detail) => {
                error!(detail = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "the server encountered a problem and could not process your request" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => {
                Self::NotFound("the requested resource was not found".into())
            }
            StoreError::Conflict(_) => Self::BadRequest("credentials already taken".into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::TokenExpired => Self::Unauthorized("token expired".into()),
            AuthError::InvalidToken(_) => Self::Unauthorized("invalid token".into()),
            AuthError::InvalidCredentials => Self::Unauthorized("invalid credentials".into()),
            AuthError::Hashing(detail) => Self::Internal(detail),
        }
    }
}

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        Self::Internal(e.to_string())
    }
}
