//! Request-surface error kinds and their envelope mapping. Handlers return
//! these instead of throwing; the envelope code mirrors the HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    NotFound(String),
    RateLimited { retry_after_seconds: u32 },
    DuplicateCommand,
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> i32 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::RateLimited { .. } | ApiError::DuplicateCommand => 429,
            ApiError::Unavailable(_) => 503,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::InvalidRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::RateLimited {
                retry_after_seconds,
            } => {
                format!("too many requests, please retry after {retry_after_seconds} seconds")
            }
            ApiError::DuplicateCommand => "move already submitted this round".to_string(),
        }
    }

    fn retry_after_seconds(&self) -> Option<u32> {
        match self {
            ApiError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            ApiError::DuplicateCommand => Some(0),
            _ => None,
        }
    }

    pub fn internal(error: impl std::fmt::Display) -> Self {
        tracing::error!(%error, "internal error");
        ApiError::Internal("internal server error".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = StatusCode::from_u16(code as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let data = self
            .retry_after_seconds()
            .map(|seconds| json!({ "retry_after_seconds": seconds }));
        let body = json!({
            "code": code,
            "msg": self.message(),
            "data": data,
        });
        (status, Json(body)).into_response()
    }
}
