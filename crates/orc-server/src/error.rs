//! HTTP error taxonomy. Every handler returns `Result<_, ApiError>` and
//! lets [`IntoResponse`] pick the status code, matching §7's error
//! table: 400 validation, 401/429 authorization/quota, 404 missing,
//! 503 a dependency isn't configured, 500 everything else.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited { retry_after_ms: u64 },
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn from_task_store(e: orc_task_store::TaskStoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "not_found"}))).into_response()
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": msg}))).into_response()
            }
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"error": "unauthorized"}))).into_response()
            }
            ApiError::RateLimited { retry_after_ms } => {
                let mut resp = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(serde_json::json!({"error": "rate_limited", "retry_after_ms": retry_after_ms})),
                )
                    .into_response();
                let retry_secs = (retry_after_ms / 1000).max(1).to_string();
                if let Ok(value) = header::HeaderValue::from_str(&retry_secs) {
                    resp.headers_mut().insert(header::RETRY_AFTER, value);
                }
                resp
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"error": msg}))).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": "internal_error"})))
                    .into_response()
            }
        }
    }
}
