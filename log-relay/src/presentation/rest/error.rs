use crate::presentation::rest::dto::ErrorResponse;
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status: StatusCode,
    /// Seconds, sent as `Retry-After`
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        ApiError {
            message: format!("Too many requests; retry after {}s", retry_after_seconds),
            status: StatusCode::TOO_MANY_REQUESTS,
            retry_after: Some(retry_after_seconds),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse::new(self.message));
        match self.retry_after {
            Some(seconds) => (
                self.status,
                [(header::RETRY_AFTER, seconds.to_string())],
                body,
            )
                .into_response(),
            None => (self.status, body).into_response(),
        }
    }
}
