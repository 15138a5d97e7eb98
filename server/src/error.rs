//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fxquery_fx::FxError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Fx(#[from] FxError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Route not found. Please check the API documentation for valid endpoints")]
    NotFound,
}

impl ApiError {
    /// Status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Fx(e) if e.is_caller_error() => StatusCode::BAD_REQUEST,
            ApiError::Fx(FxError::FetchFailed(_))
            | ApiError::Fx(FxError::UpstreamStatus { .. })
            | ApiError::Fx(FxError::MalformedSnapshot(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Fx(FxError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Fx(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Fx(e) => e.error_code(),
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound => "NOT_FOUND",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = Json(ErrorBody {
            code: self.code(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
