//! `ApiError`: the single error type every HTTP handler returns (spec §4.G
//! "Validation", §7 "Error taxonomy"). Wraps `StoreError` plus the two kinds
//! a route itself can raise — bad input and insufficient permission.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::errors::StoreError;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    Store(StoreError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(m) | Self::Unauthorized(m) | Self::Forbidden(m) => write!(f, "{m}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Store(StoreError::Busy) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(StoreError::Integrity(_)) | Self::Store(StoreError::Fatal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        tracing::warn!(status = %status, error = %message, "request failed");
        (status, Json(ErrorBody { error: &message })).into_response()
    }
}
