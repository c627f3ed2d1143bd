use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::api::types::ErrorResponse;
use crate::error::ConvoyError;

/// Error returned by HTTP handlers, rendered as `{"error": ..., "kind": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthorized",
            message: message.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        ConvoyError::invalid(format!("{field} is required")).into()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ConvoyError> for ApiError {
    fn from(err: ConvoyError) -> Self {
        let status = match &err {
            ConvoyError::InvalidArgument(_) | ConvoyError::Json(_) => StatusCode::BAD_REQUEST,
            ConvoyError::NotFound(_) => StatusCode::NOT_FOUND,
            ConvoyError::InvalidState(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, kind = err.kind(), "request failed");
        }
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}
