//! HTTP error responses.
//!
//! Library reports are mapped to a status code by their current context;
//! the body is always `{ "success": false, "error": "<message>" }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use flowbridge_engine::GatewayError;
use flowbridge_execution::ExecuteError;
use rootcause::prelude::Report;
use serde_json::json;

/// An error ready to be sent to the caller.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Report<ExecuteError>> for ApiError {
    fn from(report: Report<ExecuteError>) -> Self {
        let error = report.current_context();
        let status = match error {
            ExecuteError::NotFound { .. } => StatusCode::NOT_FOUND,
            ExecuteError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ExecuteError::ExecutionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ExecuteError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ExecuteError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ExecuteError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %report, "request failed");
        }
        Self::new(status, error.to_string())
    }
}

impl From<Report<GatewayError>> for ApiError {
    fn from(report: Report<GatewayError>) -> Self {
        let error = report.current_context();
        let status = if error.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            tracing::warn!(error = %report, "automation engine request failed");
            StatusCode::BAD_GATEWAY
        };
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}
