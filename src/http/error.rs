//! Handler error type.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::upstream::UpstreamError;

/// Application-level error that converts into a plain-text HTTP response.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        if err.is_rejection() {
            tracing::warn!(kind = err.kind(), error = %err, "Upstream refused the operation");
        } else {
            tracing::error!(kind = err.kind(), error = %err, "Upstream call failed");
        }
        Self::internal(err.to_string())
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        tracing::error!(error = %err, "Template rendering failed");
        Self::internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            format!("{}\n", self.message),
        )
            .into_response()
    }
}
