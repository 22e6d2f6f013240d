//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use taskscope_core::Error;
use taskscope_upstream::SecurityError;
use tracing::error;

/// Errors surfaced by the HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed request (bad path segment, empty prompt)
    #[error("{0}")]
    InvalidRequest(String),

    /// Failure inside the classification or image pipeline
    #[error(transparent)]
    Pipeline(#[from] Error),
}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Pipeline(err) => err.kind(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match &self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(err) => {
                error!("Request failed ({}): {}", kind, err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        metrics::counter!("taskscope_errors_total", "kind" => kind).increment(1);

        let body = json!({
            "error": kind,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let invalid: AppError = SecurityError::InvalidSegment("..".into()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let upstream: AppError = Error::upstream("acme/upscaler", 404).into();
        assert_eq!(upstream.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let parse: AppError = Error::LlmParse("expected value".into()).into();
        assert_eq!(parse.kind(), "llm_parse");
    }
}
