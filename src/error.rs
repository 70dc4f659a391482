use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::ollama::DownstreamError;

/// Everything the HTTP surface can fail with. Rendered as `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid API Key")]
    Unauthorized,

    #[error("{message}")]
    InvalidRequest { status: StatusCode, message: String },

    #[error("Ollama error: {body}")]
    OllamaStatus { status: StatusCode, body: String },

    #[error("Failed to reach Ollama server: {0}")]
    OllamaUnreachable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidRequest { status, .. } => *status,
            GatewayError::OllamaStatus { status, .. } => *status,
            GatewayError::OllamaUnreachable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DownstreamError> for GatewayError {
    fn from(err: DownstreamError) -> Self {
        match err {
            DownstreamError::Status { status, body } => GatewayError::OllamaStatus { status, body },
            other => GatewayError::OllamaUnreachable(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_keeps_upstream_code_and_text() {
        let err: GatewayError = DownstreamError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Ollama error: boom");
    }

    #[test]
    fn transport_and_body_errors_are_bad_gateway() {
        let err: GatewayError = DownstreamError::Transport("connection refused".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Failed to reach Ollama server: connection refused");

        let err: GatewayError = DownstreamError::InvalidBody("expected value".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().starts_with("Failed to reach Ollama server: "));
    }

    #[test]
    fn internal_error_is_500() {
        let err = GatewayError::Internal("cache key".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal error: cache key");
    }

    #[test]
    fn unauthorized_detail() {
        let err = GatewayError::Unauthorized;
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid API Key");
    }
}
