//! Error taxonomy for the gateway, mapped to HTTP status + OpenAI-shaped
//! error bodies at the edge. Mirrors the teacher's `ProviderError` pattern
//! (a flat `thiserror` enum with `#[from]` conversions) generalized from
//! "provider call failed" causes to "request handling failed" causes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("model '{0}' not found")]
    ModelNotFound(String),

    #[error("context window exceeded")]
    ContextExceeded,

    #[error("content policy violation: {0}")]
    ContentPolicy(String),

    #[error("generator unavailable: {0}")]
    GeneratorUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("request body error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// OpenAI-style `type` tag for the error body.
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "invalid_request_error",
            GatewayError::ModelNotFound(_) => "model_not_found",
            GatewayError::ContextExceeded => "context_length_exceeded",
            GatewayError::ContentPolicy(_) => "content_policy_violation",
            GatewayError::GeneratorUnavailable(_) => "foundation_model_error",
            GatewayError::Internal(_) | GatewayError::Json(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::ContextExceeded => StatusCode::BAD_REQUEST,
            GatewayError::ContentPolicy(_) => StatusCode::BAD_REQUEST,
            GatewayError::GeneratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) | GatewayError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `⚠️`-prefixed text used when this error must surface as a
    /// visible content delta instead of an HTTP status (streaming path,
    /// after the first byte has already gone out).
    pub fn as_streaming_notice(&self) -> String {
        match self {
            GatewayError::ContextExceeded => {
                "⚠️ **Context window exceeded**".to_string()
            }
            GatewayError::ContentPolicy(msg) => {
                format!("⚠️ **Content Policy Violation**: {msg}")
            }
            other => format!("⚠️ **Error**: {other}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    code: Option<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail {
                message: self.to_string(),
                kind: self.error_type(),
                code: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_logprobs_cap_message_matches_spec_wording() {
        let err = GatewayError::Validation("top_logprobs must be <= 5. Received 10.".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type(), "invalid_request_error");
        assert_eq!(err.to_string(), "top_logprobs must be <= 5. Received 10.");
    }

    #[test]
    fn model_not_found_maps_to_404() {
        let err = GatewayError::ModelNotFound("ghost-model".to_string());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_type(), "model_not_found");
    }

    #[test]
    fn streaming_notice_uses_specific_prefixes() {
        assert!(GatewayError::ContextExceeded
            .as_streaming_notice()
            .starts_with("⚠️ **Context window exceeded**"));
        assert!(GatewayError::ContentPolicy("nope".into())
            .as_streaming_notice()
            .starts_with("⚠️ **Content Policy Violation**"));
        assert!(GatewayError::Internal("boom".into())
            .as_streaming_notice()
            .starts_with("⚠️ **Error**"));
    }
}
