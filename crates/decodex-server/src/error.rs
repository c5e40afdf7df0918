//! Error types for the Decodex server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use decodex_core::CoreError;
use serde_json::json;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Core engine error: {0}")]
    Core(CoreError),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type, suggestion) = match &self {
            // Client mistakes carry nothing but the message
            ServerError::InvalidRequest(msg) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response();
            }
            ServerError::Timeout(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "timeout",
                "Try a shorter max_length or retry when the server is less busy",
            ),
            ServerError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                "Contact system administrator - server configuration issue",
            ),
            ServerError::Core(core_err) => Self::map_core_error(core_err),
            ServerError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                "Check file system permissions",
            ),
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_server_error",
                "Contact support if this error persists",
            ),
        };

        let mut body = json!({
            "error": self.to_string(),
            "type": error_type,
            "suggestion": suggestion,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let ServerError::Core(core_err) = &self {
            body["code"] = json!(core_err.code());
        }

        (status, Json(body)).into_response()
    }
}

impl ServerError {
    /// Map core errors to HTTP statuses by error code prefix
    fn map_core_error(core_err: &CoreError) -> (StatusCode, &'static str, &'static str) {
        match core_err.code() {
            code if code.starts_with("INVALID_") || code.starts_with("MAX_LENGTH_") => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Check input parameters and values",
            ),
            code if code.starts_with("TOKENIZER_") || code.starts_with("NGRAM_UNKNOWN_") => (
                StatusCode::BAD_REQUEST,
                "tokenizer_error",
                "Check the prompt text",
            ),
            code if code.starts_with("GENERATION_") || code.starts_with("MODEL_") => (
                StatusCode::BAD_GATEWAY,
                "generation_error",
                "The language model backend failed; check the server logs",
            ),
            code if code.starts_with("CONFIG_") || code.starts_with("NGRAM_CORPUS_") => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                "Contact system administrator - configuration issue",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "core_error",
                "An error occurred in the core engine",
            ),
        }
    }
}

/// Validation failures become plain 400s carrying the bare message
impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput { .. } => ServerError::InvalidRequest(err.message().to_string()),
            _ => ServerError::Core(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_input_is_plain_400() {
        let core = CoreError::invalid_input(
            "INVALID_PROMPT",
            "Prompt is required",
            "Request validation",
            "Provide a prompt",
        );
        let response = ServerError::from(core).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Prompt is required" }));
    }

    #[tokio::test]
    async fn test_rejected_body_is_bare_error() {
        let response =
            ServerError::InvalidRequest("EOF while parsing a string".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "EOF while parsing a string" }));
    }

    #[tokio::test]
    async fn test_timeout_is_503() {
        let response = ServerError::Timeout("comparison exceeded 1s".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("exceeded"));
        assert_eq!(body["type"], "timeout");
    }

    #[tokio::test]
    async fn test_core_errors_map_by_code() {
        let core = CoreError::generation("GENERATION_FAILED", "boom", "ctx", "retry");
        let response = ServerError::from(core).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "GENERATION_FAILED");
        assert!(body["error"].is_string());
    }
}
