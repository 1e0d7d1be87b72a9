//! Error types for OpenAI client.

use serde::Deserialize;
use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// Error code OpenAI reports when the prompt exceeds the model's context window.
pub const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";

/// OpenAI client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response, rate limit, invalid request)
    #[error("API error ({status}): {}", .detail.message)]
    Api { status: u16, detail: ApiErrorDetail },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// Build an API error from a non-2xx status and its raw body.
    ///
    /// Bodies that are not the documented `{"error": {...}}` envelope keep the
    /// raw text as the message and get no type or code.
    pub fn from_response(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
            .map(|envelope| envelope.error)
            .unwrap_or_else(|_| ApiErrorDetail {
                message: body.to_string(),
                error_type: None,
                code: None,
                param: None,
            });
        Self::Api { status, detail }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Machine-readable category: the error code if present, else the error type.
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Api { detail, .. } => detail.code.as_deref().or(detail.error_type.as_deref()),
            _ => None,
        }
    }

    /// Whether the request was rejected because the input exceeds the model's context window.
    ///
    /// Embedding endpoints sometimes omit the code and only describe the limit in
    /// the message of an `invalid_request_error`, so both shapes are recognised.
    pub fn is_context_length_exceeded(&self) -> bool {
        match self {
            Self::Api { detail, .. } => {
                detail.code.as_deref() == Some(CONTEXT_LENGTH_EXCEEDED)
                    || (detail.error_type.as_deref() == Some("invalid_request_error")
                        && detail.message.contains("maximum context length"))
            }
            _ => false,
        }
    }
}

/// The `error` object of an OpenAI error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,

    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub param: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}
