//! Typed errors for the site diagnosis library.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Page fetch failures are
//! deliberately absent: they are recorded on the page as a `FetchStatus`.

use thiserror::Error;

/// Errors surfaced by the diagnosis pipeline.
#[derive(Debug, Error)]
pub enum DiagnosisError {
    /// Provider failure that is not recoverable by shrinking the input
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Input was still too large after the maximum number of shrink attempts
    #[error("content for {model} could not be shrunk below its limit after {attempts} attempts (keep fraction {keep_fraction})")]
    ContentUnshrinkable {
        model: String,
        attempts: usize,
        keep_fraction: f64,
    },

    /// Model output never parsed as a diagnosis
    #[error("no well-formed diagnosis after {attempts} attempts: {last_error}")]
    PersistentExtractionFailure { attempts: usize, last_error: String },

    /// Model id is not present in the registry
    #[error("unknown model: {id}")]
    UnknownModel { id: String },

    /// Registry entry used with the wrong model implementation
    #[error("model {id} is not a {expected} model")]
    ModelKindMismatch { id: String, expected: &'static str },

    /// Tokenizer could not be loaded
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Similarity store operation failed
    #[error("similarity store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Errors returned by a model invocation.
///
/// Providers classify their own failures; the invoker only ever recovers from
/// [`ModelError::InputTooLarge`].
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The provider rejected the input as exceeding the model's context window
    #[error("input too large for {model}: {message}")]
    InputTooLarge { model: String, message: String },

    /// Any other provider failure (auth, rate limit, outage, malformed response)
    #[error("{model} failed (status {status:?}, {category}): {message}")]
    Provider {
        model: String,
        status: Option<u16>,
        category: String,
        message: String,
    },
}

impl ModelError {
    /// Whether this error means "retry with less text".
    pub fn is_input_too_large(&self) -> bool {
        matches!(self, Self::InputTooLarge { .. })
    }
}

/// Result type alias for diagnosis operations.
pub type Result<T> = std::result::Result<T, DiagnosisError>;

/// Result type alias for a single model call.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
