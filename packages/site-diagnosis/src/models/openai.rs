//! OpenAI implementation of the provider traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use site_diagnosis::models::{ChatModel, OpenAIProvider, CHAT_MODEL_ID};
//!
//! let provider = Arc::new(OpenAIProvider::from_env()?);
//! let chat = ChatModel::from_registry(CHAT_MODEL_ID, provider.clone())?;
//! ```

use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient, OpenAIError};
use std::time::Duration;

use super::{ChatProvider, EmbeddingProvider};
use crate::error::{DiagnosisError, ModelError, ModelResult, Result};

/// Default per-request timeout for model calls.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat and embedding provider backed by [`OpenAIClient`].
#[derive(Clone)]
pub struct OpenAIProvider {
    client: OpenAIClient,
    temperature: Option<f32>,
}

impl OpenAIProvider {
    pub fn new(client: OpenAIClient) -> Self {
        Self {
            client,
            temperature: None,
        }
    }

    /// Create from `OPENAI_API_KEY` (and optional `OPENAI_BASE_URL`) with the
    /// default request timeout.
    pub fn from_env() -> Result<Self> {
        let client = OpenAIClient::from_env()
            .and_then(|client| client.with_timeout(DEFAULT_MODEL_TIMEOUT))
            .map_err(|e| DiagnosisError::Config(e.to_string()))?;
        Ok(Self::new(client))
    }

    /// Sampling temperature for chat completions (provider default when unset).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn client(&self) -> &OpenAIClient {
        &self.client
    }
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    async fn complete(&self, model: &str, prompt: &str) -> ModelResult<String> {
        let mut request = ChatRequest::new(model).message(Message::user(prompt));
        if let Some(temperature) = self.temperature {
            request = request.temperature(temperature);
        }

        self.client
            .chat_completion(request)
            .await
            .map(|response| response.content)
            .map_err(|e| classify(model, e))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, model: &str, text: &str) -> ModelResult<Vec<f32>> {
        self.client
            .create_embedding(text, model)
            .await
            .map_err(|e| classify(model, e))
    }
}

/// Map a client error onto the two-way model error taxonomy.
fn classify(model: &str, error: OpenAIError) -> ModelError {
    if error.is_context_length_exceeded() {
        return ModelError::InputTooLarge {
            model: model.to_string(),
            message: error.to_string(),
        };
    }

    let category = match &error {
        OpenAIError::Api { .. } => error.category().unwrap_or("api").to_string(),
        OpenAIError::Network(_) => "network".to_string(),
        OpenAIError::Parse(_) => "parse".to_string(),
        OpenAIError::Config(_) => "config".to_string(),
    };

    ModelError::Provider {
        model: model.to_string(),
        status: error.status(),
        category,
        message: error.to_string(),
    }
}
