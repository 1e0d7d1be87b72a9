//! Model abstractions: what the invoker calls, and who serves it.
//!
//! A [`Model`] pairs a registry entry with a provider and a local tokenizer.
//! There are two implementations, [`ChatModel`] and [`EmbeddingModel`]; the
//! invoker is generic over them.

pub mod openai;
pub mod registry;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{ModelResult, Result};
use crate::prompts::{format_with_instructions, DIAGNOSIS_PROMPT};
use crate::tokenizer::{BpeTokenizer, Tokenizer};

pub use openai::{OpenAIProvider, DEFAULT_MODEL_TIMEOUT};
pub use registry::{ModelDescriptor, ModelKind, ModelRegistry, CHAT_MODEL_ID, EMBEDDING_MODEL_ID};

/// Chat completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send one user prompt to `model` and return the reply text.
    async fn complete(&self, model: &str, prompt: &str) -> ModelResult<String>;
}

/// Embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` with `model`.
    async fn embed(&self, model: &str, text: &str) -> ModelResult<Vec<f32>>;
}

/// A model the resilient invoker can drive.
#[async_trait]
pub trait Model: Send + Sync {
    type Output: Send;

    fn descriptor(&self) -> &ModelDescriptor;

    fn tokenizer(&self) -> &dyn Tokenizer;

    /// Turn site text into the model's input.
    fn payload(&self, text: &str) -> String;

    async fn invoke(&self, payload: &str) -> ModelResult<Self::Output>;
}

/// Chat model that wraps site text in an instruction prompt.
pub struct ChatModel {
    descriptor: ModelDescriptor,
    provider: Arc<dyn ChatProvider>,
    tokenizer: Arc<dyn Tokenizer>,
    instructions: String,
}

impl ChatModel {
    /// Build from a chat descriptor, loading its BPE tokenizer.
    pub fn new(descriptor: ModelDescriptor, provider: Arc<dyn ChatProvider>) -> Result<Self> {
        descriptor.expect_kind(ModelKind::Chat)?;
        let tokenizer = Arc::new(BpeTokenizer::for_model(descriptor.id)?);
        Ok(Self {
            descriptor,
            provider,
            tokenizer,
            instructions: DIAGNOSIS_PROMPT.to_string(),
        })
    }

    /// Build from a registry id.
    pub fn from_registry(id: &str, provider: Arc<dyn ChatProvider>) -> Result<Self> {
        Self::new(*ModelRegistry::get_kind(id, ModelKind::Chat)?, provider)
    }

    /// Replace the tokenizer.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Replace the instruction template. `{site_text}` marks where the text goes.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }
}

#[async_trait]
impl Model for ChatModel {
    type Output = String;

    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    fn payload(&self, text: &str) -> String {
        format_with_instructions(&self.instructions, text)
    }

    async fn invoke(&self, payload: &str) -> ModelResult<String> {
        self.provider.complete(self.descriptor.id, payload).await
    }
}

/// Embedding model; the site text is sent verbatim.
pub struct EmbeddingModel {
    descriptor: ModelDescriptor,
    provider: Arc<dyn EmbeddingProvider>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl EmbeddingModel {
    /// Build from an embedding descriptor, loading its BPE tokenizer.
    pub fn new(descriptor: ModelDescriptor, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        descriptor.expect_kind(ModelKind::Embedding)?;
        let tokenizer = Arc::new(BpeTokenizer::for_model(descriptor.id)?);
        Ok(Self {
            descriptor,
            provider,
            tokenizer,
        })
    }

    /// Build from a registry id.
    pub fn from_registry(id: &str, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Self::new(*ModelRegistry::get_kind(id, ModelKind::Embedding)?, provider)
    }

    /// Replace the tokenizer.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }
}

#[async_trait]
impl Model for EmbeddingModel {
    type Output = Vec<f32>;

    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    fn payload(&self, text: &str) -> String {
        text.to_string()
    }

    async fn invoke(&self, payload: &str) -> ModelResult<Vec<f32>> {
        self.provider.embed(self.descriptor.id, payload).await
    }
}
