//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the diagnosis pipeline without making real
//! HTTP or model calls. Every mock records the calls it receives.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::error::{ModelError, ModelResult};
use crate::fetch::{FetchOutcome, PageFetcher};
use crate::models::{ChatProvider, EmbeddingProvider};
use crate::tokenizer::Tokenizer;

/// A mock fetcher serving canned pages.
///
/// URLs without a registered response answer with HTTP 404.
#[derive(Default)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, FetchOutcome>>>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with HTTP 200.
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.respond(url, FetchOutcome::Ok { body: body.into() })
    }

    /// Answer with a non-200 status.
    pub fn with_status(self, url: impl Into<String>, code: u16) -> Self {
        self.respond(url, FetchOutcome::Status { code })
    }

    /// Fail at the transport level.
    pub fn with_network_error(self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.respond(
            url,
            FetchOutcome::Network {
                message: message.into(),
            },
        )
    }

    fn respond(self, url: impl Into<String>, outcome: FetchOutcome) -> Self {
        self.responses.write().unwrap().insert(url.into(), outcome);
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn get(&self, url: &str) -> FetchOutcome {
        self.requests.write().unwrap().push(url.to_string());
        self.responses
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(FetchOutcome::Status { code: 404 })
    }
}

/// Record of a call made to a [`ScriptedChatProvider`].
#[derive(Debug, Clone)]
pub struct ChatCall {
    pub model: String,
    pub prompt: String,
    pub input_chars: usize,
}

#[derive(Debug, Clone)]
enum Step {
    Respond(String),
    Fail(ModelError),
}

/// A chat provider that replays a script of replies and errors.
///
/// Each call consumes one step. Once the script runs out, the fallback reply
/// (if any) is returned, otherwise a provider error.
#[derive(Default)]
pub struct ScriptedChatProvider {
    script: Arc<RwLock<VecDeque<Step>>>,
    fallback: Option<String>,
    max_input_chars: Option<usize>,
    calls: Arc<RwLock<Vec<ChatCall>>>,
}

impl ScriptedChatProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply.
    pub fn respond(self, reply: impl Into<String>) -> Self {
        self.push(Step::Respond(reply.into()))
    }

    /// Queue an error.
    pub fn fail(self, error: ModelError) -> Self {
        self.push(Step::Fail(error))
    }

    /// Queue a context-length rejection.
    pub fn too_large(self) -> Self {
        self.push(Step::Fail(ModelError::InputTooLarge {
            model: "scripted".into(),
            message: "maximum context length exceeded".into(),
        }))
    }

    /// Reply used once the script is exhausted.
    pub fn respond_always(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Reject prompts longer than `max` characters without consuming the script.
    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = Some(max);
        self
    }

    fn push(self, step: Step) -> Self {
        self.script.write().unwrap().push_back(step);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedChatProvider {
    async fn complete(&self, model: &str, prompt: &str) -> ModelResult<String> {
        let input_chars = prompt.chars().count();
        self.calls.write().unwrap().push(ChatCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
            input_chars,
        });

        if let Some(max) = self.max_input_chars {
            if input_chars > max {
                return Err(too_large(model, input_chars, max));
            }
        }

        match self.script.write().unwrap().pop_front() {
            Some(Step::Respond(reply)) => Ok(reply),
            Some(Step::Fail(error)) => Err(error),
            None => self.fallback.clone().ok_or_else(|| ModelError::Provider {
                model: model.to_string(),
                status: None,
                category: "script_exhausted".into(),
                message: "no scripted reply left".into(),
            }),
        }
    }
}

/// Record of a call made to a [`ScriptedEmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct EmbedCall {
    pub model: String,
    pub input_chars: usize,
}

/// An embedding provider returning deterministic vectors.
///
/// Vectors are seeded from a SHA-256 of the input unless a registered marker
/// substring matches, in which case the registered vector is returned.
#[derive(Default)]
pub struct ScriptedEmbeddingProvider {
    dimension: usize,
    max_input_chars: Option<usize>,
    fixed: Arc<RwLock<Vec<(String, Vec<f32>)>>>,
    calls: Arc<RwLock<Vec<EmbedCall>>>,
}

impl ScriptedEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// Reject inputs longer than `max` characters as too large.
    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = Some(max);
        self
    }

    /// Return `embedding` for any input containing `marker`.
    pub fn with_embedding_for(self, marker: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.fixed.write().unwrap().push((marker.into(), embedding));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<EmbedCall> {
        self.calls.read().unwrap().clone()
    }

    /// Generate a deterministic embedding based on text.
    fn generate_deterministic_embedding(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = hasher.finalize();

        (0..self.dimension)
            .map(|i| (hash[i % 32] as f32 / 127.5) - 1.0)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbeddingProvider {
    async fn embed(&self, model: &str, text: &str) -> ModelResult<Vec<f32>> {
        let input_chars = text.chars().count();
        self.calls.write().unwrap().push(EmbedCall {
            model: model.to_string(),
            input_chars,
        });

        if let Some(max) = self.max_input_chars {
            if input_chars > max {
                return Err(too_large(model, input_chars, max));
            }
        }

        let fixed = self
            .fixed
            .read()
            .unwrap()
            .iter()
            .find(|(marker, _)| text.contains(marker.as_str()))
            .map(|(_, embedding)| embedding.clone());

        Ok(fixed.unwrap_or_else(|| self.generate_deterministic_embedding(text)))
    }
}

fn too_large(model: &str, chars: usize, max: usize) -> ModelError {
    ModelError::InputTooLarge {
        model: model.to_string(),
        message: format!("{} characters exceeds limit of {}", chars, max),
    }
}

/// Counts one token per `chars_per_token` characters, rounding up.
pub struct CharTokenizer {
    chars_per_token: usize,
}

impl CharTokenizer {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Tokenizer for CharTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}
