//! Static table of supported models and their input budgets.
//!
//! Budgets sit below the providers' advertised context windows to leave room
//! for the prompt wrapper and tokenizer drift.

use serde::Serialize;

use crate::error::{DiagnosisError, Result};

/// Default chat model used for diagnosis.
pub const CHAT_MODEL_ID: &str = "gpt-3.5-turbo";

/// Default embedding model used for similarity search.
pub const EMBEDDING_MODEL_ID: &str = "text-embedding-ada-002";

/// What a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Chat completion: prompt in, text out
    Chat,
    /// Embedding: text in, vector out
    Embedding,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Embedding => "embedding",
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub max_input_tokens: usize,
    pub kind: ModelKind,
}

impl ModelDescriptor {
    pub const fn new(id: &'static str, max_input_tokens: usize, kind: ModelKind) -> Self {
        Self {
            id,
            max_input_tokens,
            kind,
        }
    }

    /// Error unless this descriptor is of `kind`.
    pub(crate) fn expect_kind(&self, kind: ModelKind) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(DiagnosisError::ModelKindMismatch {
                id: self.id.to_string(),
                expected: kind.as_str(),
            })
        }
    }
}

static MODELS: [ModelDescriptor; 4] = [
    ModelDescriptor::new(CHAT_MODEL_ID, 16_000, ModelKind::Chat),
    ModelDescriptor::new("gpt-4o-mini", 120_000, ModelKind::Chat),
    ModelDescriptor::new(EMBEDDING_MODEL_ID, 8_000, ModelKind::Embedding),
    ModelDescriptor::new("text-embedding-3-small", 8_000, ModelKind::Embedding),
];

/// Read-only, process-wide model table.
pub struct ModelRegistry;

impl ModelRegistry {
    /// All registered models.
    pub fn all() -> &'static [ModelDescriptor] {
        &MODELS
    }

    /// Look up a model by id.
    pub fn get(id: &str) -> Result<&'static ModelDescriptor> {
        MODELS
            .iter()
            .find(|model| model.id == id)
            .ok_or_else(|| DiagnosisError::UnknownModel { id: id.to_string() })
    }

    /// Look up a model by id and require a kind.
    pub fn get_kind(id: &str, kind: ModelKind) -> Result<&'static ModelDescriptor> {
        let descriptor = Self::get(id)?;
        descriptor.expect_kind(kind)?;
        Ok(descriptor)
    }
}
