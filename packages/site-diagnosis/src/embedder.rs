//! Site embeddings for similarity search.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::invoker::ResilientInvoker;
use crate::models::{EmbeddingModel, Model};
use crate::site::Site;

/// A fixed-length vector describing a site's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Cosine similarity in `[-1, 1]`. Zero when either vector is zero or the
    /// dimensions differ.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        let (a, b) = (&self.0, &other.0);
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Embeds a site through the resilient invoker.
pub struct Embedder<M = EmbeddingModel> {
    model: M,
    invoker: ResilientInvoker,
}

impl<M: Model<Output = Vec<f32>>> Embedder<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            invoker: ResilientInvoker::default(),
        }
    }

    pub fn with_invoker(mut self, invoker: ResilientInvoker) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub async fn embed(&self, site: &Site) -> Result<Embedding> {
        let invocation = self.invoker.invoke(site, &self.model).await?;
        info!(
            url = %site.url(),
            dimension = invocation.output.len(),
            attempts = invocation.attempts,
            "Site embedded"
        );
        Ok(Embedding(invocation.output))
    }
}
