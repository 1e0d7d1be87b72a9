//! Offline token counting.

use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};

use crate::error::{DiagnosisError, Result};

/// Counts model tokens locally, without a network round trip.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// BPE tokenizer backed by tiktoken-rs.
pub struct BpeTokenizer {
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Load the encoding used by `model`, falling back to `cl100k_base` for
    /// models tiktoken-rs does not know.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = match get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => cl100k_base().map_err(|e| DiagnosisError::Tokenizer(e.to_string()))?,
        };
        Ok(Self { bpe })
    }
}

impl Tokenizer for BpeTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}
