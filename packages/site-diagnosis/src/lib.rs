//! Website diagnosis pipeline.
//!
//! Scrapes a homepage and the pages it links to, fits the text to a model's
//! token budget, and derives two artifacts from it: a structured [`Diagnosis`]
//! from a chat model and an [`Embedding`] for similarity search.
//!
//! # Usage
//!
//! ```rust,ignore
//! use site_diagnosis::{Config, SiteAnalyzer};
//!
//! let config = Config::from_env()?;
//! let analyzer = SiteAnalyzer::from_config(&config)?;
//!
//! let report = analyzer.analyze("https://example.vc").await?;
//! println!("{}", report.diagnosis.to_markdown());
//! ```
//!
//! # Modules
//!
//! - [`site`] - Homepage plus depth-1 subpages ([`SiteParser`])
//! - [`budget`] and [`invoker`] - Token-budget fitting and shrink-and-retry
//! - [`diagnosis`] - Structured extraction with its own parse-retry loop
//! - [`embedder`] and [`similarity`] - Embeddings and nearest-neighbour search
//! - [`testing`] - Mock fetchers and scripted model providers

pub mod analyzer;
pub mod budget;
pub mod config;
pub mod diagnosis;
pub mod embedder;
pub mod error;
pub mod fetch;
pub mod invoker;
pub mod links;
pub mod models;
pub mod page;
pub mod prompts;
pub mod similarity;
pub mod site;
pub mod testing;
pub mod tokenizer;
pub mod truncation;
pub mod url;

pub use analyzer::{SiteAnalyzer, SiteReport};
pub use budget::{FittedText, TokenBudgetFitter};
pub use config::Config;
pub use diagnosis::{Diagnosis, DiagnosisExtractor, DiagnosisParseError};
pub use embedder::{Embedder, Embedding};
pub use error::{DiagnosisError, ModelError, ModelResult, Result};
pub use fetch::{FetchOutcome, HttpFetcher, PageFetcher};
pub use invoker::{Invocation, ResilientInvoker, RetryPolicy};
pub use models::{
    ChatModel, ChatProvider, EmbeddingModel, EmbeddingProvider, Model, ModelDescriptor, ModelKind,
    ModelRegistry, OpenAIProvider,
};
pub use page::{FetchStatus, Page, PageKind};
pub use similarity::{MemorySimilarityStore, Neighbor, SimilarityStore, SiteRecord};
pub use site::{Site, SiteParser};
pub use tokenizer::{BpeTokenizer, Tokenizer};
pub use truncation::KeepFraction;
pub use url::{normalize_url, NormalizedUrl};
