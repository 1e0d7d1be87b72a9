//! End-to-end site analysis: parse, diagnose, embed, find similar sites.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::Config;
use crate::diagnosis::{Diagnosis, DiagnosisExtractor};
use crate::embedder::{Embedder, Embedding};
use crate::error::{DiagnosisError, Result};
use crate::fetch::HttpFetcher;
use crate::invoker::{ResilientInvoker, RetryPolicy};
use crate::models::{ChatModel, EmbeddingModel, OpenAIProvider};
use crate::similarity::{MemorySimilarityStore, Neighbor, SimilarityStore, SiteRecord};
use crate::site::{Site, SiteParser};
use crate::url::NormalizedUrl;

/// Default number of similar sites returned by [`SiteAnalyzer::analyze`].
pub const DEFAULT_NEIGHBORS: usize = 3;

/// Everything learned about one site.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub url: NormalizedUrl,
    pub diagnosis: Diagnosis,
    pub embedding: Embedding,
    /// Closest previously indexed sites, most similar first
    pub neighbors: Vec<Neighbor>,
}

/// Runs the full pipeline against a similarity store.
pub struct SiteAnalyzer {
    parser: SiteParser,
    extractor: DiagnosisExtractor,
    embedder: Embedder,
    store: Arc<dyn SimilarityStore>,
    neighbors: usize,
}

impl SiteAnalyzer {
    /// Analyzer backed by an empty in-memory store.
    pub fn new(parser: SiteParser, extractor: DiagnosisExtractor, embedder: Embedder) -> Self {
        Self {
            parser,
            extractor,
            embedder,
            store: Arc::new(MemorySimilarityStore::new()),
            neighbors: DEFAULT_NEIGHBORS,
        }
    }

    /// Wire the HTTP fetcher and OpenAI provider described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::with_timeout(config.fetch_timeout)?);

        let mut client = openai_client::OpenAIClient::new(config.openai_api_key.clone())
            .with_timeout(config.model_timeout)
            .map_err(|e| DiagnosisError::Config(e.to_string()))?;
        if let Some(base_url) = &config.openai_base_url {
            client = client.with_base_url(base_url.clone());
        }
        let provider = Arc::new(OpenAIProvider::new(client));
        let invoker = ResilientInvoker::new(RetryPolicy::new(config.max_shrink_attempts));

        let extractor = DiagnosisExtractor::new(ChatModel::from_registry(&config.chat_model, provider.clone())?)
            .with_invoker(invoker.clone())
            .with_max_attempts(config.max_extraction_attempts);
        let embedder =
            Embedder::new(EmbeddingModel::from_registry(&config.embedding_model, provider)?).with_invoker(invoker);

        Ok(Self::new(SiteParser::new(fetcher), extractor, embedder).with_neighbors(config.neighbors))
    }

    /// Whether subpages linked from the homepage are fetched.
    pub fn with_hyperlinks(mut self, parse_hyperlinks: bool) -> Self {
        self.parser = self.parser.with_hyperlinks(parse_hyperlinks);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SimilarityStore>) -> Self {
        self.store = store;
        self
    }

    /// Number of neighbours to return (`k`).
    pub fn with_neighbors(mut self, k: usize) -> Self {
        self.neighbors = k;
        self
    }

    pub fn store(&self) -> &Arc<dyn SimilarityStore> {
        &self.store
    }

    /// Diagnose and embed a site, then look up its nearest stored neighbours.
    pub async fn analyze(&self, url: impl Into<NormalizedUrl>) -> Result<SiteReport> {
        self.analyze_url(url.into()).await
    }

    /// Build the record a similarity store persists for a site.
    pub async fn index(&self, url: impl Into<NormalizedUrl>) -> Result<SiteRecord> {
        self.index_url(url.into()).await
    }

    /// Index a site and insert it into `store`.
    pub async fn index_into(&self, store: &dyn SimilarityStore, url: impl Into<NormalizedUrl>) -> Result<()> {
        let record = self.index(url).await?;
        info!(url = %record.url, "Indexed site");
        store.insert(record).await
    }

    /// Fetch a site without invoking any model.
    pub async fn parse(&self, url: impl Into<NormalizedUrl>) -> Site {
        self.parser.parse(url).await
    }

    pub async fn diagnose(&self, site: &Site) -> Result<Diagnosis> {
        self.extractor.extract(site).await
    }

    pub async fn embed(&self, site: &Site) -> Result<Embedding> {
        self.embedder.embed(site).await
    }

    #[instrument(name = "analyze", skip_all, fields(url = %url))]
    async fn analyze_url(&self, url: NormalizedUrl) -> Result<SiteReport> {
        let site = self.parser.parse(url).await;
        let (diagnosis, embedding) = self.diagnose_and_embed(&site).await?;
        let neighbors = self.store.query(&embedding, self.neighbors).await?;

        info!(neighbors = neighbors.len(), "Site analyzed");

        Ok(SiteReport {
            url: site.url().clone(),
            diagnosis,
            embedding,
            neighbors,
        })
    }

    #[instrument(name = "index", skip_all, fields(url = %url))]
    async fn index_url(&self, url: NormalizedUrl) -> Result<SiteRecord> {
        let site = self.parser.parse(url).await;
        let (diagnosis, embedding) = self.diagnose_and_embed(&site).await?;

        Ok(SiteRecord {
            url: site.url().clone(),
            embedding,
            text: site.full_text(),
            diagnosis,
        })
    }

    async fn diagnose_and_embed(&self, site: &Site) -> Result<(Diagnosis, Embedding)> {
        let diagnosis = self.diagnose(site).await?;
        let embedding = self.embed(site).await?;
        Ok((diagnosis, embedding))
    }
}
