//! Nearest-neighbour search over previously analysed sites.
//!
//! The pipeline only depends on the [`SimilarityStore`] trait. A persistent
//! vector database plugs in behind it; [`MemorySimilarityStore`] is the
//! in-process implementation used by tests and the CLI.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::diagnosis::Diagnosis;
use crate::embedder::Embedding;
use crate::error::{DiagnosisError, Result};
use crate::url::NormalizedUrl;

/// One analysed site, in the shape the store persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub url: NormalizedUrl,
    pub embedding: Embedding,
    /// Untruncated site text
    pub text: String,
    pub diagnosis: Diagnosis,
}

/// A stored site close to the query embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub url: NormalizedUrl,
    pub similarity: f32,
    pub diagnosis: Diagnosis,
}

/// Vector store keyed by site URL.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Insert a record, replacing any record with the same URL.
    async fn insert(&self, record: SiteRecord) -> Result<()>;

    /// Up to `k` nearest records, closest first.
    async fn query(&self, embedding: &Embedding, k: usize) -> Result<Vec<Neighbor>>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// In-memory store ranked by cosine similarity.
///
/// Not suitable for production as data is lost on restart.
#[derive(Default)]
pub struct MemorySimilarityStore {
    records: RwLock<BTreeMap<NormalizedUrl, SiteRecord>>,
}

impl MemorySimilarityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// NaN scores (from NaN components) rank below every real similarity.
fn rankable(similarity: f32) -> f32 {
    if similarity.is_nan() {
        f32::NEG_INFINITY
    } else {
        similarity
    }
}

fn poisoned() -> DiagnosisError {
    DiagnosisError::Store("similarity store lock poisoned".into())
}

#[async_trait]
impl SimilarityStore for MemorySimilarityStore {
    async fn insert(&self, record: SiteRecord) -> Result<()> {
        self.records
            .write()
            .map_err(|_| poisoned())?
            .insert(record.url.clone(), record);
        Ok(())
    }

    async fn query(&self, embedding: &Embedding, k: usize) -> Result<Vec<Neighbor>> {
        let records = self.records.read().map_err(|_| poisoned())?;

        // BTreeMap iteration is URL-ordered and the sort is stable, so ties
        // stay in URL order.
        let mut scored: Vec<Neighbor> = records
            .values()
            .map(|record| Neighbor {
                url: record.url.clone(),
                similarity: rankable(embedding.cosine_similarity(&record.embedding)),
                diagnosis: record.diagnosis.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(k);

        Ok(scored)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().map_err(|_| poisoned())?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, embedding: Vec<f32>) -> SiteRecord {
        SiteRecord {
            url: NormalizedUrl::new(url),
            embedding: Embedding::new(embedding),
            text: format!("Contents of {}\n", url),
            diagnosis: Diagnosis {
                name: url.trim_start_matches("https://").to_string(),
                contacts: String::new(),
                industries: "software".into(),
                investment_stages: "seed".into(),
            },
        }
    }

    async fn store_of_five() -> MemorySimilarityStore {
        let store = MemorySimilarityStore::new();
        for (url, embedding) in [
            ("https://a.vc", vec![1.0, 0.0]),
            ("https://b.vc", vec![0.9, 0.1]),
            ("https://c.vc", vec![0.0, 1.0]),
            ("https://d.vc", vec![0.5, 0.5]),
            ("https://e.vc", vec![-1.0, 0.0]),
        ] {
            store.insert(record(url, embedding)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_query_returns_k_closest_in_order() {
        let store = store_of_five().await;

        let neighbors = store.query(&Embedding::new(vec![1.0, 0.0]), 3).await.unwrap();

        let urls: Vec<_> = neighbors.iter().map(|n| n.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.vc", "https://b.vc", "https://d.vc"]);
        assert!(neighbors.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert_eq!(neighbors[0].diagnosis.name, "a.vc");
    }

    #[tokio::test]
    async fn test_query_with_large_k_returns_all() {
        let store = store_of_five().await;
        let neighbors = store.query(&Embedding::new(vec![0.0, 1.0]), 10).await.unwrap();
        assert_eq!(neighbors.len(), 5);
        assert_eq!(neighbors[0].url.as_str(), "https://c.vc");
    }

    #[tokio::test]
    async fn test_ties_ordered_by_url() {
        let store = MemorySimilarityStore::new();
        store.insert(record("https://z.vc", vec![1.0, 0.0])).await.unwrap();
        store.insert(record("https://m.vc", vec![2.0, 0.0])).await.unwrap();

        let neighbors = store.query(&Embedding::new(vec![1.0, 0.0]), 2).await.unwrap();
        assert_eq!(neighbors[0].url.as_str(), "https://m.vc");
        assert_eq!(neighbors[1].url.as_str(), "https://z.vc");
    }

    #[tokio::test]
    async fn test_nan_embeddings_rank_last() {
        let store = MemorySimilarityStore::new();
        for i in 0..40 {
            let embedding = if i % 3 == 0 {
                vec![f32::NAN, 1.0]
            } else {
                vec![1.0, i as f32 / 40.0]
            };
            store
                .insert(record(&format!("https://fund{:02}.vc", i), embedding))
                .await
                .unwrap();
        }

        let neighbors = store.query(&Embedding::new(vec![1.0, 0.0]), 5).await.unwrap();

        assert_eq!(neighbors.len(), 5);
        assert!(neighbors.iter().all(|n| n.similarity.is_finite()));
        assert!(neighbors.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert_eq!(neighbors[0].url.as_str(), "https://fund01.vc");

        let all = store.query(&Embedding::new(vec![1.0, 0.0]), 40).await.unwrap();
        assert_eq!(all.len(), 40);
        assert!(all[26..].iter().all(|n| n.similarity == f32::NEG_INFINITY));
    }

    #[test]
    fn test_empty_store_returns_nothing() {
        let store = MemorySimilarityStore::new();
        let neighbors = tokio_test::block_on(store.query(&Embedding::new(vec![1.0]), 3)).unwrap();
        assert!(neighbors.is_empty());
    }

    #[tokio::test]
    async fn test_insert_replaces_same_url() {
        let store = MemorySimilarityStore::new();
        assert!(store.is_empty().await.unwrap());

        store.insert(record("https://a.vc", vec![1.0, 0.0])).await.unwrap();
        store.insert(record("https://a.vc", vec![0.0, 1.0])).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        let neighbors = store.query(&Embedding::new(vec![0.0, 1.0]), 1).await.unwrap();
        assert!((neighbors[0].similarity - 1.0).abs() < 1e-6);
    }
}
