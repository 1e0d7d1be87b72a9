//! Resilient model invocation: shrink-and-retry on input-too-large.
//!
//! Each call starts from the token-budget fit. When the provider still rejects
//! the input as too large, the keep-fraction shrinks by `min(0.05, f / 2)` and
//! the site is re-rendered at the new fraction directly (no re-measuring).
//! Every other provider error is returned immediately. The loop is capped by
//! [`RetryPolicy::max_attempts`] and ends early if the fraction can no longer
//! shrink; either way [`DiagnosisError::ContentUnshrinkable`] is returned.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::budget::TokenBudgetFitter;
use crate::error::{DiagnosisError, ModelError, Result};
use crate::models::Model;
use crate::site::Site;
use crate::truncation::KeepFraction;

/// Default cap on model calls per invocation. Forty calls reach a keep-fraction
/// near 0.05 / 2^21, far past anything a real site needs.
pub const DEFAULT_MAX_SHRINK_ATTEMPTS: usize = 40;

/// Limits for the shrink loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Model calls allowed per invocation, including the first (at least 1)
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_SHRINK_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// A successful model call and how it was reached.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation<T> {
    pub output: T,
    /// Fraction of the site text that was finally accepted
    pub keep_fraction: KeepFraction,
    /// Model calls made, including the successful one
    pub attempts: usize,
}

/// Calls a model with as much of a site's text as it will accept.
#[derive(Debug, Clone, Default)]
pub struct ResilientInvoker {
    policy: RetryPolicy,
}

impl ResilientInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fit the site to the model's budget and call it, shrinking on rejection.
    pub async fn invoke<M: Model + ?Sized>(&self, site: &Site, model: &M) -> Result<Invocation<M::Output>> {
        let model_id = model.descriptor().id;
        let fitted = TokenBudgetFitter::for_model(model).fit(site);
        let mut keep_fraction = fitted.keep_fraction;
        let mut text = fitted.text;
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(
                model = model_id,
                attempt = attempts,
                keep_fraction = keep_fraction.value(),
                chars = text.chars().count(),
                "Invoking model"
            );

            match model.invoke(&model.payload(&text)).await {
                Ok(output) => {
                    if attempts > 1 {
                        info!(
                            model = model_id,
                            attempts,
                            keep_fraction = keep_fraction.value(),
                            "Model accepted shrunk input"
                        );
                    }
                    return Ok(Invocation {
                        output,
                        keep_fraction,
                        attempts,
                    });
                }
                Err(ModelError::InputTooLarge { message, .. }) => {
                    let next = if attempts < self.policy.max_attempts {
                        keep_fraction.shrink()
                    } else {
                        None
                    };
                    let Some(next) = next else {
                        warn!(
                            model = model_id,
                            attempts,
                            keep_fraction = keep_fraction.value(),
                            "Giving up shrinking input"
                        );
                        return Err(DiagnosisError::ContentUnshrinkable {
                            model: model_id.to_string(),
                            attempts,
                            keep_fraction: keep_fraction.value(),
                        });
                    };

                    debug!(
                        model = model_id,
                        from = keep_fraction.value(),
                        to = next.value(),
                        error = %message,
                        "Input too large, shrinking"
                    );
                    keep_fraction = next;
                    text = site.text_representation(keep_fraction);
                }
                Err(other) => {
                    warn!(model = model_id, attempt = attempts, error = %other, "Model call failed");
                    return Err(other.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchOutcome;
    use crate::models::{ChatModel, EmbeddingModel, CHAT_MODEL_ID, EMBEDDING_MODEL_ID};
    use crate::page::{Page, PageKind};
    use crate::testing::{CharTokenizer, ScriptedChatProvider, ScriptedEmbeddingProvider};
    use crate::url::NormalizedUrl;
    use std::sync::Arc;

    /// A homepage-only site whose full representation is exactly `len` characters.
    fn site_of_len(len: usize) -> Site {
        let url = "https://acme.vc";
        let overhead = format!("Contents of {}\n\n\n", url).len();
        let page = Page::from_outcome(
            NormalizedUrl::new(url),
            PageKind::Homepage,
            FetchOutcome::Ok {
                body: format!("<p>{}</p>", "a".repeat(len - overhead)),
            },
        );
        Site::from_pages(page, vec![], false)
    }

    fn embedding_model(provider: Arc<ScriptedEmbeddingProvider>) -> EmbeddingModel {
        EmbeddingModel::from_registry(EMBEDDING_MODEL_ID, provider)
            .unwrap()
            .with_tokenizer(Arc::new(CharTokenizer::new(1_000_000)))
    }

    #[tokio::test]
    async fn test_accepts_first_try() {
        let provider = Arc::new(ScriptedEmbeddingProvider::new(4));
        let model = embedding_model(provider.clone());

        let invocation = ResilientInvoker::default()
            .invoke(&site_of_len(1_000), &model)
            .await
            .unwrap();

        assert_eq!(invocation.attempts, 1);
        assert_eq!(invocation.keep_fraction, KeepFraction::FULL);
        assert_eq!(invocation.output.len(), 4);
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_multibyte_text_measured_in_characters() {
        let page = Page::from_outcome(
            NormalizedUrl::new("https://café.vc"),
            PageKind::Homepage,
            FetchOutcome::Ok {
                body: format!("<p>{}</p>", "é".repeat(400)),
            },
        );
        let site = Site::from_pages(page, vec![], false);
        let expected = site.text_representation(KeepFraction::FULL).chars().count();
        let provider = Arc::new(ScriptedEmbeddingProvider::new(4).with_max_input_chars(expected));
        let model = embedding_model(provider.clone());

        let invocation = ResilientInvoker::default().invoke(&site, &model).await.unwrap();

        assert_eq!(invocation.attempts, 1);
        assert_eq!(provider.calls()[0].input_chars, expected);
    }

    #[tokio::test]
    async fn test_shrinks_until_accepted() {
        // Rejects anything over half of the 100,000 characters.
        let provider = Arc::new(ScriptedEmbeddingProvider::new(4).with_max_input_chars(50_000));
        let model = embedding_model(provider.clone());

        let invocation = ResilientInvoker::default()
            .invoke(&site_of_len(100_000), &model)
            .await
            .unwrap();

        // 1.0, 0.95, ..., 0.55 rejected; ~0.5 accepted.
        assert_eq!(invocation.attempts, 11);
        assert!((invocation.keep_fraction.value() - 0.5).abs() < 1e-9);

        let lengths: Vec<usize> = provider.calls().iter().map(|c| c.input_chars).collect();
        assert_eq!(lengths.len(), 11);
        assert_eq!(lengths[0], 100_000);
        assert!(lengths.windows(2).all(|w| w[1] < w[0]));
        assert!(*lengths.last().unwrap() <= 50_000);
        assert!(lengths[lengths.len() - 2] > 50_000);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let provider = Arc::new(ScriptedEmbeddingProvider::new(4).with_max_input_chars(0));
        let model = embedding_model(provider.clone());

        let err = ResilientInvoker::new(RetryPolicy::new(5))
            .invoke(&site_of_len(1_000), &model)
            .await
            .unwrap_err();

        match err {
            DiagnosisError::ContentUnshrinkable {
                attempts,
                keep_fraction,
                ..
            } => {
                assert_eq!(attempts, 5);
                assert!(keep_fraction < 1.0 && keep_fraction > 0.0);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(provider.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_gives_up_when_fraction_bottoms_out() {
        // The instruction prompt alone exceeds the limit, so no cut is ever enough.
        let provider = Arc::new(ScriptedChatProvider::new().with_max_input_chars(1));
        let model = ChatModel::from_registry(CHAT_MODEL_ID, provider.clone())
            .unwrap()
            .with_tokenizer(Arc::new(CharTokenizer::new(4)));

        let err = ResilientInvoker::new(RetryPolicy::new(usize::MAX))
            .invoke(&site_of_len(500), &model)
            .await
            .unwrap_err();

        let (attempts, keep_fraction) = match err {
            DiagnosisError::ContentUnshrinkable {
                attempts,
                keep_fraction,
                ..
            } => (attempts, keep_fraction),
            other => panic!("unexpected: {:?}", other),
        };
        assert!(attempts > DEFAULT_MAX_SHRINK_ATTEMPTS && attempts < 2000);
        assert!(keep_fraction > 0.0);
        assert_eq!(KeepFraction::new(keep_fraction).and_then(KeepFraction::shrink), None);
        assert_eq!(provider.calls().len(), attempts);
    }

    #[tokio::test]
    async fn test_other_errors_propagate_without_retry() {
        let provider = Arc::new(
            ScriptedChatProvider::new().fail(ModelError::Provider {
                model: CHAT_MODEL_ID.into(),
                status: Some(429),
                category: "rate_limit_exceeded".into(),
                message: "slow down".into(),
            }),
        );
        let model = ChatModel::from_registry(CHAT_MODEL_ID, provider.clone())
            .unwrap()
            .with_tokenizer(Arc::new(CharTokenizer::new(4)));

        let err = ResilientInvoker::default()
            .invoke(&site_of_len(500), &model)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DiagnosisError::Model(ModelError::Provider { status: Some(429), .. })
        ));
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_starts_from_budget_fit() {
        let provider = Arc::new(ScriptedEmbeddingProvider::new(4));
        let model = EmbeddingModel::from_registry(EMBEDDING_MODEL_ID, provider.clone())
            .unwrap()
            .with_tokenizer(Arc::new(CharTokenizer::new(1)));

        // 8,000 token budget at one char per token against 32,000 characters.
        let invocation = ResilientInvoker::default()
            .invoke(&site_of_len(32_000), &model)
            .await
            .unwrap();

        assert_eq!(invocation.attempts, 1);
        assert!((invocation.keep_fraction.value() - 0.25).abs() < 1e-9);
        assert_eq!(provider.calls()[0].input_chars, 8_000);
    }
}
