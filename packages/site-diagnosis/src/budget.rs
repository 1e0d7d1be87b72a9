//! Token-budget fitting: measure the full text once, then cut it to size.
//!
//! Token counts are only known once the whole text exists, so fitting is two
//! passes: render at full size and tokenize, then render again at
//! `min(budget / tokens, 1)`. This assumes characters and tokens scale roughly
//! linearly; where they don't, the invoker's shrink loop takes over.

use serde::Serialize;
use tracing::debug;

use crate::models::Model;
use crate::site::Site;
use crate::tokenizer::Tokenizer;
use crate::truncation::KeepFraction;

/// Site text cut to a model's budget.
#[derive(Debug, Clone, Serialize)]
pub struct FittedText {
    pub keep_fraction: KeepFraction,
    pub text: String,
    /// Tokens in the untruncated text
    pub full_tokens: usize,
}

/// Computes the keep-fraction that brings a site under a token budget.
pub struct TokenBudgetFitter<'a> {
    tokenizer: &'a dyn Tokenizer,
    max_input_tokens: usize,
}

impl<'a> TokenBudgetFitter<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, max_input_tokens: usize) -> Self {
        Self {
            tokenizer,
            max_input_tokens,
        }
    }

    /// Fitter using a model's tokenizer and registry budget.
    pub fn for_model<M: Model + ?Sized>(model: &'a M) -> Self {
        Self::new(model.tokenizer(), model.descriptor().max_input_tokens)
    }

    /// Fraction and token count of the untruncated text.
    pub fn measure(&self, site: &Site) -> (KeepFraction, usize) {
        let full_tokens = self.tokenizer.count_tokens(&site.full_text());
        (KeepFraction::fitting(self.max_input_tokens, full_tokens), full_tokens)
    }

    /// Measure, then render at the computed fraction.
    pub fn fit(&self, site: &Site) -> FittedText {
        let (keep_fraction, full_tokens) = self.measure(site);
        debug!(
            url = %site.url(),
            full_tokens,
            budget = self.max_input_tokens,
            keep_fraction = keep_fraction.value(),
            "Fitted site text to token budget"
        );
        FittedText {
            keep_fraction,
            text: site.text_representation(keep_fraction),
            full_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchOutcome;
    use crate::page::{Page, PageKind};
    use crate::testing::CharTokenizer;
    use crate::url::NormalizedUrl;
    use proptest::prelude::*;

    fn site_with_bodies(bodies: &[usize]) -> Site {
        let page = |url: String, len: usize, kind| {
            Page::from_outcome(
                NormalizedUrl::new(url),
                kind,
                FetchOutcome::Ok {
                    body: format!("<p>{}</p>", "x".repeat(len)),
                },
            )
        };
        let homepage = page("https://acme.vc".into(), bodies[0], PageKind::Homepage);
        let subpages = bodies[1..]
            .iter()
            .enumerate()
            .map(|(i, len)| page(format!("https://acme.vc/p{}", i), *len, PageKind::Subpage))
            .collect();
        Site::from_pages(homepage, subpages, true)
    }

    #[test]
    fn test_under_budget_keeps_everything() {
        let site = site_with_bodies(&[100]);
        let tokenizer = CharTokenizer::new(4);
        let fitted = TokenBudgetFitter::new(&tokenizer, 10_000).fit(&site);

        assert_eq!(fitted.keep_fraction, KeepFraction::FULL);
        assert_eq!(fitted.text, site.full_text());
    }

    #[test]
    fn test_over_budget_scales_down() {
        let site = site_with_bodies(&[39_950]);
        let full = site.full_text().chars().count();
        let tokenizer = CharTokenizer::new(1);
        let fitted = TokenBudgetFitter::new(&tokenizer, full / 4).fit(&site);

        assert!((fitted.keep_fraction.value() - 0.25).abs() < 1e-3);
        assert_eq!(fitted.full_tokens, full);
        assert!(tokenizer.count_tokens(&fitted.text) <= full / 4);
    }

    proptest! {
        #[test]
        fn prop_fitted_text_within_budget(
            bodies in proptest::collection::vec(0usize..3_000, 1..6),
            chars_per_token in 1usize..6,
            budget in 1usize..2_000,
        ) {
            let site = site_with_bodies(&bodies);
            let tokenizer = CharTokenizer::new(chars_per_token);
            let fitted = TokenBudgetFitter::new(&tokenizer, budget).fit(&site);

            prop_assert!(tokenizer.count_tokens(&fitted.text) <= budget);
        }
    }
}
