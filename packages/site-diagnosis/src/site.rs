//! A homepage plus its depth-1 subpages, treated as one document.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, Instrument, Span};

use crate::fetch::PageFetcher;
use crate::links::extract_hyperlinks;
use crate::page::{Page, PageKind};
use crate::truncation::KeepFraction;
use crate::url::NormalizedUrl;

/// A parsed site. Subpages keep discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    homepage: Page,
    subpages: Vec<Page>,
    parse_hyperlinks: bool,
}

impl Site {
    /// Assemble a site from already fetched pages.
    ///
    /// Subpages are dropped when `parse_hyperlinks` is false.
    pub fn from_pages(homepage: Page, subpages: Vec<Page>, parse_hyperlinks: bool) -> Self {
        Self {
            homepage,
            subpages: if parse_hyperlinks { subpages } else { Vec::new() },
            parse_hyperlinks,
        }
    }

    pub fn url(&self) -> &NormalizedUrl {
        self.homepage.url()
    }

    pub fn homepage(&self) -> &Page {
        &self.homepage
    }

    pub fn subpages(&self) -> &[Page] {
        &self.subpages
    }

    pub fn parse_hyperlinks(&self) -> bool {
        self.parse_hyperlinks
    }

    /// Homepage first, then subpages in discovery order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        std::iter::once(&self.homepage).chain(self.subpages.iter())
    }

    /// Every page's representation at `keep_fraction`, concatenated.
    ///
    /// Each page is cut independently, so the total shrinks by the same fraction
    /// (up to one character of rounding per page).
    pub fn text_representation(&self, keep_fraction: KeepFraction) -> String {
        self.pages()
            .map(|page| page.text_representation(keep_fraction))
            .collect()
    }

    /// Untruncated representation.
    pub fn full_text(&self) -> String {
        self.text_representation(KeepFraction::FULL)
    }
}

/// Fetches a site: the homepage and, optionally, every hyperlink on it.
///
/// Logging goes to a caller-supplied parent span (the span current at parse
/// time by default), with one child span per page.
pub struct SiteParser {
    fetcher: Arc<dyn PageFetcher>,
    parse_hyperlinks: bool,
    span: Option<Span>,
}

impl SiteParser {
    /// Parser that follows hyperlinks.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            parse_hyperlinks: true,
            span: None,
        }
    }

    /// Whether to fetch the homepage's hyperlinks (depth 1 only).
    pub fn with_hyperlinks(mut self, parse_hyperlinks: bool) -> Self {
        self.parse_hyperlinks = parse_hyperlinks;
        self
    }

    /// Parent span for all logging done while parsing.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Fetch the homepage, then each discovered subpage in order.
    ///
    /// Fetch failures never abort: they are recorded on the page.
    pub async fn parse(&self, url: impl Into<NormalizedUrl>) -> Site {
        let url = url.into();
        let parent = self.span.clone().unwrap_or_else(Span::current);
        let span = info_span!(parent: &parent, "site", url = %url);

        async {
            info!(parse_hyperlinks = self.parse_hyperlinks, "Parsing site");

            let homepage = self.fetch_page(url, PageKind::Homepage).await;

            let mut subpages = Vec::new();
            if self.parse_hyperlinks {
                let hyperlinks = extract_hyperlinks(&homepage);
                info!(count = hyperlinks.len(), "Found hyperlinks");

                for link in hyperlinks {
                    subpages.push(self.fetch_page(link, PageKind::Subpage).await);
                }
            }

            let failed = subpages
                .iter()
                .filter(|page| !page.fetch_status().is_success())
                .count();
            info!(
                homepage_status = ?homepage.fetch_status(),
                subpages = subpages.len(),
                failed_subpages = failed,
                "Site parsed"
            );

            Site::from_pages(homepage, subpages, self.parse_hyperlinks)
        }
        .instrument(span)
        .await
    }

    async fn fetch_page(&self, url: NormalizedUrl, kind: PageKind) -> Page {
        let span = info_span!("page", url = %url, kind = ?kind);
        Page::fetch(self.fetcher.as_ref(), url, kind)
            .instrument(span)
            .await
    }
}
