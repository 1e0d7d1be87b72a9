//! A single fetched web page and its plain-text rendering.

use chrono::{DateTime, Utc};
use scraper::{Html, Node};
use serde::Serialize;
use std::borrow::Cow;

use crate::fetch::{FetchOutcome, PageFetcher};
use crate::truncation::{truncate_chars, KeepFraction};
use crate::url::NormalizedUrl;

/// Elements whose text is never visible.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// How a fetch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    HttpError(u16),
    NetworkError(String),
}

impl FetchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Role of a page within its site.
///
/// Failed subpages render an error placeholder; a failed homepage renders an empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Homepage,
    Subpage,
}

/// A fetched page. Immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    url: NormalizedUrl,
    kind: PageKind,
    #[serde(skip)]
    raw_markup: Option<String>,
    text_content: Option<String>,
    fetch_status: FetchStatus,
    fetched_at: DateTime<Utc>,
}

impl Page {
    /// Fetch `url` and build the page from the outcome.
    pub async fn fetch(fetcher: &dyn PageFetcher, url: NormalizedUrl, kind: PageKind) -> Self {
        let outcome = fetcher.get(url.as_str()).await;
        Self::from_outcome(url, kind, outcome)
    }

    /// Build a page from a fetch outcome without performing I/O.
    pub fn from_outcome(url: NormalizedUrl, kind: PageKind, outcome: FetchOutcome) -> Self {
        let (raw_markup, text_content, fetch_status) = match outcome {
            FetchOutcome::Ok { body } => {
                let text = visible_text(&body);
                (Some(body), Some(text), FetchStatus::Success)
            }
            FetchOutcome::Status { code } => (None, None, FetchStatus::HttpError(code)),
            FetchOutcome::Network { message } => (None, None, FetchStatus::NetworkError(message)),
        };

        Self {
            url,
            kind,
            raw_markup,
            text_content,
            fetch_status,
            fetched_at: Utc::now(),
        }
    }

    pub fn url(&self) -> &NormalizedUrl {
        &self.url
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    /// Markup source of a successful fetch. Parse with [`Html::parse_document`] when needed.
    pub fn raw_markup(&self) -> Option<&str> {
        self.raw_markup.as_deref()
    }

    /// Visible text of a successful fetch, without blank lines.
    pub fn text_content(&self) -> Option<&str> {
        self.text_content.as_deref()
    }

    pub fn fetch_status(&self) -> &FetchStatus {
        &self.fetch_status
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// The text this page contributes to its site.
    pub fn body(&self) -> Cow<'_, str> {
        match (&self.fetch_status, self.kind) {
            (FetchStatus::Success, _) => Cow::Borrowed(self.text_content.as_deref().unwrap_or("")),
            (_, PageKind::Homepage) => Cow::Borrowed(""),
            (FetchStatus::HttpError(code), PageKind::Subpage) => Cow::Owned(format!("Error {}", code)),
            (FetchStatus::NetworkError(message), PageKind::Subpage) => {
                Cow::Owned(format!("Error: {}", message))
            }
        }
    }

    /// `"Contents of <url>\n<body>\n\n"`, cut to `floor(chars * keep_fraction)` characters.
    ///
    /// The cut applies to the whole block, header included.
    pub fn text_representation(&self, keep_fraction: KeepFraction) -> String {
        let full = format!("Contents of {}\n{}\n\n", self.url, self.body());
        truncate_chars(&full, keep_fraction)
    }
}

/// Concatenated text nodes of a document, minus hidden elements, with
/// blank and whitespace-only lines dropped.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            raw.push_str(text);
        }
    }

    raw.split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
