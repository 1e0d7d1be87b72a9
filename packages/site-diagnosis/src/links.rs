//! Subpage discovery from a homepage's anchors.

use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::debug;

use crate::page::Page;
use crate::url::NormalizedUrl;

/// Href prefixes that never lead to a fetchable page.
const SKIPPED_SCHEMES: [&str; 3] = ["mailto:", "tel:", "javascript:"];

/// Hyperlinks worth following from `homepage`.
///
/// Only anchors with an `href` and no child elements count (icon and image links
/// are dropped). Hrefs not starting with `http` are prefixed with the homepage
/// URL. Results are normalized, deduplicated, stripped of the homepage itself and
/// returned in sorted order. A page without markup yields nothing.
pub fn extract_hyperlinks(homepage: &Page) -> Vec<NormalizedUrl> {
    let Some(markup) = homepage.raw_markup() else {
        return Vec::new();
    };
    let links = hyperlinks_in(markup, homepage.url());
    debug!(url = %homepage.url(), count = links.len(), "Extracted hyperlinks");
    links
}

/// Same as [`extract_hyperlinks`] over raw markup and an explicit base.
pub fn hyperlinks_in(markup: &str, base: &NormalizedUrl) -> Vec<NormalizedUrl> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(markup);

    let mut links: BTreeSet<NormalizedUrl> = document
        .select(&selector)
        .filter(|anchor| anchor.children().all(|child| !child.value().is_element()))
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter(|href| {
            let lower = href.to_ascii_lowercase();
            !SKIPPED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
        })
        .map(|href| NormalizedUrl::new(resolve(href, base)))
        .collect();

    links.remove(base);
    links.into_iter().collect()
}

fn resolve(href: &str, base: &NormalizedUrl) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') || href.starts_with('#') || href.starts_with('?') {
        format!("{}{}", base, href)
    } else {
        format!("{}/{}", base, href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NormalizedUrl {
        NormalizedUrl::new("https://acme.vc")
    }

    fn links(html: &str) -> Vec<String> {
        hyperlinks_in(html, &base())
            .into_iter()
            .map(NormalizedUrl::into_string)
            .collect()
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let html = r#"
            <a href="/team">Team</a>
            <a href="https://acme.vc/portfolio/">Portfolio</a>
            <a href="contact">Contact</a>
            <a href="https://twitter.com/acme">Twitter</a>
        "#;

        assert_eq!(
            links(html),
            vec![
                "https://acme.vc/contact",
                "https://acme.vc/portfolio",
                "https://acme.vc/team",
                "https://twitter.com/acme",
            ]
        );
    }

    #[test]
    fn test_anchors_with_child_elements_ignored() {
        let html = r#"
            <a href="/logo"><img src="logo.png"></a>
            <a href="/news"><span>News</span></a>
            <a href="/about">About</a>
            <a>No href</a>
        "#;

        assert_eq!(links(html), vec!["https://acme.vc/about"]);
    }

    #[test]
    fn test_self_links_and_duplicates_removed() {
        let html = r##"
            <a href="/">Home</a>
            <a href="#top">Top</a>
            <a href="https://acme.vc/">Home again</a>
            <a href="/team">Team</a>
            <a href="/team/">Team</a>
            <a href="/team#partners">Partners</a>
            <a href="/team?tab=2">Team tab</a>
        "##;

        assert_eq!(links(html), vec!["https://acme.vc/team"]);
    }

    #[test]
    fn test_non_page_schemes_skipped() {
        let html = r#"
            <a href="mailto:hello@acme.vc">Email</a>
            <a href="tel:+15551234">Call</a>
            <a href="javascript:void(0)">Menu</a>
            <a href="/jobs">Jobs</a>
        "#;

        assert_eq!(links(html), vec!["https://acme.vc/jobs"]);
    }

    #[test]
    fn test_page_without_markup_yields_nothing() {
        use crate::fetch::FetchOutcome;
        use crate::page::PageKind;

        let page = Page::from_outcome(base(), PageKind::Homepage, FetchOutcome::Status { code: 500 });
        assert!(extract_hyperlinks(&page).is_empty());
    }
}
