//! URL canonicalization for link deduplication and identity checks.
//!
//! No validation happens here: malformed input passes through with only the
//! textual rules applied.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A URL with no trailing `/`, and no `#fragment` or `?query` in its last path segment.
///
/// Deserialization normalizes, so a stored record can never carry a raw URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedUrl(String);

impl<'de> Deserialize<'de> for NormalizedUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl NormalizedUrl {
    /// Normalize a URL string.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self(normalize_url(url.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NormalizedUrl {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for NormalizedUrl {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Canonicalize a URL string.
///
/// Splits on `/`: an empty last segment is dropped, otherwise the last segment is
/// cut at its first `#` and its first `?`. The rule is applied until nothing
/// changes, so `a/b/?x` and `a/b//` both end up as `a/b` and normalization is
/// idempotent. Each pass that changes the string shortens it, so this terminates.
pub fn normalize_url(url: &str) -> String {
    let mut current = url.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(url: &str) -> String {
    let (head, last) = match url.rfind('/') {
        Some(i) => (&url[..i], &url[i + 1..]),
        None => ("", url),
    };

    if last.is_empty() {
        return if url.contains('/') {
            head.to_string()
        } else {
            String::new()
        };
    }

    let cut = last.find(['#', '?']).unwrap_or(last.len());
    if cut == last.len() {
        return url.to_string();
    }

    if url.contains('/') {
        format!("{}/{}", head, &last[..cut])
    } else {
        last[..cut].to_string()
    }
}
