//! HTTP fetching for site pages.
//!
//! A fetch never fails as a Rust error: non-200 statuses and transport failures
//! are reported through [`FetchOutcome`] so that one broken page degrades the
//! site's text instead of aborting the run.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;

/// Browser-like User-Agent; some sites answer 403 to obvious bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200 with the response body
    Ok { body: String },

    /// Any other HTTP status
    Status { code: u16 },

    /// DNS, connect, TLS or timeout failure, or an unreadable body
    Network { message: String },
}

/// Fetches one URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> FetchOutcome;
}

/// reqwest-backed fetcher with a fixed browser User-Agent.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    /// Use a preconfigured client. The caller is responsible for its User-Agent.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> FetchOutcome {
        debug!(url = %url, "HTTP fetch starting");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "HTTP request failed");
                return FetchOutcome::Network {
                    message: e.to_string(),
                };
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(url = %url, status = %status, "Failed to retrieve page");
            return FetchOutcome::Status {
                code: status.as_u16(),
            };
        }

        match response.text().await {
            Ok(body) => {
                debug!(url = %url, bytes = body.len(), "Page fetched");
                FetchOutcome::Ok { body }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read response body");
                FetchOutcome::Network {
                    message: e.to_string(),
                }
            }
        }
    }
}
