use crate::config::HttpConfig;
use crate::scraper::robots::RobotsPolicy;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// A failed fetch. Callers treat every variant as "skip this target";
/// nothing here ever aborts the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("blocked by robots.txt: {0}")]
    RobotsDenied(String),

    #[error("cannot resolve {url}: {source}")]
    BadUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: StatusCode },
}

/// Fetches pages for one site, honouring its robots rules and sending a
/// fixed identifying user-agent. One instance per base origin.
pub struct PageFetcher {
    client: reqwest::Client,
    base: Url,
    robots: RobotsPolicy,
}

impl PageFetcher {
    /// Builds the client and makes the single robots.txt load attempt for
    /// this origin. Construction failures are configuration errors.
    pub async fn new(config: &HttpConfig, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid base URL {}", base_url))?;

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        let robots = RobotsPolicy::load(&client, &base).await;

        Ok(Self { client, base, robots })
    }

    #[cfg(test)]
    pub fn with_robots(client: reqwest::Client, base: Url, robots: RobotsPolicy) -> Self {
        Self { client, base, robots }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a relative or absolute URL against the base origin.
    pub fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        self.base.join(url).map_err(|source| FetchError::BadUrl {
            url: url.to_string(),
            source,
        })
    }

    /// Fetch a URL as text. Robots denial, transport failure and
    /// non-success status are all reported as values.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.get(url).await?;
        Ok(resp.text().await?)
    }

    /// Fetch a URL as raw bytes (spreadsheet downloads).
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.get(url).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let full = self.resolve(url)?;

        if !self.robots.can_fetch(full.as_str()) {
            return Err(FetchError::RobotsDenied(full.to_string()));
        }

        debug!("GET {}", full);
        let resp = self.client.get(full.clone()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: full.to_string(),
                status,
            });
        }
        Ok(resp)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
