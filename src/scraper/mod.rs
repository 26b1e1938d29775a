pub mod clean;
pub mod http_client;
pub mod precios;
pub mod robots;
pub mod ventas;

use crate::models::{CrawlTarget, TableRecord};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use self::http_client::PageFetcher;

// ── Extraction outcome ────────────────────────────────────────────────────────

/// Why a fetched document produced no records. Skips are values so the
/// session can count them instead of swallowing exceptions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("document lacks a usable {0}")]
    MissingField(&'static str),

    #[error("year {0} outside the accepted window")]
    YearOutOfRange(i32),
}

/// Result of extracting one fetched document.
#[derive(Debug)]
pub enum Outcome<T> {
    Extracted(Vec<T>),
    Skipped(SkipReason),
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// One scrape source: link discovery plus per-document record extraction.
/// The session runner owns everything in between.
#[async_trait]
pub trait Source: Send + Sync {
    type Record: TableRecord + Send;

    fn name(&self) -> &'static str;

    /// Produce the set of candidate document URLs to analyze.
    async fn discover(&self, fetcher: &PageFetcher) -> Result<Vec<CrawlTarget>>;

    /// Emit records for one fetched document body.
    async fn extract(
        &self,
        fetcher: &PageFetcher,
        body: &str,
        target: &CrawlTarget,
    ) -> Outcome<Self::Record>;
}

// ── Session runner ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub targets: usize,
    pub records: usize,
    pub skipped: usize,
}

/// Runs one full scrape session: discover → fetch/extract per target →
/// accumulate. Targets are processed strictly sequentially and failures
/// are isolated per target; only configuration errors propagate.
pub async fn run_session<S: Source>(
    source: &S,
    fetcher: &PageFetcher,
) -> Result<(Vec<S::Record>, SessionStats)> {
    let targets = source.discover(fetcher).await?;
    info!("{}: {} targets discovered", source.name(), targets.len());

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for target in &targets {
        let body = match fetcher.fetch_text(&target.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("{}: skipping {}: {}", source.name(), target.url, e);
                skipped += 1;
                continue;
            }
        };

        match source.extract(fetcher, &body, target).await {
            Outcome::Extracted(mut found) => records.append(&mut found),
            Outcome::Skipped(reason) => {
                warn!("{}: skipping {}: {}", source.name(), target.url, reason);
                skipped += 1;
            }
        }
    }

    let stats = SessionStats {
        targets: targets.len(),
        records: records.len(),
        skipped,
    };
    info!(
        "{}: {} records from {} targets ({} skipped)",
        source.name(),
        stats.records,
        stats.targets,
        stats.skipped
    );
    Ok((records, stats))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
