//! Pipeline orchestrator: ties each scrape session to its output file.
//!
//! One run = one session per configured source, strictly sequential:
//! discover targets, fetch and extract each target in turn, then write
//! the accumulated records exactly once. Each site gets its own fetcher
//! so robots rules are loaded once per origin.

use crate::browser::PlacesScraper;
use crate::config::AppConfig;
use crate::scraper::http_client::PageFetcher;
use crate::scraper::precios::PreciosSource;
use crate::scraper::ventas::VentasSource;
use crate::scraper::{run_session, SessionStats};
use crate::storage::TableWriter;
use anyhow::{Context, Result};
use tracing::info;

pub const PRECIOS_COLUMNS: &[&str] = &["Marca", "Fecha", "Precio"];
pub const VENTAS_COLUMNS: &[&str] = &["Comunidad", "Anyo", "Labor", "Unidad", "Total"];
pub const PAISES_COLUMNS: &[&str] = &["country", "iso", "capital", "population"];

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug)]
pub struct RunStats {
    pub precios: SessionStats,
    pub ventas: SessionStats,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Default run: one full session of each scraper.
    pub async fn run_all(&self) -> Result<RunStats> {
        info!("=== Step 1: BOE price resolutions ===");
        let precios = self.run_precios().await?;

        info!("=== Step 2: Ministry annual sales reports ===");
        let ventas = self.run_ventas().await?;

        Ok(RunStats { precios, ventas })
    }

    pub async fn run_precios(&self) -> Result<SessionStats> {
        let fetcher = PageFetcher::new(&self.config.http, &self.config.sources.boe_base_url)
            .await
            .context("Failed to build BOE fetcher")?;
        let source = PreciosSource::new(
            self.config.sources.boe_search_path.clone(),
            self.config.sources.year_window(),
        )?;

        let (records, stats) = run_session(&source, &fetcher).await?;

        TableWriter::new(self.config.output.precios_path(), PRECIOS_COLUMNS)
            .write(&records)
            .context("Failed to write price records")?;
        Ok(stats)
    }

    pub async fn run_ventas(&self) -> Result<SessionStats> {
        let fetcher = PageFetcher::new(&self.config.http, &self.config.sources.hacienda_base_url)
            .await
            .context("Failed to build ministry fetcher")?;
        let source = VentasSource::new(
            self.config.sources.hacienda_stats_path.clone(),
            self.config.sources.year_window(),
        )?;

        let (records, stats) = run_session(&source, &fetcher).await?;

        TableWriter::new(self.config.output.ventas_path(), VENTAS_COLUMNS)
            .write(&records)
            .context("Failed to write sales records")?;
        Ok(stats)
    }

    /// Browser-driven variant. The browser is closed on every exit path:
    /// explicitly here, and by the scraper's Drop if `run` fails first.
    pub async fn run_paises(&self, query: &str) -> Result<SessionStats> {
        let scraper = PlacesScraper::launch(&self.config.browser)
            .await
            .context("Failed to launch browser")?;

        let outcome = scraper.run(query, PAISES_COLUMNS).await;
        let closed = scraper.close().await;

        let (records, stats) = outcome?;
        closed?;

        TableWriter::new(self.config.output.paises_path(), PAISES_COLUMNS)
            .write(&records)
            .context("Failed to write country records")?;
        Ok(stats)
    }
}
