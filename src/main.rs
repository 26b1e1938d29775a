mod browser;
mod config;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::scraper::SessionStats;

#[derive(Parser)]
#[command(name = "tabaco-etl", about = "Spanish tobacco market data ETL", version)]
struct Cli {
    /// With no subcommand, both scrapers run one full session each.
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape BOE price resolutions into the prices CSV
    Precios,

    /// Scrape ministry annual sales reports into the sales CSV
    Ventas,

    /// Browser-driven country search scraper
    Paises {
        /// Search string submitted to the places search form
        #[arg(short, long, default_value = "z")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "tabaco_etl=info,warn",
        1 => "tabaco_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        None => {
            let _t = utils::Timer::start("Full run");
            let stats = pipeline.run_all().await?;
            log_session("precios", &stats.precios);
            log_session("ventas", &stats.ventas);
        }

        Some(Command::Precios) => {
            let _t = utils::Timer::start("Price resolutions");
            let stats = pipeline.run_precios().await?;
            log_session("precios", &stats);
        }

        Some(Command::Ventas) => {
            let _t = utils::Timer::start("Annual sales reports");
            let stats = pipeline.run_ventas().await?;
            log_session("ventas", &stats);
        }

        Some(Command::Paises { query }) => {
            let _t = utils::Timer::start("Country search");
            let stats = pipeline.run_paises(&query).await?;
            log_session("paises", &stats);
        }
    }

    Ok(())
}

fn log_session(name: &str, stats: &SessionStats) {
    info!(
        "{}: {} records from {} targets ({} skipped)",
        name,
        utils::fmt_count(stats.records),
        utils::fmt_count(stats.targets),
        utils::fmt_count(stats.skipped)
    );
}
