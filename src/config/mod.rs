use anyhow::Result;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::YearWindow;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Entry URLs and accepted report years for the two scrapers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default = "default_boe_base_url")]
    pub boe_base_url: String,

    #[serde(default = "default_boe_search_path")]
    pub boe_search_path: String,

    #[serde(default = "default_hacienda_base_url")]
    pub hacienda_base_url: String,

    #[serde(default = "default_hacienda_stats_path")]
    pub hacienda_stats_path: String,

    #[serde(default = "default_min_year")]
    pub min_year: i32,
}

/// Browser-driven scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
}

/// Output file configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_precios_file")]
    pub precios_file: String,

    #[serde(default = "default_ventas_file")]
    pub ventas_file: String,

    #[serde(default = "default_paises_file")]
    pub paises_file: String,
}

impl SourcesConfig {
    /// Accepted report years: [min_year, last full calendar year].
    pub fn year_window(&self) -> YearWindow {
        let current = chrono::Utc::now().year();
        YearWindow::new(self.min_year, current - 1)
    }
}

impl OutputConfig {
    pub fn precios_path(&self) -> PathBuf {
        self.dir.join(&self.precios_file)
    }

    pub fn ventas_path(&self) -> PathBuf {
        self.dir.join(&self.ventas_file)
    }

    pub fn paises_path(&self) -> PathBuf {
        self.dir.join(&self.paises_file)
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:69.0) Gecko/20100101 Firefox/69.0".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_boe_base_url() -> String {
    "https://www.boe.es".to_string()
}
fn default_boe_search_path() -> String {
    // Advanced legislation query: resolutions of the Comisionado para el
    // Mercado de Tabacos on the subject "Tabaco Precios".
    "buscar/legislacion_ava.php?campo%5B0%5D=ID_SRC&dato%5B0%5D=&operador%5B0%5D=and\
     &campo%5B1%5D=NOVIGENTE&operador%5B1%5D=and&campo%5B2%5D=CONSO&operador%5B3%5D=and\
     &campo%5B3%5D=TIT&dato%5B3%5D=comisionado+para+el+mercado+de+tabacos&operador%5B3%5D=and\
     &campo%5B4%5D=ID_RNG&dato%5B4%5D=1370&operador%5B4%5D=and\
     &campo%5B5%5D=ID_DEM&dato%5B5%5D=&operador%5B5%5D=and\
     &campo%5B6%5D=MAT&dato%5B6%5D=Tabaco+Precios&operador%5B6%5D=and\
     &campo%5B7%5D=DOC&dato%5B7%5D=&operador%5B7%5D=and\
     &campo%5B8%5D=NBO&dato%5B8%5D=&operador%5B8%5D=and\
     &campo%5B9%5D=NOF&dato%5B9%5D=&operador%5B9%5D=and\
     &campo%5B10%5D=DOC&dato%5B10%5D=&operador%5B11%5D=and\
     &campo%5B11%5D=FPU&dato%5B11%5D%5B0%5D=2002-01-01&dato%5B11%5D%5B1%5D=2019-10-14\
     &operador%5B12%5D=and&campo%5B12%5D=FAP&dato%5B12%5D%5B0%5D=&dato%5B12%5D%5B1%5D=\
     &page_hits=2000&sort_field%5B0%5D=PESO&sort_order%5B0%5D=desc\
     &sort_field%5B1%5D=ref&sort_order%5B1%5D=asc&accion=Buscar"
        .to_string()
}
fn default_hacienda_base_url() -> String {
    "https://www.hacienda.gob.es".to_string()
}
fn default_hacienda_stats_path() -> String {
    "/es-ES/Areas%20Tematicas/CMTabacos/Paginas/EstadisticassobreelMercadodeTabacos.aspx"
        .to_string()
}
fn default_min_year() -> i32 {
    2005
}
fn default_search_url() -> String {
    "http://example.webscraping.com/places/default/search".to_string()
}
fn default_pause_secs() -> u64 {
    2
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_precios_file() -> String {
    "TabacoPrecios.csv".to_string()
}
fn default_ventas_file() -> String {
    "TabacoVentas.csv".to_string()
}
fn default_paises_file() -> String {
    "Countries.csv".to_string()
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TABACO").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                user_agent: default_user_agent(),
                timeout_secs: default_timeout_secs(),
            },
            sources: SourcesConfig {
                boe_base_url: default_boe_base_url(),
                boe_search_path: default_boe_search_path(),
                hacienda_base_url: default_hacienda_base_url(),
                hacienda_stats_path: default_hacienda_stats_path(),
                min_year: default_min_year(),
            },
            browser: BrowserConfig {
                search_url: default_search_url(),
                pause_secs: default_pause_secs(),
            },
            output: OutputConfig {
                dir: default_output_dir(),
                precios_file: default_precios_file(),
                ventas_file: default_ventas_file(),
                paises_file: default_paises_file(),
            },
        }
    }
}
