use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Price resolution record ───────────────────────────────────────────────────

/// One price change for one brand, taken from a BOE resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRecord {
    pub marca: String,
    pub fecha: NaiveDate,
    pub precio: f64,
}

// ── Annual sales record ───────────────────────────────────────────────────────

/// Tobacco product category as labelled in the ministry spreadsheets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Labor {
    Cigarrillos,
    Cigarros,
    PicaduraLiar,
    PicaduraPipa,
}

impl Labor {
    pub const ALL: [Labor; 4] = [
        Labor::Cigarrillos,
        Labor::Cigarros,
        Labor::PicaduraLiar,
        Labor::PicaduraPipa,
    ];

    /// Column header exactly as it appears in the spreadsheets.
    pub fn header(&self) -> &'static str {
        match self {
            Labor::Cigarrillos => "CIGARRILLOS",
            Labor::Cigarros => "CIGARROS",
            Labor::PicaduraLiar => "P. LIAR",
            Labor::PicaduraPipa => "P. PIPA",
        }
    }
}

/// Unit of the report: euros or physical units sold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Unidad {
    Euros,
    Cantidad,
}

impl Unidad {
    /// The reports label the currency variant literally "euros"; every
    /// other label means units sold.
    pub fn from_label(label: &str) -> Self {
        if label.trim() == "euros" {
            Unidad::Euros
        } else {
            Unidad::Cantidad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unidad::Euros => "euros",
            Unidad::Cantidad => "cantidad",
        }
    }
}

/// One region × year × product category × unit total from an annual report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesRecord {
    pub comunidad: String,
    pub anyo: i32,
    pub labor: Labor,
    pub unidad: Unidad,
    pub total: i64,
}

// ── Crawl target ──────────────────────────────────────────────────────────────

/// A URL produced by discovery, consumed once by extraction. The year is
/// context needed to interpret the fetched document (sales reports only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    pub year: Option<i32>,
}

impl CrawlTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), year: None }
    }

    pub fn with_year(url: impl Into<String>, year: i32) -> Self {
        Self { url: url.into(), year: Some(year) }
    }
}

// ── Accepted year window ──────────────────────────────────────────────────────

/// Inclusive range of report years accepted by both scrapers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub min: i32,
    pub max: i32,
}

impl YearWindow {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }
}

// ── CSV row shape ─────────────────────────────────────────────────────────────

/// Flat row serialization for the delimited output file. The field order
/// must match the column header the writer was built with.
pub trait TableRecord {
    fn fields(&self) -> Vec<String>;
}

impl TableRecord for PriceRecord {
    fn fields(&self) -> Vec<String> {
        vec![
            self.marca.clone(),
            self.fecha.format("%Y-%m-%d").to_string(),
            self.precio.to_string(),
        ]
    }
}

impl TableRecord for SalesRecord {
    fn fields(&self) -> Vec<String> {
        vec![
            self.comunidad.clone(),
            self.anyo.to_string(),
            self.labor.header().to_string(),
            self.unidad.as_str().to_string(),
            self.total.to_string(),
        ]
    }
}

impl TableRecord for Vec<String> {
    fn fields(&self) -> Vec<String> {
        self.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
