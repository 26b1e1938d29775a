//! Annual sales scraper for the tobacco market statistics of the Ministry
//! of Finance.
//!
//! Discovery collects the "Resumen anual de ventas ... <year>" links from
//! the statistics page. Each report page links one spreadsheet per unit
//! ("Comunidades (euros)" / "Comunidades (unidades)"); every spreadsheet
//! holds one row per first-level region and one column per product
//! category. The sheet geometry changed with the 2015 reports, so the
//! header offset and column window are selected from a year-keyed table.

use crate::models::{CrawlTarget, Labor, SalesRecord, Unidad, YearWindow};
use crate::scraper::clean::{cell_text, parse_total};
use crate::scraper::http_client::PageFetcher;
use crate::scraper::{Outcome, SkipReason, Source};
use anyhow::Result;
use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use regex::Regex;
use scraper::{Html, Selector};
use std::io::Cursor;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::warn;

// ── Sheet geometry ────────────────────────────────────────────────────────────

/// Where the data sits in a report spreadsheet: 0-based header row and
/// inclusive column window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub header_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

/// Report format by year. The ministry reshaped the sheets starting with
/// the 2015 reports; later changes get a new row here.
const LAYOUTS: &[(RangeInclusive<i32>, SheetLayout)] = &[
    (
        2005..=2014,
        SheetLayout { header_row: 3, first_col: 0, last_col: 4 }, // A:E
    ),
    (
        2015..=i32::MAX,
        SheetLayout { header_row: 5, first_col: 1, last_col: 5 }, // B:F
    ),
];

pub fn layout_for_year(year: i32) -> Option<SheetLayout> {
    LAYOUTS
        .iter()
        .find(|(range, _)| range.contains(&year))
        .map(|(_, layout)| *layout)
}

/// One row per region; the region reported separately is not in the
/// window.
const MAX_REGION_ROWS: u32 = 16;

const REGION_COLUMN: &str = "COMUNIDAD";

// ── Sheet errors ──────────────────────────────────────────────────────────────

/// Why one report spreadsheet was rejected. Failures are per report and
/// never abort the session.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("cannot decode workbook: {0}")]
    Decode(#[from] calamine::Error),

    #[error("workbook has no sheets")]
    NoSheet,

    #[error("header row lacks column {0}")]
    MissingColumn(&'static str),

    #[error("non-numeric {0} total for {1}")]
    BadCell(&'static str, String),
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct VentasSource {
    stats_path: String,
    years: YearWindow,
    resumen_re: Regex,
    comunidades_re: Regex,
    anchor_sel: Selector,
}

impl VentasSource {
    pub fn new(stats_path: String, years: YearWindow) -> Result<Self> {
        Ok(Self {
            stats_path,
            years,
            resumen_re: Regex::new(r"^Resumen anual de ventas.+?(\d+)")?,
            comunidades_re: Regex::new(r"^Comunidades \(([^)]+)")?,
            anchor_sel: Selector::parse("a")
                .map_err(|e| anyhow::anyhow!("anchor selector: {:?}", e))?,
        })
    }

    /// Annual report links whose trailing year falls inside the accepted
    /// window. Out-of-window anchors yield no target at all.
    fn annual_report_targets(&self, html: &str) -> Vec<CrawlTarget> {
        let doc = Html::parse_document(html);
        let mut targets = Vec::new();

        for anchor in doc.select(&self.anchor_sel) {
            let text = anchor.text().collect::<String>();
            let Some(caps) = self.resumen_re.captures(text.trim()) else {
                continue;
            };
            let Ok(year) = caps[1].parse::<i32>() else {
                continue;
            };
            if !self.years.contains(year) {
                continue;
            }
            if let Some(href) = anchor.value().attr("href") {
                targets.push(CrawlTarget::with_year(href, year));
            }
        }
        targets
    }

    /// Per-unit spreadsheet links of one report page.
    fn report_sheets(&self, html: &str) -> Vec<(String, Unidad)> {
        let doc = Html::parse_document(html);
        let mut sheets = Vec::new();

        for anchor in doc.select(&self.anchor_sel) {
            let text = anchor.text().collect::<String>();
            let Some(caps) = self.comunidades_re.captures(text.trim()) else {
                continue;
            };
            let unidad = Unidad::from_label(&caps[1]);
            if let Some(href) = anchor.value().attr("href") {
                sheets.push((href.to_string(), unidad));
            }
        }
        sheets
    }
}

#[async_trait]
impl Source for VentasSource {
    type Record = SalesRecord;

    fn name(&self) -> &'static str {
        "ventas"
    }

    async fn discover(&self, fetcher: &PageFetcher) -> Result<Vec<CrawlTarget>> {
        let html = match fetcher.fetch_text(&self.stats_path).await {
            Ok(html) => html,
            Err(e) => {
                warn!("ventas: statistics page unavailable: {}", e);
                return Ok(vec![]);
            }
        };
        Ok(self.annual_report_targets(&html))
    }

    async fn extract(
        &self,
        fetcher: &PageFetcher,
        body: &str,
        target: &CrawlTarget,
    ) -> Outcome<Self::Record> {
        let Some(year) = target.year else {
            return Outcome::Skipped(SkipReason::MissingField("year"));
        };
        if !self.years.contains(year) {
            return Outcome::Skipped(SkipReason::YearOutOfRange(year));
        }
        let Some(layout) = layout_for_year(year) else {
            return Outcome::Skipped(SkipReason::YearOutOfRange(year));
        };

        let sheets = self.report_sheets(body);

        let mut records = Vec::new();
        for (href, unidad) in sheets {
            let bytes = match fetcher.fetch_bytes(&href).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("ventas {}: sheet {} unavailable: {}", year, href, e);
                    continue;
                }
            };
            match workbook_sales(&bytes, year, unidad, layout) {
                Ok(mut found) => records.append(&mut found),
                Err(e) => warn!("ventas {}: sheet {} rejected: {}", year, href, e),
            }
        }
        Outcome::Extracted(records)
    }
}

// ── Spreadsheet extraction ────────────────────────────────────────────────────

fn workbook_sales(
    bytes: &[u8],
    year: i32,
    unidad: Unidad,
    layout: SheetLayout,
) -> Result<Vec<SalesRecord>, SheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoSheet)??;
    range_sales(&range, year, unidad, layout)
}

/// Read the fixed window: the header row names the region column and the
/// four product categories; the following rows (at most one window of
/// regions) each yield one record per category. Any malformed cell
/// rejects the whole sheet.
fn range_sales(
    range: &Range<Data>,
    year: i32,
    unidad: Unidad,
    layout: SheetLayout,
) -> Result<Vec<SalesRecord>, SheetError> {
    let header_col = |name: &'static str| -> Result<u32, SheetError> {
        (layout.first_col..=layout.last_col)
            .find(|&col| {
                range
                    .get_value((layout.header_row, col))
                    .and_then(cell_text)
                    .is_some_and(|text| text.trim().eq_ignore_ascii_case(name))
            })
            .ok_or(SheetError::MissingColumn(name))
    };

    let region_col = header_col(REGION_COLUMN)?;
    let mut labor_cols = Vec::with_capacity(Labor::ALL.len());
    for labor in Labor::ALL {
        labor_cols.push((labor, header_col(labor.header())?));
    }

    let first_row = layout.header_row + 1;
    let mut records = Vec::new();

    for row in first_row..first_row + MAX_REGION_ROWS {
        let Some(comunidad) = range.get_value((row, region_col)).and_then(cell_text) else {
            break; // sheet ended before the window filled
        };

        for &(labor, col) in &labor_cols {
            let cell = range.get_value((row, col)).unwrap_or(&Data::Empty);
            let total = parse_total(cell)
                .ok_or_else(|| SheetError::BadCell(labor.header(), comunidad.clone()))?;
            records.push(SalesRecord {
                comunidad: comunidad.clone(),
                anyo: year,
                labor,
                unidad,
                total,
            });
        }
    }
    Ok(records)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> VentasSource {
        VentasSource::new("stats".into(), YearWindow::new(2005, 2018)).unwrap()
    }

    #[test]
    fn test_layout_changes_at_2015() {
        assert_eq!(
            layout_for_year(2014),
            Some(SheetLayout { header_row: 3, first_col: 0, last_col: 4 })
        );
        assert_eq!(
            layout_for_year(2015),
            Some(SheetLayout { header_row: 5, first_col: 1, last_col: 5 })
        );
        assert_eq!(layout_for_year(2005).unwrap().header_row, 3);
        assert_eq!(layout_for_year(2030).unwrap().header_row, 5);
        assert_eq!(layout_for_year(2004), None);
    }

    #[test]
    fn test_year_window_filter_is_boundary_exact() {
        let html = "\
            <a href=\"/r2004\">Resumen anual de ventas de tabaco 2004</a>\
            <a href=\"/r2005\">Resumen anual de ventas de tabaco 2005</a>\
            <a href=\"/r2018\">Resumen anual de ventas de tabaco 2018</a>\
            <a href=\"/r2019\">Resumen anual de ventas de tabaco 2019</a>\
            <a href=\"/otros\">Otras estadísticas 2010</a>";
        let targets = source().annual_report_targets(html);
        assert_eq!(
            targets,
            vec![
                CrawlTarget::with_year("/r2005", 2005),
                CrawlTarget::with_year("/r2018", 2018),
            ]
        );
    }

    #[test]
    fn test_unit_labels_canonicalized() {
        let html = "\
            <a href=\"/euros.xls\">Comunidades (euros)</a>\
            <a href=\"/unidades.xls\">Comunidades (unidades)</a>\
            <a href=\"/prov.xls\">Provincias (euros)</a>";
        let sheets = source().report_sheets(html);
        assert_eq!(
            sheets,
            vec![
                ("/euros.xls".to_string(), Unidad::Euros),
                ("/unidades.xls".to_string(), Unidad::Cantidad),
            ]
        );
    }

    fn sheet(layout: SheetLayout, rows: &[(&str, [f64; 4])]) -> Range<Data> {
        let mut range = Range::new((0, 0), (40, 10));
        let headers = ["CIGARRILLOS", "CIGARROS", "P. LIAR", "P. PIPA"];
        range.set_value(
            (layout.header_row, layout.first_col),
            Data::String(REGION_COLUMN.into()),
        );
        for (i, h) in headers.iter().enumerate() {
            range.set_value(
                (layout.header_row, layout.first_col + 1 + i as u32),
                Data::String((*h).into()),
            );
        }
        for (r, (region, totals)) in rows.iter().enumerate() {
            let row = layout.header_row + 1 + r as u32;
            range.set_value((row, layout.first_col), Data::String((*region).into()));
            for (c, total) in totals.iter().enumerate() {
                range.set_value(
                    (row, layout.first_col + 1 + c as u32),
                    Data::Float(*total),
                );
            }
        }
        range
    }

    #[test]
    fn test_madrid_2016_yields_four_records() {
        let layout = layout_for_year(2016).unwrap();
        let range = sheet(layout, &[("MADRID", [100.0, 50.0, 10.0, 5.0])]);
        let records = range_sales(&range, 2016, Unidad::Euros, layout).unwrap();

        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.comunidad == "MADRID"));
        assert!(records.iter().all(|r| r.anyo == 2016));
        assert!(records.iter().all(|r| r.unidad == Unidad::Euros));
        let by_labor: Vec<(Labor, i64)> =
            records.iter().map(|r| (r.labor, r.total)).collect();
        assert_eq!(
            by_labor,
            vec![
                (Labor::Cigarrillos, 100),
                (Labor::Cigarros, 50),
                (Labor::PicaduraLiar, 10),
                (Labor::PicaduraPipa, 5),
            ]
        );
    }

    #[test]
    fn test_old_layout_alignment() {
        let layout = layout_for_year(2010).unwrap();
        assert_eq!(layout.first_col, 0);
        let range = sheet(layout, &[("GALICIA", [7.0, 6.0, 5.0, 4.0])]);
        let records = range_sales(&range, 2010, Unidad::Cantidad, layout).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].comunidad, "GALICIA");
        assert_eq!(records[0].total, 7);
    }

    #[test]
    fn test_window_capped_at_sixteen_rows() {
        let layout = layout_for_year(2016).unwrap();
        let rows: Vec<(String, [f64; 4])> = (0..20)
            .map(|i| (format!("REGION{i}"), [1.0, 2.0, 3.0, 4.0]))
            .collect();
        let borrowed: Vec<(&str, [f64; 4])> =
            rows.iter().map(|(name, t)| (name.as_str(), *t)).collect();
        let range = sheet(layout, &borrowed);
        let records = range_sales(&range, 2016, Unidad::Euros, layout).unwrap();
        assert_eq!(records.len(), 16 * 4);
    }

    #[test]
    fn test_bad_cell_rejects_whole_sheet() {
        let layout = layout_for_year(2016).unwrap();
        let mut range = sheet(
            layout,
            &[("MADRID", [1.0, 2.0, 3.0, 4.0]), ("ARAGON", [1.0, 2.0, 3.0, 4.0])],
        );
        range.set_value(
            (layout.header_row + 2, layout.first_col + 1),
            Data::String("n.d.".into()),
        );
        match range_sales(&range, 2016, Unidad::Euros, layout) {
            Err(SheetError::BadCell("CIGARRILLOS", region)) => assert_eq!(region, "ARAGON"),
            other => panic!("expected BadCell, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_missing_region_column_rejected() {
        let layout = layout_for_year(2016).unwrap();
        let mut range = Range::new((0, 0), (40, 10));
        range.set_value((layout.header_row, layout.first_col), Data::String("ZONA".into()));
        match range_sales(&range, 2016, Unidad::Euros, layout) {
            Err(SheetError::MissingColumn(REGION_COLUMN)) => {}
            other => panic!("expected MissingColumn, got {:?}", other.map(|r| r.len())),
        }
    }
}
