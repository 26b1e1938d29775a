//! Price-resolution scraper for the BOE legal database.
//!
//! Discovery runs one fixed advanced-search query whose result anchors
//! point at the human-facing document viewer; each link is rewritten to
//! the machine-readable XML rendition of the same resolution. Extraction
//! reads the effective date and the first price table of each document.

use crate::models::{CrawlTarget, PriceRecord, YearWindow};
use crate::scraper::clean::{parse_fecha, parse_precio};
use crate::scraper::http_client::PageFetcher;
use crate::scraper::{Outcome, SkipReason, Source};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Datelike;
use scraper::{Html, Selector};
use tracing::{debug, warn};

const VIEWER_PATH: &str = "../buscar/doc.php";
const XML_PATH: &str = "diario_boe/xml.php";

pub struct PreciosSource {
    search_path: String,
    years: YearWindow,
    link_sel: Selector,
    fecha_sel: Selector,
    table_sel: Selector,
    row_sel: Selector,
    cell_sel: Selector,
}

impl PreciosSource {
    pub fn new(search_path: String, years: YearWindow) -> Result<Self> {
        Ok(Self {
            search_path,
            years,
            link_sel: selector("a.resultado-busqueda-link-defecto")?,
            fecha_sel: selector("fecha_vigencia")?,
            table_sel: selector("table")?,
            row_sel: selector("tr")?,
            cell_sel: selector("p")?,
        })
    }

    /// Search-result hrefs, rewritten from the document viewer to the XML
    /// rendition of the same resolution.
    fn result_targets(&self, html: &str) -> Vec<CrawlTarget> {
        let doc = Html::parse_document(html);
        doc.select(&self.link_sel)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| CrawlTarget::new(href.replace(VIEWER_PATH, XML_PATH)))
            .collect()
    }

    /// One record per two-cell row of the first table. Rows whose price
    /// does not parse are dropped; the rest of the table is kept.
    fn price_records(&self, body: &str) -> Outcome<PriceRecord> {
        let doc = Html::parse_document(body);

        let fecha_text = match doc.select(&self.fecha_sel).next() {
            Some(el) => el.text().collect::<String>(),
            None => return Outcome::Skipped(SkipReason::MissingField("fecha_vigencia")),
        };
        if fecha_text.trim().is_empty() {
            return Outcome::Skipped(SkipReason::MissingField("fecha_vigencia"));
        }

        let Some(fecha) = parse_fecha(&fecha_text) else {
            return Outcome::Skipped(SkipReason::MissingField("fecha_vigencia"));
        };
        if !self.years.contains(fecha.year()) {
            return Outcome::Skipped(SkipReason::YearOutOfRange(fecha.year()));
        }

        // Only the first table: it lists Peninsula e Illes Balears, the
        // area this dataset covers. Later tables are other areas.
        let Some(table) = doc.select(&self.table_sel).next() else {
            return Outcome::Extracted(vec![]);
        };

        let mut records = Vec::new();
        for row in table.select(&self.row_sel) {
            let cells: Vec<String> = row
                .select(&self.cell_sel)
                .map(|p| p.text().collect::<String>().trim().to_string())
                .collect();

            if cells.len() != 2 {
                continue;
            }

            match parse_precio(&cells[1]) {
                Some(precio) => records.push(PriceRecord {
                    marca: cells[0].clone(),
                    fecha,
                    precio,
                }),
                None => debug!("dropping row without price: {:?}", cells[0]),
            }
        }
        Outcome::Extracted(records)
    }
}

#[async_trait]
impl Source for PreciosSource {
    type Record = PriceRecord;

    fn name(&self) -> &'static str {
        "precios"
    }

    async fn discover(&self, fetcher: &PageFetcher) -> Result<Vec<CrawlTarget>> {
        let html = match fetcher.fetch_text(&self.search_path).await {
            Ok(html) => html,
            Err(e) => {
                warn!("precios: search page unavailable: {}", e);
                return Ok(vec![]);
            }
        };
        Ok(self.result_targets(&html))
    }

    async fn extract(
        &self,
        _fetcher: &PageFetcher,
        body: &str,
        _target: &CrawlTarget,
    ) -> Outcome<Self::Record> {
        self.price_records(body)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("selector {}: {:?}", css, e))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn source() -> PreciosSource {
        PreciosSource::new("buscar/test".into(), YearWindow::new(2005, 2024)).unwrap()
    }

    fn resolution(fecha: &str, tables: &str) -> String {
        format!(
            "<documento><metadatos><fecha_vigencia>{}</fecha_vigencia></metadatos>\
             <texto>{}</texto></documento>",
            fecha, tables
        )
    }

    fn extracted(outcome: Outcome<PriceRecord>) -> Vec<PriceRecord> {
        match outcome {
            Outcome::Extracted(records) => records,
            Outcome::Skipped(reason) => panic!("unexpected skip: {}", reason),
        }
    }

    #[test]
    fn test_single_two_cell_row() {
        let body = resolution(
            "2020-03-01",
            "<table><tr><td><p>MARCA X</p></td><td><p>1,23</p></td></tr></table>",
        );
        let records = extracted(source().price_records(&body));
        assert_eq!(
            records,
            vec![PriceRecord {
                marca: "MARCA X".into(),
                fecha: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
                precio: 1.23,
            }]
        );
    }

    #[test]
    fn test_blank_fecha_skips_document() {
        let body = resolution(
            "  ",
            "<table><tr><td><p>MARCA X</p></td><td><p>1,23</p></td></tr></table>",
        );
        match source().price_records(&body) {
            Outcome::Skipped(SkipReason::MissingField("fecha_vigencia")) => {}
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fecha_skips_document() {
        let body = "<documento><texto><table><tr><td><p>A</p></td>\
                    <td><p>1,00</p></td></tr></table></texto></documento>";
        match source().price_records(body) {
            Outcome::Skipped(SkipReason::MissingField("fecha_vigencia")) => {}
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_year_outside_window_skips_document() {
        let body = resolution(
            "2004-12-31",
            "<table><tr><td><p>A</p></td><td><p>1,00</p></td></tr></table>",
        );
        match source().price_records(&body) {
            Outcome::Skipped(SkipReason::YearOutOfRange(2004)) => {}
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_price_row_dropped_siblings_kept() {
        let body = resolution(
            "2020-03-01",
            "<table>\
             <tr><td><p>BUENA</p></td><td><p>2,50</p></td></tr>\
             <tr><td><p>MALA</p></td><td><p>(1)</p></td></tr>\
             <tr><td><p>OTRA</p></td><td><p>3,00</p></td></tr>\
             </table>",
        );
        let records = extracted(source().price_records(&body));
        let marcas: Vec<&str> = records.iter().map(|r| r.marca.as_str()).collect();
        assert_eq!(marcas, vec!["BUENA", "OTRA"]);
    }

    #[test]
    fn test_second_table_ignored() {
        let body = resolution(
            "2020-03-01",
            "<table><tr><td><p>PENINSULA</p></td><td><p>1,00</p></td></tr></table>\
             <table><tr><td><p>CEUTA</p></td><td><p>0,90</p></td></tr></table>",
        );
        let records = extracted(source().price_records(&body));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].marca, "PENINSULA");
    }

    #[test]
    fn test_rows_without_two_cells_ignored() {
        let body = resolution(
            "2020-03-01",
            "<table>\
             <tr><td><p>CABECERA</p></td></tr>\
             <tr><td><p>A</p></td><td><p>1,10</p></td><td><p>extra</p></td></tr>\
             <tr><td><p>B</p></td><td><p>2,20</p></td></tr>\
             </table>",
        );
        let records = extracted(source().price_records(&body));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].marca, "B");
    }

    #[test]
    fn test_viewer_links_rewritten_to_xml() {
        let html = "<div class=\"listado\">\
            <a class=\"resultado-busqueda-link-defecto\" \
               href=\"../buscar/doc.php?id=BOE-A-2020-3121\">Resolución</a>\
            <a class=\"otro-enlace\" href=\"../buscar/doc.php?id=BOE-A-2020-9999\">No</a>\
            </div>";
        let targets = source().result_targets(html);
        assert_eq!(
            targets,
            vec![CrawlTarget::new("diario_boe/xml.php?id=BOE-A-2020-3121")]
        );
    }
}
