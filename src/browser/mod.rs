//! Browser-driven scraper for the script-rendered country search site.
//!
//! The search page renders its results with client-side AJAX and paginates
//! through a page-side `next();` function, so discovery drives a real
//! Chrome process instead of fetching HTML: submit the query, wait a fixed
//! pause for the results to render, collect the result links, and repeat
//! while a next-page control exists. Each landing page is then loaded and
//! its row-labelled table read into one flat record.

use crate::config::BrowserConfig;
use crate::scraper::clean::strip_thousands;
use crate::scraper::SessionStats;
use anyhow::{Context, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use futures::StreamExt;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const SEARCH_INPUT: &str = "#search_term";
const RESULT_LINKS: &str = "#results a";
const NEXT_CONTROL: &str = "#next";
const ROW_ID_PATTERN: &str = r"^places_(\S+?)__row$";

/// Owns the Chrome process for one scrape. The handler task is aborted on
/// drop and `Browser::drop` kills the process, so the browser is released
/// on every exit path; `close()` is the clean shutdown.
pub struct PlacesScraper {
    browser: Browser,
    handler: JoinHandle<()>,
    search_url: String,
    pause: Duration,
    row_id_re: Regex,
}

impl PlacesScraper {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let chrome_config = chromiumoxide::browser::BrowserConfig::builder()
            .request_timeout(Duration::from_secs(30))
            .window_size(1280, 900)
            .arg("--no-first-run")
            .arg("--disable-extensions")
            .arg("--mute-audio")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler: {:?}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler: handler_task,
            search_url: config.search_url.clone(),
            pause: Duration::from_secs(config.pause_secs),
            row_id_re: Regex::new(ROW_ID_PATTERN).context("row id pattern")?,
        })
    }

    /// One full session: search, paginate through the AJAX results, then
    /// read one record per landing page in the caller-supplied field
    /// order.
    pub async fn run(
        &self,
        query: &str,
        fields: &[&str],
    ) -> Result<(Vec<Vec<String>>, SessionStats)> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        self.submit_search(&page, query).await?;
        let links = self.collect_result_links(&page).await?;
        info!("paises: {} result links collected", links.len());

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for url in &links {
            if page.goto(url.as_str()).await.is_err() {
                warn!("paises: skipping {}: navigation failed", url);
                skipped += 1;
                continue;
            }
            sleep(self.pause).await;

            match self.place_fields(&page).await {
                Ok(found) => match record_in_order(&found, fields) {
                    Some(record) => records.push(record),
                    None => {
                        warn!("paises: skipping {}: missing requested field", url);
                        skipped += 1;
                    }
                },
                Err(e) => {
                    warn!("paises: skipping {}: {}", url, e);
                    skipped += 1;
                }
            }
        }

        let stats = SessionStats {
            targets: links.len(),
            records: records.len(),
            skipped,
        };
        Ok((records, stats))
    }

    /// Clean shutdown; the Drop impl covers abnormal exits.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.context("Browser close failed")?;
        self.browser.wait().await.context("Browser wait failed")?;
        self.handler.abort();
        Ok(())
    }

    async fn submit_search(&self, page: &Page, query: &str) -> Result<()> {
        page.goto(self.search_url.as_str())
            .await
            .with_context(|| format!("Cannot open search page {}", self.search_url))?;

        let input = page
            .find_element(SEARCH_INPUT)
            .await
            .context("Search input not found")?;
        input.click().await.context("Cannot focus search input")?;
        input.type_str(query).await.context("Cannot type query")?;
        input
            .press_key("Enter")
            .await
            .context("Cannot submit query")?;
        Ok(())
    }

    /// Collect result hrefs across every AJAX page. A fixed pause before
    /// each read gives the client-side rendering time to finish.
    async fn collect_result_links(&self, page: &Page) -> Result<Vec<String>> {
        let mut links = Vec::new();

        loop {
            sleep(self.pause).await;

            if let Ok(anchors) = page.find_elements(RESULT_LINKS).await {
                for anchor in anchors {
                    if let Ok(Some(href)) = anchor.attribute("href").await {
                        links.push(href);
                    }
                }
            }

            if page.find_element(NEXT_CONTROL).await.is_err() {
                break;
            }
            if page.evaluate("next();").await.is_err() {
                break;
            }
        }
        Ok(links)
    }

    /// Field name → value for every `places_<name>__row` table row of the
    /// current page. The value is the second cell; population loses its
    /// thousands separators.
    async fn place_fields(&self, page: &Page) -> Result<HashMap<String, String>> {
        let mut fields = HashMap::new();

        let rows = page.find_elements("tr").await.context("No table rows")?;
        for row in rows {
            let Ok(Some(id)) = row.attribute("id").await else {
                continue;
            };
            let Some(caps) = self.row_id_re.captures(&id) else {
                continue;
            };
            let name = caps[1].to_string();

            let cells = row.find_elements("td").await.unwrap_or_default();
            let Some(cell) = cells.get(1) else {
                continue;
            };
            let value = cell
                .inner_text()
                .await
                .ok()
                .flatten()
                .unwrap_or_default()
                .trim()
                .to_string();

            fields.insert(name, value);
        }

        if let Some(population) = fields.get_mut("population") {
            *population = strip_thousands(population);
        }
        Ok(fields)
    }
}

impl Drop for PlacesScraper {
    fn drop(&mut self) {
        // Browser::drop kills the Chrome process; the handler task must
        // not outlive it.
        self.handler.abort();
    }
}

/// One flat record in the caller-supplied field order; None if the page
/// lacks any requested field.
fn record_in_order(fields: &HashMap<String, String>, wanted: &[&str]) -> Option<Vec<String>> {
    wanted
        .iter()
        .map(|name| fields.get(*name).cloned())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_pattern() {
        let re = Regex::new(ROW_ID_PATTERN).unwrap();
        assert_eq!(&re.captures("places_iso__row").unwrap()[1], "iso");
        assert_eq!(
            &re.captures("places_country__row").unwrap()[1],
            "country"
        );
        assert!(re.captures("places___row").is_none());
        assert!(re.captures("other_iso__row").is_none());
        assert!(re.captures("xplaces_iso__row").is_none());
    }

    #[test]
    fn test_record_follows_requested_order() {
        let mut fields = HashMap::new();
        fields.insert("country".to_string(), "Zambia".to_string());
        fields.insert("iso".to_string(), "ZM".to_string());
        fields.insert("population".to_string(), "13460305".to_string());

        let record = record_in_order(&fields, &["iso", "country", "population"]).unwrap();
        assert_eq!(record, vec!["ZM", "Zambia", "13460305"]);
    }

    #[test]
    fn test_missing_field_skips_record() {
        let mut fields = HashMap::new();
        fields.insert("country".to_string(), "Zambia".to_string());
        assert!(record_in_order(&fields, &["country", "capital"]).is_none());
    }
}
