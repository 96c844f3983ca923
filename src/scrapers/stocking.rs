//! Per-lake stocking-table fetcher.
//!
//! Lake detail pages fill their stocking table in after load, so each
//! fetch renders the page through a [`PageRenderer`] and then parses the
//! resulting HTML. The target table is located by its caption text; its
//! header texts become the keys of each row's [`EventRecord`].
//!
//! A page without the captioned table is a successful empty result
//! ([`Fetched::NoContent`]; many lakes simply have no stocking history),
//! while render failures are transient and surface as `Err` for the
//! dispatcher to retry.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::debug;

use crate::fetch::{FetchTask, Fetched};
use crate::models::{EventRecord, Lake};
use crate::render::PageRenderer;

/// Caption identifying the stocking-history table.
pub const STOCKING_CAPTION: &str = "10 most recent fish plants in this lake";

/// Readiness selector: the table body holds a row that is not the
/// loading placeholder.
pub const STOCKING_READY_SELECTOR: &str = "tbody#dataRows tr:not(:has(div.st-loading))";

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static CAPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("caption").unwrap());
static HEADERS: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").unwrap());
static BODY_ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// [`FetchTask`] over lakes: render the detail page, scrape the table.
pub struct StockingFetcher<R> {
    renderer: R,
}

impl<R> StockingFetcher<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }
}

impl<R: PageRenderer> FetchTask for StockingFetcher<R> {
    type Item = Lake;
    type Output = Vec<EventRecord>;

    async fn fetch(
        &self,
        lake: &Lake,
    ) -> Result<Fetched<Vec<EventRecord>>, Box<dyn Error + Send + Sync>> {
        debug!(item = %lake.label(), url = %lake.url, "Rendering lake page");
        let html = self.renderer.render(&lake.url).await?;

        match parse_stocking_table(&html) {
            Some(rows) => {
                debug!(item = %lake.label(), count = rows.len(), "Scraped stocking table");
                Ok(Fetched::Rows(rows))
            }
            None => Ok(Fetched::NoContent),
        }
    }
}

/// Find the captioned stocking table and map its body rows to records
/// keyed by header text. `None` when no such table exists on the page.
pub fn parse_stocking_table(html: &str) -> Option<Vec<EventRecord>> {
    let document = Html::parse_document(html);

    for table in document.select(&TABLE) {
        let matches = table
            .select(&CAPTION)
            .any(|caption| caption.text().collect::<String>().trim() == STOCKING_CAPTION);
        if !matches {
            continue;
        }

        let headers: Vec<String> = table
            .select(&HEADERS)
            .map(|th| th.text().collect::<String>().trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for row in table.select(&BODY_ROWS) {
            let cells: Vec<String> = row
                .select(&CELLS)
                .map(|td| td.text().collect::<String>().trim().to_string())
                .collect();
            // Placeholder rows render without data cells.
            if cells.is_empty() {
                continue;
            }

            let record: EventRecord = headers
                .iter()
                .zip(cells)
                .map(|(header, cell)| (header.clone(), cell.into()))
                .collect();
            rows.push(record);
        }
        return Some(rows);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOCKED_PAGE: &str = r#"
        <html><body>
          <table>
            <caption>Lake facts</caption>
            <tbody><tr><td>Elevation</td><td>4963 feet</td></tr></tbody>
          </table>
          <table>
            <caption>10 most recent fish plants in this lake</caption>
            <thead>
              <tr>
                <th>Stock Date</th><th>Species</th><th>Number Released</th>
                <th>Fish per Pound</th><th>Facility</th>
              </tr>
            </thead>
            <tbody id="dataRows">
              <tr>
                <td>July 1, 2025</td><td>Rainbow</td><td>3,000</td>
                <td>1200.0</td><td>Arlington Hatchery</td>
              </tr>
              <tr>
                <td>June 12, 2024</td><td>Cutthroat</td><td>1,500</td>
                <td>950.0</td><td>Arlington Hatchery</td>
              </tr>
            </tbody>
          </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_stocking_table_rows_keyed_by_headers() {
        let rows = parse_stocking_table(STOCKED_PAGE).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.get("Stock Date").and_then(|v| v.as_str()), Some("July 1, 2025"));
        assert_eq!(first.get("Species").and_then(|v| v.as_str()), Some("Rainbow"));
        assert_eq!(first.get("Number Released").and_then(|v| v.as_str()), Some("3,000"));
        assert_eq!(first.get("Facility").and_then(|v| v.as_str()), Some("Arlington Hatchery"));

        // Key order follows the table's column order.
        let keys: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Stock Date", "Species", "Number Released", "Fish per Pound", "Facility"]
        );
    }

    #[test]
    fn test_page_without_captioned_table_is_no_content() {
        let html = r#"
            <html><body>
              <table>
                <caption>Lake facts</caption>
                <tbody><tr><td>Elevation</td><td>4963 feet</td></tr></tbody>
              </table>
            </body></html>
        "#;
        assert!(parse_stocking_table(html).is_none());
    }

    #[test]
    fn test_empty_table_yields_zero_rows() {
        let html = r#"
            <html><body>
              <table>
                <caption>10 most recent fish plants in this lake</caption>
                <thead><tr><th>Stock Date</th><th>Species</th></tr></thead>
                <tbody id="dataRows"></tbody>
              </table>
            </body></html>
        "#;
        let rows = parse_stocking_table(html).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_rows_without_cells_are_skipped() {
        let html = r#"
            <html><body>
              <table>
                <caption>10 most recent fish plants in this lake</caption>
                <thead><tr><th>Stock Date</th><th>Species</th></tr></thead>
                <tbody id="dataRows">
                  <tr><th>subtotal</th></tr>
                  <tr><td>May 2, 2023</td><td>Tiger Trout</td></tr>
                </tbody>
              </table>
            </body></html>
        "#;
        let rows = parse_stocking_table(html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Species").and_then(|v| v.as_str()), Some("Tiger Trout"));
    }
}
