//! High-lakes listing scraper: county ids and paginated lake rows.
//!
//! Two-phase enumerator over the WDFW high-lakes listing:
//! 1. [`county_ids`] reads the listing page's county filter and returns
//!    its option values.
//! 2. [`lakes_for_county`] walks that county's result pages until the
//!    source signals end-of-pages (no table, zero rows, or no next-page
//!    affordance), parsing each row into a [`Lake`].
//!
//! A fetch error mid-pagination keeps the rows gathered so far; only the
//! county-id fetch itself is allowed to fail the run.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client;
use crate::models::Lake;

/// Listing page carrying both the county filter and the result table.
pub const LISTING_URL: &str = "https://wdfw.wa.gov/fishing/locations/high-lakes";

/// Root used to resolve the listing's relative lake links.
const SITE_ROOT: &str = "https://wdfw.wa.gov";

static COUNTY_OPTIONS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"select[name="county[]"] option"#).unwrap());
static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static BODY_ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static LAT: Lazy<Selector> = Lazy::new(|| Selector::parse("span.latlon-lat").unwrap());
static LON: Lazy<Selector> = Lazy::new(|| Selector::parse("span.latlon-lon").unwrap());
static NEXT_PAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("li.pager__item--next").unwrap());

/// Fetch the listing page and extract the county filter's ids.
///
/// Failure here is a setup failure: without county ids there is nothing
/// to enumerate, so the error propagates and aborts the run.
#[instrument(level = "info")]
pub async fn county_ids() -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
    info!(url = LISTING_URL, "Fetching county ids");
    let html = client()
        .get(LISTING_URL)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let ids = parse_county_ids(&html);
    info!(count = ids.len(), "Indexed county ids");
    debug!(?ids, "County ids");
    Ok(ids)
}

/// Extract unique county ids from the listing page's filter select.
pub fn parse_county_ids(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&COUNTY_OPTIONS)
        .filter_map(|option| option.value().attr("value"))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unique()
        .collect()
}

/// One parsed result page.
pub struct ListingPage {
    pub lakes: Vec<Lake>,
    /// A next-page affordance is present.
    pub has_next: bool,
}

/// Scrape every listing page for one county, politely pausing
/// `page_delay` between page fetches.
///
/// Fetch errors end the pagination early with whatever was gathered;
/// they never fail the run.
#[instrument(level = "info", skip(page_delay))]
pub async fn lakes_for_county(county_id: &str, page_delay: Duration) -> Vec<Lake> {
    let mut lakes = Vec::new();
    let mut page = 0usize;

    loop {
        let url = format!(
            "{LISTING_URL}?name=&county%5B%5D={}&page={}",
            urlencoding::encode(county_id),
            page
        );

        let html = match fetch_page(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(county_id, page, error = %e, "Listing page fetch failed; keeping partial results");
                break;
            }
        };

        let Some(parsed) = parse_listing_page(&html) else {
            debug!(county_id, page, "No table on page; end of results");
            break;
        };
        if parsed.lakes.is_empty() {
            debug!(county_id, page, "No rows on page; all pages scraped");
            break;
        }

        info!(county_id, page, count = parsed.lakes.len(), "Scraped listing page");
        lakes.extend(parsed.lakes);

        if !parsed.has_next {
            debug!(county_id, page, "No next link; all pages scraped");
            break;
        }

        page += 1;
        sleep(page_delay).await;
    }

    info!(county_id, count = lakes.len(), "Scraped county listing");
    lakes
}

async fn fetch_page(url: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    Ok(client()
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?)
}

/// Parse one result page. `None` when the page has no table at all.
pub fn parse_listing_page(html: &str) -> Option<ListingPage> {
    let document = Html::parse_document(html);
    let table = document.select(&TABLE).next()?;

    let site_root = Url::parse(SITE_ROOT).expect("site root url");
    let lakes = table
        .select(&BODY_ROWS)
        .filter_map(|row| parse_lake_row(row, &site_root))
        .collect();
    let has_next = document.select(&NEXT_PAGE).next().is_some();

    Some(ListingPage { lakes, has_next })
}

fn parse_lake_row(row: ElementRef<'_>, site_root: &Url) -> Option<Lake> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELLS).collect();
    if cells.is_empty() {
        return None;
    }

    let (name, url) = match cells[0].select(&LINK).next() {
        Some(link) => {
            let name = cell_text(&link);
            let url = link
                .value()
                .attr("href")
                .and_then(|href| site_root.join(href).ok())
                .map(|resolved| resolved.to_string())
                .unwrap_or_default();
            (name, url)
        }
        None => (String::new(), String::new()),
    };

    let (location_lat, location_lon) = match cells.get(4) {
        Some(location) => (
            location.select(&LAT).next().map(|e| cell_text(&e)).unwrap_or_default(),
            location.select(&LON).next().map(|e| cell_text(&e)).unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };

    Some(Lake {
        name,
        url,
        acres: cells.get(1).map(cell_text).unwrap_or_default(),
        elevation: cells.get(2).map(cell_text).unwrap_or_default(),
        county: cells.get(3).map(cell_text).unwrap_or_default(),
        location_lat,
        location_lon,
        plants: Vec::new(),
    })
}

fn cell_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
