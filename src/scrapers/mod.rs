//! Scrapers for the upstream lake listing, the fish-plants API, and the
//! per-lake stocking tables.
//!
//! # Submodules
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | High-lakes listing | [`listing`] | HTTP + HTML parsing, paginated |
//! | Fish-plants open-data API | [`plants_api`] | HTTP + JSON, offset pagination |
//! | Per-lake stocking table | [`stocking`] | Headless render + HTML parsing |
//!
//! All plain-HTTP requests go through one shared [`client`] carrying an
//! identifying `User-Agent` and a per-request timeout. The stocking
//! scraper does not use it; its pages only exist post-JavaScript, so it
//! goes through [`crate::render`] instead.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

pub mod listing;
pub mod plants_api;
pub mod stocking;

/// Identifying client header sent with every scraping request.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Per-request timeout; timeouts count as recoverable failures upstream.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static HTTP: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("reqwest client")
});

/// Shared HTTP client for all plain-GET scraping.
pub(crate) fn client() -> &'static Client {
    &HTTP
}
