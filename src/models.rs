//! Data models for lakes and their stocking records.
//!
//! This module defines the core data structures passed between pipeline
//! stages:
//! - [`Lake`]: one row of the high-lakes listing, optionally carrying plants
//! - [`EventRecord`]: a single stocking event as a header-keyed mapping
//! - [`PlantsArchive`]: the envelope the API fetch stage writes to disk
//!
//! Stages exchange these types only through JSON files on disk, so every
//! struct here derives both `Serialize` and `Deserialize` and tolerates the
//! fields an earlier stage did not produce (a listing file has no `plants`
//! key yet).

use serde::{Deserialize, Serialize};

/// A single stocking event, keyed by the source's own column names.
///
/// The scraped stocking table and the open-data API disagree on field
/// names ("Stock Date" vs `release_date`), so events stay as
/// order-preserving JSON objects rather than a fixed struct. Key order is
/// insertion order, which later becomes CSV column order.
pub type EventRecord = serde_json::Map<String, serde_json::Value>;

/// One lake from the high-lakes listing.
///
/// All scalar fields are free text exactly as scraped; `elevation` looks
/// like `"5305 feet"` and the location fields may be empty. Identity for
/// grouping purposes is name + county.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lake {
    /// Lake name from the listing's first column.
    pub name: String,
    /// Absolute URL of the lake's detail page.
    pub url: String,
    /// Surface area, free text.
    pub acres: String,
    /// Elevation, free text (e.g. `"5305 feet"`).
    pub elevation: String,
    /// County name, free text.
    pub county: String,
    /// Latitude, free text or empty.
    pub location_lat: String,
    /// Longitude, free text or empty.
    pub location_lon: String,
    /// Stocking events attached by the scrape or enrich stage.
    /// Listing-stage files have no `plants` key, hence the default.
    #[serde(default)]
    pub plants: Vec<EventRecord>,
}

impl Lake {
    /// Fixed-width `(County) Name` label used to tag log lines.
    pub fn label(&self) -> String {
        crate::utils::item_label(&self.county, &self.name)
    }
}

impl crate::dispatch::WorkItem for Lake {
    fn label(&self) -> String {
        self.label()
    }
}

/// Envelope written by the `fetch-plants` stage.
///
/// Wraps the raw API records with provenance metadata so a consumer of the
/// file can tell when and from where it was pulled.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlantsArchive {
    /// Human-readable name of the upstream dataset.
    pub source: String,
    /// Local timestamp of the fetch, RFC 3339.
    pub last_updated: String,
    /// `"success"` for a complete pull.
    pub status: String,
    /// Summary line including the record count.
    pub message: String,
    /// The fetched records.
    pub data: Vec<EventRecord>,
}

/// Either shape the enrich stage accepts as its plants input: the archive
/// envelope from `fetch-plants`, or a bare JSON array of records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PlantsInput {
    Archive(PlantsArchive),
    Records(Vec<EventRecord>),
}

impl PlantsInput {
    pub fn into_records(self) -> Vec<EventRecord> {
        match self {
            PlantsInput::Archive(archive) => archive.data,
            PlantsInput::Records(records) => records,
        }
    }
}
