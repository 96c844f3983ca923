//! Denormalize lakes-with-plants into flat tabular rows.
//!
//! Each lake expands into one row per stocking event; a lake with no
//! events still yields exactly one row, with every event column null, so
//! no lake is silently dropped. The event-column set is the union of
//! event keys across the whole input (first-seen order), which keeps the
//! first row carrying the full schema for column-oriented export.
//!
//! Stock dates arrive as human-readable text ("July 1, 2025");
//! [`normalize_dates`] rewrites them to ISO calendar dates, passing
//! anything unparseable through unchanged with a warning.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{EventRecord, Lake};

/// One output row: lake scalars followed by event columns.
pub type FlatRow = serde_json::Map<String, Value>;

/// Lake scalar columns, in output order.
const BASE_COLUMNS: [&str; 7] = [
    "name",
    "url",
    "acres",
    "elevation",
    "county",
    "location_lat",
    "location_lon",
];

/// Date formats accepted by [`normalize_stock_date`], tried in order.
const DATE_FORMATS: [&str; 4] = ["%B %d, %Y", "%b %d, %Y", "%m/%d/%Y", "%Y-%m-%d"];

/// Expand every lake into flat rows.
pub fn flatten(lakes: &[Lake]) -> Vec<FlatRow> {
    let event_columns = collect_event_columns(lakes);

    let mut rows = Vec::new();
    for lake in lakes {
        if lake.plants.is_empty() {
            rows.push(make_row(lake, None, &event_columns));
        } else {
            for event in &lake.plants {
                rows.push(make_row(lake, Some(event), &event_columns));
            }
        }
    }

    info!(lakes = lakes.len(), rows = rows.len(), "Flattened lake records");
    rows
}

/// Union of event keys across all lakes, first-seen order. Keys that
/// collide with a lake scalar column are not new columns; they overwrite
/// the scalar value in place.
fn collect_event_columns(lakes: &[Lake]) -> Vec<String> {
    let mut columns = Vec::new();
    for lake in lakes {
        for event in &lake.plants {
            for key in event.keys() {
                if BASE_COLUMNS.contains(&key.as_str()) {
                    continue;
                }
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

fn make_row(lake: &Lake, event: Option<&EventRecord>, event_columns: &[String]) -> FlatRow {
    let mut row = FlatRow::new();
    row.insert("name".to_string(), lake.name.clone().into());
    row.insert("url".to_string(), lake.url.clone().into());
    row.insert("acres".to_string(), lake.acres.clone().into());
    row.insert("elevation".to_string(), lake.elevation.clone().into());
    row.insert("county".to_string(), lake.county.clone().into());
    row.insert("location_lat".to_string(), lake.location_lat.clone().into());
    row.insert("location_lon".to_string(), lake.location_lon.clone().into());

    for column in event_columns {
        let value = event
            .and_then(|e| e.get(column))
            .cloned()
            .unwrap_or(Value::Null);
        row.insert(column.clone(), value);
    }

    // An event field named like a lake scalar replaces the scalar value;
    // overwriting keeps the column's original position.
    if let Some(event) = event {
        for (key, value) in event {
            if BASE_COLUMNS.contains(&key.as_str()) {
                row.insert(key.clone(), value.clone());
            }
        }
    }

    row
}

/// Parse a free-text stock date to `YYYY-MM-DD`, or `None`.
pub fn normalize_stock_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(trimmed, format)
            .ok()
            .map(|date| date.format("%Y-%m-%d").to_string())
    })
}

/// Rewrite `field` in every row to an ISO date where possible.
///
/// Unparseable values are left exactly as they were and logged; the
/// returned count is the caller-observable warning signal. Null or
/// missing fields (event-less rows) are not warnings.
pub fn normalize_dates(rows: &mut [FlatRow], field: &str) -> usize {
    let mut unparsed = 0usize;

    for row in rows.iter_mut() {
        let raw = match row.get(field) {
            Some(Value::String(s)) => s.clone(),
            _ => continue,
        };

        match normalize_stock_date(&raw) {
            Some(iso) => {
                row.insert(field.to_string(), Value::String(iso));
            }
            None => {
                unparsed += 1;
                warn!(field, value = %raw, "Unparseable stock date; passing through unchanged");
            }
        }
    }

    unparsed
}
