//! Join lakes with plant records by county and elevation.
//!
//! The listing and the open-data API describe the same lakes but share no
//! id, so records are correlated by a derived key: the upper-cased county
//! name and the integer elevation, as `"KING-3622"`. The listing writes
//! elevation as `"3622 feet"` and the API as `"3622"`; [`join_key`]
//! normalizes both by taking the first digit run.
//!
//! A record whose county trims to empty or whose elevation holds no
//! digits cannot be matched. It is excluded from the index or lookup and
//! processing continues; one malformed record never aborts the merge.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::{EventRecord, Lake};

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Normalized `COUNTY-ELEVATION` key, or `None` when either side is
/// unusable.
pub fn join_key(county: &str, elevation: &str) -> Option<String> {
    let county = county.trim();
    if county.is_empty() {
        return None;
    }

    let digits = DIGIT_RUN.find(elevation)?.as_str();
    // Integer round-trip strips leading zeros; absurdly long runs fail
    // the parse and exclude the record like any other malformed value.
    let feet: u64 = digits.parse().ok()?;

    Some(format!("{}-{}", county.to_uppercase(), feet))
}

/// One-to-many index from join key to plant records.
///
/// Records without a usable key are skipped and counted, not errors.
pub fn build_event_index(records: Vec<EventRecord>) -> HashMap<String, Vec<EventRecord>> {
    let total = records.len();
    let mut index: HashMap<String, Vec<EventRecord>> = HashMap::new();
    let mut skipped = 0usize;

    for record in records {
        let county = field_as_string(&record, "county");
        let elevation = field_as_string(&record, "elevation");
        match join_key(&county, &elevation) {
            Some(key) => index.entry(key).or_default().push(record),
            None => skipped += 1,
        }
    }

    debug!(total, skipped, keys = index.len(), "Built plant record index");
    index
}

/// Matching summary for one enrichment pass.
#[derive(Debug)]
pub struct EnrichReport {
    pub matched: usize,
    pub total: usize,
}

/// Attach each lake's matching plant records (possibly none).
///
/// Every input lake stays in the output; a lake without a usable key or
/// without matches simply gets an empty list.
pub fn enrich(lakes: &mut [Lake], index: &HashMap<String, Vec<EventRecord>>) -> EnrichReport {
    let mut matched = 0usize;

    for lake in lakes.iter_mut() {
        lake.plants = match join_key(&lake.county, &lake.elevation) {
            Some(key) => match index.get(&key) {
                Some(events) => {
                    matched += 1;
                    events.clone()
                }
                None => Vec::new(),
            },
            None => Vec::new(),
        };
    }

    let report = EnrichReport {
        matched,
        total: lakes.len(),
    };
    info!(matched = report.matched, total = report.total, "Matching complete");
    report
}

/// String view of a record field; the API serves strings but numbers
/// show up in hand-edited files.
fn field_as_string(record: &EventRecord, key: &str) -> String {
    match record.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lake(county: &str, elevation: &str) -> Lake {
        Lake {
            name: "Test Lake".to_string(),
            url: String::new(),
            acres: String::new(),
            elevation: elevation.to_string(),
            county: county.to_string(),
            location_lat: String::new(),
            location_lon: String::new(),
            plants: Vec::new(),
        }
    }

    fn plant(county: &str, elevation: &str) -> EventRecord {
        let mut record = EventRecord::new();
        record.insert("county".to_string(), county.into());
        record.insert("elevation".to_string(), elevation.into());
        record.insert("species".to_string(), "Rainbow".into());
        record
    }

    #[test]
    fn test_join_key_normalizes_both_sides() {
        assert_eq!(join_key("King", "3622 feet"), Some("KING-3622".to_string()));
        assert_eq!(join_key(" KING ", "3622"), Some("KING-3622".to_string()));
        assert_eq!(join_key("king", "03622"), Some("KING-3622".to_string()));
    }

    #[test]
    fn test_join_key_rejects_unusable_values() {
        assert_eq!(join_key("", "3622"), None);
        assert_eq!(join_key("   ", "3622"), None);
        assert_eq!(join_key("King", "unknown"), None);
        assert_eq!(join_key("King", ""), None);
    }

    #[test]
    fn test_enrich_attaches_matching_records() {
        let records = vec![plant("KING", "3622"), plant("KING", "3622"), plant("CHELAN", "5305")];
        let index = build_event_index(records);

        let mut lakes = vec![lake("King", "3622 feet")];
        let report = enrich(&mut lakes, &index);

        assert_eq!(report.matched, 1);
        assert_eq!(report.total, 1);
        assert_eq!(lakes[0].plants.len(), 2);
    }

    #[test]
    fn test_enrich_malformed_elevation_gets_empty_list() {
        let index = build_event_index(vec![plant("KING", "3622")]);

        let mut lakes = vec![lake("King", "unknown"), lake("King", "3622 feet")];
        let report = enrich(&mut lakes, &index);

        assert_eq!(report.matched, 1);
        assert!(lakes[0].plants.is_empty());
        assert_eq!(lakes[1].plants.len(), 1);
    }

    #[test]
    fn test_index_skips_malformed_records() {
        let records = vec![plant("KING", "3622"), plant("", "3622"), plant("KING", "n/a")];
        let index = build_event_index(records);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("KING-3622").unwrap().len(), 1);
    }

    #[test]
    fn test_index_handles_numeric_elevation_values() {
        let mut record = EventRecord::new();
        record.insert("county".to_string(), "KING".into());
        record.insert("elevation".to_string(), serde_json::json!(3622));

        let index = build_event_index(vec![record]);
        assert!(index.contains_key("KING-3622"));
    }

    #[test]
    fn test_enrich_unmatched_key_gets_empty_list() {
        let index = build_event_index(vec![plant("CHELAN", "5305")]);
        let mut lakes = vec![lake("King", "3622 feet")];
        let report = enrich(&mut lakes, &index);

        assert_eq!(report.matched, 0);
        assert!(lakes[0].plants.is_empty());
    }
}
