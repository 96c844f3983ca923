//! CSV export for flattened rows.
//!
//! The header row is derived from the first flattened row's keys, in key
//! order; later rows missing a column emit an empty field. Null values
//! (the event columns of an event-less lake) also serialize as empty
//! fields.

use serde_json::Value;
use std::error::Error;
use tracing::{info, warn};

use crate::flatten::FlatRow;

/// Write rows to a CSV file, buffered fully in memory first.
///
/// With no rows there is no derivable schema; nothing is written and a
/// warning is logged.
pub fn write(path: &str, rows: &[FlatRow]) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(first) = rows.first() else {
        warn!(path, "No rows to write; skipping CSV output");
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();

    let mut bytes = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut bytes);
        writer.write_record(&headers)?;
        for row in rows {
            writer.write_record(headers.iter().map(|h| field(row.get(*h))))?;
        }
        writer.flush()?;
    }
    std::fs::write(path, &bytes)?;

    info!(path, rows = rows.len(), columns = headers.len(), "Wrote CSV file");
    Ok(())
}

fn field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
