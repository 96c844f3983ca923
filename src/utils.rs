//! Utility functions for log labels, string truncation, and file system
//! checks.

use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Width the `(County) Name` log label is squeezed into.
const LABEL_WIDTH: usize = 25;

/// Build the fixed-width `(County) Name` label used to tag per-lake log
/// lines. Long labels keep their head and tail with an ellipsis between.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(item_label("King", "Angeline Lake"), "(King) Angeline Lake");
/// ```
pub fn item_label(county: &str, name: &str) -> String {
    let label = format!("({county}) {name}");
    let chars: Vec<char> = label.chars().collect();
    if chars.len() <= LABEL_WIDTH {
        return label;
    }

    let head: String = chars[..11].iter().collect();
    let tail: String = chars[chars.len() - 11..].iter().collect();
    format!("{head}...{tail}")
}

/// Truncate a string for logging purposes.
///
/// Strings longer than `max` characters are cut with an ellipsis and a
/// byte-count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…(+{} bytes)", &s[..idx], s.len() - idx),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then probes it with a throwaway file.
/// Used before the expensive scraping stages so a permissions problem
/// surfaces up front instead of after the whole crawl.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Small sync write probe; simpler error surface than async here.
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Directory portion of an output path for writability probing; the
/// current directory when the path has no parent component.
pub fn parent_dir(path: &str) -> String {
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    }
}
