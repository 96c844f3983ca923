//! JSON file load/save for inter-stage handoffs.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Load a required JSON input file.
///
/// A missing or unreadable file is an error the caller treats as fatal:
/// the stage cannot do anything useful without its input.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn load<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn Error + Send + Sync>> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| format!("required input file {path}: {e}"))?;
    let value = serde_json::from_slice(&bytes)
        .map_err(|e| format!("input file {path} is not valid JSON: {e}"))?;
    info!(path, bytes = bytes.len(), "Loaded JSON input");
    Ok(value)
}

/// Serialize a value and write it in one shot.
///
/// The parent directory is created if needed; the file content is fully
/// serialized before any byte reaches disk.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn write<T: Serialize>(path: &str, value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(path, json).await?;
    info!(path, "Wrote JSON file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lake;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("high_lakes_json_test_{}_{name}", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn test_write_then_load_round_trip() {
        let path = temp_path("roundtrip.json");
        let lakes = vec![Lake {
            name: "Angeline Lake".to_string(),
            url: "https://wdfw.wa.gov/x".to_string(),
            acres: "188.10".to_string(),
            elevation: "4963 feet".to_string(),
            county: "King".to_string(),
            location_lat: String::new(),
            location_lon: String::new(),
            plants: Vec::new(),
        }];

        write(&path, &lakes).await.unwrap();
        let back: Vec<Lake> = load(&path).await.unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].name, "Angeline Lake");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_load_missing_file_is_an_error_naming_the_path() {
        let path = temp_path("does_not_exist.json");
        let result = load::<Vec<Lake>>(&path).await;
        let err = result.err().expect("missing file must error");
        assert!(err.to_string().contains("required input file"));
        assert!(err.to_string().contains("does_not_exist.json"));
    }

    #[tokio::test]
    async fn test_load_invalid_json_is_an_error() {
        let path = temp_path("invalid.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result = load::<Vec<Lake>>(&path).await;
        assert!(result.is_err());

        let _ = tokio::fs::remove_file(&path).await;
    }
}
