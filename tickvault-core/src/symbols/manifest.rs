//! Manifest strategy: a local JSON file holding either a flat list of symbols
//! or an object with a `symbols` field.

use super::SymbolSource;
use crate::config::AcquisitionConfig;
use crate::error::DataError;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    Flat(Vec<String>),
    Wrapped { symbols: Vec<String> },
}

pub struct ManifestSource;

impl ManifestSource {
    pub fn load(path: &Path) -> Result<Vec<String>, DataError> {
        let invalid = |reason: String| DataError::InvalidManifest {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        Self::parse(&content).map_err(|e| invalid(e.to_string()))
    }

    pub fn parse(content: &str) -> Result<Vec<String>, serde_json::Error> {
        let manifest: Manifest = serde_json::from_str(content)?;
        Ok(match manifest {
            Manifest::Flat(symbols) | Manifest::Wrapped { symbols } => symbols,
        })
    }
}

impl SymbolSource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    fn fetch_symbols(&self, config: &AcquisitionConfig) -> Result<Vec<String>, DataError> {
        let path = config
            .manifest_path
            .as_deref()
            .ok_or_else(|| DataError::InvalidManifest {
                path: String::new(),
                reason: "no manifest_path configured".into(),
            })?;
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flat_list() {
        assert_eq!(
            ManifestSource::parse(r#"["ETHUSDT","BTCUSDT"]"#).unwrap(),
            vec!["ETHUSDT", "BTCUSDT"]
        );
    }

    #[test]
    fn wrapped_object() {
        assert_eq!(
            ManifestSource::parse(r#"{"symbols":["BTCUSDT"],"generated":"2024-01-01"}"#).unwrap(),
            vec!["BTCUSDT"]
        );
    }

    #[test]
    fn other_shapes_are_rejected() {
        assert!(ManifestSource::parse(r#"{"tickers":["BTCUSDT"]}"#).is_err());
        assert!(ManifestSource::parse(r#"[1,2,3]"#).is_err());
        assert!(ManifestSource::parse("BTCUSDT").is_err());
    }

    #[test]
    fn load_reports_invalid_manifest_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"symbols": "BTCUSDT"}}"#).unwrap();
        match ManifestSource::load(file.path()) {
            Err(DataError::InvalidManifest { path, .. }) => {
                assert_eq!(path, file.path().display().to_string())
            }
            other => panic!("expected InvalidManifest, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_invalid_manifest() {
        let err = ManifestSource::load(Path::new("/nonexistent/symbols.json")).unwrap_err();
        assert!(matches!(err, DataError::InvalidManifest { .. }));
    }
}
