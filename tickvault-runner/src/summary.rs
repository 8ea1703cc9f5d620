//! End-of-run summary.
//!
//! A run always ends with one of these, including runs that found nothing to
//! do, so a partially acquired dataset is never silently presented as
//! complete.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tickvault_core::config::{AcquisitionConfig, AssetClass, TimePeriod};
use tickvault_core::pipeline::PipelineReport;
use tickvault_core::probe::ProbeOutcome;
use tickvault_core::verify::VerificationReport;

/// BLAKE3 over the full sorted symbol list, before batching. Workers that
/// split one list between them should all report the same value.
pub fn symbol_fingerprint(symbols: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for symbol in symbols {
        hasher.update(symbol.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub asset_class: AssetClass,
    pub time_period: TimePeriod,
    pub data_type: String,
    pub frequency: String,
    pub batch_number: usize,
    pub total_batches: usize,
    pub symbols_resolved: usize,
    pub symbols_in_batch: usize,
    pub symbol_fingerprint: String,
    /// Discovery (or batching) left no symbols to acquire.
    pub nothing_to_do: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeOutcome>,
    pub urls: usize,
    pub pipeline: PipelineReport,
    pub verification: VerificationReport,
    pub elapsed_secs: f64,
}

impl RunSummary {
    /// Empty summary for `config`; the runner fills in the stages it reaches.
    pub fn begin(config: &AcquisitionConfig) -> Self {
        Self {
            started_at: Utc::now(),
            asset_class: config.asset_class,
            time_period: config.time_period,
            data_type: config.data_type.clone(),
            frequency: config.frequency.clone(),
            batch_number: config.batch_number,
            total_batches: config.total_batches,
            symbols_resolved: 0,
            symbols_in_batch: 0,
            symbol_fingerprint: symbol_fingerprint(&[]),
            nothing_to_do: false,
            probe: None,
            urls: 0,
            pipeline: PipelineReport::default(),
            verification: VerificationReport::default(),
            elapsed_secs: 0.0,
        }
    }

    /// No download, extraction, read or quarantine problems.
    pub fn is_clean(&self) -> bool {
        self.pipeline.failures() == 0 && self.verification.is_clean()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
    }
}
