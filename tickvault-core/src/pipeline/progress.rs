//! Progress callbacks for the download/extract pipeline.
//!
//! Observers are called from worker threads of both pools, so implementations
//! must be `Send + Sync` and do their own synchronisation.

use super::extract::ExtractOutcome;
use super::PipelineReport;
use crate::error::DataError;
use tracing::{debug, info};

pub trait PipelineObserver: Send + Sync {
    /// Called once before any task is submitted.
    fn on_start(&self, total_urls: usize);

    /// Called when a download task finishes (either way).
    fn on_download(&self, url: &str, result: &Result<usize, DataError>);

    /// Called when an extraction task finishes (either way).
    fn on_extract(&self, url: &str, result: &Result<ExtractOutcome, DataError>);

    /// Called once after both stages have drained.
    fn on_finish(&self, report: &PipelineReport);
}

/// Reports progress as tracing events. Failures are already logged at `warn`
/// by the pipeline itself, so per-task events stay at `debug`.
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_start(&self, total_urls: usize) {
        info!(total_urls, "acquisition started");
    }

    fn on_download(&self, url: &str, result: &Result<usize, DataError>) {
        match result {
            Ok(bytes) => debug!(url, bytes, "downloaded"),
            Err(e) => debug!(url, error = %e, "download abandoned"),
        }
    }

    fn on_extract(&self, url: &str, result: &Result<ExtractOutcome, DataError>) {
        match result {
            Ok(outcome) => debug!(url, written = outcome.written, skipped = outcome.skipped, "extracted"),
            Err(e) => debug!(url, error = %e, "extraction abandoned"),
        }
    }

    fn on_finish(&self, report: &PipelineReport) {
        info!(
            downloaded = report.downloaded,
            download_failures = report.download_failures,
            extracted = report.extracted,
            extract_failures = report.extract_failures,
            files_written = report.files_written,
            files_skipped = report.files_skipped,
            "acquisition finished"
        );
    }
}
