//! Batch run orchestration.
//!
//! Three entry points:
//! - `run_acquisition()`: discovery, batching, URL resolution, download,
//!   extraction and verification. Used by `tickvault fetch`.
//! - `select_symbols()`: discovery and batching only. Used by `tickvault symbols`.
//! - `run_verification()`: verification of an existing dataset. Used by
//!   `tickvault verify`.
//!
//! Only problems that make the whole run meaningless (bad config, unusable
//! destination, upstream schema drift or a schema check that could not run)
//! become a `RunError`. Per-symbol and per-archive failures are counted in the
//! `RunSummary` instead.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, info_span, warn};

use tickvault_core::batch::select_batch;
use tickvault_core::config::{AcquisitionConfig, ConfigError};
use tickvault_core::error::DataError;
use tickvault_core::pipeline::progress::PipelineObserver;
use tickvault_core::pipeline::AcquisitionPipeline;
use tickvault_core::probe::{ProbeOutcome, SchemaProbe};
use tickvault_core::retry::RetryableFetcher;
use tickvault_core::symbols::{canonicalize, SymbolResolver};
use tickvault_core::transport::{HttpTransport, Transport};
use tickvault_core::urls::UrlResolver;
use tickvault_core::verify::schema::SchemaTable;
use tickvault_core::verify::Verifier;

use crate::summary::{symbol_fingerprint, RunSummary};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("upstream schema drift: expected {expected} columns, live data has {actual}")]
    SchemaDrift { expected: usize, actual: usize },
    #[error("upstream schema could not be checked: {reason}")]
    SchemaUnverified { reason: String },
}

/// The symbols one batch worker is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSelection {
    /// Size of the full resolved list.
    pub resolved: usize,
    /// Fingerprint of the full resolved list.
    pub fingerprint: String,
    pub symbols: Vec<String>,
}

/// Blocking HTTP transport with the config's request timeout.
pub fn http_transport(config: &AcquisitionConfig) -> Result<Arc<dyn Transport>, RunError> {
    Ok(Arc::new(HttpTransport::new(config.request_timeout())?))
}

/// Resolve the full symbol list and cut out this worker's batch.
pub fn select_symbols(config: &AcquisitionConfig, fetcher: &RetryableFetcher) -> BatchSelection {
    let all = SymbolResolver::for_config(config, fetcher.clone()).resolve(config);
    let symbols = select_batch(&all, config.batch_number, config.total_batches)
        .map(<[String]>::to_vec)
        .unwrap_or_default();
    info!(
        resolved = all.len(),
        batch = config.batch_number,
        of = config.total_batches,
        selected = symbols.len(),
        "batch selected"
    );
    BatchSelection {
        resolved: all.len(),
        fingerprint: symbol_fingerprint(&all),
        symbols,
    }
}

/// Symbols that already have a directory under `{root}/{asset_class}/`,
/// filtered by the configured suffixes and naturally sorted.
pub fn dataset_symbols(config: &AcquisitionConfig) -> Result<Vec<String>, RunError> {
    let dir = config.destination_dir.join(config.asset_class.as_str());
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DataError::Io(e).into()),
    };
    let names = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    Ok(canonicalize(names, &config.symbol_suffixes))
}

/// Full acquisition run for the configured batch.
pub fn run_acquisition(
    config: &AcquisitionConfig,
    transport: Arc<dyn Transport>,
    observer: &dyn PipelineObserver,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let _span = info_span!(
        "acquire",
        asset_class = %config.asset_class,
        data_type = %config.data_type,
        frequency = %config.frequency,
        batch = config.batch_number,
    )
    .entered();

    let start = Instant::now();
    let mut summary = RunSummary::begin(config);
    let fetcher = RetryableFetcher::new(transport, config.retry_policy());
    let schema = SchemaTable::for_config(config)?;

    if config.probe_schema {
        match SchemaProbe::new(fetcher.clone()).check(config, &schema) {
            ProbeOutcome::Mismatch { expected, actual } => {
                return Err(RunError::SchemaDrift { expected, actual })
            }
            ProbeOutcome::Failed { reason } => return Err(RunError::SchemaUnverified { reason }),
            outcome => summary.probe = Some(outcome),
        }
    }

    let selection = select_symbols(config, &fetcher);
    summary.symbols_resolved = selection.resolved;
    summary.symbols_in_batch = selection.symbols.len();
    summary.symbol_fingerprint = selection.fingerprint;

    if selection.symbols.is_empty() {
        warn!("no symbols to acquire");
        summary.nothing_to_do = true;
        summary.elapsed_secs = start.elapsed().as_secs_f64();
        return Ok(summary);
    }

    std::fs::create_dir_all(&config.destination_dir).map_err(DataError::from)?;

    let urls = UrlResolver::new(fetcher.clone(), config)?.resolve_urls(&selection.symbols, config);
    summary.urls = urls.len();

    let pipeline = AcquisitionPipeline::new(fetcher, config)?;
    summary.pipeline = pipeline.run(&urls, observer);

    summary.verification = Verifier::new(config, &schema).verify(&selection.symbols);
    summary.elapsed_secs = start.elapsed().as_secs_f64();

    info!(
        clean = summary.is_clean(),
        elapsed_secs = summary.elapsed_secs,
        "run finished"
    );
    Ok(summary)
}

/// Verify `symbols` (or, if `None`, every symbol present in the dataset)
/// without touching the network.
pub fn run_verification(
    config: &AcquisitionConfig,
    symbols: Option<Vec<String>>,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let start = Instant::now();
    let mut summary = RunSummary::begin(config);

    let symbols = match symbols {
        Some(list) => canonicalize(list, &config.symbol_suffixes),
        None => dataset_symbols(config)?,
    };
    summary.symbols_resolved = symbols.len();
    summary.symbols_in_batch = symbols.len();
    summary.symbol_fingerprint = symbol_fingerprint(&symbols);
    summary.nothing_to_do = symbols.is_empty();

    summary.verification = Verifier::from_config(config)?.verify(&symbols);
    summary.elapsed_secs = start.elapsed().as_secs_f64();
    Ok(summary)
}
