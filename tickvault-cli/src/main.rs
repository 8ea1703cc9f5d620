//! TickVault CLI: fetch, symbols and verify commands.
//!
//! Commands:
//! - `fetch`: resolve symbols, download and extract one batch, then verify it
//! - `symbols`: print the symbols of one batch without downloading
//! - `verify`: verify (and quarantine from) an existing dataset, offline
//!
//! Every command takes an optional `--config` TOML file; flags override it.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tickvault_core::config::{AcquisitionConfig, AssetClass, DiscoveryMethod, TimePeriod};
use tickvault_core::error::DataError;
use tickvault_core::pipeline::extract::ExtractOutcome;
use tickvault_core::pipeline::progress::PipelineObserver;
use tickvault_core::pipeline::PipelineReport;
use tickvault_core::retry::RetryableFetcher;
use tickvault_runner::{
    http_transport, init_tracing, run_acquisition, run_verification, select_symbols, RunSummary,
};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "tickvault",
    about = "TickVault CLI: bulk historical market-data acquisition"
)]
struct Cli {
    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, extract and verify one batch of symbols.
    Fetch {
        #[command(flatten)]
        config: ConfigArgs,

        /// Write the run summary as JSON to this path.
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
    /// Print the symbols of one batch.
    Symbols {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Verify an existing dataset without network access.
    Verify {
        #[command(flatten)]
        config: ConfigArgs,

        /// Symbols to verify. Defaults to every symbol directory on disk.
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<String>>,

        /// Write the run summary as JSON to this path.
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
}

/// Configuration surface. Without `--config`, the first four are required.
#[derive(Args)]
struct ConfigArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// spot, um, cm or option.
    #[arg(long)]
    asset_class: Option<AssetClass>,

    /// daily or monthly.
    #[arg(long)]
    time_period: Option<TimePeriod>,

    /// klines, aggTrades, trades, ...
    #[arg(long)]
    data_type: Option<String>,

    /// 1m, 1h, 1d, ...
    #[arg(long)]
    frequency: Option<String>,

    /// Dataset root. Defaults to ./binance_data.
    #[arg(long)]
    destination_dir: Option<PathBuf>,

    /// Keep only symbols ending in one of these (repeatable, or comma separated).
    #[arg(long = "suffix", value_delimiter = ',')]
    suffixes: Vec<String>,

    /// catalog, listing or manifest.
    #[arg(long)]
    discovery: Option<DiscoveryMethod>,

    /// Symbol manifest (JSON) for manifest discovery.
    #[arg(long)]
    manifest: Option<PathBuf>,

    #[arg(long)]
    max_workers: Option<usize>,

    #[arg(long)]
    max_extract_workers: Option<usize>,

    #[arg(long)]
    retries: Option<u32>,

    #[arg(long)]
    batch_number: Option<usize>,

    #[arg(long)]
    total_batches: Option<usize>,

    /// TOML file overriding the expected column counts.
    #[arg(long)]
    schema_table: Option<PathBuf>,

    /// Check the live kline width before downloading.
    #[arg(long, default_value_t = false)]
    probe_schema: bool,
}

impl ConfigArgs {
    fn resolve(self) -> Result<AcquisitionConfig> {
        let mut config = match &self.config {
            Some(path) => AcquisitionConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => {
                let (Some(asset), Some(period), Some(data_type), Some(frequency)) = (
                    self.asset_class,
                    self.time_period,
                    self.data_type.clone(),
                    self.frequency.clone(),
                ) else {
                    bail!(
                        "without --config, --asset-class, --time-period, --data-type and --frequency are required"
                    );
                };
                AcquisitionConfig::new(asset, period, data_type, frequency)
            }
        };

        if let Some(v) = self.asset_class {
            config.asset_class = v;
        }
        if let Some(v) = self.time_period {
            config.time_period = v;
        }
        if let Some(v) = self.data_type {
            config.data_type = v;
        }
        if let Some(v) = self.frequency {
            config.frequency = v;
        }
        if let Some(v) = self.destination_dir {
            config.destination_dir = v;
        }
        if !self.suffixes.is_empty() {
            config.symbol_suffixes = self.suffixes;
        }
        if let Some(v) = self.discovery {
            config.discovery = v;
        }
        if let Some(v) = self.manifest {
            config.manifest_path = Some(v);
        }
        if let Some(v) = self.max_workers {
            config.max_workers = v;
        }
        if let Some(v) = self.max_extract_workers {
            config.max_extract_workers = v;
        }
        if let Some(v) = self.retries {
            config.retries = v;
        }
        if let Some(v) = self.batch_number {
            config.batch_number = v;
        }
        if let Some(v) = self.total_batches {
            config.total_batches = v;
        }
        if let Some(v) = self.schema_table {
            config.schema_table = Some(v);
        }
        if self.probe_schema {
            config.probe_schema = true;
        }

        config.validate()?;
        debug!(?config, "resolved configuration");
        Ok(config)
    }
}

/// Console progress: one line per finished download or extraction.
#[derive(Default)]
struct ConsoleProgress {
    total: AtomicUsize,
    downloads: AtomicUsize,
    extracts: AtomicUsize,
}

impl PipelineObserver for ConsoleProgress {
    fn on_start(&self, total_urls: usize) {
        self.total.store(total_urls, Ordering::Relaxed);
        eprintln!("Fetching {total_urls} archives...");
    }

    fn on_download(&self, url: &str, result: &Result<usize, DataError>) {
        let n = self.downloads.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        if let Err(e) = result {
            eprintln!("[{n}/{total}] FAIL download {url}: {e}");
        }
    }

    fn on_extract(&self, url: &str, result: &Result<ExtractOutcome, DataError>) {
        let n = self.extracts.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        match result {
            Ok(outcome) => eprintln!(
                "[{n}/{total}] {} ({} written, {} skipped)",
                file_name(url),
                outcome.written,
                outcome.skipped
            ),
            Err(e) => eprintln!("[{n}/{total}] FAIL extract {url}: {e}"),
        }
    }

    fn on_finish(&self, report: &PipelineReport) {
        eprintln!(
            "\nPipeline complete: {}/{} downloaded, {} extracted, {} failed",
            report.downloaded,
            report.urls,
            report.extracted,
            report.failures()
        );
    }
}

fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match cli.command {
        Commands::Fetch {
            config,
            summary_json,
        } => run_fetch(config.resolve()?, summary_json.as_deref()),
        Commands::Symbols { config } => run_symbols(config.resolve()?),
        Commands::Verify {
            config,
            symbols,
            summary_json,
        } => run_verify(config.resolve()?, symbols, summary_json.as_deref()),
    }
}

fn run_fetch(config: AcquisitionConfig, summary_json: Option<&Path>) -> Result<()> {
    let transport = http_transport(&config)?;
    let summary = run_acquisition(&config, transport, &ConsoleProgress::default())?;
    finish(&summary, summary_json)
}

fn run_symbols(config: AcquisitionConfig) -> Result<()> {
    let fetcher = RetryableFetcher::new(http_transport(&config)?, config.retry_policy());
    let selection = select_symbols(&config, &fetcher);
    if selection.resolved == 0 {
        bail!("symbol discovery returned nothing");
    }
    eprintln!(
        "batch {}/{}: {} of {} symbols (list fingerprint {})",
        config.batch_number,
        config.total_batches,
        selection.symbols.len(),
        selection.resolved,
        &selection.fingerprint[..16]
    );
    for symbol in &selection.symbols {
        println!("{symbol}");
    }
    Ok(())
}

fn run_verify(
    config: AcquisitionConfig,
    symbols: Option<Vec<String>>,
    summary_json: Option<&Path>,
) -> Result<()> {
    let summary = run_verification(&config, symbols)?;
    finish(&summary, summary_json)
}

fn finish(summary: &RunSummary, summary_json: Option<&Path>) -> Result<()> {
    print_summary(summary);
    if let Some(path) = summary_json {
        summary
            .write_json(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if !summary.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(s: &RunSummary) {
    if s.nothing_to_do {
        println!("Nothing to do: no symbols for batch {}/{}", s.batch_number, s.total_batches);
        return;
    }
    println!(
        "Batch {}/{}: {} symbols ({} resolved), {} archives",
        s.batch_number, s.total_batches, s.symbols_in_batch, s.symbols_resolved, s.urls
    );
    if s.urls > 0 {
        println!(
            "  downloads: {} ok, {} failed; extraction: {} ok, {} failed; files: {} written, {} skipped",
            s.pipeline.downloaded,
            s.pipeline.download_failures,
            s.pipeline.extracted,
            s.pipeline.extract_failures,
            s.pipeline.files_written,
            s.pipeline.files_skipped
        );
    }
    let v = &s.verification;
    println!(
        "  verified {} files: {} valid, {} quarantined, {} quarantine failures, {} unreadable",
        v.files_checked, v.valid, v.quarantined, v.quarantine_failures, v.read_errors
    );
    for rejected in &v.rejected {
        println!("    {} {}: {}", rejected.symbol, rejected.file, rejected.reason);
    }
    if v.gap_count() > 0 {
        let symbols_with_gaps = v.continuity.iter().filter(|c| c.has_gaps()).count();
        println!("  {} missing dates across {symbols_with_gaps} symbols", v.gap_count());
    }
    println!("  elapsed {:.1}s", s.elapsed_secs);
}
