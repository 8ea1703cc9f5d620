//! Structural verification of extracted files.
//!
//! Each `.csv` under a symbol's directory is checked for an expected column
//! count and a first-column timestamp of the expected width. Anything that
//! fails is moved to quarantine with a reason; nothing is ever deleted.
//! Verification is sequential and never returns an error: every outcome,
//! including unreadable files, ends up as a count in [`VerificationReport`].

pub mod continuity;
pub mod quarantine;
pub mod schema;

use crate::config::{AcquisitionConfig, AssetClass, ConfigError, TimePeriod};
use crate::error::DataError;
use crate::layout::{date_token, DatasetLayout, MEMBER_EXTENSION};
use chrono::Datelike;
use continuity::{continuity, ContinuityReport};
use quarantine::Quarantine;
use schema::SchemaTable;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// First year whose spot files carry microsecond timestamps.
pub const SPOT_MICROSECOND_CUTOVER_YEAR: i32 = 2025;
pub const MILLISECOND_DIGITS: usize = 13;
pub const MICROSECOND_DIGITS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    EmptyFile,
    SchemaMismatch { expected: usize, actual: usize },
    InvalidTimestamp { value: String },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Valid => f.write_str("valid"),
            Verdict::EmptyFile => f.write_str("empty file"),
            Verdict::SchemaMismatch { expected, actual } => {
                write!(f, "schema mismatch: expected {expected} columns, got {actual}")
            }
            Verdict::InvalidTimestamp { value } => write!(f, "invalid timestamp: {value:?}"),
        }
    }
}

/// Timestamp width expected in a file. Spot files dated on or after the
/// cutover use microseconds; everything else, including files whose name has
/// no date token, uses milliseconds.
pub fn expected_timestamp_digits(asset_class: AssetClass, file_name: &str) -> usize {
    let micro = asset_class == AssetClass::Spot
        && date_token(file_name).is_some_and(|d| d.year() >= SPOT_MICROSECOND_CUTOVER_YEAR);
    if micro {
        MICROSECOND_DIGITS
    } else {
        MILLISECOND_DIGITS
    }
}

/// Column check alone. `None` for `expected` disables it.
pub fn check_columns(expected: Option<usize>, actual: usize) -> Verdict {
    match expected {
        Some(expected) if expected != actual => Verdict::SchemaMismatch { expected, actual },
        _ => Verdict::Valid,
    }
}

/// Timestamp check alone: a non-empty run of ASCII digits of exactly `digits`.
pub fn check_timestamp(value: &str, digits: usize) -> Verdict {
    if value.len() == digits && value.bytes().all(|b| b.is_ascii_digit()) {
        Verdict::Valid
    } else {
        Verdict::InvalidTimestamp {
            value: value.to_string(),
        }
    }
}

/// True for a row like `open_time,open,high,...`.
fn is_column_name_row(record: &csv::StringRecord) -> bool {
    !record.is_empty()
        && record.iter().all(|field| {
            let mut chars = field.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFile {
    pub symbol: String,
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub files_checked: usize,
    pub valid: usize,
    pub quarantined: usize,
    pub quarantine_failures: usize,
    pub read_errors: usize,
    pub rejected: Vec<RejectedFile>,
    pub continuity: Vec<ContinuityReport>,
}

impl VerificationReport {
    pub fn errors(&self) -> usize {
        self.files_checked - self.valid
    }

    pub fn is_clean(&self) -> bool {
        self.errors() == 0
    }

    pub fn gap_count(&self) -> usize {
        self.continuity.iter().map(|c| c.missing.len()).sum()
    }
}

pub struct Verifier {
    layout: DatasetLayout,
    asset_class: AssetClass,
    time_period: TimePeriod,
    expected_columns: Option<usize>,
    quarantine: Quarantine,
}

impl Verifier {
    pub fn new(config: &AcquisitionConfig, schema: &SchemaTable) -> Self {
        let expected_columns = schema.expected_columns(&config.data_type, config.asset_class);
        if expected_columns.is_none() {
            warn!(
                data_type = %config.data_type,
                asset_class = %config.asset_class,
                "no expected column count; column check disabled"
            );
        }
        let layout = config.layout();
        let quarantine = Quarantine::new(layout.quarantine_dir());
        Self {
            layout,
            asset_class: config.asset_class,
            time_period: config.time_period,
            expected_columns,
            quarantine,
        }
    }

    /// Verifier using the config's schema table (built-in or override file).
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self, ConfigError> {
        let schema = SchemaTable::for_config(config)?;
        Ok(Self::new(config, &schema))
    }

    pub fn quarantine(&self) -> &Quarantine {
        &self.quarantine
    }

    /// Verify every file of every symbol, quarantining rejects.
    pub fn verify(&self, symbols: &[String]) -> VerificationReport {
        info!(symbols = symbols.len(), "verifying dataset");
        let mut report = VerificationReport::default();

        for symbol in symbols {
            let dir = self.layout.symbol_dir(symbol);
            let files = match csv_files(&dir) {
                Ok(files) => files,
                Err(e) => {
                    debug!(symbol, dir = %dir.display(), error = %e, "no files to verify");
                    continue;
                }
            };

            let mut dates = Vec::new();
            for path in files {
                report.files_checked += 1;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                let verdict = match self.check_file(&path) {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!(symbol, file = %file_name, error = %e, "could not read file");
                        report.read_errors += 1;
                        continue;
                    }
                };

                if verdict.is_valid() {
                    report.valid += 1;
                    dates.extend(date_token(&file_name));
                    continue;
                }

                let reason = verdict.to_string();
                match self.quarantine.relocate(&path, symbol, &reason) {
                    Ok(target) => {
                        warn!(symbol, file = %file_name, reason = %reason, to = %target.display(), "quarantined");
                        report.quarantined += 1;
                    }
                    Err(e) => {
                        warn!(symbol, file = %file_name, reason = %reason, error = %e, "quarantine failed");
                        report.quarantine_failures += 1;
                    }
                }
                report.rejected.push(RejectedFile {
                    symbol: symbol.clone(),
                    file: file_name,
                    reason,
                });
            }

            let gaps = continuity(symbol, dates, self.time_period);
            if gaps.has_gaps() {
                warn!(
                    symbol,
                    missing = gaps.missing.len(),
                    first = ?gaps.first,
                    last = ?gaps.last,
                    "date gaps in dataset"
                );
            }
            if gaps.files > 0 {
                report.continuity.push(gaps);
            }
        }

        if report.is_clean() {
            info!(files = report.files_checked, "verification passed");
        } else {
            warn!(
                files = report.files_checked,
                errors = report.errors(),
                quarantined = report.quarantined,
                "verification found problems"
            );
        }
        report
    }

    /// Verdict for a single file. Errors mean the file could not be read at
    /// all, which is reported but does not quarantine it.
    pub fn check_file(&self, path: &Path) -> Result<Verdict, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;
        let mut records = reader.records();

        let first = match records.next() {
            Some(record) => record.map_err(|e| csv_error(path, e))?,
            None => return Ok(Verdict::EmptyFile),
        };

        let (width, row) = if is_column_name_row(&first) {
            match records.next() {
                Some(row) => (first.len(), row.map_err(|e| csv_error(path, e))?),
                None => return Ok(Verdict::EmptyFile),
            }
        } else {
            (first.len(), first)
        };

        let columns = check_columns(self.expected_columns, width);
        if !columns.is_valid() {
            return Ok(columns);
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let digits = expected_timestamp_digits(self.asset_class, file_name);
        Ok(check_timestamp(row.get(0).unwrap_or_default(), digits))
    }
}

fn csv_error(path: &Path, e: csv::Error) -> DataError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => DataError::Io(io),
        other => DataError::Parse(format!("{}: {other:?}", path.display())),
    }
}

/// `.csv` files directly inside `dir`, sorted by name.
fn csv_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(MEMBER_EXTENSION))
        })
        .collect();
    files.sort();
    Ok(files)
}
