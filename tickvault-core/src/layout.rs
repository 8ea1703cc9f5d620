//! Dataset directory layout and archive URL templates.
//!
//! Local layout: `{root}/{asset_class}/{symbol}/{frequency}/*.csv`, with
//! rejected files moved to `{root}/quarantine/`.
//!
//! Archive URLs are decoded with a per-asset-class named-capture template
//! instead of slash-segment indexing, so a URL that does not have the
//! expected shape is rejected rather than silently mapped to the wrong symbol.

use crate::config::{AssetClass, TimePeriod};
use crate::error::DataError;
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const ARCHIVE_EXTENSION: &str = ".zip";
pub const MEMBER_EXTENSION: &str = ".csv";
pub const QUARANTINE_DIR: &str = "quarantine";

/// Deterministic local paths for one asset class.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
    asset_class: AssetClass,
    frequency: String,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>, asset_class: AssetClass, frequency: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            asset_class,
            frequency: frequency.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{asset_class}/{symbol}/{frequency}` for the configured frequency.
    pub fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.dir_for(symbol, &self.frequency)
    }

    /// Destination directory for an archive, using the frequency its URL carries.
    pub fn archive_dir(&self, archive: &ArchiveUrl) -> PathBuf {
        self.dir_for(&archive.symbol, &archive.frequency)
    }

    fn dir_for(&self, symbol: &str, frequency: &str) -> PathBuf {
        self.root
            .join(self.asset_class.as_str())
            .join(symbol)
            .join(frequency)
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join(QUARANTINE_DIR)
    }
}

/// A remote archive reference decoded into its path components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUrl {
    pub url: String,
    pub period: TimePeriod,
    pub data_type: String,
    pub symbol: String,
    pub frequency: String,
    pub file_name: String,
}

impl ArchiveUrl {
    /// Date token embedded in the archive file name.
    pub fn date(&self) -> Option<NaiveDate> {
        date_token(&self.file_name)
    }
}

/// Named-capture pattern for the archive URLs of one asset class.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    asset_class: AssetClass,
    download_base: String,
    pattern: Regex,
}

impl UrlTemplate {
    pub fn new(download_base: &str, asset_class: AssetClass) -> Result<Self, DataError> {
        let base = download_base.trim_end_matches('/');
        let pattern = format!(
            r"^{}/{}/(?P<period>daily|monthly)/(?P<data_type>[^/]+)/(?P<symbol>[^/]+)/(?P<frequency>[^/]+)/(?P<file>[^/]+{})$",
            regex::escape(base),
            regex::escape(asset_class.key_prefix()),
            regex::escape(ARCHIVE_EXTENSION),
        );
        let pattern =
            Regex::new(&pattern).map_err(|e| DataError::Parse(format!("url template: {e}")))?;
        Ok(Self {
            asset_class,
            download_base: base.to_string(),
            pattern,
        })
    }

    /// Download URL for a listed object key.
    pub fn url_for_key(&self, key: &str) -> String {
        format!("{}/{}", self.download_base, key.trim_start_matches('/'))
    }

    pub fn parse(&self, url: &str) -> Result<ArchiveUrl, DataError> {
        let invalid = || DataError::InvalidUrl {
            url: url.to_string(),
            asset_class: self.asset_class.to_string(),
        };
        let caps = self.pattern.captures(url).ok_or_else(invalid)?;
        let period = caps["period"].parse().map_err(|_| invalid())?;
        Ok(ArchiveUrl {
            url: url.to_string(),
            period,
            data_type: caps["data_type"].to_string(),
            symbol: caps["symbol"].to_string(),
            frequency: caps["frequency"].to_string(),
            file_name: caps["file"].to_string(),
        })
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?P<year>\d{4})-(?P<month>\d{2})(?:-(?P<day>\d{2}))?\.(?:zip|csv)$")
            .expect("static date pattern")
    })
}

/// Parse the `YYYY-MM-DD` / `YYYY-MM` token at the end of an archive or member
/// file name. Monthly tokens resolve to the first day of the month.
pub fn date_token(file_name: &str) -> Option<NaiveDate> {
    let caps = date_pattern().captures(file_name)?;
    let year = caps["year"].parse().ok()?;
    let month = caps["month"].parse().ok()?;
    let day = match caps.name("day") {
        Some(d) => d.as_str().parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}
