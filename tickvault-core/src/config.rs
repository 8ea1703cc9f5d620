//! Serializable acquisition configuration.
//!
//! Loaded from a TOML file (or built in code) and validated once before a run.
//! Every component reads what it needs from here; nothing below the runner
//! parses command-line arguments.

use crate::layout::DatasetLayout;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Market segment with its own archive path structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Spot,
    /// USD-margined futures.
    Um,
    /// Coin-margined futures.
    Cm,
    Option,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Spot => "spot",
            AssetClass::Um => "um",
            AssetClass::Cm => "cm",
            AssetClass::Option => "option",
        }
    }

    /// Remote key path below the bucket root, e.g. `data/futures/um`.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            AssetClass::Spot => "data/spot",
            AssetClass::Um => "data/futures/um",
            AssetClass::Cm => "data/futures/cm",
            AssetClass::Option => "data/option",
        }
    }

    pub fn is_derivative(&self) -> bool {
        !matches!(self, AssetClass::Spot)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spot" => Ok(AssetClass::Spot),
            "um" => Ok(AssetClass::Um),
            "cm" => Ok(AssetClass::Cm),
            "option" => Ok(AssetClass::Option),
            other => Err(ConfigError::Invalid(format!(
                "asset class must be one of spot, um, cm, option (got '{other}')"
            ))),
        }
    }
}

/// Archive granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    Daily,
    Monthly,
}

impl TimePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::Daily => "daily",
            TimePeriod::Monthly => "monthly",
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimePeriod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(TimePeriod::Daily),
            "monthly" => Ok(TimePeriod::Monthly),
            other => Err(ConfigError::Invalid(format!(
                "time period must be daily or monthly (got '{other}')"
            ))),
        }
    }
}

/// How the symbol list is discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMethod {
    /// Exchange metadata endpoint.
    #[serde(alias = "api")]
    Catalog,
    /// Paginated common-prefix bucket listing.
    #[serde(alias = "xml")]
    Listing,
    /// Local JSON symbol list.
    #[serde(alias = "json")]
    Manifest,
}

impl std::str::FromStr for DiscoveryMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "catalog" | "api" => Ok(DiscoveryMethod::Catalog),
            "listing" | "xml" => Ok(DiscoveryMethod::Listing),
            "manifest" | "json" => Ok(DiscoveryMethod::Manifest),
            other => Err(ConfigError::Invalid(format!(
                "discovery must be catalog, listing or manifest (got '{other}')"
            ))),
        }
    }
}

/// Remote endpoints. Defaults point at the public Binance archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Bucket listing API root.
    pub listing_base_url: String,
    /// Root that archive keys are appended to for download.
    pub download_base_url: String,
    pub spot_api: String,
    pub um_api: String,
    pub cm_api: String,
    pub option_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            listing_base_url: "https://s3-ap-northeast-1.amazonaws.com/data.binance.vision".into(),
            download_base_url: "https://data.binance.vision".into(),
            spot_api: "https://api.binance.com/api/v3".into(),
            um_api: "https://fapi.binance.com/fapi/v1".into(),
            cm_api: "https://dapi.binance.com/dapi/v1".into(),
            option_api: "https://eapi.binance.com/eapi/v1".into(),
        }
    }
}

impl Endpoints {
    /// REST API root for an asset class.
    pub fn api_base(&self, asset_class: AssetClass) -> &str {
        match asset_class {
            AssetClass::Spot => &self.spot_api,
            AssetClass::Um => &self.um_api,
            AssetClass::Cm => &self.cm_api,
            AssetClass::Option => &self.option_api,
        }
    }

    /// Exchange metadata endpoint listing every symbol of an asset class.
    pub fn catalog_url(&self, asset_class: AssetClass) -> String {
        format!("{}/exchangeInfo", self.api_base(asset_class).trim_end_matches('/'))
    }
}

/// Complete configuration for one acquisition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    pub asset_class: AssetClass,
    pub time_period: TimePeriod,
    /// klines, aggTrades, trades, ...
    pub data_type: String,
    /// Interval segment, e.g. 1m, 1h, 1d.
    pub frequency: String,

    #[serde(default = "default_destination_dir")]
    pub destination_dir: PathBuf,

    /// Download pool size.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Extraction pool size.
    #[serde(default = "default_max_extract_workers")]
    pub max_extract_workers: usize,
    /// Downloaded archives allowed to wait for an extraction worker.
    #[serde(default = "default_extract_queue_depth")]
    pub extract_queue_depth: usize,

    /// Keep a symbol iff it ends with any of these (case-sensitive). Empty keeps all.
    #[serde(default)]
    pub symbol_suffixes: Vec<String>,

    /// 1-based batch index.
    #[serde(default = "default_one")]
    pub batch_number: usize,
    #[serde(default = "default_one")]
    pub total_batches: usize,

    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_discovery")]
    pub discovery: DiscoveryMethod,
    /// Required when `discovery = "manifest"`.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// TOML file overriding the built-in expected-column table.
    #[serde(default)]
    pub schema_table: Option<PathBuf>,
    /// Check the upstream row width before downloading anything.
    #[serde(default)]
    pub probe_schema: bool,

    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_destination_dir() -> PathBuf {
    PathBuf::from("./binance_data")
}

fn default_max_workers() -> usize {
    50
}

fn default_max_extract_workers() -> usize {
    10
}

fn default_extract_queue_depth() -> usize {
    256
}

fn default_one() -> usize {
    1
}

fn default_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_discovery() -> DiscoveryMethod {
    DiscoveryMethod::Catalog
}

impl AcquisitionConfig {
    /// Config with defaults for everything but the four required fields.
    pub fn new(
        asset_class: AssetClass,
        time_period: TimePeriod,
        data_type: impl Into<String>,
        frequency: impl Into<String>,
    ) -> Self {
        Self {
            asset_class,
            time_period,
            data_type: data_type.into(),
            frequency: frequency.into(),
            destination_dir: default_destination_dir(),
            max_workers: default_max_workers(),
            max_extract_workers: default_max_extract_workers(),
            extract_queue_depth: default_extract_queue_depth(),
            symbol_suffixes: Vec::new(),
            batch_number: 1,
            total_batches: 1,
            retries: default_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            discovery: default_discovery(),
            manifest_path: None,
            schema_table: None,
            probe_schema: false,
            endpoints: Endpoints::default(),
        }
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asset_class == AssetClass::Option && self.time_period != TimePeriod::Daily {
            return Err(ConfigError::Invalid(
                "option data is only available for the daily time period".into(),
            ));
        }
        if self.data_type.trim().is_empty() || self.frequency.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "data_type and frequency must not be empty".into(),
            ));
        }
        if self.total_batches == 0 {
            return Err(ConfigError::Invalid("total_batches must be at least 1".into()));
        }
        if self.batch_number == 0 || self.batch_number > self.total_batches {
            return Err(ConfigError::Invalid(format!(
                "batch_number must be in 1..={} (got {})",
                self.total_batches, self.batch_number
            )));
        }
        if self.max_workers == 0 || self.max_extract_workers == 0 {
            return Err(ConfigError::Invalid("worker pool sizes must be at least 1".into()));
        }
        if self.extract_queue_depth == 0 {
            return Err(ConfigError::Invalid("extract_queue_depth must be at least 1".into()));
        }
        if self.discovery == DiscoveryMethod::Manifest && self.manifest_path.is_none() {
            return Err(ConfigError::Invalid(
                "manifest discovery requires manifest_path".into(),
            ));
        }
        Ok(())
    }

    /// Listing prefix shared by every symbol: `data/spot/daily/klines/`.
    pub fn listing_prefix(&self) -> String {
        format!(
            "{}/{}/{}/",
            self.asset_class.key_prefix(),
            self.time_period,
            self.data_type
        )
    }

    /// Listing prefix for one symbol's archives: `data/spot/daily/klines/BTCUSDT/1m/`.
    pub fn symbol_prefix(&self, symbol: &str) -> String {
        format!("{}{symbol}/{}/", self.listing_prefix(), self.frequency)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.retry_base_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn layout(&self) -> DatasetLayout {
        DatasetLayout::new(
            &self.destination_dir,
            self.asset_class,
            self.frequency.clone(),
        )
    }
}
