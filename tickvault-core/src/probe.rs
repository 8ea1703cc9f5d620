//! Upstream schema probe.
//!
//! Fetches a single live record from the asset class's REST API and compares
//! its width with the expected-column table, so a changed upstream layout is
//! caught before anything is downloaded. A probe that cannot complete is a
//! failure, not a pass: the run cannot vouch for a schema it never saw.

use crate::config::{AcquisitionConfig, AssetClass};
use crate::error::DataError;
use crate::retry::RetryableFetcher;
use crate::transport::Request;
use crate::verify::schema::SchemaTable;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Match,
    Mismatch { expected: usize, actual: usize },
    /// Nothing to compare: no endpoint for this data type, or an empty sample.
    Skipped { reason: String },
    /// The live sample could not be fetched or decoded.
    Failed { reason: String },
}

impl ProbeOutcome {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, ProbeOutcome::Mismatch { .. })
    }

    /// Whether a run may go ahead after this outcome.
    pub fn permits_run(&self) -> bool {
        matches!(self, ProbeOutcome::Match | ProbeOutcome::Skipped { .. })
    }
}

/// A symbol that exists for the whole history of each asset class.
pub fn probe_symbol(asset_class: AssetClass) -> &'static str {
    match asset_class {
        AssetClass::Cm => "BTCUSD_PERP",
        _ => "BTCUSDT",
    }
}

/// One-record REST request for `config`'s data type, if there is an endpoint.
pub fn probe_request(config: &AcquisitionConfig) -> Option<Request> {
    let base = config.endpoints.api_base(config.asset_class).trim_end_matches('/');
    let request = match config.data_type.as_str() {
        "klines" => {
            Request::get(format!("{base}/klines")).param("interval", &config.frequency)
        }
        "aggTrades" => Request::get(format!("{base}/aggTrades")),
        "trades" => Request::get(format!("{base}/trades")),
        _ => return None,
    };
    Some(
        request
            .param("symbol", probe_symbol(config.asset_class))
            .param("limit", "1"),
    )
}

pub struct SchemaProbe {
    fetcher: RetryableFetcher,
}

impl SchemaProbe {
    pub fn new(fetcher: RetryableFetcher) -> Self {
        Self { fetcher }
    }

    pub fn check(&self, config: &AcquisitionConfig, schema: &SchemaTable) -> ProbeOutcome {
        if config.asset_class == AssetClass::Option {
            return ProbeOutcome::Skipped {
                reason: "option data has no REST probe".into(),
            };
        }
        let Some(request) = probe_request(config) else {
            return ProbeOutcome::Skipped {
                reason: format!("no live probe for data type '{}'", config.data_type),
            };
        };
        let Some(expected) = schema.expected_columns(&config.data_type, config.asset_class) else {
            return ProbeOutcome::Skipped {
                reason: "no expected column count".into(),
            };
        };

        let actual = match self.fetcher.fetch(&request).and_then(|body| record_width(&body)) {
            Ok(Some(width)) => width,
            Ok(None) => {
                warn!(url = %request.url, "schema probe returned no records");
                return ProbeOutcome::Skipped {
                    reason: "empty sample".into(),
                };
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "schema probe failed");
                return ProbeOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        if actual == expected {
            info!(columns = actual, data_type = %config.data_type, "upstream schema matches");
            ProbeOutcome::Match
        } else {
            warn!(expected, actual, data_type = %config.data_type, "upstream schema drift detected");
            ProbeOutcome::Mismatch { expected, actual }
        }
    }
}

/// Width of the first record of a REST sample: the length of an array row
/// (klines) or the number of keys of an object row (trades, aggTrades).
/// `None` for an empty sample.
pub fn record_width(body: &[u8]) -> Result<Option<usize>, DataError> {
    let rows: Vec<Value> =
        serde_json::from_slice(body).map_err(|e| DataError::Parse(format!("probe sample: {e}")))?;
    match rows.first() {
        None => Ok(None),
        Some(Value::Array(fields)) => Ok(Some(fields.len())),
        Some(Value::Object(fields)) => Ok(Some(fields.len())),
        Some(other) => Err(DataError::Parse(format!("probe sample: unexpected record {other}"))),
    }
}
