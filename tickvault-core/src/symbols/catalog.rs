//! Catalog strategy: one request to the exchange metadata endpoint.
//!
//! Every listed symbol is taken regardless of trading status, so delisted
//! symbols with archived history are still acquired.

use super::SymbolSource;
use crate::config::AcquisitionConfig;
use crate::error::DataError;
use crate::retry::RetryableFetcher;
use crate::transport::Request;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    /// Options publish their instruments under `optionSymbols`.
    #[serde(alias = "optionSymbols")]
    symbols: Vec<SymbolRecord>,
}

#[derive(Debug, Deserialize)]
struct SymbolRecord {
    symbol: String,
}

pub struct CatalogSource {
    fetcher: RetryableFetcher,
}

impl CatalogSource {
    pub fn new(fetcher: RetryableFetcher) -> Self {
        Self { fetcher }
    }

    pub fn parse(body: &[u8]) -> Result<Vec<String>, DataError> {
        let resp: CatalogResponse = serde_json::from_slice(body)
            .map_err(|e| DataError::Parse(format!("catalog response: {e}")))?;
        Ok(resp.symbols.into_iter().map(|s| s.symbol).collect())
    }
}

impl SymbolSource for CatalogSource {
    fn name(&self) -> &str {
        "catalog"
    }

    fn fetch_symbols(&self, config: &AcquisitionConfig) -> Result<Vec<String>, DataError> {
        let url = config.endpoints.catalog_url(config.asset_class);
        let body = self.fetcher.fetch(&Request::get(url))?;
        Self::parse(&body)
    }
}
