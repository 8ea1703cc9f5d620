//! Archive URL resolution: one paginated object listing per symbol, run on a
//! bounded rayon pool. A symbol whose listing fails contributes whatever
//! URLs it collected before the failure; other symbols are unaffected.

use crate::config::AcquisitionConfig;
use crate::error::DataError;
use crate::layout::{UrlTemplate, ARCHIVE_EXTENSION};
use crate::listing::{ListingPages, ListingQuery};
use crate::retry::RetryableFetcher;
use rayon::prelude::*;
use tracing::{info, warn};

pub struct UrlResolver {
    fetcher: RetryableFetcher,
    template: UrlTemplate,
    pool: rayon::ThreadPool,
}

impl UrlResolver {
    pub fn new(fetcher: RetryableFetcher, config: &AcquisitionConfig) -> Result<Self, DataError> {
        let template = UrlTemplate::new(&config.endpoints.download_base_url, config.asset_class)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers.max(1))
            .thread_name(|i| format!("tickvault-list-{i}"))
            .build()
            .map_err(|e| DataError::Io(std::io::Error::other(e)))?;
        Ok(Self {
            fetcher,
            template,
            pool,
        })
    }

    /// Download URLs for every symbol, grouped in symbol order.
    pub fn resolve_urls(&self, symbols: &[String], config: &AcquisitionConfig) -> Vec<String> {
        info!(symbols = symbols.len(), "resolving archive urls");
        let per_symbol: Vec<Vec<String>> = self.pool.install(|| {
            symbols
                .par_iter()
                .map(|symbol| self.urls_for_symbol(symbol, config))
                .collect()
        });
        let urls: Vec<String> = per_symbol.into_iter().flatten().collect();
        info!(urls = urls.len(), "archive urls resolved");
        urls
    }

    /// Walk one symbol's listing. Listing failures truncate the result.
    pub fn urls_for_symbol(&self, symbol: &str, config: &AcquisitionConfig) -> Vec<String> {
        let query =
            ListingQuery::objects(&config.endpoints.listing_base_url, config.symbol_prefix(symbol));
        let mut urls = Vec::new();

        for page in ListingPages::new(&self.fetcher, query) {
            match page {
                Ok(page) => urls.extend(
                    page.keys
                        .iter()
                        .filter(|key| key.ends_with(ARCHIVE_EXTENSION))
                        .map(|key| self.template.url_for_key(key)),
                ),
                Err(e) => {
                    warn!(symbol, collected = urls.len(), error = %e, "url listing failed");
                    break;
                }
            }
        }
        urls
    }
}
