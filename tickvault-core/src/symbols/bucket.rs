//! Listing strategy: walk the common prefixes directly below
//! `{asset path}/{period}/{data_type}/`. Each prefix is one symbol directory.

use super::SymbolSource;
use crate::config::AcquisitionConfig;
use crate::error::DataError;
use crate::listing::{ListingPages, ListingQuery};
use crate::retry::RetryableFetcher;

pub struct BucketListingSource {
    fetcher: RetryableFetcher,
}

impl BucketListingSource {
    pub fn new(fetcher: RetryableFetcher) -> Self {
        Self { fetcher }
    }
}

/// Symbol segment of a common prefix, relative to the listing prefix.
pub fn symbol_from_prefix<'a>(common_prefix: &'a str, listing_prefix: &str) -> Option<&'a str> {
    let rest = common_prefix.strip_prefix(listing_prefix)?;
    rest.split('/').find(|segment| !segment.is_empty())
}

impl SymbolSource for BucketListingSource {
    fn name(&self) -> &str {
        "listing"
    }

    fn fetch_symbols(&self, config: &AcquisitionConfig) -> Result<Vec<String>, DataError> {
        let prefix = config.listing_prefix();
        let query = ListingQuery::common_prefixes(&config.endpoints.listing_base_url, &prefix);

        let mut symbols = Vec::new();
        for page in ListingPages::new(&self.fetcher, query) {
            let page = page?;
            symbols.extend(
                page.prefixes
                    .iter()
                    .filter_map(|p| symbol_from_prefix(p, &prefix))
                    .map(str::to_string),
            );
        }
        Ok(symbols)
    }
}
