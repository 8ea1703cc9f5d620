//! Symbol discovery.
//!
//! Three interchangeable sources produce raw symbol lists; `SymbolResolver`
//! applies the shared post-processing (dedup, suffix filter, natural sort).
//! A source failure yields an empty list: "nothing to do" is a defined
//! outcome the caller must check for, not an error.

pub mod bucket;
pub mod catalog;
pub mod manifest;

pub use bucket::BucketListingSource;
pub use catalog::CatalogSource;
pub use manifest::ManifestSource;

use crate::config::{AcquisitionConfig, DiscoveryMethod};
use crate::error::DataError;
use crate::retry::RetryableFetcher;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{error, info};

/// A strategy producing the raw (unfiltered, unsorted) symbol list.
pub trait SymbolSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_symbols(&self, config: &AcquisitionConfig) -> Result<Vec<String>, DataError>;
}

/// Runs one `SymbolSource` and canonicalises its output.
pub struct SymbolResolver {
    source: Box<dyn SymbolSource>,
}

impl SymbolResolver {
    pub fn new(source: Box<dyn SymbolSource>) -> Self {
        Self { source }
    }

    /// Resolver for the configured discovery method.
    pub fn for_config(config: &AcquisitionConfig, fetcher: RetryableFetcher) -> Self {
        let source: Box<dyn SymbolSource> = match config.discovery {
            DiscoveryMethod::Catalog => Box::new(CatalogSource::new(fetcher)),
            DiscoveryMethod::Listing => Box::new(BucketListingSource::new(fetcher)),
            DiscoveryMethod::Manifest => Box::new(ManifestSource),
        };
        Self::new(source)
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Resolve, filter and naturally sort the symbols for `config`.
    ///
    /// Returns an empty list (after logging) if the source fails.
    pub fn resolve(&self, config: &AcquisitionConfig) -> Vec<String> {
        info!(
            source = self.source.name(),
            asset_class = %config.asset_class,
            "resolving symbols"
        );
        match self.source.fetch_symbols(config) {
            Ok(raw) => {
                let symbols = canonicalize(raw, &config.symbol_suffixes);
                info!(count = symbols.len(), "symbols resolved");
                symbols
            }
            Err(e) => {
                error!(source = self.source.name(), error = %e, "symbol discovery failed");
                Vec::new()
            }
        }
    }
}

/// Dedup, keep symbols ending in any suffix (all if `suffixes` is empty), natural sort.
pub fn canonicalize(symbols: Vec<String>, suffixes: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = symbols
        .into_iter()
        .filter(|s| !s.is_empty())
        .filter(|s| matches_suffix(s, suffixes))
        .filter(|s| seen.insert(s.clone()))
        .collect();
    out.sort_by(|a, b| natural_cmp(a, b));
    out
}

/// Case-sensitive suffix match. An empty filter keeps everything.
pub fn matches_suffix(symbol: &str, suffixes: &[String]) -> bool {
    suffixes.is_empty() || suffixes.iter().any(|suffix| symbol.ends_with(suffix.as_str()))
}

/// Natural ordering: digit runs compare by numeric value, everything else by
/// character. Ties (e.g. `A01` vs `A1`) fall back to plain byte order so the
/// ordering is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ab, bb) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < ab.len() && j < bb.len() {
        if ab[i].is_ascii_digit() && bb[j].is_ascii_digit() {
            let si = i;
            while i < ab.len() && ab[i].is_ascii_digit() {
                i += 1;
            }
            let sj = j;
            while j < bb.len() && bb[j].is_ascii_digit() {
                j += 1;
            }
            let ord = cmp_digit_runs(&ab[si..i], &bb[sj..j]);
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = ab[i].cmp(&bb[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }

    (ab.len() - i)
        .cmp(&(bb.len() - j))
        .then_with(|| a.cmp(b))
}

fn cmp_digit_runs(x: &[u8], y: &[u8]) -> Ordering {
    let trim = |s: &[u8]| -> usize { s.iter().take_while(|&&c| c == b'0').count() };
    let (x, y) = (&x[trim(x)..], &y[trim(y)..]);
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}
