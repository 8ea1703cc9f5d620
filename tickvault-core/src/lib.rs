//! TickVault Core: discovery, download, extraction and verification of
//! historical market-data archives.
//!
//! This crate contains the acquisition machinery:
//! - Symbol discovery through a catalog endpoint, a paginated bucket listing,
//!   or a local manifest
//! - Cursor-paginated archive URL resolution per symbol
//! - A two-stage download/extract pipeline on separately sized thread pools
//! - Bounded retry of transient network failures
//! - Structural verification with non-destructive quarantine
//!
//! Everything that talks to the network goes through the [`transport::Transport`]
//! trait, so every component can be driven offline.

pub mod batch;
pub mod config;
pub mod error;
pub mod layout;
pub mod listing;
pub mod pipeline;
pub mod probe;
pub mod retry;
pub mod symbols;
pub mod transport;
pub mod urls;
pub mod verify;

pub use config::{AcquisitionConfig, AssetClass, ConfigError, DiscoveryMethod, TimePeriod};
pub use error::DataError;
pub use pipeline::{AcquisitionPipeline, PipelineReport};
pub use retry::{RetryPolicy, RetryableFetcher};
pub use symbols::SymbolResolver;
pub use urls::UrlResolver;
pub use verify::{Verdict, VerificationReport, Verifier};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across worker threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<AcquisitionConfig>();
        require_sync::<AcquisitionConfig>();
        require_send::<RetryableFetcher>();
        require_sync::<RetryableFetcher>();
        require_send::<UrlResolver>();
        require_sync::<UrlResolver>();
        require_send::<AcquisitionPipeline>();
        require_sync::<AcquisitionPipeline>();
        require_send::<SymbolResolver>();
        require_sync::<SymbolResolver>();
        require_send::<PipelineReport>();
        require_send::<DataError>();
        require_send::<transport::HttpTransport>();
        require_sync::<transport::HttpTransport>();
    }
}
