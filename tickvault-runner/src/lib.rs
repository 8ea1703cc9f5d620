//! TickVault Runner: batch run orchestration on top of `tickvault-core`.
//!
//! This crate provides:
//! - The end-to-end acquisition run for one batch of a distributed job
//! - Offline verification of an existing dataset
//! - The run summary and symbol-list fingerprinting
//! - Tracing initialisation for binaries

pub mod logging;
pub mod runner;
pub mod summary;

pub use logging::init_tracing;
pub use runner::{
    dataset_symbols, http_transport, run_acquisition, run_verification, select_symbols,
    BatchSelection, RunError,
};
pub use summary::{symbol_fingerprint, RunSummary};
