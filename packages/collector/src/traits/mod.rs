//! Core trait abstractions for the collector library.
//!
//! These traits define the seams between the shard runner and its
//! capabilities: content fetching, AI-backed extraction, progress
//! record-keeping, result output, and input reads.

pub mod backend;
pub mod fetcher;
pub mod ledger;
pub mod sink;
pub mod store;

pub use backend::{BackendResponse, ExtractionBackend};
pub use fetcher::Fetcher;
pub use ledger::ProgressLedger;
pub use sink::RecordSink;
pub use store::TaskStore;
