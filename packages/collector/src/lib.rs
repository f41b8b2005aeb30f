//! Sharded Facility Page Collection Library
//!
//! Fetches facility web pages (HTML, image, or PDF), extracts structured
//! rows from them with an AI backend, and writes tab-separated output, with
//! the work list partitioned deterministically across parallel shard tasks.
//!
//! Each shard owns a durable progress ledger, so an interrupted or
//! deadline-stopped run resumes where it left off: attempted items are
//! skipped, unstarted items run, and a failed item never aborts the shard.
//!
//! # Usage
//!
//! ```rust,ignore
//! use collector::{
//!     assign_items, parse_work_list, run_shard, ExtractionClient, FileLedger,
//!     GeminiBackend, HttpFetcher, LocalStore, RunParams, TsvSink,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let params = RunParams::from_env()?;
//! let store = LocalStore::new(&params.data_dir);
//! let items = parse_work_list(&store.read_work_list(params.mode).await?)?;
//! let shard = assign_items(&items, params.shard_index, params.shard_count)?;
//!
//! let fetcher = HttpFetcher::new(&params);
//! let template = collector::load_template(&store, params.mode).await?;
//! let client = ExtractionClient::new(backend, template);
//! let ledger = FileLedger::open(&params.data_dir, params.mode, params.shard_index)?;
//! let sink = TsvSink::new(&params.data_dir, params.mode, params.shard_index);
//!
//! let report = run_shard(
//!     shard, &fetcher, &client, &ledger, &sink, &params,
//!     CancellationToken::new(),
//! )
//! .await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (Fetcher, ExtractionBackend, ProgressLedger, RecordSink, TaskStore)
//! - [`types`] - Work items, payloads, ledger entries, run parameters
//! - [`fetchers`] - Content fetcher implementations (HttpFetcher)
//! - [`backends`] - Extraction backend implementations (GeminiBackend)
//! - [`extract`] - Template rendering, retry, and response parsing
//! - [`ledgers`] - Progress ledger implementations
//! - [`sinks`] - Output sink implementations
//! - [`stores`] - Task input stores
//! - [`runner`] - The per-shard execution loop
//! - [`testing`] - Mock implementations for testing

pub mod backends;
pub mod error;
pub mod extract;
pub mod fetchers;
pub mod input;
pub mod ledgers;
pub mod runner;
pub mod shard;
pub mod sinks;
pub mod stats;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    BackendError, ConfigError, ExtractError, FailureKind, FetchError, ItemError, LedgerError,
    RunError, SinkError,
};
pub use traits::{
    BackendResponse, ExtractionBackend, Fetcher, ProgressLedger, RecordSink, TaskStore,
};
pub use types::{
    ExtractionResult, FetchedContent, JobMode, MediaKind, MediaPayload, Outcome, ProgressEntry,
    RunParams, WorkItem,
};

// Re-export the run surface
pub use input::parse_work_list;
pub use runner::run_shard;
pub use shard::{assign_items, shard_range};
pub use stats::{RunStats, ShardReport};

// Re-export extraction components
pub use extract::{load_template, ExtractionClient, ExtractionTemplate, RetryPolicy};

// Re-export implementations
pub use backends::{GeminiBackend, RateLimitedBackend};
pub use fetchers::HttpFetcher;
pub use ledgers::{FileLedger, MemoryLedger};
pub use sinks::{MemorySink, TsvSink};
pub use stores::{LocalStore, MemoryStore};
