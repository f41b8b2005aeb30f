//! Data types for the collector library.

pub mod config;
pub mod item;

pub use config::{JobMode, RunParams};
pub use item::{
    jst_file_timestamp, jst_now, jst_now_iso, ExtractionResult, FetchedContent, MediaKind,
    MediaPayload, Outcome, ProgressEntry, WorkItem,
};
