//! Fetcher trait for pluggable content retrieval.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::{FetchedContent, WorkItem};

/// Fetcher trait for retrieving and classifying one work item's content.
///
/// Implementations fetch a single address and return classified, size-bounded
/// content:
/// - `HttpFetcher` - production HTTP(S) retrieval
/// - `MockFetcher` - canned responses for tests
///
/// Errors are item-scoped; the runner records them and moves on.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve the resource behind `item.source_url`, classify its media
    /// kind, and enforce the size ceilings.
    async fn fetch(&self, item: &WorkItem) -> Result<FetchedContent, FetchError>;

    /// Get the fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
