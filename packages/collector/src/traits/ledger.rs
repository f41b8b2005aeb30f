//! Progress ledger trait - durable per-item attempt records.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{ProgressEntry, WorkItem};

/// Append-only record of per-item outcomes, enabling audit and resume.
///
/// `record` must be durable before it returns; a crash immediately after a
/// successful `record` never loses that entry. There is no update or delete -
/// corrections are appended, and consumers take the most recent entry per
/// item as authoritative.
#[async_trait]
pub trait ProgressLedger: Send + Sync {
    /// Append one attempt record.
    async fn record(&self, entry: &ProgressEntry) -> Result<(), LedgerError>;

    /// The set of items with at least one recorded attempt.
    ///
    /// Both `success` and `failure` count as attempted; a resumed run skips
    /// every member of this set.
    async fn processed_set(&self) -> Result<HashSet<WorkItem>, LedgerError>;
}
