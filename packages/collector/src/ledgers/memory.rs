//! In-memory progress ledger for testing and development.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::traits::ProgressLedger;
use crate::types::{Outcome, ProgressEntry, WorkItem};

/// In-memory ledger. Entries are lost on restart, so resume across runs
/// only works within one process; production shards use the file ledger.
pub struct MemoryLedger {
    entries: RwLock<Vec<ProgressEntry>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// All recorded entries, in record order.
    pub fn entries(&self) -> Vec<ProgressEntry> {
        self.entries.read().unwrap().clone()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn success_count(&self) -> usize {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Success))
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failure))
            .count()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

#[async_trait]
impl ProgressLedger for MemoryLedger {
    async fn record(&self, entry: &ProgressEntry) -> Result<(), LedgerError> {
        self.entries.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn processed_set(&self) -> Result<HashSet<WorkItem>, LedgerError> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .map(|e| e.work_item())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_by_outcome() {
        let ledger = MemoryLedger::new();
        let item = WorkItem::new("F0001", "https://example.com/");
        ledger.record(&ProgressEntry::success(&item)).await.unwrap();

        assert_eq!(ledger.entry_count(), 1);
        assert_eq!(ledger.success_count(), 1);
        assert_eq!(ledger.failure_count(), 0);

        let processed = ledger.processed_set().await.unwrap();
        assert!(processed.contains(&item));
    }
}
