//! In-memory record sink for testing and development.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::traits::RecordSink;

/// Collects rows in memory instead of writing a file.
pub struct MemorySink {
    rows: RwLock<Vec<Vec<String>>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    /// All rows written so far, in write order.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.read().unwrap().clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn clear(&self) {
        self.rows.write().unwrap().clear();
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write(&self, rows: &[Vec<String>]) -> Result<(), SinkError> {
        self.rows.write().unwrap().extend(rows.iter().cloned());
        Ok(())
    }
}
