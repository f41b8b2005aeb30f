//! Append-only JSONL progress ledger on the local filesystem.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

use crate::error::LedgerError;
use crate::traits::ProgressLedger;
use crate::types::{JobMode, ProgressEntry, WorkItem};

/// Durable progress ledger: one JSON entry per line, appended and synced
/// before an item counts as attempted.
///
/// The file lives at `{data_dir}/{mode}/progress/task_{shard_index}.jsonl`
/// and survives restarts; a rerun of the same shard reads it back to skip
/// already-attempted items.
pub struct FileLedger {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLedger {
    /// Open (or create) the ledger file for one shard.
    pub fn open(
        data_dir: impl AsRef<Path>,
        mode: JobMode,
        shard_index: usize,
    ) -> Result<Self, LedgerError> {
        let path = data_dir
            .as_ref()
            .join(mode.as_str())
            .join("progress")
            .join(format!("task_{shard_index}.jsonl"));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(LedgerError::Write)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(LedgerError::Write)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProgressLedger for FileLedger {
    async fn record(&self, entry: &ProgressEntry) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| LedgerError::Write(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        line.push('\n');

        let mut file = self.file.lock().unwrap();
        file.write_all(line.as_bytes()).map_err(LedgerError::Write)?;
        file.flush().map_err(LedgerError::Write)?;
        // The entry must survive a crash before the item counts as attempted
        file.sync_data().map_err(LedgerError::Write)?;
        Ok(())
    }

    async fn processed_set(&self) -> Result<HashSet<WorkItem>, LedgerError> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let text = fs::read_to_string(&self.path).map_err(LedgerError::Read)?;

        let mut processed = HashSet::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ProgressEntry>(line) {
                Ok(entry) => {
                    processed.insert(entry.work_item());
                }
                // A torn final line from an interrupted run is not fatal
                Err(e) => warn!(path = %self.path.display(), error = %e, "skipping malformed ledger line"),
            }
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ItemError};
    use tempfile::tempdir;

    fn item(n: u32) -> WorkItem {
        WorkItem::new(format!("F{n:04}"), format!("https://example.com/{n}"))
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let dir = tempdir().unwrap();
        let ledger = FileLedger::open(dir.path(), JobMode::DoctorInfo, 0).unwrap();

        ledger.record(&ProgressEntry::success(&item(1))).await.unwrap();
        let failure = ItemError::from(FetchError::Timeout {
            url: item(2).source_url.clone(),
        });
        ledger
            .record(&ProgressEntry::failure(&item(2), &failure))
            .await
            .unwrap();

        let processed = ledger.processed_set().await.unwrap();
        assert_eq!(processed.len(), 2);
        assert!(processed.contains(&item(1)));
        assert!(processed.contains(&item(2)));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let ledger = FileLedger::open(dir.path(), JobMode::UrlCollect, 3).unwrap();
            ledger.record(&ProgressEntry::success(&item(7))).await.unwrap();
        }

        let reopened = FileLedger::open(dir.path(), JobMode::UrlCollect, 3).unwrap();
        let processed = reopened.processed_set().await.unwrap();
        assert_eq!(processed.len(), 1);
        assert!(processed.contains(&item(7)));
    }

    #[tokio::test]
    async fn test_fresh_ledger_is_empty() {
        let dir = tempdir().unwrap();
        let ledger = FileLedger::open(dir.path(), JobMode::Outpatient, 0).unwrap();
        assert!(ledger.processed_set().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let dir = tempdir().unwrap();
        let ledger = FileLedger::open(dir.path(), JobMode::DoctorInfo, 1).unwrap();
        ledger.record(&ProgressEntry::success(&item(1))).await.unwrap();

        // Simulate a torn write from a crashed run
        fs::write(
            ledger.path(),
            format!(
                "{}\n{{\"facility_id\":\"F00",
                serde_json::to_string(&ProgressEntry::success(&item(1))).unwrap()
            ),
        )
        .unwrap();

        let processed = ledger.processed_set().await.unwrap();
        assert_eq!(processed.len(), 1);
    }

    #[tokio::test]
    async fn test_shards_use_distinct_files() {
        let dir = tempdir().unwrap();
        let a = FileLedger::open(dir.path(), JobMode::DoctorInfo, 0).unwrap();
        let b = FileLedger::open(dir.path(), JobMode::DoctorInfo, 1).unwrap();

        a.record(&ProgressEntry::success(&item(1))).await.unwrap();

        assert_ne!(a.path(), b.path());
        assert!(b.processed_set().await.unwrap().is_empty());
    }
}
