//! Incremental TSV output sink on the local filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::error::SinkError;
use crate::traits::RecordSink;
use crate::types::{jst_file_timestamp, JobMode};

/// Field value ceiling; longer values are clipped.
const MAX_FIELD_CHARS: usize = 500;

/// Tab-separated output file, one per shard per run.
///
/// The path carries a JST timestamp taken at construction, so a rerun of the
/// same shard writes a fresh file instead of reopening an earlier one. The
/// file and its header row are created lazily on the first batch; a shard
/// that produces no rows leaves nothing behind.
pub struct TsvSink {
    path: PathBuf,
    columns: &'static [&'static str],
    file: Mutex<Option<File>>,
}

impl TsvSink {
    pub fn new(data_dir: impl AsRef<Path>, mode: JobMode, shard_index: usize) -> Self {
        let path = data_dir.as_ref().join(mode.as_str()).join("tsv").join(format!(
            "{}_result_task_{}_{}.tsv",
            mode.as_str(),
            shard_index,
            jst_file_timestamp()
        ));
        Self {
            path,
            columns: mode.columns(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_with_header(&self) -> Result<File, SinkError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SinkError::Create {
                path: self.path.display().to_string(),
                source: e,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SinkError::Create {
                path: self.path.display().to_string(),
                source: e,
            })?;

        // Skip the header if a same-second rerun already wrote one
        let len = file.metadata().map_err(SinkError::Write)?.len();
        if len == 0 {
            let mut header = self.columns.join("\t");
            header.push('\n');
            file.write_all(header.as_bytes()).map_err(SinkError::Write)?;
        }
        info!(path = %self.path.display(), "output file created");
        Ok(file)
    }
}

#[async_trait]
impl RecordSink for TsvSink {
    async fn write(&self, rows: &[Vec<String>]) -> Result<(), SinkError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut batch = String::new();
        for row in rows {
            let cleaned: Vec<String> = row.iter().map(|f| clean_field(f)).collect();
            batch.push_str(&cleaned.join("\t"));
            batch.push('\n');
        }

        let mut guard = self.file.lock().unwrap();
        if guard.is_none() {
            *guard = Some(self.open_with_header()?);
        }
        let file = guard.as_mut().unwrap();
        file.write_all(batch.as_bytes()).map_err(SinkError::Write)?;
        file.flush().map_err(SinkError::Write)?;
        Ok(())
    }
}

/// Make a value safe for one TSV cell: no field or record separators, no
/// quote or backslash surprises downstream, bounded length.
fn clean_field(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '\t' | '\r' | '\n' => ' ',
            '"' => '\'',
            '\\' => '/',
            c => c,
        })
        .collect();
    if replaced.chars().count() > MAX_FIELD_CHARS {
        replaced.chars().take(MAX_FIELD_CHARS).collect()
    } else {
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let dir = tempdir().unwrap();
        let sink = TsvSink::new(dir.path(), JobMode::UrlCollect, 0);

        assert!(!sink.path().exists());
        sink.write(&[]).await.unwrap();
        assert!(!sink.path().exists(), "empty batch must not create the file");

        sink.write(&[row(&["F0001", "https://a", "s", "0.9", "t", "m"])])
            .await
            .unwrap();
        assert!(sink.path().exists());
    }

    #[tokio::test]
    async fn test_header_and_rows() {
        let dir = tempdir().unwrap();
        let sink = TsvSink::new(dir.path(), JobMode::UrlCollect, 2);

        sink.write(&[row(&["F0001", "https://a", "s", "0.9", "t1", "m1"])])
            .await
            .unwrap();
        sink.write(&[row(&["F0002", "https://b", "g_txt", "0.7", "t2", "m1"])])
            .await
            .unwrap();

        let text = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], JobMode::UrlCollect.columns().join("\t"));
        assert!(lines[1].starts_with("F0001\t"));
        assert!(lines[2].starts_with("F0002\t"));
    }

    #[tokio::test]
    async fn test_field_cleaning() {
        let dir = tempdir().unwrap();
        let sink = TsvSink::new(dir.path(), JobMode::UrlCollect, 0);

        sink.write(&[row(&[
            "F\t0001",
            "https://a",
            "s",
            "0.9",
            "line\nbreak",
            "say \"hi\" c:\\temp",
        ])])
        .await
        .unwrap();

        let text = fs::read_to_string(sink.path()).unwrap();
        let data_line = text.lines().nth(1).unwrap();
        assert_eq!(data_line.split('\t').count(), 6);
        assert!(data_line.contains("F 0001"));
        assert!(data_line.contains("line break"));
        assert!(data_line.contains("say 'hi' c:/temp"));
    }

    #[tokio::test]
    async fn test_long_field_clipped() {
        let long = "x".repeat(2000);
        let cleaned = clean_field(&long);
        assert_eq!(cleaned.chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn test_filename_carries_mode_and_shard() {
        let dir = tempdir().unwrap();
        let sink = TsvSink::new(dir.path(), JobMode::DoctorInfo, 7);
        let name = sink.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("doctor_info_result_task_7_"));
        assert!(name.ends_with(".tsv"));
    }
}
