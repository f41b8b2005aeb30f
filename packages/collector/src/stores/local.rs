//! Local filesystem task store.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::ConfigError;
use crate::traits::TaskStore;
use crate::types::JobMode;

/// Run inputs on the local filesystem, laid out per mode:
///
/// ```text
/// {root}/{mode}/input/input.csv    work list
/// {root}/{mode}/input/prompt.txt   extraction template (optional)
/// ```
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn input_dir(&self, mode: JobMode) -> PathBuf {
        self.root.join(mode.as_str()).join("input")
    }
}

#[async_trait]
impl TaskStore for LocalStore {
    async fn read_work_list(&self, mode: JobMode) -> Result<String, ConfigError> {
        let path = self.input_dir(mode).join("input.csv");
        fs::read_to_string(&path)
            .map_err(|e| ConfigError::WorkList(format!("{}: {e}", path.display())))
    }

    async fn read_template(&self, mode: JobMode) -> Result<Option<String>, ConfigError> {
        let path = self.input_dir(mode).join("prompt.txt");
        if !path.exists() {
            debug!(path = %path.display(), "no template file");
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| ConfigError::Template(format!("{}: {e}", path.display())))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_input(root: &Path, mode: JobMode, name: &str, content: &str) {
        let dir = root.join(mode.as_str()).join("input");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_reads_work_list() {
        let dir = tempdir().unwrap();
        write_input(
            dir.path(),
            JobMode::DoctorInfo,
            "input.csv",
            "fac_id_unif,URL\nF0001,https://example.com/\n",
        );

        let store = LocalStore::new(dir.path());
        let text = store.read_work_list(JobMode::DoctorInfo).await.unwrap();
        assert!(text.starts_with("fac_id_unif"));
    }

    #[tokio::test]
    async fn test_missing_work_list_is_config_error() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store.read_work_list(JobMode::DoctorInfo).await.unwrap_err();
        assert!(matches!(err, ConfigError::WorkList(_)));
    }

    #[tokio::test]
    async fn test_template_present_absent_and_blank() {
        let dir = tempdir().unwrap();
        write_input(dir.path(), JobMode::UrlCollect, "prompt.txt", "分類してください");
        write_input(dir.path(), JobMode::Outpatient, "prompt.txt", "   \n");

        let store = LocalStore::new(dir.path());
        assert_eq!(
            store.read_template(JobMode::UrlCollect).await.unwrap(),
            Some("分類してください".to_string())
        );
        assert_eq!(store.read_template(JobMode::DoctorInfo).await.unwrap(), None);
        assert_eq!(store.read_template(JobMode::Outpatient).await.unwrap(), None);
    }
}
