//! In-memory task store for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::ConfigError;
use crate::traits::TaskStore;
use crate::types::JobMode;

/// Task inputs held in memory.
pub struct MemoryStore {
    work_lists: RwLock<HashMap<JobMode, String>>,
    templates: RwLock<HashMap<JobMode, String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            work_lists: RwLock::new(HashMap::new()),
            templates: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_work_list(self, mode: JobMode, csv: impl Into<String>) -> Self {
        self.work_lists.write().unwrap().insert(mode, csv.into());
        self
    }

    pub fn with_template(self, mode: JobMode, text: impl Into<String>) -> Self {
        self.templates.write().unwrap().insert(mode, text.into());
        self
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn read_work_list(&self, mode: JobMode) -> Result<String, ConfigError> {
        self.work_lists
            .read()
            .unwrap()
            .get(&mode)
            .cloned()
            .ok_or_else(|| ConfigError::WorkList(format!("no work list for mode {mode}")))
    }

    async fn read_template(&self, mode: JobMode) -> Result<Option<String>, ConfigError> {
        Ok(self.templates.read().unwrap().get(&mode).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemoryStore::new()
            .with_work_list(JobMode::DoctorInfo, "fac_id_unif,URL\n")
            .with_template(JobMode::DoctorInfo, "抽出してください");

        assert!(store
            .read_work_list(JobMode::DoctorInfo)
            .await
            .unwrap()
            .starts_with("fac_id_unif"));
        assert!(store.read_template(JobMode::DoctorInfo).await.unwrap().is_some());
        assert!(store.read_template(JobMode::Outpatient).await.unwrap().is_none());
        assert!(store.read_work_list(JobMode::UrlCollect).await.is_err());
    }
}
