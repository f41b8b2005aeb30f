//! Task store trait - read-side run inputs.

use async_trait::async_trait;

use crate::error::ConfigError;
use crate::types::JobMode;

/// Read access to the run's external inputs: the facility work list and the
/// per-mode extraction templates.
///
/// Both reads happen once, before any item starts, which is why failures are
/// [`ConfigError`] (fatal). The ledger and sink manage their own files; this
/// trait covers only what the runner consumes.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Read a mode's facility work list as CSV text.
    async fn read_work_list(&self, mode: JobMode) -> Result<String, ConfigError>;

    /// Read the extraction template for a mode, `None` when the store has no
    /// template for it (the built-in fallback is used instead).
    async fn read_template(&self, mode: JobMode) -> Result<Option<String>, ConfigError>;
}
