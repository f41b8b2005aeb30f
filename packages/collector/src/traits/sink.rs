//! Record sink trait - incremental tabular output.

use async_trait::async_trait;

use crate::error::SinkError;

/// Shard-local result sink.
///
/// `write` appends one item's rows and flushes before returning, so memory
/// stays bounded by a single item's row count. Creation is lazy: a run with
/// zero successful items must leave no sink artifact behind. A sink never
/// reopens or truncates a prior run's output.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append rows already in the mode's full column order.
    async fn write(&self, rows: &[Vec<String>]) -> Result<(), SinkError>;
}
