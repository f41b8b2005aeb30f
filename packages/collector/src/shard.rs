//! Shard partitioning - deterministic assignment of work-list slices.
//!
//! Each of W shards owns a contiguous slice of the ordered work list.
//! Identical `(total, index, count)` inputs always produce the identical
//! slice, so a failed-and-restarted shard reprocesses the same item range.

use std::ops::Range;

use crate::error::ConfigError;
use crate::types::WorkItem;

/// Index range of the work list owned by shard `shard_index` of
/// `shard_count`.
///
/// Sizes differ by at most 1 across shards; lower-indexed shards take the
/// remainder. Fails with [`ConfigError::InvalidShard`] when the coordinates
/// are out of range.
pub fn shard_range(
    total: usize,
    shard_index: usize,
    shard_count: usize,
) -> Result<Range<usize>, ConfigError> {
    if shard_count == 0 || shard_index >= shard_count {
        return Err(ConfigError::InvalidShard {
            index: shard_index,
            count: shard_count,
        });
    }

    let chunk = total / shard_count;
    let rem = total % shard_count;
    let start = shard_index * chunk + shard_index.min(rem);
    let len = chunk + usize::from(shard_index < rem);
    Ok(start..start + len)
}

/// The work items assigned to one shard, in input order.
pub fn assign_items(
    items: &[WorkItem],
    shard_index: usize,
    shard_count: usize,
) -> Result<Vec<WorkItem>, ConfigError> {
    let range = shard_range(items.len(), shard_index, shard_count)?;
    Ok(items[range].to_vec())
}
