use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::plan::{KeyRange, ScanOptions};

/// One unit of scan work: a store shard of the scanned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardPartition {
    options: Arc<ScanOptions>,
    index: usize,
    range: KeyRange,
}

impl ShardPartition {
    pub fn new(options: Arc<ScanOptions>, index: usize, range: KeyRange) -> Self {
        Self {
            options,
            index,
            range,
        }
    }

    pub fn options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Key range of the underlying shard.
    pub fn range(&self) -> &KeyRange {
        &self.range
    }

    /// The shard range narrowed by the planned range. May be empty.
    pub fn effective_range(&self) -> KeyRange {
        self.range.intersect(&self.options.planned_range())
    }

    pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

impl fmt::Display for ShardPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} {}",
            self.options.table_name(),
            self.index,
            self.range
        )
    }
}
