use std::sync::Arc;

use arrow_schema::Schema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::plan::{KeyBound, KeyRange, PlannedRange, ShardPartition};
use crate::engine::types::{ScalarValue, StoreType, Value, to_store_key};
use crate::shared::config::ConnectorOptions;

const LOG_TARGET: &str = "kvscan::plan::options";

/// Immutable description of one table scan. Built once on the coordinator
/// and shipped unchanged to every worker reading one of its partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub(crate) connection: ConnectorOptions,
    pub(crate) table_name: String,
    pub(crate) table_path: String,
    pub(crate) actual_schema: Schema,
    pub(crate) out_schema: Schema,
    pub(crate) key_columns: Vec<String>,
    pub(crate) key_types: Vec<StoreType>,
    pub(crate) planned: PlannedRange,
    pub(crate) partitions: Vec<KeyRange>,
    pub(crate) queue_depth: usize,
    pub(crate) session_seconds: u64,
    pub(crate) row_limit: Option<u64>,
}

impl ScanOptions {
    /// Connection options identifying the store; workers re-acquire their
    /// driver handle with it.
    pub fn connection(&self) -> &ConnectorOptions {
        &self.connection
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn table_path(&self) -> &str {
        &self.table_path
    }

    pub fn actual_schema(&self) -> &Schema {
        &self.actual_schema
    }

    pub fn out_schema(&self) -> &Schema {
        &self.out_schema
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn key_types(&self) -> &[StoreType] {
        &self.key_types
    }

    pub fn planned(&self) -> &PlannedRange {
        &self.planned
    }

    pub fn partitions(&self) -> &[KeyRange] {
        &self.partitions
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    pub fn session_seconds(&self) -> u64 {
        self.session_seconds
    }

    pub fn row_limit(&self) -> Option<u64> {
        self.row_limit
    }

    /// Columns requested from the store, in output order. The store needs at
    /// least one column, so an empty projection reads the first key column.
    pub fn out_columns(&self) -> Vec<String> {
        if self.out_schema.fields().is_empty() {
            return self.key_columns.iter().take(1).cloned().collect();
        }
        self.out_schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// The planned key range in store terms, inclusive on both sides.
    pub fn planned_range(&self) -> KeyRange {
        KeyRange::new(
            KeyBound::inclusive(self.store_key(&self.planned.range_begin)),
            KeyBound::inclusive(self.store_key(&self.planned.range_end)),
        )
    }

    /// Converts a planned key prefix to optional store values. A literal that
    /// does not fit its key type ends the prefix there, which only widens
    /// the range.
    fn store_key(&self, values: &[ScalarValue]) -> Vec<Value> {
        let mut key = Vec::with_capacity(values.len());
        for (pos, (value, ty)) in values.iter().zip(&self.key_types).enumerate() {
            match to_store_key(value, ty) {
                Ok(v) => key.push(v),
                Err(e) => {
                    debug!(
                        target: LOG_TARGET,
                        table = %self.table_name,
                        column = %self.key_columns[pos],
                        error = %e,
                        "Key literal not convertible, truncating range prefix"
                    );
                    break;
                }
            }
        }
        key
    }

    /// One partition per store shard. A table described without shards
    /// yields a single unrestricted partition.
    pub fn plan_partitions(self: &Arc<Self>) -> Vec<ShardPartition> {
        if self.partitions.is_empty() {
            return vec![ShardPartition::new(
                Arc::clone(self),
                0,
                KeyRange::unrestricted(),
            )];
        }
        self.partitions
            .iter()
            .enumerate()
            .map(|(index, range)| ShardPartition::new(Arc::clone(self), index, range.clone()))
            .collect()
    }

    pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}
