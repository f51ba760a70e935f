//! Wire-level contract of the ordered key-value store the connector reads
//! from, plus an in-process implementation of it.

pub mod memory;
pub mod request;
pub mod result;
pub mod status;

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::errors::StoreError;
use crate::engine::plan::KeyRange;
use crate::engine::types::StoreType;

pub use memory::{MemoryFaults, MemoryStore};
pub use request::{ReadTableRequest, ReadTableRequestBuilder};
pub use result::ResultBlock;
pub use status::{Status, StatusCode};

/// Name of the hidden table backing a secondary index, relative to the
/// index directory under its table.
pub const INDEX_IMPL_TABLE: &str = "indexImplTable";

/// Scheme-level operations plus session creation.
pub trait StoreClient: Send + Sync {
    fn create_session(&self, ttl: Duration) -> Result<Arc<dyn Session>, StoreError>;

    /// Describes a table, including its shard key bounds.
    fn describe_table(&self, path: &str) -> Result<TableDescription, StoreError>;

    fn list_directory(&self, path: &str) -> Result<Vec<SchemeEntry>, StoreError>;

    fn describe_path(&self, path: &str) -> Result<SchemeEntry, StoreError>;

    /// Succeeds on an existing directory, reporting it as an issue.
    fn make_directory(&self, path: &str) -> Result<Status, StoreError>;

    fn remove_directory(&self, path: &str) -> Result<(), StoreError>;

    fn create_table(&self, path: &str, description: &TableDescription) -> Result<(), StoreError>;

    fn alter_table(&self, path: &str, operations: &[AlterOperation]) -> Result<(), StoreError>;

    fn drop_table(&self, path: &str) -> Result<(), StoreError>;

    fn rename_table(&self, from: &str, to: &str) -> Result<(), StoreError>;
}

/// A long-lived store session. Owned by exactly one reader at a time.
pub trait Session: Send + Sync {
    fn id(&self) -> u64;

    /// Opens an ordered range read. The stream does not run until started.
    fn read_table(
        &self,
        path: &str,
        request: ReadTableRequest,
    ) -> Result<Arc<dyn ReadStream>, StoreError>;

    /// Returns the session to the store. Idempotent.
    fn close(&self);
}

/// A streaming range read delivering one [`ResultBlock`] per protocol message.
pub trait ReadStream: Send + Sync {
    /// Runs the stream to completion, handing blocks to `sink` in store
    /// order, and returns the terminal status. The sink may stop the stream
    /// early by returning `Break`, which completes it as cancelled.
    fn start(&self, sink: &mut dyn FnMut(ResultBlock) -> ControlFlow<()>) -> Status;

    /// Cancels the stream from any thread. Idempotent.
    fn cancel(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Directory,
    Database,
    Table,
    ColumnTable,
    Other,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Directory => "DIRECTORY",
            EntryKind::Database => "DATABASE",
            EntryKind::Table => "TABLE",
            EntryKind::ColumnTable => "COLUMN_TABLE",
            EntryKind::Other => "OTHER",
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, EntryKind::Table | EntryKind::ColumnTable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeEntry {
    pub name: String,
    pub kind: EntryKind,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub store_type: StoreType,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, store_type: StoreType) -> Self {
        Self {
            name: name.into(),
            store_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub columns: Vec<String>,
}

/// Table layout as reported by the store. `partitions` lists the key range
/// of every shard in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub columns: Vec<ColumnDescription>,
    pub primary_key: Vec<String>,
    pub partitions: Vec<KeyRange>,
    pub indexes: Vec<IndexDescription>,
    pub properties: BTreeMap<String, String>,
}

impl TableDescription {
    pub fn column(&self, name: &str) -> Option<&ColumnDescription> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn key_types(&self) -> Option<Vec<StoreType>> {
        self.primary_key
            .iter()
            .map(|k| self.column(k).map(|c| c.store_type.clone()))
            .collect()
    }

    pub fn index(&self, name: &str) -> Option<&IndexDescription> {
        self.indexes.iter().find(|ix| ix.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlterOperation {
    AddColumn(ColumnDescription),
    DropColumn(String),
    SetProperty { key: String, value: String },
    RemoveProperty(String),
}

/// Joins a parent path and a child name with exactly one separator.
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if parent.is_empty() {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Path of the hidden table backing index `index` of the table at `table_path`.
pub fn index_table_path(table_path: &str, index: &str) -> String {
    join_path(&join_path(table_path, index), INDEX_IMPL_TABLE)
}

#[cfg(test)]
mod request_test;
