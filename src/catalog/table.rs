use std::collections::BTreeMap;
use std::sync::Arc;

use arrow_schema::Schema;
use tracing::debug;

use crate::driver::Connector;
use crate::engine::errors::StoreError;
use crate::engine::plan::{ScanBuilder, ScanTarget};
use crate::shared::config::ConnectorOptions;
use crate::store::{TableDescription, index_table_path};

use super::store_catalog::{ENTRY_TYPE, PRIMARY_KEY};

const LOG_TARGET: &str = "kvscan::catalog::table";

/// A table, or an index pseudo-table, resolved against the store.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    path: String,
    index: Option<String>,
    description: TableDescription,
    target: ScanTarget,
    options: ConnectorOptions,
    connector: Arc<Connector>,
}

impl Table {
    /// Describes the table at `table_path`, or its index `index` when given.
    /// An index reads as a table keyed by the index columns followed by the
    /// table's primary key.
    pub fn lookup(
        connector: &Arc<Connector>,
        options: &ConnectorOptions,
        table_path: &str,
        name: &str,
        index: Option<&str>,
    ) -> Result<Table, StoreError> {
        let path = match index {
            Some(index) => index_table_path(table_path, index),
            None => table_path.to_string(),
        };
        let description = connector.client().describe_table(&path)?;
        debug!(
            target: LOG_TARGET,
            path = %path,
            columns = description.columns.len(),
            shards = description.partitions.len(),
            "Table described"
        );
        let target = ScanTarget::from_description(name, path.clone(), &description);
        Ok(Table {
            name: name.to_string(),
            path,
            index: index.map(str::to_string),
            description,
            target,
            options: options.clone(),
            connector: Arc::clone(connector),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store path read by scans of this table.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn is_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn description(&self) -> &TableDescription {
        &self.description
    }

    pub fn schema(&self) -> &Schema {
        &self.target.schema
    }

    pub fn key_columns(&self) -> &[String] {
        &self.target.key_columns
    }

    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    /// Stored table properties plus the primary key and the entry type.
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut properties = self.description.properties.clone();
        properties.insert(PRIMARY_KEY.to_string(), self.target.key_columns.join(","));
        let kind = if self.is_index() { "INDEX" } else { "TABLE" };
        properties.insert(ENTRY_TYPE.to_string(), kind.to_string());
        properties
    }

    pub fn scan_target(&self) -> &ScanTarget {
        &self.target
    }

    pub fn new_scan_builder(&self) -> ScanBuilder {
        ScanBuilder::new(self.target.clone(), self.options.clone())
    }
}
