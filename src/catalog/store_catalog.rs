use std::collections::BTreeMap;
use std::sync::Arc;

use arrow_schema::{DataType, Schema};
use tracing::{debug, info, warn};

use super::identifier::{Identifier, merge_path, table_path};
use super::table::Table;
use crate::driver::{Connector, DriverRegistry, StoreClientFactory};
use crate::engine::errors::{CatalogError, StoreError};
use crate::engine::types::StoreType;
use crate::shared::config::ConnectorOptions;
use crate::store::{AlterOperation, ColumnDescription, EntryKind, StatusCode, TableDescription};

const LOG_TARGET: &str = "kvscan::catalog";

pub const ENTRY_TYPE: &str = "entry_type";
pub const ENTRY_OWNER: &str = "entry_owner";
/// Table property listing the primary key columns, comma separated.
pub const PRIMARY_KEY: &str = "primary_key";

const PATH_NOT_FOUND: &str = "Path not found";
const PATH_EXISTS: &str = " path exist, request accepts it";

/// A change requested by the engine's `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    AddColumn { name: String, data_type: DataType },
    DeleteColumn(String),
    SetProperty { key: String, value: String },
    RemoveProperty(String),
    RenameColumn { from: String, to: String },
    UpdateColumnType { name: String, data_type: DataType },
}

struct CatalogState {
    connector: Arc<Connector>,
    options: ConnectorOptions,
    list_indexes: bool,
}

/// Namespaces are store directories under the database root; tables are the
/// store tables inside them.
pub struct StoreCatalog {
    name: String,
    registry: Arc<DriverRegistry>,
    clients: Arc<dyn StoreClientFactory>,
    state: Option<CatalogState>,
}

impl StoreCatalog {
    pub fn new(clients: Arc<dyn StoreClientFactory>) -> Self {
        Self {
            name: String::new(),
            registry: DriverRegistry::global(),
            clients,
            state: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<DriverRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn initialize(&mut self, name: &str, options: ConnectorOptions) -> Result<(), CatalogError> {
        let connector = self.registry.get_or_create(&options, self.clients.as_ref())?;
        let list_indexes = options.list_indexes();
        info!(
            target: LOG_TARGET,
            catalog = name,
            database = connector.database(),
            list_indexes,
            "Catalog initialized"
        );
        self.name = name.to_string();
        self.state = Some(CatalogState {
            connector,
            options,
            list_indexes,
        });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> Result<&CatalogState, CatalogError> {
        self.state
            .as_ref()
            .ok_or_else(|| CatalogError::NotInitialized(self.name.clone()))
    }

    pub fn connector(&self) -> Result<&Arc<Connector>, CatalogError> {
        Ok(&self.state()?.connector)
    }

    fn namespace_path(&self, namespace: &[String]) -> Result<String, CatalogError> {
        Ok(merge_path(self.connector()?.database(), namespace))
    }

    fn table_path(&self, ident: &Identifier) -> Result<String, CatalogError> {
        Ok(table_path(self.connector()?.database(), ident))
    }

    pub fn list_namespaces(&self, namespace: &[String]) -> Result<Vec<Vec<String>>, CatalogError> {
        let path = self.namespace_path(namespace)?;
        let entries = self
            .connector()?
            .client()
            .list_directory(&path)
            .map_err(|e| namespace_error(e, namespace))?;
        Ok(entries
            .into_iter()
            .filter(|e| e.kind == EntryKind::Directory)
            .map(|e| {
                let mut child = namespace.to_vec();
                child.push(e.name);
                child
            })
            .collect())
    }

    pub fn namespace_exists(&self, namespace: &[String]) -> Result<bool, CatalogError> {
        match self.load_namespace_metadata(namespace) {
            Ok(_) => Ok(true),
            Err(CatalogError::NoSuchNamespace(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Entry type and owner of a namespace directory. The root namespace has
    /// no metadata.
    pub fn load_namespace_metadata(
        &self,
        namespace: &[String],
    ) -> Result<BTreeMap<String, String>, CatalogError> {
        let mut metadata = BTreeMap::new();
        if namespace.is_empty() {
            self.state()?;
            return Ok(metadata);
        }
        let path = self.namespace_path(namespace)?;
        let entry = self
            .connector()?
            .client()
            .describe_path(&path)
            .map_err(|e| namespace_error(e, namespace))?;
        metadata.insert(ENTRY_TYPE.to_string(), entry.kind.as_str().to_string());
        metadata.insert(ENTRY_OWNER.to_string(), entry.owner);
        Ok(metadata)
    }

    /// Namespace metadata is not stored; only the directory is created.
    pub fn create_namespace(
        &self,
        namespace: &[String],
        _metadata: &BTreeMap<String, String>,
    ) -> Result<(), CatalogError> {
        let path = self.namespace_path(namespace)?;
        let status = self.connector()?.client().make_directory(&path)?;
        if status.is_success() && status.issues().iter().any(|i| i.contains(PATH_EXISTS)) {
            return Err(CatalogError::NamespaceAlreadyExists(namespace.join(".")));
        }
        status.expect_success(format!("create namespace {path}"))?;
        info!(target: LOG_TARGET, path = %path, "Namespace created");
        Ok(())
    }

    pub fn alter_namespace(&self, namespace: &[String]) -> Result<(), CatalogError> {
        Err(CatalogError::Unsupported(format!(
            "altering namespace {}",
            namespace.join(".")
        )))
    }

    /// Removes an empty namespace; `false` when the store refused.
    pub fn drop_namespace(&self, namespace: &[String], recursive: bool) -> Result<bool, CatalogError> {
        if recursive {
            return Err(CatalogError::Unsupported(
                "recursive namespace removal".to_string(),
            ));
        }
        let path = self.namespace_path(namespace)?;
        match self.connector()?.client().remove_directory(&path) {
            Ok(()) => {
                info!(target: LOG_TARGET, path = %path, "Namespace dropped");
                Ok(true)
            }
            Err(e) => {
                debug!(target: LOG_TARGET, path = %path, error = %e, "Namespace not dropped");
                Ok(false)
            }
        }
    }

    /// Tables of a namespace, followed by `ix/<table>/<index>` for each of
    /// their indexes when index listing is enabled.
    pub fn list_tables(&self, namespace: &[String]) -> Result<Vec<Identifier>, CatalogError> {
        let state = self.state()?;
        let path = self.namespace_path(namespace)?;
        let entries = state
            .connector
            .client()
            .list_directory(&path)
            .map_err(|e| namespace_error(e, namespace))?;

        let mut tables = Vec::new();
        for entry in entries.into_iter().filter(|e| e.kind.is_table()) {
            tables.push(Identifier::new(namespace.to_vec(), entry.name.clone()));
            if state.list_indexes && entry.kind == EntryKind::Table {
                self.push_indexes(namespace, &entry.name, &mut tables)?;
            }
        }
        Ok(tables)
    }

    fn push_indexes(
        &self,
        namespace: &[String],
        table: &str,
        out: &mut Vec<Identifier>,
    ) -> Result<(), CatalogError> {
        let ident = Identifier::new(namespace.to_vec(), table);
        let path = self.table_path(&ident)?;
        match self.connector()?.client().describe_table(&path) {
            Ok(description) => {
                for index in &description.indexes {
                    let name = format!("{}{}/{}", super::INDEX_PREFIX, table, index.name);
                    out.push(Identifier::new(namespace.to_vec(), name));
                }
            }
            Err(e) => {
                warn!(
                    target: LOG_TARGET,
                    path = %path,
                    error = %e,
                    "Skipping index listing for table due to failed describe"
                );
            }
        }
        Ok(())
    }

    pub fn load_table(&self, ident: &Identifier) -> Result<Table, CatalogError> {
        let state = self.state()?;
        let database = state.connector.database();
        if ident.is_index() {
            let (table, index) = ident
                .index_parts()
                .ok_or_else(|| CatalogError::NoSuchTable(ident.to_string()))?;
            let base = Identifier::new(ident.namespace().to_vec(), table);
            return Table::lookup(
                &state.connector,
                &state.options,
                &table_path(database, &base),
                &ident.local_name(),
                Some(index),
            )
            .map_err(|e| table_error(e, ident));
        }
        Table::lookup(
            &state.connector,
            &state.options,
            &table_path(database, ident),
            &ident.local_name(),
            None,
        )
        .map_err(|e| table_error(e, ident))
    }

    pub fn table_exists(&self, ident: &Identifier) -> Result<bool, CatalogError> {
        match self.load_table(ident) {
            Ok(_) => Ok(true),
            Err(CatalogError::NoSuchTable(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Creates a table from an engine schema. The key comes from the
    /// `primary_key` property and defaults to the first column; other
    /// properties are stored with the table.
    pub fn create_table(
        &self,
        ident: &Identifier,
        schema: &Schema,
        properties: &BTreeMap<String, String>,
    ) -> Result<Table, CatalogError> {
        if ident.is_index() {
            return Err(CatalogError::Unsupported(format!(
                "direct index table creation, identifier {ident}"
            )));
        }
        let path = self.table_path(ident)?;
        let description = describe_new_table(schema, properties)?;
        self.connector()?
            .client()
            .create_table(&path, &description)
            .map_err(|e| match e.code() {
                StatusCode::AlreadyExists => CatalogError::TableAlreadyExists(ident.to_string()),
                _ => CatalogError::Store(e),
            })?;
        info!(target: LOG_TARGET, path = %path, key = ?description.primary_key, "Table created");
        self.load_table(ident)
    }

    pub fn alter_table(&self, ident: &Identifier, changes: &[TableChange]) -> Result<Table, CatalogError> {
        if ident.is_index() {
            return Err(CatalogError::Unsupported(format!(
                "index table alteration, identifier {ident}"
            )));
        }
        let path = self.table_path(ident)?;
        let operations = changes
            .iter()
            .map(alter_operation)
            .collect::<Result<Vec<_>, _>>()?;
        self.connector()?
            .client()
            .alter_table(&path, &operations)
            .map_err(|e| table_error(e, ident))?;
        info!(target: LOG_TARGET, path = %path, changes = operations.len(), "Table altered");
        self.load_table(ident)
    }

    /// `false` when there is no such table.
    pub fn drop_table(&self, ident: &Identifier) -> Result<bool, CatalogError> {
        if ident.is_index() {
            return Err(CatalogError::Unsupported(format!("dropping index table {ident}")));
        }
        let path = self.table_path(ident)?;
        debug!(target: LOG_TARGET, path = %path, "Dropping table");
        let client = self.connector()?.client();
        match client.describe_table(&path) {
            Ok(_) => {}
            Err(e) if e.code() == StatusCode::SchemeError => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        client.drop_table(&path)?;
        info!(target: LOG_TARGET, path = %path, "Table dropped");
        Ok(true)
    }

    pub fn rename_table(&self, from: &Identifier, to: &Identifier) -> Result<(), CatalogError> {
        if from.is_index() {
            return Err(CatalogError::Unsupported(format!("renaming index table {from}")));
        }
        if to.is_index() {
            return Err(CatalogError::Unsupported(format!("renaming table to index {to}")));
        }
        let old_path = self.table_path(from)?;
        let new_path = self.table_path(to)?;
        self.connector()?
            .client()
            .rename_table(&old_path, &new_path)
            .map_err(|e| match e.code() {
                StatusCode::SchemeError => CatalogError::NoSuchTable(from.to_string()),
                StatusCode::AlreadyExists => CatalogError::TableAlreadyExists(to.to_string()),
                _ => CatalogError::Store(e),
            })?;
        info!(target: LOG_TARGET, from = %old_path, to = %new_path, "Table renamed");
        Ok(())
    }
}

fn namespace_error(err: StoreError, namespace: &[String]) -> CatalogError {
    let missing = err.code() == StatusCode::SchemeError
        && err.status.issues().iter().any(|i| i.contains(PATH_NOT_FOUND));
    if missing {
        CatalogError::NoSuchNamespace(namespace.join("."))
    } else {
        CatalogError::Store(err)
    }
}

fn table_error(err: StoreError, ident: &Identifier) -> CatalogError {
    if err.code() == StatusCode::SchemeError {
        CatalogError::NoSuchTable(ident.to_string())
    } else {
        CatalogError::Store(err)
    }
}

fn describe_new_table(
    schema: &Schema,
    properties: &BTreeMap<String, String>,
) -> Result<TableDescription, CatalogError> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let ty = StoreType::from_arrow(field.data_type())?;
            let ty = if field.is_nullable() { ty.optional() } else { ty };
            Ok(ColumnDescription::new(field.name().clone(), ty))
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;

    let primary_key: Vec<String> = match properties.get(PRIMARY_KEY) {
        Some(raw) => raw
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        None => columns.iter().take(1).map(|c| c.name.clone()).collect(),
    };
    let properties = properties
        .iter()
        .filter(|(k, _)| k.as_str() != PRIMARY_KEY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(TableDescription {
        columns,
        primary_key,
        partitions: Vec::new(),
        indexes: Vec::new(),
        properties,
    })
}

fn alter_operation(change: &TableChange) -> Result<AlterOperation, CatalogError> {
    let operation = match change {
        TableChange::AddColumn { name, data_type } => {
            // Added columns are always nullable: existing rows have no value.
            let ty = StoreType::from_arrow(data_type)?.optional();
            AlterOperation::AddColumn(ColumnDescription::new(name.clone(), ty))
        }
        TableChange::DeleteColumn(name) => AlterOperation::DropColumn(name.clone()),
        TableChange::SetProperty { key, value } => AlterOperation::SetProperty {
            key: key.clone(),
            value: value.clone(),
        },
        TableChange::RemoveProperty(key) => AlterOperation::RemoveProperty(key.clone()),
        other => {
            return Err(CatalogError::Unsupported(format!(
                "table alter operation {other:?}"
            )));
        }
    };
    Ok(operation)
}
