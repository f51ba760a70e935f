use thiserror::Error;
use tracing::{debug, error};

use crate::store::{Status, StatusCode};

/// A failed store call: what the connector was doing plus the store status.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{context}: {status}")]
pub struct StoreError {
    pub context: String,
    pub status: Status,
}

impl StoreError {
    pub fn new(context: impl Into<String>, status: Status) -> Self {
        Self {
            context: context.into(),
            status,
        }
    }

    pub fn code(&self) -> StatusCode {
        self.status.code()
    }
}

/// Errors raised when a value cannot cross between engine and store types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("Cannot convert {value} to {target}")]
    Mismatch { value: String, target: String },

    #[error("Value {value} is out of range for {target}")]
    OutOfRange { value: String, target: String },

    #[error("NULL is not allowed for non-optional type {0}")]
    NullForRequired(String),

    #[error("Unknown store type: {0}")]
    UnknownStoreType(String),

    #[error("Unsupported engine type: {0}")]
    UnsupportedEngineType(String),
}

/// Which way a result block disagreed with the projected columns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaDrift {
    #[error("Expected columns count {expected}, but got {got}")]
    ColumnCount { expected: usize, got: usize },

    #[error("Lost column [{0}] in the result set")]
    LostColumn(String),
}

/// Fatal errors surfaced by a shard reader to the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    #[error("Failed to initiate scan for table {table}: {source}")]
    Setup {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("{message} [{status}]")]
    Failed { message: String, status: Status },

    #[error("Scan of table {table} failed: {drift}")]
    SchemaDrift { table: String, drift: SchemaDrift },

    #[error("Scan producer for table {0} exited without an end-of-scan marker")]
    ProducerLost(String),

    #[error("Nothing to read: no current row")]
    NoCurrentRow,

    #[error("Value conversion failed: {0}")]
    Coercion(#[from] CoercionError),

    #[error("Record batch assembly failed: {0}")]
    Batch(String),
}

impl ScanError {
    pub fn failed(message: impl Into<String>, status: Status) -> Self {
        ScanError::Failed {
            message: message.into(),
            status,
        }
    }

    /// The store status behind this error, when the store produced one.
    pub fn status(&self) -> Option<&Status> {
        match self {
            ScanError::Setup { source, .. } => Some(&source.status),
            ScanError::Failed { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn log_error(&self) {
        match self {
            ScanError::Setup { table, source } => {
                error!("Scan setup failed for table {}: {}", table, source);
                debug!("Scan setup error details: {:?}", source);
            }
            ScanError::Failed { message, status } => {
                error!("{}: {}", message, status);
                debug!("Scan failure status details: {:?}", status);
            }
            ScanError::SchemaDrift { table, drift } => {
                error!("Result schema drift on table {}: {}", table, drift);
            }
            ScanError::ProducerLost(table) => {
                error!("Scan producer lost for table {}", table);
            }
            ScanError::NoCurrentRow => {
                error!("Row requested without a current row");
            }
            ScanError::Coercion(e) => {
                error!("Value conversion failed: {}", e);
                debug!("Value conversion error details: {:?}", e);
            }
            ScanError::Batch(e) => {
                error!("Record batch assembly failed: {}", e);
            }
        }
    }
}

/// Errors returned by catalog operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("Catalog {0} is not initialized")]
    NotInitialized(String),

    #[error("Namespace not found: {0}")]
    NoSuchNamespace(String),

    #[error("Table not found: {0}")]
    NoSuchTable(String),

    #[error("Namespace already exists: {0}")]
    NamespaceAlreadyExists(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Type conversion failed: {0}")]
    Coercion(#[from] CoercionError),
}
