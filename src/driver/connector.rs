use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::errors::StoreError;
use crate::shared::config::ConnectorOptions;
use crate::store::{MemoryStore, Session, StoreClient};

const LOG_TARGET: &str = "kvscan::driver";

/// Opens a store client for a set of connection options.
pub trait StoreClientFactory: Send + Sync {
    fn create_client(&self, options: &ConnectorOptions) -> Result<Arc<dyn StoreClient>, StoreError>;
}

impl<F> StoreClientFactory for F
where
    F: Fn(&ConnectorOptions) -> Result<Arc<dyn StoreClient>, StoreError> + Send + Sync,
{
    fn create_client(&self, options: &ConnectorOptions) -> Result<Arc<dyn StoreClient>, StoreError> {
        self(options)
    }
}

/// Every connection resolves to the same in-process store.
impl StoreClientFactory for MemoryStore {
    fn create_client(&self, _options: &ConnectorOptions) -> Result<Arc<dyn StoreClient>, StoreError> {
        Ok(Arc::new(self.clone()))
    }
}

/// A live driver handle: the store client plus the options it was opened
/// with. Shared by every catalog and reader in the process that uses equal
/// connection options.
pub struct Connector {
    options: ConnectorOptions,
    database: String,
    client: Arc<dyn StoreClient>,
}

impl Connector {
    pub fn new(options: ConnectorOptions, client: Arc<dyn StoreClient>) -> Self {
        let database = options.database();
        info!(
            target: LOG_TARGET,
            database = %database,
            options = %options,
            "Store connector opened"
        );
        Self {
            options,
            database,
            client,
        }
    }

    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn client(&self) -> &Arc<dyn StoreClient> {
        &self.client
    }

    pub fn create_session(&self, ttl: Duration) -> Result<Arc<dyn Session>, StoreError> {
        self.client.create_session(ttl)
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("database", &self.database)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        info!(
            target: LOG_TARGET,
            database = %self.database,
            "Store connector released"
        );
    }
}
