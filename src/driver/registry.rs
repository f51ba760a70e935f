use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use tracing::debug;

use super::connector::{Connector, StoreClientFactory};
use crate::engine::errors::StoreError;
use crate::shared::config::ConnectorOptions;

const LOG_TARGET: &str = "kvscan::driver::registry";

static GLOBAL_DRIVER_REGISTRY: Lazy<Arc<DriverRegistry>> =
    Lazy::new(|| Arc::new(DriverRegistry::new()));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub hits: u64,
    pub opened: u64,
    pub live: usize,
}

/// Process-wide cache of driver handles keyed by the canonical connection
/// options. Entries are weak: a handle lives as long as some catalog or
/// reader holds it, and the next lookup after that opens a fresh one.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    entries: DashMap<ConnectorOptions, Weak<Connector>>,
    hits: AtomicU64,
    opened: AtomicU64,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<DriverRegistry> {
        Arc::clone(&GLOBAL_DRIVER_REGISTRY)
    }

    /// Returns the live handle for `options`, opening one through `factory`
    /// when none exists. Concurrent callers with equal options get the same
    /// handle; the factory runs at most once per live handle.
    pub fn get_or_create(
        &self,
        options: &ConnectorOptions,
        factory: &dyn StoreClientFactory,
    ) -> Result<Arc<Connector>, StoreError> {
        let key = options.connection_snapshot();
        self.purge();

        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if let Some(connector) = entry.get().upgrade() {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(connector);
                }
                let connector = self.open(entry.key(), factory)?;
                entry.insert(Arc::downgrade(&connector));
                Ok(connector)
            }
            Entry::Vacant(entry) => {
                let connector = self.open(entry.key(), factory)?;
                entry.insert(Arc::downgrade(&connector));
                Ok(connector)
            }
        }
    }

    /// Looks up a live handle without opening one.
    pub fn get(&self, options: &ConnectorOptions) -> Option<Arc<Connector>> {
        let key = options.connection_snapshot();
        self.entries.get(&key).and_then(|weak| weak.upgrade())
    }

    /// Drops entries whose handle has been released.
    pub fn purge(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(target: LOG_TARGET, removed, "Purged released connectors");
        }
        removed
    }

    pub fn live_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            hits: self.hits.load(Ordering::Relaxed),
            opened: self.opened.load(Ordering::Relaxed),
            live: self.live_count(),
        }
    }

    fn open(
        &self,
        key: &ConnectorOptions,
        factory: &dyn StoreClientFactory,
    ) -> Result<Arc<Connector>, StoreError> {
        let client = factory.create_client(key)?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        debug!(target: LOG_TARGET, options = %key, "Opening connector");
        Ok(Arc::new(Connector::new(key.clone(), client)))
    }
}
