pub use super::factories::{ExprFactory, ReaderFactory, ScanTargetFactory, TableFactory};

use crate::store::MemoryStore;

pub struct Factory;

impl Factory {
    pub fn expr() -> ExprFactory {
        ExprFactory::new()
    }

    pub fn table() -> TableFactory {
        TableFactory::new()
    }

    pub fn scan_target() -> ScanTargetFactory {
        ScanTargetFactory::new()
    }

    pub fn reader(store: &MemoryStore) -> ReaderFactory {
        ReaderFactory::new(store)
    }
}
