pub mod identifier;
pub mod store_catalog;
pub mod table;

pub use identifier::{INDEX_PREFIX, Identifier, merge_path, safe_name, table_path};
pub use store_catalog::{ENTRY_OWNER, ENTRY_TYPE, PRIMARY_KEY, StoreCatalog, TableChange};
pub use table::Table;
