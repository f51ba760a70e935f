pub mod expr_factory;
pub mod reader_factory;
pub mod scan_target_factory;
pub mod table_factory;

pub use expr_factory::ExprFactory;
pub use reader_factory::{ReaderFactory, fast_reader_settings};
pub use scan_target_factory::ScanTargetFactory;
pub use table_factory::{TableFactory, scalar_from_json, sequential_row};

#[cfg(test)]
mod expr_factory_test;
#[cfg(test)]
mod table_factory_test;
