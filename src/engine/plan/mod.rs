pub mod key_range;
pub mod partition;
pub mod range_planner;
pub mod scan_builder;
pub mod scan_options;

pub use key_range::{KeyBound, KeyRange};
pub use partition::ShardPartition;
pub use range_planner::{PlannedRange, RangePlanner};
pub use scan_builder::{ScanBuilder, ScanTarget};
pub use scan_options::ScanOptions;

#[cfg(test)]
mod scan_options_test;
