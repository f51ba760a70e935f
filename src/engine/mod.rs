pub mod errors;
pub mod expr;
pub mod plan;
pub mod scan;
pub mod types;

pub use errors::*;
