pub mod catalog;
pub mod driver;
pub mod engine;
pub mod logging;
pub mod shared;
pub mod store;

#[cfg(test)]
#[path = "../tests/helpers/mod.rs"]
pub mod test_helpers;
