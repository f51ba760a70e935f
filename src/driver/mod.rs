pub mod connector;
pub mod registry;

pub use connector::{Connector, StoreClientFactory};
pub use registry::{DriverRegistry, RegistryStats};
