pub mod global;
pub mod model;
pub mod options;

pub use global::CONFIG;
pub use model::{LoggingConfig, ScanConfig, Settings, load_settings, load_settings_from};
pub use options::ConnectorOptions;
