use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub stdout_level: String,
    pub file_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Bounded queue capacity between a shard's producer and its reader (minimum 2)
    pub queue_depth: usize,
    /// TTL of the long-lived session opened per shard reader
    pub session_seconds: u64,
    /// Request-level timeout for range reads; scans are long-running
    pub request_timeout_secs: u64,
    /// Poll interval used by queue offers and takes
    pub poll_interval_ms: u64,
    /// Pause between queue drains while a closing reader waits for its producer
    pub drain_pause_ms: u64,
    /// Whether catalogs enumerate index pseudo-tables by default
    pub list_indexes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                stdout_level: "info".to_string(),
                file_level: "debug".to_string(),
            },
            scan: ScanConfig {
                queue_depth: 3,
                session_seconds: 30,
                request_timeout_secs: 8 * 3600,
                poll_interval_ms: 100,
                drain_pause_ms: 20,
                list_indexes: false,
            },
        }
    }
}

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    let config_path = env::var("KVSCAN_CONFIG").unwrap_or_else(|_| "config".to_string());
    load_settings_from(&config_path)
}

/// Built-in defaults, overlaid by an optional settings file, overlaid by
/// `KVSCAN__SECTION__KEY` environment variables.
pub fn load_settings_from(config_path: &str) -> Result<Settings, config::ConfigError> {
    let defaults = Settings::default();

    let settings: Settings = config::Config::builder()
        .set_default("logging.log_dir", defaults.logging.log_dir)?
        .set_default("logging.stdout_level", defaults.logging.stdout_level)?
        .set_default("logging.file_level", defaults.logging.file_level)?
        .set_default("scan.queue_depth", defaults.scan.queue_depth as i64)?
        .set_default("scan.session_seconds", defaults.scan.session_seconds as i64)?
        .set_default(
            "scan.request_timeout_secs",
            defaults.scan.request_timeout_secs as i64,
        )?
        .set_default("scan.poll_interval_ms", defaults.scan.poll_interval_ms as i64)?
        .set_default("scan.drain_pause_ms", defaults.scan.drain_pause_ms as i64)?
        .set_default("scan.list_indexes", defaults.scan.list_indexes)?
        .add_source(config::File::with_name(config_path).required(false))
        .add_source(
            config::Environment::with_prefix("KVSCAN")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?
        .try_deserialize()?;

    Ok(settings)
}
