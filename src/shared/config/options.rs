use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::shared::config::CONFIG;

pub const SCAN_QUEUE_DEPTH: &str = "scan.queue.depth";
pub const SCAN_SESSION_SECONDS: &str = "scan.session.seconds";
pub const LIST_INDEXES: &str = "list.indexes";
pub const DATABASE: &str = "database";

pub const MIN_QUEUE_DEPTH: usize = 2;
pub const DEFAULT_QUEUE_DEPTH: usize = 3;
pub const DEFAULT_DATABASE: &str = "/local";

const LOG_TARGET: &str = "kvscan::config::options";

/// Engine-supplied connector options. Keys are matched case-insensitively;
/// they are stored lowercased in a sorted map so that two equal option sets
/// always have the same canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectorOptions {
    entries: BTreeMap<String, String>,
}

impl ConnectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bounded queue capacity per shard reader. Values below the minimum are
    /// clamped; values that are not a 32-bit integer fall back to the default.
    pub fn queue_depth(&self) -> usize {
        let Some(raw) = self.get(SCAN_QUEUE_DEPTH) else {
            return CONFIG.scan.queue_depth.max(MIN_QUEUE_DEPTH);
        };
        match raw.trim().parse::<i32>() {
            Ok(depth) if depth < MIN_QUEUE_DEPTH as i32 => {
                warn!(
                    target: LOG_TARGET,
                    option = SCAN_QUEUE_DEPTH,
                    value = depth,
                    "Queue depth below minimum, using {}",
                    MIN_QUEUE_DEPTH
                );
                MIN_QUEUE_DEPTH
            }
            Ok(depth) => depth as usize,
            Err(_) => {
                warn!(
                    target: LOG_TARGET,
                    option = SCAN_QUEUE_DEPTH,
                    value = raw,
                    "Illegal queue depth, using default {}",
                    DEFAULT_QUEUE_DEPTH
                );
                DEFAULT_QUEUE_DEPTH
            }
        }
    }

    /// TTL of the session each shard reader holds for the duration of its
    /// scan. Must be a positive 32-bit integer.
    pub fn session_seconds(&self) -> u64 {
        let fallback = CONFIG.scan.session_seconds;
        let Some(raw) = self.get(SCAN_SESSION_SECONDS) else {
            return fallback;
        };
        match raw.trim().parse::<i32>() {
            Ok(seconds) if seconds > 0 => seconds as u64,
            _ => {
                warn!(
                    target: LOG_TARGET,
                    option = SCAN_SESSION_SECONDS,
                    value = raw,
                    "Illegal session TTL, using default {}",
                    fallback
                );
                fallback
            }
        }
    }

    pub fn list_indexes(&self) -> bool {
        match self.get(LIST_INDEXES) {
            Some(raw) => raw.trim().eq_ignore_ascii_case("true"),
            None => CONFIG.scan.list_indexes,
        }
    }

    /// Root path under which catalog namespaces live.
    pub fn database(&self) -> String {
        let raw = self.get(DATABASE).unwrap_or(DEFAULT_DATABASE).trim();
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            DEFAULT_DATABASE.to_string()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// The options that identify a store connection, without the scan and
    /// catalog tuning knobs. Equal snapshots share one driver handle.
    pub fn connection_snapshot(&self) -> ConnectorOptions {
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| {
                !matches!(k.as_str(), SCAN_QUEUE_DEPTH | SCAN_SESSION_SECONDS | LIST_INDEXES)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        ConnectorOptions { entries }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ConnectorOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = ConnectorOptions::new();
        for (k, v) in iter {
            options.set(k.as_ref(), v);
        }
        options
    }
}

impl fmt::Display for ConnectorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (k, v)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}
