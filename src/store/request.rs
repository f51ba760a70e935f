use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::types::Value;

/// One side of a range read: a (possibly partial) key tuple and whether it
/// is inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBound {
    pub key: Vec<Value>,
    pub inclusive: bool,
}

/// Ordered range read of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadTableRequest {
    pub columns: Vec<String>,
    pub from_key: Option<RequestBound>,
    pub to_key: Option<RequestBound>,
    pub row_limit: Option<u64>,
    pub ordered: bool,
    pub request_timeout: Duration,
}

impl ReadTableRequest {
    pub fn builder() -> ReadTableRequestBuilder {
        ReadTableRequestBuilder::default()
    }
}

#[derive(Debug, Clone)]
pub struct ReadTableRequestBuilder {
    columns: Vec<String>,
    from_key: Option<RequestBound>,
    to_key: Option<RequestBound>,
    row_limit: Option<u64>,
    ordered: bool,
    request_timeout: Duration,
}

impl Default for ReadTableRequestBuilder {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            from_key: None,
            to_key: None,
            row_limit: None,
            ordered: true,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ReadTableRequestBuilder {
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    pub fn columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the lower bound; an empty key leaves the side open.
    pub fn from_key(mut self, key: Vec<Value>, inclusive: bool) -> Self {
        self.from_key = (!key.is_empty()).then_some(RequestBound { key, inclusive });
        self
    }

    /// Sets the upper bound; an empty key leaves the side open.
    pub fn to_key(mut self, key: Vec<Value>, inclusive: bool) -> Self {
        self.to_key = (!key.is_empty()).then_some(RequestBound { key, inclusive });
        self
    }

    /// Zero means no limit.
    pub fn row_limit(mut self, limit: u64) -> Self {
        self.row_limit = (limit > 0).then_some(limit);
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn build(self) -> ReadTableRequest {
        ReadTableRequest {
            columns: self.columns,
            from_key: self.from_key,
            to_key: self.to_key,
            row_limit: self.row_limit,
            ordered: self.ordered,
            request_timeout: self.request_timeout,
        }
    }
}
