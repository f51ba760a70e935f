use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of the pseudo-table names under which secondary indexes are listed:
/// `ix/<table>/<index>`.
pub const INDEX_PREFIX: &str = "ix/";

/// A table name inside a namespace path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    namespace: Vec<String>,
    name: String,
}

impl Identifier {
    pub fn new(namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    pub fn of(namespace: &[&str], name: &str) -> Self {
        Self::new(namespace.iter().map(|s| s.to_string()).collect(), name)
    }

    pub fn namespace(&self) -> &[String] {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_index(&self) -> bool {
        self.name.starts_with(INDEX_PREFIX)
    }

    /// `(table, index)` for a well-formed index pseudo-table name.
    pub fn index_parts(&self) -> Option<(&str, &str)> {
        let rest = self.name.strip_prefix(INDEX_PREFIX)?;
        let (table, index) = rest.split_once('/')?;
        if table.is_empty() || index.is_empty() || index.contains('/') {
            return None;
        }
        Some((table, index))
    }

    /// Namespace and name joined with `/`, each part made path-safe.
    pub fn local_name(&self) -> String {
        self.namespace
            .iter()
            .chain(std::iter::once(&self.name))
            .map(|part| safe_name(part))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.namespace {
            write!(f, "{part}.")?;
        }
        f.write_str(&self.name)
    }
}

/// Path separators inside a single name component become underscores.
pub fn safe_name(part: &str) -> String {
    part.replace(['/', '\\'], "_")
}

/// `database/ns...` with every component made path-safe.
pub fn merge_path(database: &str, parts: &[String]) -> String {
    let mut path = database.trim_end_matches('/').to_string();
    for part in parts {
        path.push('/');
        path.push_str(&safe_name(part));
    }
    path
}

/// Store path of the table an identifier names.
pub fn table_path(database: &str, ident: &Identifier) -> String {
    let mut path = merge_path(database, ident.namespace());
    path.push('/');
    path.push_str(&safe_name(ident.name()));
    path
}
