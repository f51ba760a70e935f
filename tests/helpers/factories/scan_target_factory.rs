use crate::engine::plan::{KeyRange, ScanBuilder, ScanTarget};
use crate::engine::types::StoreType;
use crate::shared::config::ConnectorOptions;
use arrow_schema::{Field, Schema};

/// Builds a [`ScanTarget`] without going through a catalog. Defaults to the
/// `orders` layout used by `TableFactory`.
pub struct ScanTargetFactory {
    name: String,
    path: String,
    columns: Vec<(String, StoreType)>,
    key_columns: Vec<String>,
    partitions: Vec<KeyRange>,
}

impl ScanTargetFactory {
    pub fn new() -> Self {
        Self {
            name: "orders".into(),
            path: "/local/orders".into(),
            columns: vec![
                ("a".into(), StoreType::Int32.optional()),
                ("b".into(), StoreType::Text.optional()),
                ("c".into(), StoreType::Int64.optional()),
            ],
            key_columns: vec!["a".into(), "b".into()],
            partitions: Vec::new(),
        }
    }

    pub fn with_path(mut self, name: &str, path: &str) -> Self {
        self.name = name.into();
        self.path = path.into();
        self
    }

    pub fn with_columns(mut self, columns: &[(&str, StoreType)]) -> Self {
        self.columns = columns
            .iter()
            .map(|(n, t)| (n.to_string(), t.clone()))
            .collect();
        self
    }

    pub fn with_key(mut self, key: &[&str]) -> Self {
        self.key_columns = key.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_partitions(mut self, partitions: Vec<KeyRange>) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn create(self) -> ScanTarget {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|(name, ty)| Field::new(name, ty.to_arrow(), ty.is_optional()))
            .collect();
        let key_types = self
            .key_columns
            .iter()
            .map(|k| {
                self.columns
                    .iter()
                    .find(|(n, _)| n == k)
                    .map(|(_, t)| t.clone())
                    .expect("key column must be declared")
            })
            .collect();
        ScanTarget {
            name: self.name,
            path: self.path,
            schema: Schema::new(fields),
            key_columns: self.key_columns,
            key_types,
            partitions: self.partitions,
        }
    }

    pub fn builder(self) -> ScanBuilder {
        ScanBuilder::new(self.create(), ConnectorOptions::new())
    }
}
