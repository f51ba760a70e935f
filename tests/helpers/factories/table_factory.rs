use crate::engine::types::{ScalarValue, StoreType, Value, to_store};
use crate::store::{
    ColumnDescription, IndexDescription, MemoryStore, StoreClient, TableDescription, join_path,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Builds a table inside a [`MemoryStore`]. Defaults to `orders` with key
/// `(a: Int32?, b: Utf8?)` and a payload column `c: Int64?`.
pub struct TableFactory {
    namespace: Vec<String>,
    name: String,
    columns: Vec<ColumnDescription>,
    primary_key: Vec<String>,
    indexes: Vec<IndexDescription>,
    properties: BTreeMap<String, String>,
    rows: Vec<Vec<Value>>,
    json_rows: Vec<JsonValue>,
    split_points: Vec<Vec<Value>>,
}

impl TableFactory {
    pub fn new() -> Self {
        Self {
            namespace: Vec::new(),
            name: "orders".into(),
            columns: vec![
                ColumnDescription::new("a", StoreType::Int32.optional()),
                ColumnDescription::new("b", StoreType::Text.optional()),
                ColumnDescription::new("c", StoreType::Int64.optional()),
            ],
            primary_key: vec!["a".into(), "b".into()],
            indexes: Vec::new(),
            properties: BTreeMap::new(),
            rows: Vec::new(),
            json_rows: Vec::new(),
            split_points: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_namespace(mut self, namespace: &[&str]) -> Self {
        self.namespace = namespace.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_columns(mut self, columns: &[(&str, StoreType)]) -> Self {
        self.columns = columns
            .iter()
            .map(|(name, ty)| ColumnDescription::new(*name, ty.clone()))
            .collect();
        self
    }

    pub fn with_primary_key(mut self, key: &[&str]) -> Self {
        self.primary_key = key.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_index(mut self, name: &str, columns: &[&str]) -> Self {
        self.indexes.push(IndexDescription {
            name: name.into(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Rows given as JSON arrays in column order, converted through the
    /// declared column types.
    pub fn with_json_rows(mut self, rows: Vec<JsonValue>) -> Self {
        self.json_rows.extend(rows);
        self
    }

    /// `n` rows for the default layout: `a = i / 10`, `b = "k{i:03}"`, `c = i`.
    pub fn with_sequential_rows(self, n: usize) -> Self {
        let rows = (0..n).map(sequential_row).collect();
        self.with_rows(rows)
    }

    pub fn with_split_points(mut self, points: Vec<Vec<Value>>) -> Self {
        self.split_points = points;
        self
    }

    pub fn path(&self, store: &MemoryStore) -> String {
        let mut path = store.database().to_string();
        for part in &self.namespace {
            path = join_path(&path, part);
        }
        join_path(&path, &self.name)
    }

    pub fn description(&self) -> TableDescription {
        TableDescription {
            columns: self.columns.clone(),
            primary_key: self.primary_key.clone(),
            partitions: Vec::new(),
            indexes: self.indexes.clone(),
            properties: self.properties.clone(),
        }
    }

    /// Creates the table, loads its rows and returns its path.
    pub fn create(self, store: &MemoryStore) -> String {
        let path = self.path(store);
        store
            .create_table(&path, &self.description())
            .expect("create table");
        let mut rows = self.rows.clone();
        for json in &self.json_rows {
            rows.push(self.json_row(json));
        }
        store.insert_rows(&path, rows).expect("insert rows");
        if !self.split_points.is_empty() {
            store
                .set_split_points(&path, self.split_points.clone())
                .expect("split table");
        }
        path
    }

    fn json_row(&self, json: &JsonValue) -> Vec<Value> {
        let values = json.as_array().expect("JSON row must be an array");
        assert_eq!(values.len(), self.columns.len(), "JSON row width");
        values
            .iter()
            .zip(&self.columns)
            .map(|(v, c)| to_store(&scalar_from_json(v), &c.store_type).expect("JSON value"))
            .collect()
    }
}

pub fn sequential_row(i: usize) -> Vec<Value> {
    vec![
        Value::Int32((i / 10) as i32).make_optional(),
        Value::Text(format!("k{i:03}")).make_optional(),
        Value::Int64(i as i64).make_optional(),
    ]
}

pub fn scalar_from_json(value: &JsonValue) -> ScalarValue {
    match value {
        JsonValue::Null => ScalarValue::Null,
        JsonValue::Bool(b) => ScalarValue::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Int64(i)
            } else if let Some(u) = n.as_u64() {
                ScalarValue::UInt64(u)
            } else {
                ScalarValue::Float64(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => ScalarValue::Utf8(s.clone()),
        other => ScalarValue::Utf8(other.to_string()),
    }
}
