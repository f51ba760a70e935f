use crate::store::{MemoryStore, StoreClient};
use crate::test_helpers::factories::TableFactory;
use serde_json::json;

#[test]
fn creates_default_table_under_database() {
    let store = MemoryStore::new();
    let path = TableFactory::new().with_sequential_rows(12).create(&store);
    assert_eq!(path, "/local/orders");
    assert_eq!(store.row_count(&path), Some(12));
    let description = store.describe_table(&path).unwrap();
    assert_eq!(description.primary_key, vec!["a", "b"]);
    assert_eq!(description.partitions.len(), 1);
}

#[test]
fn converts_json_rows_through_column_types() {
    let store = MemoryStore::new();
    let path = TableFactory::new()
        .with_namespace(&["sales", "eu"])
        .with_json_rows(vec![json!([1, "x", null]), json!([2, "y", 20])])
        .create(&store);
    assert_eq!(path, "/local/sales/eu/orders");
    assert_eq!(store.row_count(&path), Some(2));
}
