use std::time::Duration;

use crate::engine::types::Value;
use crate::store::ReadTableRequest;

#[test]
fn builder_collects_columns_in_order() {
    let request = ReadTableRequest::builder()
        .column("b")
        .columns(["a", "c"])
        .build();
    assert_eq!(request.columns, vec!["b", "a", "c"]);
    assert!(request.ordered);
    assert!(request.from_key.is_none());
    assert!(request.to_key.is_none());
    assert!(request.row_limit.is_none());
}

#[test]
fn empty_keys_leave_bounds_open() {
    let request = ReadTableRequest::builder()
        .from_key(Vec::new(), true)
        .to_key(vec![Value::Int32(4).make_optional()], false)
        .build();
    assert!(request.from_key.is_none());
    let to = request.to_key.expect("upper bound");
    assert!(!to.inclusive);
    assert_eq!(to.key, vec![Value::Int32(4).make_optional()]);
}

#[test]
fn zero_row_limit_means_unbounded() {
    let unbounded = ReadTableRequest::builder().row_limit(0).build();
    assert_eq!(unbounded.row_limit, None);
    let limited = ReadTableRequest::builder()
        .row_limit(25)
        .request_timeout(Duration::from_secs(3600))
        .build();
    assert_eq!(limited.row_limit, Some(25));
    assert_eq!(limited.request_timeout, Duration::from_secs(3600));
}
