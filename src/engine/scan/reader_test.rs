use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use serde_json::json;

use crate::driver::DriverRegistry;
use crate::engine::errors::{ScanError, SchemaDrift};
use crate::engine::scan::reader::ScanControl;
use crate::engine::scan::{PartitionReader, ReaderState, ShardReaderFactory, StreamingShardReader};
use crate::engine::types::{ScalarValue, Value};
use crate::store::{MemoryFaults, MemoryStore, Status, StatusCode};
use crate::test_helpers::factories::{
    ExprFactory, ReaderFactory, TableFactory, fast_reader_settings,
};

fn expected_row(i: usize) -> Vec<ScalarValue> {
    vec![
        ScalarValue::Int32((i / 10) as i32),
        ScalarValue::Utf8(format!("k{i:03}")),
        ScalarValue::Int64(i as i64),
    ]
}

fn drain(reader: &mut StreamingShardReader) -> Vec<Vec<ScalarValue>> {
    let mut rows = Vec::new();
    while reader.next().expect("next row") {
        rows.push(reader.get().expect("current row"));
    }
    rows
}

fn assert_released(store: &MemoryStore) {
    assert_eq!(store.open_sessions(), 0);
    assert_eq!(store.active_streams(), 0);
}

#[test]
fn reads_every_block_in_store_order() {
    crate::logging::init_for_tests();
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store).create();
    assert_eq!(reader.state(), ReaderState::Created);

    let rows = drain(&mut reader);
    assert_eq!(rows, (0..30).map(expected_row).collect::<Vec<_>>());
    assert_eq!(reader.state(), ReaderState::Finished);
    assert!(!reader.next().unwrap());
    assert_eq!(reader.rows_read(), 30);

    let metrics = Arc::clone(reader.metrics());
    assert_eq!(metrics.total_received_blocks(), 3);
    assert_eq!(metrics.total_received_rows(), 30);
    assert!(metrics.peak_pending_items() <= 3);

    reader.close();
    assert_eq!(reader.state(), ReaderState::Finished);
    assert_released(&store);
}

#[test]
fn get_without_current_row_fails() {
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store).create();
    assert!(matches!(reader.get(), Err(ScanError::NoCurrentRow)));
    reader.prepare().unwrap();
    assert_eq!(reader.state(), ReaderState::Prepared);
    reader.prepare().unwrap();
    assert_eq!(store.read_requests().len(), 1);
    reader.close();
}

#[test]
fn close_mid_stream_stops_the_producer() {
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store).with_queue_depth(2).create();

    for i in 0..5 {
        assert!(reader.next().unwrap());
        assert_eq!(reader.get().unwrap(), expected_row(i));
    }
    reader.close();

    assert_eq!(reader.state(), ReaderState::Finished);
    assert!(!reader.next().unwrap());
    assert!(matches!(reader.get(), Err(ScanError::NoCurrentRow)));
    assert_eq!(reader.rows_read(), 5);
    assert_eq!(store.cancelled_streams(), 1);
    assert_released(&store);

    reader.close();
    assert_released(&store);
}

#[test]
fn stream_error_surfaces_after_delivered_rows() {
    let store = MemoryStore::new();
    let (gate, gate_rx) = channel::unbounded();
    let mut reader = ReaderFactory::new(&store).create();
    store.set_faults(MemoryFaults {
        gate_before_block: Some((1, gate_rx)),
        fail_after_blocks: Some((1, Status::new(StatusCode::Overloaded, "shard overloaded"))),
        ..Default::default()
    });

    for i in 0..10 {
        assert!(reader.next().unwrap());
        assert_eq!(reader.get().unwrap(), expected_row(i));
    }
    gate.send(()).unwrap();

    let err = reader.next().unwrap_err();
    assert_eq!(err.status().map(|s| s.code()), Some(StatusCode::Overloaded));
    assert!(matches!(err, ScanError::Failed { .. }));
    assert_eq!(reader.state(), ReaderState::Failed);

    let again = reader.next().unwrap_err();
    assert_eq!(again, err);

    reader.close();
    assert_eq!(reader.state(), ReaderState::Failed);
    assert_released(&store);
}

#[test]
fn first_issue_is_kept_and_later_ones_are_dropped() {
    let control = ScanControl::new();
    assert_eq!(control.state(), ReaderState::Created);

    let drift = ScanError::SchemaDrift {
        table: "/local/orders".to_string(),
        drift: SchemaDrift::LostColumn("a".to_string()),
    };
    assert!(control.set_issue(drift.clone()));
    assert_eq!(control.state(), ReaderState::Failed);

    let failed = ScanError::failed(
        "Background scan failed for table /local/orders",
        Status::new(StatusCode::Overloaded, "shard overloaded"),
    );
    assert!(!control.set_issue(failed));
    assert_eq!(control.issue(), Some(drift));
    assert_eq!(control.state(), ReaderState::Failed);
}

#[test]
fn reordered_columns_keep_rows_positional() {
    let store = MemoryStore::new();
    store.set_faults(MemoryFaults {
        reverse_odd_blocks: true,
        ..Default::default()
    });
    let mut reader = ReaderFactory::new(&store)
        .with_projection(&["c", "a"])
        .create();

    let rows = drain(&mut reader);
    let expected: Vec<_> = (0..30)
        .map(|i| vec![ScalarValue::Int64(i as i64), ScalarValue::Int32((i / 10) as i32)])
        .collect();
    assert_eq!(rows, expected);
    assert_eq!(reader.out_columns(), &["c".to_string(), "a".to_string()]);
}

#[test]
fn narrowed_block_is_fatal() {
    let store = MemoryStore::new();
    store.set_faults(MemoryFaults {
        drop_column_after_blocks: Some(1),
        ..Default::default()
    });
    let mut reader = ReaderFactory::new(&store).create();

    for _ in 0..10 {
        assert!(reader.next().unwrap());
    }
    let err = reader.next().unwrap_err();
    match &err {
        ScanError::SchemaDrift { drift, .. } => {
            assert_eq!(drift, &SchemaDrift::ColumnCount { expected: 3, got: 2 })
        }
        other => panic!("expected schema drift, got {other:?}"),
    }
    assert_eq!(reader.state(), ReaderState::Failed);
    assert_eq!(reader.next().unwrap_err(), err);

    reader.close();
    assert_eq!(reader.state(), ReaderState::Failed);
    assert_released(&store);
}

#[test]
fn lost_column_is_fatal() {
    let store = MemoryStore::new();
    store.set_faults(MemoryFaults {
        rename_column_after_blocks: Some(0),
        ..Default::default()
    });
    let mut reader = ReaderFactory::new(&store).create();

    let err = reader.next().unwrap_err();
    assert!(matches!(
        err,
        ScanError::SchemaDrift { drift: SchemaDrift::LostColumn(ref name), .. } if name == "a"
    ));
    reader.close();
    assert_released(&store);
}

#[test]
fn never_prepared_reader_closes() {
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store).create();
    reader.close();
    assert_eq!(reader.state(), ReaderState::Finished);
    assert!(!reader.next().unwrap());
    assert!(store.read_requests().is_empty());
    assert_released(&store);
}

#[test]
fn empty_projection_reads_first_key_column() {
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store).with_projection(&[]).create();

    let rows = drain(&mut reader);
    assert_eq!(rows.len(), 30);
    assert!(rows.iter().all(|r| r.len() == 1));
    assert_eq!(rows[25], vec![ScalarValue::Int32(2)]);

    let (_, request) = store.read_requests().pop().unwrap();
    assert_eq!(request.columns, vec!["a".to_string()]);
}

#[test]
fn read_setup_failure_releases_the_session() {
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store).create();
    store.set_faults(MemoryFaults {
        fail_read: Some(Status::new(StatusCode::Unavailable, "no route to shard")),
        ..Default::default()
    });

    let err = reader.next().unwrap_err();
    assert!(matches!(err, ScanError::Setup { .. }));
    assert_eq!(err.status().map(|s| s.code()), Some(StatusCode::Unavailable));
    assert_eq!(reader.state(), ReaderState::Failed);
    assert_eq!(store.open_sessions(), 0);

    assert_eq!(reader.prepare(), Ok(()));
    assert_eq!(reader.next().unwrap_err(), err);
    reader.close();
    assert_released(&store);
}

#[test]
fn session_setup_failure_is_fatal() {
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store).create();
    store.set_faults(MemoryFaults {
        fail_session: Some(Status::new(StatusCode::Overloaded, "too many sessions")),
        ..Default::default()
    });

    let err = reader.prepare().unwrap_err();
    assert_eq!(err.status().map(|s| s.code()), Some(StatusCode::Overloaded));
    reader.close();
    assert_released(&store);
}

#[test]
fn expired_session_fails_the_shard() {
    let store = MemoryStore::new();
    let (gate, gate_rx) = channel::unbounded();
    let mut reader = ReaderFactory::new(&store).create();
    store.set_faults(MemoryFaults {
        gate_before_block: Some((1, gate_rx)),
        ..Default::default()
    });

    for _ in 0..10 {
        assert!(reader.next().unwrap());
    }
    store.expire_sessions();
    gate.send(()).unwrap();

    let err = reader.next().unwrap_err();
    assert_eq!(err.status().map(|s| s.code()), Some(StatusCode::SessionExpired));
    reader.close();
    assert_released(&store);
}

#[test]
fn request_carries_range_and_limit() {
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store)
        .with_predicates(vec![ExprFactory::cmp("a", "=", json!(1))])
        .with_row_limit(5)
        .create();

    let rows = drain(&mut reader);
    assert_eq!(rows, (10..15).map(expected_row).collect::<Vec<_>>());

    let (path, request) = store.read_requests().pop().unwrap();
    assert_eq!(path, "/local/orders");
    let from = request.from_key.expect("lower bound");
    let to = request.to_key.expect("upper bound");
    assert_eq!(from.key, vec![Value::Int32(1).make_optional()]);
    assert!(from.inclusive);
    assert_eq!(to.key, vec![Value::Int32(1).make_optional()]);
    assert!(to.inclusive);
    assert_eq!(request.row_limit, Some(5));
    assert!(request.request_timeout >= Duration::from_secs(60));
}

#[test]
fn slow_consumer_keeps_the_queue_bounded() {
    let store = MemoryStore::new();
    let mut reader = ReaderFactory::new(&store)
        .with_block_size(1)
        .with_queue_depth(2)
        .create();

    assert!(reader.next().unwrap());
    thread::sleep(Duration::from_millis(50));
    let mut count = 1;
    while reader.next().unwrap() {
        count += 1;
    }
    assert_eq!(count, 30);

    let metrics = reader.metrics();
    assert!(metrics.peak_pending_items() <= 2);
    assert!(metrics.backpressure_events() >= 1);
    assert_eq!(metrics.total_sent_blocks(), 30);
    reader.close();
}

#[test]
fn shard_readers_cover_the_table_once() {
    let store = MemoryStore::new();
    let partitions = ReaderFactory::new(&store)
        .with_table(
            TableFactory::new()
                .with_sequential_rows(30)
                .with_split_points(vec![
                    vec![Value::Int32(1).make_optional()],
                    vec![Value::Int32(2).make_optional()],
                ]),
        )
        .with_block_size(4)
        .partitions();
    assert_eq!(partitions.len(), 3);

    let mut all = Vec::new();
    for partition in partitions {
        let index = partition.index();
        let mut reader = ReaderFactory::reader_for(&store, partition);
        let rows = drain(&mut reader);
        assert_eq!(rows.len(), 10, "shard {index}");
        assert!(rows.iter().all(|r| r[0] == ScalarValue::Int32(index as i32)));
        all.extend(rows);
        reader.close();
    }
    assert_eq!(all, (0..30).map(expected_row).collect::<Vec<_>>());
    assert_released(&store);
}

#[test]
fn disjoint_shard_reads_nothing() {
    let store = MemoryStore::new();
    let partitions = ReaderFactory::new(&store)
        .with_table(
            TableFactory::new()
                .with_sequential_rows(30)
                .with_split_points(vec![vec![Value::Int32(2).make_optional()]]),
        )
        .with_predicates(vec![ExprFactory::cmp("a", "<", json!(1))])
        .partitions();
    assert_eq!(partitions.len(), 2);

    let mut low = ReaderFactory::reader_for(&store, partitions[0].clone());
    assert_eq!(drain(&mut low).len(), 20);
    let mut high = ReaderFactory::reader_for(&store, partitions[1].clone());
    assert!(drain(&mut high).is_empty());
}

#[test]
fn dropping_a_reader_closes_it() {
    let store = MemoryStore::new();
    {
        let mut reader = ReaderFactory::new(&store).with_queue_depth(2).create();
        assert!(reader.next().unwrap());
        assert_eq!(store.open_sessions(), 1);
    }
    assert_released(&store);
}

#[test]
fn reader_works_through_the_trait() {
    let store = MemoryStore::new();
    let mut reader: Box<dyn PartitionReader> = Box::new(ReaderFactory::new(&store).create());
    let mut count = 0;
    while reader.next().unwrap() {
        assert_eq!(reader.get().unwrap().len(), 3);
        count += 1;
    }
    reader.close();
    assert_eq!(count, 30);
}

#[test]
fn factory_reacquires_the_shared_connector() {
    let store = MemoryStore::new();
    let registry = Arc::new(DriverRegistry::new());
    let factory = ShardReaderFactory::new(Arc::new(store.clone()))
        .with_registry(Arc::clone(&registry))
        .with_settings(fast_reader_settings());

    let partitions = ReaderFactory::new(&store)
        .with_table(
            TableFactory::new()
                .with_sequential_rows(30)
                .with_split_points(vec![vec![Value::Int32(1).make_optional()]]),
        )
        .partitions();
    let mut readers: Vec<_> = partitions
        .into_iter()
        .map(|p| factory.create_reader(p).unwrap())
        .collect();
    assert_eq!(registry.stats().opened, 1);
    assert_eq!(registry.live_count(), 1);

    let total: usize = readers.iter_mut().map(|r| drain(r).len()).sum();
    assert_eq!(total, 30);
    drop(readers);
    assert_eq!(registry.live_count(), 0);
    assert_released(&store);
}
