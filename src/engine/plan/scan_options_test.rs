use std::cmp::Ordering;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};
use serde_json::json;

use crate::engine::expr::{Expr, PredicateOp};
use crate::engine::plan::{KeyBound, KeyRange, ScanOptions};
use crate::engine::types::{ScalarValue, StoreType, Value};
use crate::test_helpers::factories::{ExprFactory, ScanTargetFactory};

fn opt_i32(v: i32) -> Value {
    Value::Int32(v).make_optional()
}

fn opt_text(v: &str) -> Value {
    Value::Text(v.to_string()).make_optional()
}

#[test]
fn planned_range_converts_literals_to_optional_key_values() {
    let mut builder = ScanTargetFactory::new().builder();
    builder.setup_predicates(vec![
        ExprFactory::cmp("a", "=", json!(7)),
        ExprFactory::cmp("b", ">=", json!("m")),
        ExprFactory::cmp("b", "<", json!("q")),
    ]);
    let options = builder.build();
    let range = options.planned_range();
    assert_eq!(
        range.from(),
        &KeyBound::inclusive(vec![opt_i32(7), opt_text("m")])
    );
    assert_eq!(
        range.to(),
        &KeyBound::inclusive(vec![opt_i32(7), opt_text("q")])
    );
}

#[test]
fn unconvertible_literal_truncates_the_prefix() {
    let mut builder = ScanTargetFactory::new().builder();
    builder.setup_predicates(vec![
        ExprFactory::cmp("a", "=", json!(7)),
        ExprFactory::cmp("b", "=", json!(12)),
    ]);
    let options = builder.build();
    assert_eq!(options.planned().range_begin.len(), 2);
    let range = options.planned_range();
    assert_eq!(range.from(), &KeyBound::inclusive(vec![opt_i32(7)]));
    assert_eq!(range.to(), &KeyBound::inclusive(vec![opt_i32(7)]));

    let mut builder = ScanTargetFactory::new().builder();
    builder.setup_predicates(vec![ExprFactory::cmp("a", ">", json!(5_000_000_000i64))]);
    assert!(builder.build().planned_range().from().is_unrestricted());
}

#[test]
fn empty_projection_reads_first_key_column() {
    let mut builder = ScanTargetFactory::new().builder();
    builder.prune_columns(Schema::empty());
    let options = builder.build();
    assert_eq!(options.out_columns(), vec!["a".to_string()]);
    assert!(options.out_schema().fields().is_empty());
}

#[test]
fn pruned_projection_keeps_engine_order() {
    let mut builder = ScanTargetFactory::new().builder();
    builder.prune_columns(Schema::new(vec![
        Field::new("c", DataType::Int64, true),
        Field::new("a", DataType::Int32, true),
    ]));
    let options = builder.build();
    assert_eq!(options.out_columns(), vec!["c".to_string(), "a".to_string()]);
    assert_eq!(options.actual_schema().fields().len(), 3);
}

#[test]
fn options_survive_transport() {
    let target = ScanTargetFactory::new()
        .with_partitions(vec![
            KeyRange::new(KeyBound::unrestricted(), KeyBound::exclusive(vec![opt_i32(10)])),
            KeyRange::new(KeyBound::inclusive(vec![opt_i32(10)]), KeyBound::unrestricted()),
        ])
        .create();
    let mut builder = crate::engine::plan::ScanBuilder::new(
        target,
        crate::shared::config::ConnectorOptions::new()
            .with("endpoint", "grpc://store:2135")
            .with("scan.queue.depth", "5"),
    );
    builder.setup_predicates(vec![ExprFactory::cmp("a", "<=", json!(12))]);
    builder.set_row_limit(100);
    let options = builder.build();

    let bytes = options.to_bytes().unwrap();
    let restored = ScanOptions::from_bytes(&bytes).unwrap();
    assert_eq!(restored, options);
    assert_eq!(restored.queue_depth(), 5);
    assert_eq!(restored.row_limit(), Some(100));
    assert_eq!(restored.connection().get("endpoint"), Some("grpc://store:2135"));
    assert_eq!(restored.connection().get("scan.queue.depth"), None);
    assert_eq!(restored.partitions().len(), 2);
}

#[test]
fn partitions_follow_shard_list() {
    let target = ScanTargetFactory::new()
        .with_partitions(vec![
            KeyRange::new(KeyBound::unrestricted(), KeyBound::exclusive(vec![opt_i32(10)])),
            KeyRange::new(KeyBound::inclusive(vec![opt_i32(10)]), KeyBound::unrestricted()),
        ])
        .create();
    let options = Arc::new(crate::engine::plan::ScanBuilder::new(target, Default::default()).build());
    let partitions = options.plan_partitions();
    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[1].index(), 1);
    assert_eq!(partitions[1].range(), &options.partitions()[1]);

    let bare = Arc::new(ScanTargetFactory::new().builder().build());
    let partitions = bare.plan_partitions();
    assert_eq!(partitions.len(), 1);
    assert!(partitions[0].range().is_unrestricted());
}

/// Evaluates a conjunction of `column OP literal` predicates over one
/// `(a, b)` row the way the engine would.
fn matches(row: &(i32, String), predicates: &[Expr]) -> bool {
    predicates.iter().all(|p| {
        let Expr::Predicate { op, children } = p else {
            return true;
        };
        let (field, lit, op) = match (&children[0], &children[1]) {
            (column @ Expr::Column(_), Expr::Literal(lit)) => (column, lit, op.clone()),
            (Expr::Literal(lit), column @ Expr::Column(_)) => {
                let flipped = match op {
                    PredicateOp::Lt => PredicateOp::Gt,
                    PredicateOp::LtEq => PredicateOp::GtEq,
                    PredicateOp::Gt => PredicateOp::Lt,
                    PredicateOp::GtEq => PredicateOp::LtEq,
                    other => other.clone(),
                };
                (column, lit, flipped)
            }
            _ => return true,
        };
        let Some(field) = field.field_name() else {
            return true;
        };
        let value = match field {
            "a" => ScalarValue::Int32(row.0),
            "b" => ScalarValue::Utf8(row.1.clone()),
            _ => return true,
        };
        if op == PredicateOp::StartsWith {
            return match (value.as_str(), lit.as_str()) {
                (Some(v), Some(prefix)) => v.starts_with(prefix),
                _ => false,
            };
        }
        let Some(ord) = value.natural_cmp(lit) else {
            return false;
        };
        match op {
            PredicateOp::Eq | PredicateOp::NullSafeEq => ord == Ordering::Equal,
            PredicateOp::Lt => ord == Ordering::Less,
            PredicateOp::LtEq => ord != Ordering::Greater,
            PredicateOp::Gt => ord == Ordering::Greater,
            PredicateOp::GtEq => ord != Ordering::Less,
            _ => true,
        }
    })
}

#[test]
fn planned_range_never_excludes_matching_rows() {
    let conjunctions: Vec<Vec<Expr>> = vec![
        vec![ExprFactory::cmp("a", "=", json!(3)), ExprFactory::cmp("b", "=", json!("bd"))],
        vec![ExprFactory::cmp("a", "=", json!(3)), ExprFactory::cmp("b", ">", json!("bb"))],
        vec![ExprFactory::cmp("a", ">", json!(2)), ExprFactory::cmp("a", "<", json!(6))],
        vec![ExprFactory::cmp("a", ">=", json!(2)), ExprFactory::cmp("b", "<", json!("ac"))],
        vec![ExprFactory::cmp("a", "=", json!(1)), ExprFactory::cmp("b", "STARTS_WITH", json!("c"))],
        vec![ExprFactory::new().with_op(">").with_value(json!(4)).reverted().create()],
        vec![ExprFactory::cmp("a", "=", json!(9)), ExprFactory::cmp("b", "<=", json!("aa"))],
    ];
    let rows: Vec<(i32, String)> = (0..10)
        .flat_map(|a| {
            ["aa", "ab", "ac", "ba", "bb", "bd", "c", "ca", "cz", "d"]
                .into_iter()
                .map(move |b| (a, b.to_string()))
        })
        .collect();

    for predicates in conjunctions {
        let mut builder = ScanTargetFactory::new().builder();
        builder.setup_predicates(predicates.clone());
        let range = builder.build().planned_range();
        for row in rows.iter().filter(|row| matches(row, &predicates)) {
            let key = vec![opt_i32(row.0), opt_text(&row.1)];
            assert!(
                range.contains(&key),
                "row {row:?} matches {predicates:?} but lies outside {range}"
            );
        }
    }
}

#[test]
fn key_types_drive_conversion() {
    let target = ScanTargetFactory::new()
        .with_columns(&[
            ("day", StoreType::Date),
            ("id", StoreType::Uint64.optional()),
        ])
        .with_key(&["day", "id"])
        .create();
    let mut builder = crate::engine::plan::ScanBuilder::new(target, Default::default());
    builder.setup_predicates(vec![
        ExprFactory::cmp("day", "=", json!("2024-03-01")),
        ExprFactory::cmp("id", ">=", json!(10)),
    ]);
    let range = builder.build().planned_range();
    assert_eq!(
        range.from().values(),
        &[Value::Date(19783).make_optional(), Value::Uint64(10).make_optional()]
    );
    assert_eq!(range.to().values(), &[Value::Date(19783).make_optional()]);
}
