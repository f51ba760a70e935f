use crate::engine::expr::{Expr, PredicateOp};
use crate::engine::types::ScalarValue;
use crate::test_helpers::factories::ExprFactory;
use serde_json::json;

#[test]
fn test_expr_factory_default_compare() {
    let expr = ExprFactory::new().create();
    assert_eq!(
        expr,
        Expr::predicate(
            PredicateOp::Eq,
            vec![Expr::col("a"), Expr::Literal(ScalarValue::Int64(1))]
        )
    );
}

#[test]
fn test_expr_factory_reverted_compare() {
    let expr = ExprFactory::new()
        .with_field("b")
        .with_op("<")
        .with_value(json!("m"))
        .reverted()
        .create();
    assert_eq!(expr, Expr::lit("m").lt(Expr::col("b")));
}
