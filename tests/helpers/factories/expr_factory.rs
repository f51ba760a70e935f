use crate::engine::expr::{Expr, PredicateOp};
use crate::test_helpers::factories::table_factory::scalar_from_json;
use serde_json::{Value, json};

/// Builds a `field OP literal` predicate, literals given as JSON.
pub struct ExprFactory {
    field: String,
    op: PredicateOp,
    value: Value,
    reverted: bool,
}

impl ExprFactory {
    pub fn new() -> Self {
        Self {
            field: "a".into(),
            op: PredicateOp::Eq,
            value: json!(1),
            reverted: false,
        }
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_op(mut self, op: &str) -> Self {
        self.op = PredicateOp::from_name(op);
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    /// Puts the literal on the left: `literal OP field`.
    pub fn reverted(mut self) -> Self {
        self.reverted = true;
        self
    }

    pub fn create(self) -> Expr {
        let field = Expr::col(&self.field);
        let literal = Expr::Literal(scalar_from_json(&self.value));
        let children = if self.reverted {
            vec![literal, field]
        } else {
            vec![field, literal]
        };
        Expr::predicate(self.op, children)
    }

    pub fn cmp(field: &str, op: &str, value: Value) -> Expr {
        Self::new()
            .with_field(field)
            .with_op(op)
            .with_value(value)
            .create()
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        lhs.and(rhs)
    }
}
