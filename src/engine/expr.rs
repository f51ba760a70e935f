use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::types::ScalarValue;

/// Predicate operators the engine may push down. Names follow the engine's
/// textual predicate names and are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateOp {
    And,
    Or,
    Not,
    Eq,
    NullSafeEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    StartsWith,
    EndsWith,
    Contains,
    In,
    IsNull,
    IsNotNull,
    Other(String),
}

impl PredicateOp {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "AND" => PredicateOp::And,
            "OR" => PredicateOp::Or,
            "NOT" => PredicateOp::Not,
            "=" => PredicateOp::Eq,
            "<=>" => PredicateOp::NullSafeEq,
            "<" => PredicateOp::Lt,
            "<=" => PredicateOp::LtEq,
            ">" => PredicateOp::Gt,
            ">=" => PredicateOp::GtEq,
            "STARTS_WITH" => PredicateOp::StartsWith,
            "ENDS_WITH" => PredicateOp::EndsWith,
            "CONTAINS" => PredicateOp::Contains,
            "IN" => PredicateOp::In,
            "IS_NULL" => PredicateOp::IsNull,
            "IS_NOT_NULL" => PredicateOp::IsNotNull,
            _ => PredicateOp::Other(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PredicateOp::And => "AND",
            PredicateOp::Or => "OR",
            PredicateOp::Not => "NOT",
            PredicateOp::Eq => "=",
            PredicateOp::NullSafeEq => "<=>",
            PredicateOp::Lt => "<",
            PredicateOp::LtEq => "<=",
            PredicateOp::Gt => ">",
            PredicateOp::GtEq => ">=",
            PredicateOp::StartsWith => "STARTS_WITH",
            PredicateOp::EndsWith => "ENDS_WITH",
            PredicateOp::Contains => "CONTAINS",
            PredicateOp::In => "IN",
            PredicateOp::IsNull => "IS_NULL",
            PredicateOp::IsNotNull => "IS_NOT_NULL",
            PredicateOp::Other(name) => name.as_str(),
        }
    }
}

/// Engine expression handed over with a scan: a field reference, a literal,
/// or a named predicate applied to child expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Field reference; nested fields are given as a path.
    Column(Vec<String>),
    Literal(ScalarValue),
    Predicate { op: PredicateOp, children: Vec<Expr> },
}

impl Expr {
    pub fn col(name: &str) -> Self {
        Expr::Column(vec![name.to_string()])
    }

    pub fn lit(value: impl Into<ScalarValue>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn predicate(op: PredicateOp, children: Vec<Expr>) -> Self {
        Expr::Predicate { op, children }
    }

    pub fn named(name: &str, children: Vec<Expr>) -> Self {
        Expr::predicate(PredicateOp::from_name(name), children)
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::predicate(PredicateOp::Eq, vec![self, other])
    }

    pub fn lt(self, other: Expr) -> Self {
        Expr::predicate(PredicateOp::Lt, vec![self, other])
    }

    pub fn lt_eq(self, other: Expr) -> Self {
        Expr::predicate(PredicateOp::LtEq, vec![self, other])
    }

    pub fn gt(self, other: Expr) -> Self {
        Expr::predicate(PredicateOp::Gt, vec![self, other])
    }

    pub fn gt_eq(self, other: Expr) -> Self {
        Expr::predicate(PredicateOp::GtEq, vec![self, other])
    }

    pub fn starts_with(self, prefix: Expr) -> Self {
        Expr::predicate(PredicateOp::StartsWith, vec![self, prefix])
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::predicate(PredicateOp::And, vec![self, other])
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::predicate(PredicateOp::Or, vec![self, other])
    }

    pub fn not(self) -> Self {
        Expr::predicate(PredicateOp::Not, vec![self])
    }

    /// The innermost field name of a column reference.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Expr::Column(path) => path.last().map(|s| s.as_str()),
            _ => None,
        }
    }
}

/// Splits every `AND` node recursively, leaving other connectives intact.
pub fn flatten_conjunction(predicates: &[Expr]) -> Vec<&Expr> {
    let mut flat = Vec::new();
    for predicate in predicates {
        flatten_into(predicate, &mut flat);
    }
    flat
}

fn flatten_into<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Predicate {
            op: PredicateOp::And,
            children,
        } => {
            for child in children {
                flatten_into(child, out);
            }
        }
        other => out.push(other),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(path) => f.write_str(&path.join(".")),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Predicate { op, children } => match children.as_slice() {
                [left, right] => write!(f, "({left} {} {right})", op.name()),
                _ => {
                    write!(f, "{}(", op.name())?;
                    for (idx, child) in children.iter().enumerate() {
                        if idx > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{child}")?;
                    }
                    f.write_str(")")
                }
            },
        }
    }
}
