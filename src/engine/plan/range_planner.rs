use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::expr::{Expr, PredicateOp, flatten_conjunction};
use crate::engine::types::ScalarValue;

const LOG_TARGET: &str = "kvscan::plan::range";

/// Key-prefix bounds folded out of a predicate conjunction. Both sides are
/// treated as inclusive; trailing NULL positions are never present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannedRange {
    pub range_begin: Vec<ScalarValue>,
    pub range_end: Vec<ScalarValue>,
}

impl PlannedRange {
    pub fn is_unrestricted(&self) -> bool {
        self.range_begin.is_empty() && self.range_end.is_empty()
    }
}

/// Folds conjunctive scalar predicates on a composite primary key into one
/// key range. Supports any number of leading equalities followed by a single
/// range-constrained column; everything else is left to the engine.
pub struct RangePlanner<'a> {
    key_columns: &'a [String],
}

impl<'a> RangePlanner<'a> {
    pub fn new(key_columns: &'a [String]) -> Self {
        Self { key_columns }
    }

    pub fn plan(&self, predicates: &[Expr]) -> PlannedRange {
        let flat = flatten_conjunction(predicates);
        if flat.is_empty() || self.key_columns.is_empty() {
            return PlannedRange::default();
        }
        debug!(target: LOG_TARGET, predicates = flat.len(), "Calculating scan range");

        let mut begin = vec![ScalarValue::Null; self.key_columns.len()];
        let mut end = vec![ScalarValue::Null; self.key_columns.len()];

        for (pos, key_column) in self.key_columns.iter().enumerate() {
            let mut has_equality = false;
            for predicate in &flat {
                let Expr::Predicate { op, children } = predicate else {
                    continue;
                };
                let Some(operand) = KeyOperand::analyze(key_column, children) else {
                    continue;
                };
                match op {
                    PredicateOp::Eq | PredicateOp::NullSafeEq => {
                        begin[pos] = operand.value.clone();
                        end[pos] = operand.value.clone();
                        has_equality = true;
                        break;
                    }
                    PredicateOp::Gt | PredicateOp::GtEq => {
                        if operand.revert {
                            tighten_upper(&mut end[pos], operand.value);
                        } else {
                            tighten_lower(&mut begin[pos], operand.value);
                        }
                    }
                    PredicateOp::Lt | PredicateOp::LtEq => {
                        if operand.revert {
                            tighten_lower(&mut begin[pos], operand.value);
                        } else {
                            tighten_upper(&mut end[pos], operand.value);
                        }
                    }
                    PredicateOp::StartsWith if !operand.revert => {
                        if let ScalarValue::Utf8(prefix) = operand.value {
                            if let Some(next) = prefix_successor(prefix) {
                                tighten_lower(&mut begin[pos], operand.value);
                                tighten_upper(&mut end[pos], &ScalarValue::Utf8(next));
                            }
                        }
                    }
                    _ => {}
                }
            }
            if !has_equality {
                break;
            }
        }

        strip_trailing_nulls(&mut begin);
        strip_trailing_nulls(&mut end);
        debug!(
            target: LOG_TARGET,
            begin = ?begin,
            end = ?end,
            "Calculated scan range"
        );
        PlannedRange {
            range_begin: begin,
            range_end: end,
        }
    }
}

/// The `field OP literal` shape of a binary predicate, with `revert` set
/// when the literal came first.
struct KeyOperand<'e> {
    value: &'e ScalarValue,
    revert: bool,
}

impl<'e> KeyOperand<'e> {
    fn analyze(key_column: &str, children: &'e [Expr]) -> Option<Self> {
        let [left, right] = children else {
            return None;
        };
        let (field, literal, revert) = match (left, right) {
            (_, Expr::Column(_)) => (right, left, true),
            _ => (left, right, false),
        };
        let Expr::Literal(value) = literal else {
            return None;
        };
        if field.field_name()? != key_column {
            return None;
        }
        Some(Self { value, revert })
    }
}

fn tighten_lower(slot: &mut ScalarValue, value: &ScalarValue) {
    if value.is_null() {
        return;
    }
    match slot.natural_cmp(value) {
        Some(Ordering::Less) | None => *slot = value.clone(),
        Some(_) => {}
    }
}

fn tighten_upper(slot: &mut ScalarValue, value: &ScalarValue) {
    if value.is_null() {
        return;
    }
    match slot.natural_cmp(value) {
        Some(Ordering::Greater) | None => *slot = value.clone(),
        Some(_) => {}
    }
}

/// The smallest string greater than every string starting with `prefix`,
/// built by bumping its last character.
fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    let last = chars.pop()?;
    let bumped = match last as u32 + 1 {
        0xD800 => '\u{E000}',
        code => char::from_u32(code)?,
    };
    chars.push(bumped);
    Some(chars.into_iter().collect())
}

fn strip_trailing_nulls(values: &mut Vec<ScalarValue>) {
    while values.last().is_some_and(ScalarValue::is_null) {
        values.pop();
    }
}
