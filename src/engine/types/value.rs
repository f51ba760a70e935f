use std::cmp::Ordering;
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::{Deserialize, Serialize};

/// A value as the store sees it: one of the store's primitive types, or an
/// optional wrapper around one. `Optional(None)` is the store's NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Decimal { value: i128, precision: u8, scale: i8 },
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// Days since the Unix epoch.
    Date(i32),
    /// Seconds since the Unix epoch.
    Datetime(u32),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    /// Signed microseconds.
    Interval(i64),
    Uuid(u128),
    Optional(Option<Box<Value>>),
}

impl Value {
    pub fn null() -> Self {
        Value::Optional(None)
    }

    pub fn is_null(&self) -> bool {
        self.unwrap_optional().is_none()
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Value::Optional(_))
    }

    /// Strips every optional layer, returning `None` for NULL.
    pub fn unwrap_optional(&self) -> Option<&Value> {
        match self {
            Value::Optional(None) => None,
            Value::Optional(Some(inner)) => inner.unwrap_optional(),
            other => Some(other),
        }
    }

    /// Wraps the value into an optional unless it already is one.
    pub fn make_optional(self) -> Value {
        match self {
            Value::Optional(_) => self,
            other => Value::Optional(Some(Box::new(other))),
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int8(v) => Some(*v as i128),
            Value::Int16(v) => Some(*v as i128),
            Value::Int32(v) => Some(*v as i128),
            Value::Int64(v) => Some(*v as i128),
            Value::Uint8(v) => Some(*v as i128),
            Value::Uint16(v) => Some(*v as i128),
            Value::Uint32(v) => Some(*v as i128),
            Value::Uint64(v) => Some(*v as i128),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    fn as_byte_slice(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Orders two store values of compatible kinds. NULL sorts before every
    /// non-NULL value, matching the store's key ordering. Returns `None` when
    /// the kinds cannot be compared.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        let (left, right) = match (self.unwrap_optional(), other.unwrap_optional()) {
            (None, None) => return Some(Ordering::Equal),
            (None, Some(_)) => return Some(Ordering::Less),
            (Some(_), None) => return Some(Ordering::Greater),
            (Some(l), Some(r)) => (l, r),
        };

        match (left, right) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Decimal { value: a, scale: sa, .. }, Value::Decimal { value: b, scale: sb, .. }) => {
                Some(compare_decimals(*a, *sa, *b, *sb))
            }
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Datetime(a), Value::Datetime(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Interval(a), Value::Interval(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (l, r) => {
                if let (Some(a), Some(b)) = (l.as_i128(), r.as_i128()) {
                    return Some(a.cmp(&b));
                }
                if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
                    return a.partial_cmp(&b);
                }
                if let (Some(a), Some(b)) = (l.as_byte_slice(), r.as_byte_slice()) {
                    return Some(a.cmp(b));
                }
                None
            }
        }
    }
}

fn compare_decimals(a: i128, scale_a: i8, b: i128, scale_b: i8) -> Ordering {
    if scale_a == scale_b {
        return a.cmp(&b);
    }
    let diff = (scale_a as i32 - scale_b as i32).unsigned_abs();
    let factor = 10i128.checked_pow(diff);
    match factor {
        Some(factor) if scale_a > scale_b => match b.checked_mul(factor) {
            Some(b) => a.cmp(&b),
            None => 0.cmp(&b),
        },
        Some(factor) => match a.checked_mul(factor) {
            Some(a) => a.cmp(&b),
            None => a.cmp(&0),
        },
        None => (a as f64 / 10f64.powi(scale_a as i32))
            .partial_cmp(&(b as f64 / 10f64.powi(scale_b as i32)))
            .unwrap_or(Ordering::Equal),
    }
}

/// Compares two key tuples over their common prefix. Incomparable positions
/// are treated as equal.
pub fn compare_key_prefix(left: &[Value], right: &[Value]) -> Ordering {
    for (l, r) in left.iter().zip(right.iter()) {
        match l.compare(r) {
            Some(Ordering::Equal) | None => continue,
            Some(ord) => return ord,
        }
    }
    Ordering::Equal
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}t"),
            Value::Int16(v) => write!(f, "{v}s"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}l"),
            Value::Uint8(v) => write!(f, "{v}ut"),
            Value::Uint16(v) => write!(f, "{v}us"),
            Value::Uint32(v) => write!(f, "{v}u"),
            Value::Uint64(v) => write!(f, "{v}ul"),
            Value::Float(v) => write!(f, "{v}f"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal { value, scale, .. } => write!(f, "{value}e-{scale}"),
            Value::Bytes(v) => write!(f, "b64'{}'", BASE64_STANDARD.encode(v)),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Date(v) => write!(f, "Date({v})"),
            Value::Datetime(v) => write!(f, "Datetime({v})"),
            Value::Timestamp(v) => write!(f, "Timestamp({v})"),
            Value::Interval(v) => write!(f, "Interval({v})"),
            Value::Uuid(v) => write!(f, "Uuid({v:032x})"),
            Value::Optional(None) => f.write_str("NULL"),
            Value::Optional(Some(inner)) => write!(f, "{inner}?"),
        }
    }
}
