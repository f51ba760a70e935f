use std::cmp::Ordering;
use std::fmt;

use arrow_schema::{DataType, TimeUnit};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

/// A single engine-side value: what rows handed to the engine are made of
/// and what literals inside pushed-down predicates carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Decimal128 { value: i128, precision: u8, scale: i8 },
    Utf8(String),
    Binary(Vec<u8>),
    /// Days since the Unix epoch.
    Date32(i32),
    /// Microseconds since the Unix epoch.
    TimestampMicros(i64),
    DurationMicros(i64),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int8(_) => DataType::Int8,
            ScalarValue::Int16(_) => DataType::Int16,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::UInt8(_) => DataType::UInt8,
            ScalarValue::UInt16(_) => DataType::UInt16,
            ScalarValue::UInt32(_) => DataType::UInt32,
            ScalarValue::UInt64(_) => DataType::UInt64,
            ScalarValue::Float32(_) => DataType::Float32,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Decimal128 {
                precision, scale, ..
            } => DataType::Decimal128(*precision, *scale),
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Binary(_) => DataType::Binary,
            ScalarValue::Date32(_) => DataType::Date32,
            ScalarValue::TimestampMicros(_) => DataType::Timestamp(TimeUnit::Microsecond, None),
            ScalarValue::DurationMicros(_) => DataType::Duration(TimeUnit::Microsecond),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            ScalarValue::Int8(v) => Some(*v as i128),
            ScalarValue::Int16(v) => Some(*v as i128),
            ScalarValue::Int32(v) => Some(*v as i128),
            ScalarValue::Int64(v) => Some(*v as i128),
            ScalarValue::UInt8(v) => Some(*v as i128),
            ScalarValue::UInt16(v) => Some(*v as i128),
            ScalarValue::UInt32(v) => Some(*v as i128),
            ScalarValue::UInt64(v) => Some(*v as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Float32(f) => Some(*f as f64),
            ScalarValue::Float64(f) => Some(*f),
            ScalarValue::Decimal128 { value, scale, .. } => {
                Some(*value as f64 / 10f64.powi(*scale as i32))
            }
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Natural ordering between two values of compatible runtime types.
    /// Integers of any width compare numerically with each other; floats
    /// and decimals compare numerically with any number. Everything else
    /// only compares within its own kind. `None` means no natural order.
    pub fn natural_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Null, _) | (_, ScalarValue::Null) => None,
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => Some(a.cmp(b)),
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => Some(a.cmp(b)),
            (ScalarValue::Binary(a), ScalarValue::Binary(b)) => Some(a.cmp(b)),
            (ScalarValue::Date32(a), ScalarValue::Date32(b)) => Some(a.cmp(b)),
            (ScalarValue::TimestampMicros(a), ScalarValue::TimestampMicros(b)) => Some(a.cmp(b)),
            (ScalarValue::DurationMicros(a), ScalarValue::DurationMicros(b)) => Some(a.cmp(b)),
            (
                ScalarValue::Decimal128 {
                    value: a, scale: sa, ..
                },
                ScalarValue::Decimal128 {
                    value: b, scale: sb, ..
                },
            ) if sa == sb => Some(a.cmp(b)),
            (l, r) => {
                if let (Some(a), Some(b)) = (l.as_i128(), r.as_i128()) {
                    return Some(a.cmp(&b));
                }
                if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
                    return a.partial_cmp(&b);
                }
                None
            }
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            ScalarValue::Null => JsonValue::Null,
            ScalarValue::Boolean(b) => JsonValue::Bool(*b),
            ScalarValue::Float32(f) => Number::from_f64(*f as f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ScalarValue::Float64(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ScalarValue::Utf8(s) => JsonValue::String(s.clone()),
            ScalarValue::Binary(bytes) => JsonValue::String(BASE64_STANDARD.encode(bytes)),
            ScalarValue::Decimal128 { .. } => JsonValue::String(self.to_string()),
            ScalarValue::Date32(v) => JsonValue::Number(Number::from(*v)),
            ScalarValue::TimestampMicros(v) | ScalarValue::DurationMicros(v) => {
                JsonValue::Number(Number::from(*v))
            }
            other => match other.as_i128() {
                Some(v) if v >= 0 => JsonValue::Number(Number::from(v as u64)),
                Some(v) => JsonValue::Number(Number::from(v as i64)),
                None => JsonValue::Null,
            },
        }
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int32(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Int8(v) => write!(f, "{v}"),
            ScalarValue::Int16(v) => write!(f, "{v}"),
            ScalarValue::Int32(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::UInt8(v) => write!(f, "{v}"),
            ScalarValue::UInt16(v) => write!(f, "{v}"),
            ScalarValue::UInt32(v) => write!(f, "{v}"),
            ScalarValue::UInt64(v) => write!(f, "{v}"),
            ScalarValue::Float32(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::Decimal128 { value, scale, .. } => {
                if *scale <= 0 {
                    return write!(f, "{value}");
                }
                let divisor = 10i128.pow(*scale as u32);
                let sign = if *value < 0 { "-" } else { "" };
                let abs = value.unsigned_abs();
                write!(
                    f,
                    "{sign}{}.{:0width$}",
                    abs / divisor as u128,
                    abs % divisor as u128,
                    width = *scale as usize
                )
            }
            ScalarValue::Utf8(v) => write!(f, "{v:?}"),
            ScalarValue::Binary(v) => write!(f, "b64'{}'", BASE64_STANDARD.encode(v)),
            ScalarValue::Date32(v) => write!(f, "Date32({v})"),
            ScalarValue::TimestampMicros(v) => write!(f, "TimestampMicros({v})"),
            ScalarValue::DurationMicros(v) => write!(f, "DurationMicros({v})"),
        }
    }
}
