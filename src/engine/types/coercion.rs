//! Conversion table between engine values and store values.
//!
//! Every conversion in the crate goes through [`to_engine`] and
//! [`to_store`]; call sites never cast values themselves.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::engine::errors::CoercionError;
use crate::engine::types::{ScalarValue, StoreType, Value};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// Converts a store value into the engine value placed in output rows.
pub fn to_engine(value: &Value) -> ScalarValue {
    match value {
        Value::Optional(None) => ScalarValue::Null,
        Value::Optional(Some(inner)) => to_engine(inner),
        Value::Bool(v) => ScalarValue::Boolean(*v),
        Value::Int8(v) => ScalarValue::Int8(*v),
        Value::Int16(v) => ScalarValue::Int16(*v),
        Value::Int32(v) => ScalarValue::Int32(*v),
        Value::Int64(v) => ScalarValue::Int64(*v),
        Value::Uint8(v) => ScalarValue::UInt8(*v),
        Value::Uint16(v) => ScalarValue::UInt16(*v),
        Value::Uint32(v) => ScalarValue::UInt32(*v),
        Value::Uint64(v) => ScalarValue::UInt64(*v),
        Value::Float(v) => ScalarValue::Float32(*v),
        Value::Double(v) => ScalarValue::Float64(*v),
        Value::Decimal {
            value,
            precision,
            scale,
        } => ScalarValue::Decimal128 {
            value: *value,
            precision: *precision,
            scale: *scale,
        },
        Value::Bytes(v) => ScalarValue::Binary(v.clone()),
        Value::Text(v) => ScalarValue::Utf8(v.clone()),
        Value::Date(v) => ScalarValue::Date32(*v),
        Value::Datetime(v) => ScalarValue::TimestampMicros(*v as i64 * MICROS_PER_SECOND),
        Value::Timestamp(v) => ScalarValue::TimestampMicros(*v),
        Value::Interval(v) => ScalarValue::DurationMicros(*v),
        Value::Uuid(v) => ScalarValue::Utf8(format_uuid(*v)),
    }
}

/// Converts an engine value into a store value of the declared type.
pub fn to_store(value: &ScalarValue, ty: &StoreType) -> Result<Value, CoercionError> {
    if let StoreType::Optional(inner) = ty {
        if value.is_null() {
            return Ok(Value::Optional(None));
        }
        return Ok(to_store(value, inner)?.make_optional());
    }
    if value.is_null() {
        return Err(CoercionError::NullForRequired(ty.to_string()));
    }

    let mismatch = || CoercionError::Mismatch {
        value: value.to_string(),
        target: ty.to_string(),
    };

    let converted = match ty {
        StoreType::Bool => match value {
            ScalarValue::Boolean(b) => Value::Bool(*b),
            _ => return Err(mismatch()),
        },
        StoreType::Int8 => Value::Int8(integer(value, ty)?),
        StoreType::Int16 => Value::Int16(integer(value, ty)?),
        StoreType::Int32 => Value::Int32(integer(value, ty)?),
        StoreType::Int64 => Value::Int64(integer(value, ty)?),
        StoreType::Uint8 => Value::Uint8(integer(value, ty)?),
        StoreType::Uint16 => Value::Uint16(integer(value, ty)?),
        StoreType::Uint32 => Value::Uint32(integer(value, ty)?),
        StoreType::Uint64 => Value::Uint64(integer(value, ty)?),
        StoreType::Float => match value {
            ScalarValue::Float32(f) => Value::Float(*f),
            other => Value::Float(other.as_f64().ok_or_else(mismatch)? as f32),
        },
        StoreType::Double => Value::Double(value.as_f64().ok_or_else(mismatch)?),
        StoreType::Decimal { precision, scale } => Value::Decimal {
            value: decimal(value, *scale, ty)?,
            precision: *precision,
            scale: *scale,
        },
        StoreType::Bytes => match value {
            ScalarValue::Binary(b) => Value::Bytes(b.clone()),
            ScalarValue::Utf8(s) => Value::Bytes(s.as_bytes().to_vec()),
            _ => return Err(mismatch()),
        },
        StoreType::Text => match value {
            ScalarValue::Utf8(s) => Value::Text(s.clone()),
            _ => return Err(mismatch()),
        },
        StoreType::Date => match value {
            ScalarValue::Date32(d) => Value::Date(*d),
            ScalarValue::TimestampMicros(ts) => {
                let days = ts.div_euclid(MICROS_PER_DAY);
                Value::Date(i32::try_from(days).map_err(|_| out_of_range(value, ty))?)
            }
            ScalarValue::Utf8(s) => Value::Date(parse_date(s).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        },
        StoreType::Datetime => {
            let micros = timestamp_micros(value).ok_or_else(mismatch)?;
            let seconds = micros.div_euclid(MICROS_PER_SECOND);
            Value::Datetime(u32::try_from(seconds).map_err(|_| out_of_range(value, ty))?)
        }
        StoreType::Timestamp => Value::Timestamp(timestamp_micros(value).ok_or_else(mismatch)?),
        StoreType::Interval => match value {
            ScalarValue::DurationMicros(v) => Value::Interval(*v),
            other => match other.as_i128() {
                Some(v) => Value::Interval(i64::try_from(v).map_err(|_| out_of_range(value, ty))?),
                None => return Err(mismatch()),
            },
        },
        StoreType::Uuid => match value {
            ScalarValue::Utf8(s) => Value::Uuid(parse_uuid(s).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        },
        StoreType::Optional(_) => unreachable!("optional handled above"),
    };
    Ok(converted)
}

/// Converts a key literal for a range bound. Key columns are always
/// optional in range tuples, so the result is wrapped accordingly.
pub fn to_store_key(value: &ScalarValue, ty: &StoreType) -> Result<Value, CoercionError> {
    to_store(value, &ty.clone().optional())
}

fn integer<T: TryFrom<i128>>(value: &ScalarValue, ty: &StoreType) -> Result<T, CoercionError> {
    let raw = match value {
        ScalarValue::Utf8(s) => s.trim().parse::<i128>().map_err(|_| CoercionError::Mismatch {
            value: value.to_string(),
            target: ty.to_string(),
        })?,
        other => other.as_i128().ok_or_else(|| CoercionError::Mismatch {
            value: value.to_string(),
            target: ty.to_string(),
        })?,
    };
    T::try_from(raw).map_err(|_| out_of_range(value, ty))
}

fn decimal(value: &ScalarValue, target_scale: i8, ty: &StoreType) -> Result<i128, CoercionError> {
    let (raw, scale) = match value {
        ScalarValue::Decimal128 { value, scale, .. } => (*value, *scale),
        other => match other.as_i128() {
            Some(v) => (v, 0),
            None => {
                return Err(CoercionError::Mismatch {
                    value: value.to_string(),
                    target: ty.to_string(),
                });
            }
        },
    };
    let shift = target_scale as i32 - scale as i32;
    let factor = 10i128
        .checked_pow(shift.unsigned_abs())
        .ok_or_else(|| out_of_range(value, ty))?;
    if shift >= 0 {
        raw.checked_mul(factor).ok_or_else(|| out_of_range(value, ty))
    } else {
        Ok(raw / factor)
    }
}

fn timestamp_micros(value: &ScalarValue) -> Option<i64> {
    match value {
        ScalarValue::TimestampMicros(ts) => Some(*ts),
        ScalarValue::Date32(d) => Some(*d as i64 * MICROS_PER_DAY),
        ScalarValue::Utf8(s) => parse_timestamp(s),
        _ => None,
    }
}

fn out_of_range(value: &ScalarValue, ty: &StoreType) -> CoercionError {
    CoercionError::OutOfRange {
        value: value.to_string(),
        target: ty.to_string(),
    }
}

fn parse_date(s: &str) -> Option<i32> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from(date.signed_duration_since(epoch).num_days()).ok()
}

fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_micros());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_micros());
        }
    }
    parse_date(s).map(|days| days as i64 * MICROS_PER_DAY)
}

fn parse_uuid(s: &str) -> Option<u128> {
    let hex: String = s.trim().chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 {
        return None;
    }
    u128::from_str_radix(&hex, 16).ok()
}

pub fn format_uuid(value: u128) -> String {
    let hex = format!("{value:032x}");
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
