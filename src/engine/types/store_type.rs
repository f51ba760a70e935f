use std::fmt;
use std::str::FromStr;

use arrow_schema::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::engine::errors::CoercionError;

/// Declared column type in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    Decimal { precision: u8, scale: i8 },
    Bytes,
    Text,
    Date,
    Datetime,
    Timestamp,
    Interval,
    Uuid,
    Optional(Box<StoreType>),
}

impl StoreType {
    pub fn optional(self) -> StoreType {
        match self {
            StoreType::Optional(_) => self,
            other => StoreType::Optional(Box::new(other)),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, StoreType::Optional(_))
    }

    /// The type with every optional layer removed.
    pub fn base(&self) -> &StoreType {
        match self {
            StoreType::Optional(inner) => inner.base(),
            other => other,
        }
    }

    pub fn to_arrow(&self) -> DataType {
        match self.base() {
            StoreType::Bool => DataType::Boolean,
            StoreType::Int8 => DataType::Int8,
            StoreType::Int16 => DataType::Int16,
            StoreType::Int32 => DataType::Int32,
            StoreType::Int64 => DataType::Int64,
            StoreType::Uint8 => DataType::UInt8,
            StoreType::Uint16 => DataType::UInt16,
            StoreType::Uint32 => DataType::UInt32,
            StoreType::Uint64 => DataType::UInt64,
            StoreType::Float => DataType::Float32,
            StoreType::Double => DataType::Float64,
            StoreType::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale),
            StoreType::Bytes => DataType::Binary,
            StoreType::Text | StoreType::Uuid => DataType::Utf8,
            StoreType::Date => DataType::Date32,
            StoreType::Datetime | StoreType::Timestamp => {
                DataType::Timestamp(TimeUnit::Microsecond, None)
            }
            StoreType::Interval => DataType::Duration(TimeUnit::Microsecond),
            StoreType::Optional(_) => unreachable!("base() strips optional layers"),
        }
    }

    /// Maps an engine type onto the store type used when creating columns.
    pub fn from_arrow(data_type: &DataType) -> Result<StoreType, CoercionError> {
        let ty = match data_type {
            DataType::Boolean => StoreType::Bool,
            DataType::Int8 => StoreType::Int8,
            DataType::Int16 => StoreType::Int16,
            DataType::Int32 => StoreType::Int32,
            DataType::Int64 => StoreType::Int64,
            DataType::UInt8 => StoreType::Uint8,
            DataType::UInt16 => StoreType::Uint16,
            DataType::UInt32 => StoreType::Uint32,
            DataType::UInt64 => StoreType::Uint64,
            DataType::Float32 => StoreType::Float,
            DataType::Float64 => StoreType::Double,
            DataType::Decimal128(precision, scale) => StoreType::Decimal {
                precision: *precision,
                scale: *scale,
            },
            DataType::Binary | DataType::LargeBinary => StoreType::Bytes,
            DataType::Utf8 | DataType::LargeUtf8 => StoreType::Text,
            DataType::Date32 => StoreType::Date,
            DataType::Timestamp(_, _) => StoreType::Timestamp,
            DataType::Duration(_) => StoreType::Interval,
            other => return Err(CoercionError::UnsupportedEngineType(other.to_string())),
        };
        Ok(ty)
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreType::Bool => f.write_str("Bool"),
            StoreType::Int8 => f.write_str("Int8"),
            StoreType::Int16 => f.write_str("Int16"),
            StoreType::Int32 => f.write_str("Int32"),
            StoreType::Int64 => f.write_str("Int64"),
            StoreType::Uint8 => f.write_str("Uint8"),
            StoreType::Uint16 => f.write_str("Uint16"),
            StoreType::Uint32 => f.write_str("Uint32"),
            StoreType::Uint64 => f.write_str("Uint64"),
            StoreType::Float => f.write_str("Float"),
            StoreType::Double => f.write_str("Double"),
            StoreType::Decimal { precision, scale } => write!(f, "Decimal({precision},{scale})"),
            StoreType::Bytes => f.write_str("String"),
            StoreType::Text => f.write_str("Utf8"),
            StoreType::Date => f.write_str("Date"),
            StoreType::Datetime => f.write_str("Datetime"),
            StoreType::Timestamp => f.write_str("Timestamp"),
            StoreType::Interval => f.write_str("Interval"),
            StoreType::Uuid => f.write_str("Uuid"),
            StoreType::Optional(inner) => write!(f, "{inner}?"),
        }
    }
}

impl FromStr for StoreType {
    type Err = CoercionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix('?') {
            return Ok(inner.parse::<StoreType>()?.optional());
        }
        if let Some(inner) = s
            .strip_prefix("Optional<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ok(inner.parse::<StoreType>()?.optional());
        }
        if let Some(args) = s
            .strip_prefix("Decimal(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let (precision, scale) = args
                .split_once(',')
                .ok_or_else(|| CoercionError::UnknownStoreType(s.to_string()))?;
            let precision = precision
                .trim()
                .parse::<u8>()
                .map_err(|_| CoercionError::UnknownStoreType(s.to_string()))?;
            let scale = scale
                .trim()
                .parse::<i8>()
                .map_err(|_| CoercionError::UnknownStoreType(s.to_string()))?;
            return Ok(StoreType::Decimal { precision, scale });
        }

        match s {
            "Bool" => Ok(StoreType::Bool),
            "Int8" => Ok(StoreType::Int8),
            "Int16" => Ok(StoreType::Int16),
            "Int32" => Ok(StoreType::Int32),
            "Int64" => Ok(StoreType::Int64),
            "Uint8" => Ok(StoreType::Uint8),
            "Uint16" => Ok(StoreType::Uint16),
            "Uint32" => Ok(StoreType::Uint32),
            "Uint64" => Ok(StoreType::Uint64),
            "Float" => Ok(StoreType::Float),
            "Double" => Ok(StoreType::Double),
            "Decimal" => Ok(StoreType::Decimal {
                precision: 22,
                scale: 9,
            }),
            "String" | "Bytes" => Ok(StoreType::Bytes),
            "Utf8" | "Text" => Ok(StoreType::Text),
            "Date" => Ok(StoreType::Date),
            "Datetime" => Ok(StoreType::Datetime),
            "Timestamp" => Ok(StoreType::Timestamp),
            "Interval" => Ok(StoreType::Interval),
            "Uuid" => Ok(StoreType::Uuid),
            other => Err(CoercionError::UnknownStoreType(other.to_string())),
        }
    }
}
