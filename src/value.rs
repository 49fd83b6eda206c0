//! Dynamically typed cell values exchanged between models and frames.
//!
//! A [`Value`] is what a model hands out through its field accessor and what an
//! adapter yields for every cell it decodes. The coercion layer in
//! [`crate::mapping::coerce`] reshapes values to the declared logical type before
//! they cross into either direction.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rustc_hash::FxHashMap;

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value
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
    Utf8(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    /// Fixed-point number: `value * 10^-scale`
    Decimal { value: i128, scale: i8 },
    /// Name of an enum variant
    Enum(String),
    List(Vec<Value>),
    /// Named struct members, in declaration order once coerced
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Whether this value is [`Value::Null`]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value's kind, used in error messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Int8(_) => "int8",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::UInt8(_) => "uint8",
            Self::UInt16(_) => "uint16",
            Self::UInt32(_) => "uint32",
            Self::UInt64(_) => "uint64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Utf8(_) => "utf8",
            Self::Binary(_) => "binary",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Timestamp(_) => "timestamp",
            Self::Decimal { .. } => "decimal",
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
            Self::Struct(_) => "struct",
        }
    }

    /// Integer payload widened to `i128`, if this is an integer value
    #[must_use]
    pub const fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Int8(v) => Some(v as i128),
            Self::Int16(v) => Some(v as i128),
            Self::Int32(v) => Some(v as i128),
            Self::Int64(v) => Some(v as i128),
            Self::UInt8(v) => Some(v as i128),
            Self::UInt16(v) => Some(v as i128),
            Self::UInt32(v) => Some(v as i128),
            Self::UInt64(v) => Some(v as i128),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) | Self::Enum(v) => write!(f, "{v:?}"),
            Self::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Self::Date(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{v}"),
            Self::Decimal { value, scale } => write!(f, "{value}e{}", -i16::from(*scale)),
            Self::List(items) => write!(f, "[{} items]", items.len()),
            Self::Struct(fields) => write!(f, "{{{} fields}}", fields.len()),
        }
    }
}

/// Field name to value map handed to a model constructor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: FxHashMap<String, Value>,
}

impl Record {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Borrow a field value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Remove a field value; absent fields read as [`Value::Null`]
    pub fn take(&mut self, name: &str) -> Value {
        self.values.remove(name).unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<(String, Value)>> for Record {
    fn from(fields: Vec<(String, Value)>) -> Self {
        Self {
            values: fields.into_iter().collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// One decoded frame row: values in schema field order
pub type Row = Vec<Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_take_defaults_to_null() {
        let mut record = Record::from(vec![("id".to_string(), Value::Int64(7))]);
        assert_eq!(record.take("id"), Value::Int64(7));
        assert_eq!(record.take("id"), Value::Null);
        assert_eq!(record.take("missing"), Value::Null);
    }

    #[test]
    fn test_decimal_display_exponent() {
        assert_eq!(Value::Decimal { value: 1999, scale: 2 }.to_string(), "1999e-2");
        assert_eq!(Value::Decimal { value: 12, scale: -2 }.to_string(), "12e2");
        assert_eq!(Value::Decimal { value: 5, scale: i8::MIN }.to_string(), "5e128");
    }

    #[test]
    fn test_integer_widening_helper() {
        assert_eq!(Value::UInt64(u64::MAX).as_i128(), Some(i128::from(u64::MAX)));
        assert_eq!(Value::Int8(-3).as_i128(), Some(-3));
        assert_eq!(Value::Utf8("3".into()).as_i128(), None);
    }
}
