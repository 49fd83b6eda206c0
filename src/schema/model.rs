//! Typed-model definition interface.
//!
//! A model exposes an ordered list of declared fields, a field accessor and a
//! constructor taking a [`Record`]. Structs normally get all three from
//! `#[derive(Model)]`; the [`FieldValue`] implementations below tell the derive
//! how each Rust field type maps onto a declared type and a [`Value`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ValueError;
use crate::schema::{LogicalType, TimeUnit};
use crate::value::{Record, Value};

/// Declared type of a model field, before schema extraction resolves it
#[derive(Debug, Clone)]
pub enum DeclaredType {
    /// A primitive logical type
    Logical(LogicalType),
    /// Categorical field with the listed variants
    Enum(Vec<String>),
    /// Reference to a nested model, resolved lazily so that recursive
    /// definitions can be detected instead of expanded forever
    Model(fn() -> ModelDefinition),
    /// List of elements of the inner declared type
    List {
        element: Box<DeclaredType>,
        nullable: bool,
    },
    /// Unconstrained value with no logical mapping
    Any,
}

/// One field of a model definition
#[derive(Debug, Clone)]
pub struct DeclaredField {
    pub name: String,
    pub declared_type: DeclaredType,
    pub nullable: bool,
}

impl DeclaredField {
    pub fn new(name: impl Into<String>, declared_type: DeclaredType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            declared_type,
            nullable,
        }
    }

    /// Declare a field whose type and nullability follow a Rust type
    pub fn of<T: FieldValue>(name: impl Into<String>) -> Self {
        Self::new(name, T::declared_type(), T::nullable())
    }
}

/// Ordered field list of a model
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    name: String,
    identity: String,
    fields: Vec<DeclaredField>,
}

impl ModelDefinition {
    /// Create an empty definition; the name doubles as the model identity
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            identity: name.clone(),
            name,
            fields: Vec::new(),
        }
    }

    /// Create an empty definition identified by a Rust type
    pub fn for_type<T: ?Sized>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: std::any::type_name::<T>().to_string(),
            fields: Vec::new(),
        }
    }

    /// Append a field
    #[must_use]
    pub fn field(mut self, field: DeclaredField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity used for cycle detection
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn fields(&self) -> &[DeclaredField] {
        &self.fields
    }
}

/// A typed model that can be described, read field by field, and rebuilt from
/// a record
pub trait Model: Sized {
    /// Ordered field declarations
    fn definition() -> ModelDefinition;

    /// Value of a field by name, `None` if the model has no such field
    fn field_value(&self, name: &str) -> Option<Value>;

    /// Build an instance from field values
    fn from_record(record: Record) -> Result<Self, ValueError>;
}

/// A Rust type usable as a model field
pub trait FieldValue: Sized {
    /// Declared type of fields of this Rust type
    fn declared_type() -> DeclaredType;

    /// Whether fields of this Rust type accept null
    fn nullable() -> bool {
        false
    }

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, ValueError>;
}

macro_rules! integer_field_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn declared_type() -> DeclaredType {
                    DeclaredType::Logical(LogicalType::$variant)
                }

                fn to_value(&self) -> Value {
                    Value::$variant(*self)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let wide = value
                        .as_i128()
                        .ok_or_else(|| ValueError::unexpected(stringify!($ty), &value))?;
                    <$ty>::try_from(wide).map_err(|_| ValueError::OutOfRange {
                        value: wide.to_string(),
                        target: stringify!($ty),
                    })
                }
            }
        )*
    };
}

integer_field_value! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
}

impl FieldValue for f32 {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Float32)
    }

    fn to_value(&self) -> Value {
        Value::Float32(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float32(v) => Ok(v),
            other => Err(ValueError::unexpected("f32", &other)),
        }
    }
}

impl FieldValue for f64 {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Float64)
    }

    fn to_value(&self) -> Value {
        Value::Float64(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float64(v) => Ok(v),
            Value::Float32(v) => Ok(f64::from(v)),
            other => Err(ValueError::unexpected("f64", &other)),
        }
    }
}

impl FieldValue for bool {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Boolean)
    }

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Boolean(v) => Ok(v),
            other => Err(ValueError::unexpected("bool", &other)),
        }
    }
}

impl FieldValue for String {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Utf8)
    }

    fn to_value(&self) -> Value {
        Value::Utf8(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Utf8(v) | Value::Enum(v) => Ok(v),
            other => Err(ValueError::unexpected("String", &other)),
        }
    }
}

/// Opaque byte string field
///
/// `Vec<u8>` already means "list of uint8", so binary columns use this wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

impl FieldValue for Blob {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Binary)
    }

    fn to_value(&self) -> Value {
        Value::Binary(self.0.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Binary(v) => Ok(Self(v)),
            other => Err(ValueError::unexpected("Blob", &other)),
        }
    }
}

/// Fixed-point decimal field with precision `P` and scale `S`
///
/// The wrapped integer is the unscaled value: `Decimal::<10, 2>(12345)` is 123.45.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decimal<const P: u8, const S: i8>(pub i128);

impl<const P: u8, const S: i8> FieldValue for Decimal<P, S> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Decimal {
            precision: P,
            scale: S,
        })
    }

    fn to_value(&self) -> Value {
        Value::Decimal {
            value: self.0,
            scale: S,
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Decimal { value, scale } if scale == S => Ok(Self(value)),
            decimal @ Value::Decimal { .. } => Err(ValueError::OutOfRange {
                value: decimal.to_string(),
                target: "decimal of a different scale",
            }),
            other => Err(ValueError::unexpected("decimal", &other)),
        }
    }
}

impl FieldValue for NaiveDate {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Date)
    }

    fn to_value(&self) -> Value {
        Value::Date(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Date(v) => Ok(v),
            other => Err(ValueError::unexpected("NaiveDate", &other)),
        }
    }
}

impl FieldValue for NaiveTime {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Time(TimeUnit::Microsecond))
    }

    fn to_value(&self) -> Value {
        Value::Time(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Time(v) => Ok(v),
            other => Err(ValueError::unexpected("NaiveTime", &other)),
        }
    }
}

impl FieldValue for NaiveDateTime {
    fn declared_type() -> DeclaredType {
        DeclaredType::Logical(LogicalType::Timestamp(TimeUnit::Microsecond))
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(ValueError::unexpected("NaiveDateTime", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn declared_type() -> DeclaredType {
        T::declared_type()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::List {
            element: Box::new(T::declared_type()),
            nullable: T::nullable(),
        }
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| T::from_value(item).map_err(|e| e.in_field(&i.to_string())))
                .collect(),
            other => Err(ValueError::unexpected("list", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn declared_type() -> DeclaredType {
        T::declared_type()
    }

    fn nullable() -> bool {
        T::nullable()
    }

    fn to_value(&self) -> Value {
        self.as_ref().to_value()
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        T::from_value(value).map(Box::new)
    }
}

/// Free-form JSON has no logical type; models holding it cannot be extracted.
impl FieldValue for serde_json::Value {
    fn declared_type() -> DeclaredType {
        DeclaredType::Any
    }

    fn to_value(&self) -> Value {
        Value::Utf8(self.to_string())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Utf8(text) => serde_json::from_str(&text).map_err(|_| ValueError::Unexpected {
                expected: "JSON text",
                found: "utf8",
            }),
            other => Err(ValueError::unexpected("JSON text", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_from_value_range_checked() {
        assert_eq!(i16::from_value(Value::Int64(300)), Ok(300));
        assert!(matches!(
            i8::from_value(Value::Int64(300)),
            Err(ValueError::OutOfRange { target: "i8", .. })
        ));
        assert!(matches!(
            u32::from_value(Value::Utf8("1".into())),
            Err(ValueError::Unexpected { found: "utf8", .. })
        ));
    }

    #[test]
    fn test_option_and_vec_declarations() {
        let field = DeclaredField::of::<Option<Vec<Option<i32>>>>("scores");
        assert!(field.nullable);
        let DeclaredType::List { element, nullable } = field.declared_type else {
            panic!("expected list declaration");
        };
        assert!(nullable);
        assert!(matches!(*element, DeclaredType::Logical(LogicalType::Int32)));
    }

    #[test]
    fn test_vec_from_value_reports_index() {
        let err = Vec::<u8>::from_value(Value::List(vec![Value::UInt8(1), Value::Int64(-1)]))
            .unwrap_err();
        assert_eq!(err.field_path().as_deref(), Some("1"));
    }
}
