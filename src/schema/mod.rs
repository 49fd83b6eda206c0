//! Backend-independent schema description.
//!
//! A [`Schema`] is the single source of truth shared by validation and
//! conversion. It is derived from a model definition by [`extract`] and compared
//! against whatever a backend reports for a frame.

pub mod extract;
pub mod model;

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub use extract::{SchemaCache, extract, extract_schema};
pub use model::{Blob, Decimal, DeclaredField, DeclaredType, FieldValue, Model, ModelDefinition};

/// Name given to list element descriptors
pub const LIST_ITEM_NAME: &str = "item";

/// Precision of time and timestamp values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TimeUnit {
    /// Number of ticks of this unit per second
    #[must_use]
    pub const fn ticks_per_second(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Millisecond => 1_000,
            Self::Microsecond => 1_000_000,
            Self::Nanosecond => 1_000_000_000,
        }
    }

    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Second => "s",
            Self::Millisecond => "ms",
            Self::Microsecond => "us",
            Self::Nanosecond => "ns",
        }
    }
}

/// Abstract, backend-independent type of a field
///
/// Nullability is not part of the logical type; it lives on the
/// [`FieldDescriptor`] that carries the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Binary,
    /// Calendar date without time of day
    Date,
    /// Time of day
    Time(TimeUnit),
    /// Date and time without timezone
    Timestamp(TimeUnit),
    /// Fixed-point decimal with `precision` significant digits, `scale` of them fractional
    Decimal { precision: u8, scale: i8 },
    /// Categorical string; the allowed variants live on the field descriptor
    Enum,
    /// Nested record with its own ordered fields
    Struct(Vec<FieldDescriptor>),
    /// Variable-length list; the element descriptor is named [`LIST_ITEM_NAME`]
    List(Box<FieldDescriptor>),
}

impl LogicalType {
    /// A list type whose elements have the given type and nullability
    #[must_use]
    pub fn list(element: Self, element_nullable: bool) -> Self {
        Self::List(Box::new(FieldDescriptor::new(
            LIST_ITEM_NAME,
            element,
            element_nullable,
        )))
    }

    /// Whether the type contains child fields
    #[must_use]
    pub const fn is_nested(&self) -> bool {
        matches!(self, Self::Struct(_) | Self::List(_))
    }

    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Int8 => write!(f, "int8"),
            Self::Int16 => write!(f, "int16"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::UInt8 => write!(f, "uint8"),
            Self::UInt16 => write!(f, "uint16"),
            Self::UInt32 => write!(f, "uint32"),
            Self::UInt64 => write!(f, "uint64"),
            Self::Float32 => write!(f, "float32"),
            Self::Float64 => write!(f, "float64"),
            Self::Utf8 => write!(f, "utf8"),
            Self::Binary => write!(f, "binary"),
            Self::Date => write!(f, "date"),
            Self::Time(unit) => write!(f, "time[{}]", unit.suffix()),
            Self::Timestamp(unit) => write!(f, "timestamp[{}]", unit.suffix()),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision}, {scale})"),
            Self::Enum => write!(f, "enum"),
            Self::Struct(fields) => write!(f, "struct<{}>", fields.iter().join(", ")),
            Self::List(item) => write!(f, "list<{item}>"),
        }
    }
}

/// Description of one field of a schema
///
/// Two descriptors are equal when name, logical type and nullability agree.
/// Enum variants are a value constraint, not part of the structural identity,
/// since most backends cannot report them back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, unique within its schema or struct
    pub name: String,
    /// Logical type of the field
    pub logical_type: LogicalType,
    /// Whether the field accepts null values
    pub nullable: bool,
    /// Allowed values of an [`LogicalType::Enum`] field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
            variants: Vec::new(),
        }
    }

    /// Attach the allowed variants of an enum field
    #[must_use]
    pub fn with_variants<S: Into<String>>(mut self, variants: impl IntoIterator<Item = S>) -> Self {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }

    /// Child fields of a struct field, empty for any other type
    #[must_use]
    pub fn children(&self) -> &[FieldDescriptor] {
        match &self.logical_type {
            LogicalType::Struct(fields) => fields,
            _ => &[],
        }
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.logical_type == other.logical_type
            && self.nullable == other.nullable
    }
}

impl Eq for FieldDescriptor {}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.logical_type)?;
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// Ordered sequence of field descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    #[must_use]
    pub const fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Fields in declaration order
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field at a position
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Find a field by name
    #[must_use]
    pub fn field_with_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Position of a field by name
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema<{}>", self.fields.iter().join(", "))
    }
}
