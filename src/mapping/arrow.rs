//! Logical type mapping for Arrow.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields, Schema as ArrowSchema, TimeUnit as ArrowTimeUnit};

use crate::backend::ArrowBackend;
use crate::error::{BridgeError, Result};
use crate::mapping::TypeMapping;
use crate::schema::extract::MAX_DECIMAL_PRECISION;
use crate::schema::{FieldDescriptor, LIST_ITEM_NAME, LogicalType, Schema, TimeUnit};

const BACKEND: &str = "arrow";

impl TypeMapping for ArrowBackend {
    type Native = DataType;

    const BACKEND: &'static str = BACKEND;

    fn to_native(&self, logical: &LogicalType) -> Result<DataType> {
        arrow_type(logical)
    }

    fn from_native(&self, native: &DataType) -> Result<LogicalType> {
        logical_type(native)
    }

    fn describe_native(&self, native: &DataType) -> String {
        native.to_string()
    }
}

const fn arrow_unit(unit: TimeUnit) -> ArrowTimeUnit {
    match unit {
        TimeUnit::Second => ArrowTimeUnit::Second,
        TimeUnit::Millisecond => ArrowTimeUnit::Millisecond,
        TimeUnit::Microsecond => ArrowTimeUnit::Microsecond,
        TimeUnit::Nanosecond => ArrowTimeUnit::Nanosecond,
    }
}

const fn logical_unit(unit: ArrowTimeUnit) -> TimeUnit {
    match unit {
        ArrowTimeUnit::Second => TimeUnit::Second,
        ArrowTimeUnit::Millisecond => TimeUnit::Millisecond,
        ArrowTimeUnit::Microsecond => TimeUnit::Microsecond,
        ArrowTimeUnit::Nanosecond => TimeUnit::Nanosecond,
    }
}

/// Arrow data type for a logical type
pub fn arrow_type(logical: &LogicalType) -> Result<DataType> {
    let data_type = match logical {
        LogicalType::Boolean => DataType::Boolean,
        LogicalType::Int8 => DataType::Int8,
        LogicalType::Int16 => DataType::Int16,
        LogicalType::Int32 => DataType::Int32,
        LogicalType::Int64 => DataType::Int64,
        LogicalType::UInt8 => DataType::UInt8,
        LogicalType::UInt16 => DataType::UInt16,
        LogicalType::UInt32 => DataType::UInt32,
        LogicalType::UInt64 => DataType::UInt64,
        LogicalType::Float32 => DataType::Float32,
        LogicalType::Float64 => DataType::Float64,
        LogicalType::Utf8 => DataType::Utf8,
        LogicalType::Binary => DataType::Binary,
        LogicalType::Date => DataType::Date32,
        LogicalType::Time(unit @ (TimeUnit::Second | TimeUnit::Millisecond)) => {
            DataType::Time32(arrow_unit(*unit))
        }
        LogicalType::Time(unit) => DataType::Time64(arrow_unit(*unit)),
        LogicalType::Timestamp(unit) => DataType::Timestamp(arrow_unit(*unit), None),
        LogicalType::Decimal { precision, scale } => {
            if *precision > MAX_DECIMAL_PRECISION {
                return Err(BridgeError::unsupported(BACKEND, logical));
            }
            DataType::Decimal128(*precision, *scale)
        }
        LogicalType::Enum => {
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
        }
        LogicalType::Struct(children) => DataType::Struct(
            children
                .iter()
                .map(arrow_field)
                .collect::<Result<Vec<_>>>()?
                .into(),
        ),
        LogicalType::List(item) => DataType::List(Arc::new(arrow_field(item)?)),
    };
    Ok(data_type)
}

/// Arrow field for a field descriptor
pub fn arrow_field(field: &FieldDescriptor) -> Result<Field> {
    Ok(Field::new(
        &field.name,
        arrow_type(&field.logical_type)?,
        field.nullable,
    ))
}

/// Arrow schema for a schema, in field order
pub fn arrow_schema(schema: &Schema) -> Result<ArrowSchema> {
    let fields = schema.iter().map(arrow_field).collect::<Result<Vec<_>>>()?;
    Ok(ArrowSchema::new(fields))
}

/// Logical type for an Arrow data type
///
/// Several Arrow encodings collapse onto one logical type: large and view
/// variants read as their plain counterparts, dictionaries of strings read as
/// enums and timezone-aware timestamps read as plain timestamps.
pub fn logical_type(data_type: &DataType) -> Result<LogicalType> {
    let logical = match data_type {
        DataType::Boolean => LogicalType::Boolean,
        DataType::Int8 => LogicalType::Int8,
        DataType::Int16 => LogicalType::Int16,
        DataType::Int32 => LogicalType::Int32,
        DataType::Int64 => LogicalType::Int64,
        DataType::UInt8 => LogicalType::UInt8,
        DataType::UInt16 => LogicalType::UInt16,
        DataType::UInt32 => LogicalType::UInt32,
        DataType::UInt64 => LogicalType::UInt64,
        DataType::Float32 => LogicalType::Float32,
        DataType::Float64 => LogicalType::Float64,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => LogicalType::Utf8,
        DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView
        | DataType::FixedSizeBinary(_) => LogicalType::Binary,
        DataType::Date32 | DataType::Date64 => LogicalType::Date,
        DataType::Time32(unit) | DataType::Time64(unit) => LogicalType::Time(logical_unit(*unit)),
        DataType::Timestamp(unit, _) => LogicalType::Timestamp(logical_unit(*unit)),
        DataType::Decimal128(precision, scale) => LogicalType::Decimal {
            precision: *precision,
            scale: *scale,
        },
        DataType::Dictionary(key, value)
            if key.is_dictionary_key_type()
                && matches!(
                    value.as_ref(),
                    DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
                ) =>
        {
            LogicalType::Enum
        }
        DataType::Struct(fields) => LogicalType::Struct(struct_fields(fields)?),
        DataType::List(item) | DataType::LargeList(item) | DataType::FixedSizeList(item, _) => {
            let mut item = field_descriptor(item)?;
            item.name = LIST_ITEM_NAME.to_string();
            LogicalType::List(Box::new(item))
        }
        other => return Err(BridgeError::unsupported(BACKEND, other)),
    };
    Ok(logical)
}

/// Field descriptor for an Arrow field
pub fn field_descriptor(field: &Field) -> Result<FieldDescriptor> {
    Ok(FieldDescriptor::new(
        field.name(),
        logical_type(field.data_type())?,
        field.is_nullable(),
    ))
}

fn struct_fields(fields: &Fields) -> Result<Vec<FieldDescriptor>> {
    fields.iter().map(|field| field_descriptor(field)).collect()
}
