//! Logical type mapping for Parquet.
//!
//! Parquet describes a column by a physical type plus an optional logical
//! annotation, and nests through groups. [`ParquetType`] captures exactly that,
//! so a file's schema tree can be mapped without going through Arrow.
//!
//! Parquet has no second-precision time units, and the Arrow writer stores
//! categorical columns as plain UTF8 strings, so `time[s]`, `timestamp[s]` and
//! `enum` are not supported here.

use parquet::basic::{
    ConvertedType, LogicalType as ParquetLogicalType, Repetition, TimeUnit as ParquetTimeUnit,
    Type as PhysicalType,
};
use parquet::schema::types::Type;

use crate::backend::ParquetBackend;
use crate::error::{BridgeError, Result};
use crate::mapping::TypeMapping;
use crate::schema::{FieldDescriptor, LIST_ITEM_NAME, LogicalType, TimeUnit};

const BACKEND: &str = "parquet";

/// Native Parquet type of a column
#[derive(Debug, Clone, PartialEq)]
pub enum ParquetType {
    /// Leaf column
    Primitive {
        physical: PhysicalType,
        logical: Option<ParquetLogicalType>,
        /// Byte width of `FIXED_LEN_BYTE_ARRAY` columns, -1 otherwise
        length: i32,
    },
    /// Group of named children
    Group(Vec<ParquetField>),
    /// List group wrapping a single element
    List(Box<ParquetField>),
}

/// A named Parquet type with its repetition
#[derive(Debug, Clone, PartialEq)]
pub struct ParquetField {
    pub name: String,
    pub repetition: Repetition,
    pub parquet_type: ParquetType,
}

impl ParquetField {
    /// Whether the field may hold nulls according to its declared repetition
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.repetition == Repetition::OPTIONAL
    }
}

impl TypeMapping for ParquetBackend {
    type Native = ParquetType;

    const BACKEND: &'static str = BACKEND;

    fn to_native(&self, logical: &LogicalType) -> Result<ParquetType> {
        parquet_type(logical)
    }

    fn from_native(&self, native: &ParquetType) -> Result<LogicalType> {
        logical_type(native)
    }
}

const fn repetition(nullable: bool) -> Repetition {
    if nullable {
        Repetition::OPTIONAL
    } else {
        Repetition::REQUIRED
    }
}

fn primitive(physical: PhysicalType, logical: Option<ParquetLogicalType>) -> ParquetType {
    ParquetType::Primitive {
        physical,
        logical,
        length: -1,
    }
}

fn integer(physical: PhysicalType, bit_width: i8, is_signed: bool) -> ParquetType {
    primitive(
        physical,
        Some(ParquetLogicalType::Integer {
            bit_width,
            is_signed,
        }),
    )
}

fn parquet_unit(unit: TimeUnit) -> Option<ParquetTimeUnit> {
    match unit {
        TimeUnit::Second => None,
        TimeUnit::Millisecond => Some(ParquetTimeUnit::MILLIS(Default::default())),
        TimeUnit::Microsecond => Some(ParquetTimeUnit::MICROS(Default::default())),
        TimeUnit::Nanosecond => Some(ParquetTimeUnit::NANOS(Default::default())),
    }
}

const fn logical_unit(unit: &ParquetTimeUnit) -> TimeUnit {
    match unit {
        ParquetTimeUnit::MILLIS(_) => TimeUnit::Millisecond,
        ParquetTimeUnit::MICROS(_) => TimeUnit::Microsecond,
        ParquetTimeUnit::NANOS(_) => TimeUnit::Nanosecond,
    }
}

/// Minimal byte width of a fixed-length decimal holding `precision` digits
fn decimal_length(precision: u8) -> i32 {
    // Smallest n such that 2^(8n - 1) > 10^precision
    let bits = f64::from(precision) * std::f64::consts::LOG2_10 + 1.0;
    (bits / 8.0).ceil() as i32
}

/// Native Parquet type of a logical type
pub fn parquet_type(logical: &LogicalType) -> Result<ParquetType> {
    let native = match logical {
        LogicalType::Boolean => primitive(PhysicalType::BOOLEAN, None),
        LogicalType::Int8 => integer(PhysicalType::INT32, 8, true),
        LogicalType::Int16 => integer(PhysicalType::INT32, 16, true),
        LogicalType::Int32 => integer(PhysicalType::INT32, 32, true),
        LogicalType::Int64 => integer(PhysicalType::INT64, 64, true),
        LogicalType::UInt8 => integer(PhysicalType::INT32, 8, false),
        LogicalType::UInt16 => integer(PhysicalType::INT32, 16, false),
        LogicalType::UInt32 => integer(PhysicalType::INT32, 32, false),
        LogicalType::UInt64 => integer(PhysicalType::INT64, 64, false),
        LogicalType::Float32 => primitive(PhysicalType::FLOAT, None),
        LogicalType::Float64 => primitive(PhysicalType::DOUBLE, None),
        LogicalType::Utf8 => primitive(PhysicalType::BYTE_ARRAY, Some(ParquetLogicalType::String)),
        LogicalType::Binary => primitive(PhysicalType::BYTE_ARRAY, None),
        LogicalType::Date => primitive(PhysicalType::INT32, Some(ParquetLogicalType::Date)),
        LogicalType::Time(unit) => {
            let parquet_unit =
                parquet_unit(*unit).ok_or_else(|| BridgeError::unsupported(BACKEND, logical))?;
            let physical = if *unit == TimeUnit::Millisecond {
                PhysicalType::INT32
            } else {
                PhysicalType::INT64
            };
            primitive(
                physical,
                Some(ParquetLogicalType::Time {
                    is_adjusted_to_u_t_c: false,
                    unit: parquet_unit,
                }),
            )
        }
        LogicalType::Timestamp(unit) => {
            let parquet_unit =
                parquet_unit(*unit).ok_or_else(|| BridgeError::unsupported(BACKEND, logical))?;
            primitive(
                PhysicalType::INT64,
                Some(ParquetLogicalType::Timestamp {
                    is_adjusted_to_u_t_c: false,
                    unit: parquet_unit,
                }),
            )
        }
        LogicalType::Decimal { precision, scale } => {
            let annotation = Some(ParquetLogicalType::Decimal {
                scale: i32::from(*scale),
                precision: i32::from(*precision),
            });
            // Same physical layout the Arrow writer picks
            if *precision > 1 && *precision <= 9 {
                primitive(PhysicalType::INT32, annotation)
            } else if *precision <= 18 {
                primitive(PhysicalType::INT64, annotation)
            } else {
                ParquetType::Primitive {
                    physical: PhysicalType::FIXED_LEN_BYTE_ARRAY,
                    logical: annotation,
                    length: decimal_length(*precision),
                }
            }
        }
        LogicalType::Enum => return Err(BridgeError::unsupported(BACKEND, logical)),
        LogicalType::Struct(children) => ParquetType::Group(
            children
                .iter()
                .map(parquet_field)
                .collect::<Result<Vec<_>>>()?,
        ),
        LogicalType::List(item) => ParquetType::List(Box::new(parquet_field(item)?)),
    };
    Ok(native)
}

/// Native Parquet field for a field descriptor
pub fn parquet_field(field: &FieldDescriptor) -> Result<ParquetField> {
    Ok(ParquetField {
        name: field.name.clone(),
        repetition: repetition(field.nullable),
        parquet_type: parquet_type(&field.logical_type)?,
    })
}

/// Logical type of a native Parquet type
pub fn logical_type(native: &ParquetType) -> Result<LogicalType> {
    match native {
        ParquetType::Primitive {
            physical, logical, ..
        } => primitive_logical_type(*physical, logical.as_ref()),
        ParquetType::Group(children) => Ok(LogicalType::Struct(
            children
                .iter()
                .map(field_descriptor)
                .collect::<Result<Vec<_>>>()?,
        )),
        ParquetType::List(item) => {
            let mut item = field_descriptor(item)?;
            item.name = LIST_ITEM_NAME.to_string();
            Ok(LogicalType::List(Box::new(item)))
        }
    }
}

/// Field descriptor of a native Parquet field; nullability from repetition
pub fn field_descriptor(field: &ParquetField) -> Result<FieldDescriptor> {
    Ok(FieldDescriptor::new(
        &field.name,
        logical_type(&field.parquet_type)?,
        field.is_optional(),
    ))
}

fn primitive_logical_type(
    physical: PhysicalType,
    logical: Option<&ParquetLogicalType>,
) -> Result<LogicalType> {
    let unsupported = || {
        BridgeError::unsupported(
            BACKEND,
            format!("physical type {physical} with annotation {logical:?}"),
        )
    };

    let mapped = match (physical, logical) {
        (PhysicalType::BOOLEAN, None) => LogicalType::Boolean,
        (
            PhysicalType::INT32 | PhysicalType::INT64,
            Some(ParquetLogicalType::Integer {
                bit_width,
                is_signed,
            }),
        ) => match (*bit_width, *is_signed) {
            (8, true) => LogicalType::Int8,
            (16, true) => LogicalType::Int16,
            (32, true) => LogicalType::Int32,
            (64, true) => LogicalType::Int64,
            (8, false) => LogicalType::UInt8,
            (16, false) => LogicalType::UInt16,
            (32, false) => LogicalType::UInt32,
            (64, false) => LogicalType::UInt64,
            _ => return Err(unsupported()),
        },
        (_, Some(ParquetLogicalType::Decimal { scale, precision })) => {
            let precision = u8::try_from(*precision).map_err(|_| unsupported())?;
            let scale = i8::try_from(*scale).map_err(|_| unsupported())?;
            LogicalType::Decimal { precision, scale }
        }
        (PhysicalType::INT32, None) => LogicalType::Int32,
        (PhysicalType::INT64, None) => LogicalType::Int64,
        (PhysicalType::INT32, Some(ParquetLogicalType::Date)) => LogicalType::Date,
        (PhysicalType::INT32 | PhysicalType::INT64, Some(ParquetLogicalType::Time { unit, .. })) => {
            LogicalType::Time(logical_unit(unit))
        }
        (PhysicalType::INT64, Some(ParquetLogicalType::Timestamp { unit, .. })) => {
            LogicalType::Timestamp(logical_unit(unit))
        }
        // Legacy nanosecond timestamps
        (PhysicalType::INT96, None) => LogicalType::Timestamp(TimeUnit::Nanosecond),
        (PhysicalType::FLOAT, None) => LogicalType::Float32,
        (PhysicalType::DOUBLE, None) => LogicalType::Float64,
        (
            PhysicalType::BYTE_ARRAY,
            Some(ParquetLogicalType::String | ParquetLogicalType::Enum | ParquetLogicalType::Json),
        ) => LogicalType::Utf8,
        (PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY, None) => {
            LogicalType::Binary
        }
        _ => return Err(unsupported()),
    };
    Ok(mapped)
}

/// Native field of a node in a Parquet schema tree
///
/// Recognises the standard three-level list layout
/// (`<list> (LIST) { repeated group list { <element> } }`), the two-level
/// layout where the repeated child is the element itself, and bare repeated
/// fields, which read as lists of required elements.
pub fn native_field(node: &Type) -> ParquetField {
    let info = node.get_basic_info();
    let declared = if info.has_repetition() {
        info.repetition()
    } else {
        Repetition::REQUIRED
    };

    if declared == Repetition::REPEATED {
        let element = ParquetField {
            name: LIST_ITEM_NAME.to_string(),
            repetition: Repetition::REQUIRED,
            parquet_type: native_type(node),
        };
        return ParquetField {
            name: info.name().to_string(),
            repetition: Repetition::REQUIRED,
            parquet_type: ParquetType::List(Box::new(element)),
        };
    }

    ParquetField {
        name: info.name().to_string(),
        repetition: declared,
        parquet_type: native_type(node),
    }
}

fn native_type(node: &Type) -> ParquetType {
    match node {
        Type::PrimitiveType {
            basic_info,
            physical_type,
            type_length,
            scale,
            precision,
        } => ParquetType::Primitive {
            physical: *physical_type,
            logical: basic_info
                .logical_type()
                .or_else(|| legacy_annotation(basic_info.converted_type(), *precision, *scale)),
            length: *type_length,
        },
        Type::GroupType { basic_info, fields } => {
            let is_list = matches!(basic_info.logical_type(), Some(ParquetLogicalType::List))
                || basic_info.converted_type() == ConvertedType::LIST;
            match fields.as_slice() {
                [repeated] if is_list => ParquetType::List(Box::new(list_element(repeated))),
                _ => ParquetType::Group(fields.iter().map(|field| native_field(field)).collect()),
            }
        }
    }
}

fn list_element(repeated: &Type) -> ParquetField {
    match repeated {
        Type::GroupType { fields, .. } if fields.len() == 1 => {
            let element = &fields[0];
            let info = element.get_basic_info();
            ParquetField {
                name: LIST_ITEM_NAME.to_string(),
                repetition: if info.has_repetition() {
                    info.repetition()
                } else {
                    Repetition::REQUIRED
                },
                parquet_type: native_type(element),
            }
        }
        other => ParquetField {
            name: LIST_ITEM_NAME.to_string(),
            repetition: Repetition::REQUIRED,
            parquet_type: native_type(other),
        },
    }
}

/// Logical annotation implied by a pre-`LogicalType` converted type
///
/// Legacy time and timestamp columns are UTC-adjusted.
fn legacy_annotation(
    converted: ConvertedType,
    precision: i32,
    scale: i32,
) -> Option<ParquetLogicalType> {
    match converted {
        ConvertedType::UTF8 => Some(ParquetLogicalType::String),
        ConvertedType::ENUM => Some(ParquetLogicalType::Enum),
        ConvertedType::JSON => Some(ParquetLogicalType::Json),
        ConvertedType::DATE => Some(ParquetLogicalType::Date),
        ConvertedType::DECIMAL => Some(ParquetLogicalType::Decimal { scale, precision }),
        ConvertedType::TIME_MILLIS => Some(ParquetLogicalType::Time {
            is_adjusted_to_u_t_c: true,
            unit: ParquetTimeUnit::MILLIS(Default::default()),
        }),
        ConvertedType::TIME_MICROS => Some(ParquetLogicalType::Time {
            is_adjusted_to_u_t_c: true,
            unit: ParquetTimeUnit::MICROS(Default::default()),
        }),
        ConvertedType::TIMESTAMP_MILLIS => Some(ParquetLogicalType::Timestamp {
            is_adjusted_to_u_t_c: true,
            unit: ParquetTimeUnit::MILLIS(Default::default()),
        }),
        ConvertedType::TIMESTAMP_MICROS => Some(ParquetLogicalType::Timestamp {
            is_adjusted_to_u_t_c: true,
            unit: ParquetTimeUnit::MICROS(Default::default()),
        }),
        ConvertedType::INT_32 => Some(ParquetLogicalType::Integer {
            bit_width: 32,
            is_signed: true,
        }),
        ConvertedType::INT_64 => Some(ParquetLogicalType::Integer {
            bit_width: 64,
            is_signed: true,
        }),
        ConvertedType::INT_8 => Some(ParquetLogicalType::Integer {
            bit_width: 8,
            is_signed: true,
        }),
        ConvertedType::INT_16 => Some(ParquetLogicalType::Integer {
            bit_width: 16,
            is_signed: true,
        }),
        ConvertedType::UINT_8 => Some(ParquetLogicalType::Integer {
            bit_width: 8,
            is_signed: false,
        }),
        ConvertedType::UINT_16 => Some(ParquetLogicalType::Integer {
            bit_width: 16,
            is_signed: false,
        }),
        ConvertedType::UINT_32 => Some(ParquetLogicalType::Integer {
            bit_width: 32,
            is_signed: false,
        }),
        ConvertedType::UINT_64 => Some(ParquetLogicalType::Integer {
            bit_width: 64,
            is_signed: false,
        }),
        _ => None,
    }
}
