//! Classification of how an observed logical type relates to a declared one.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::schema::{FieldDescriptor, LogicalType};

/// Types of data type compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeCompatibility {
    /// Types match exactly
    Exact,
    /// Observed values convert losslessly into the declared type
    Compatible,
    /// Types are incompatible
    Incompatible,
}

impl TypeCompatibility {
    /// Weaker of two classifications
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        self.max(other)
    }
}

/// Number of decimal digits needed for the largest magnitude of an integer type
const fn integer_digits(logical: &LogicalType) -> Option<i16> {
    match logical {
        LogicalType::Int8 | LogicalType::UInt8 => Some(3),
        LogicalType::Int16 | LogicalType::UInt16 => Some(5),
        LogicalType::Int32 | LogicalType::UInt32 => Some(10),
        LogicalType::Int64 => Some(19),
        LogicalType::UInt64 => Some(20),
        _ => None,
    }
}

/// Width in bits and signedness of an integer type
const fn integer_shape(logical: &LogicalType) -> Option<(u8, bool)> {
    match logical {
        LogicalType::Int8 => Some((8, true)),
        LogicalType::Int16 => Some((16, true)),
        LogicalType::Int32 => Some((32, true)),
        LogicalType::Int64 => Some((64, true)),
        LogicalType::UInt8 => Some((8, false)),
        LogicalType::UInt16 => Some((16, false)),
        LogicalType::UInt32 => Some((32, false)),
        LogicalType::UInt64 => Some((64, false)),
        _ => None,
    }
}

/// Check whether data observed as `from` can stand in for the declared `to`
#[must_use]
pub fn check_type_compatibility(from: &LogicalType, to: &LogicalType) -> TypeCompatibility {
    if from == to {
        return TypeCompatibility::Exact;
    }

    let widens = match (from, to) {
        (LogicalType::Struct(observed), LogicalType::Struct(declared)) => {
            return struct_compatibility(observed, declared);
        }
        (LogicalType::List(observed), LogicalType::List(declared)) => {
            let element = check_type_compatibility(&observed.logical_type, &declared.logical_type);
            if observed.nullable && !declared.nullable {
                return TypeCompatibility::Incompatible;
            }
            return element.and(TypeCompatibility::Compatible);
        }

        (f, t) if f.is_integer() && t.is_integer() => {
            match (integer_shape(f), integer_shape(t)) {
                (Some((from_bits, from_signed)), Some((to_bits, to_signed))) => {
                    if from_signed == to_signed {
                        from_bits < to_bits
                    } else {
                        // Unsigned fits a strictly wider signed type
                        !from_signed && from_bits < to_bits
                    }
                }
                _ => false,
            }
        }

        // Integers with at most 24 significant bits are exact in f32, 53 in f64
        (
            LogicalType::Int8 | LogicalType::Int16 | LogicalType::UInt8 | LogicalType::UInt16,
            LogicalType::Float32,
        )
        | (
            LogicalType::Int8
            | LogicalType::Int16
            | LogicalType::Int32
            | LogicalType::UInt8
            | LogicalType::UInt16
            | LogicalType::UInt32,
            LogicalType::Float64,
        )
        | (LogicalType::Float32, LogicalType::Float64) => true,

        (LogicalType::Time(from_unit), LogicalType::Time(to_unit))
        | (LogicalType::Timestamp(from_unit), LogicalType::Timestamp(to_unit)) => {
            from_unit.cmp(to_unit) == Ordering::Less
        }
        (LogicalType::Date, LogicalType::Timestamp(_)) => true,

        (
            LogicalType::Decimal {
                precision: p1,
                scale: s1,
            },
            LogicalType::Decimal {
                precision: p2,
                scale: s2,
            },
        ) => {
            let integer_digits_from = i16::from(*p1) - i16::from(*s1);
            let integer_digits_to = i16::from(*p2) - i16::from(*s2);
            s2 >= s1 && integer_digits_to >= integer_digits_from
        }
        (f, LogicalType::Decimal { precision, scale }) if f.is_integer() => integer_digits(f)
            .is_some_and(|digits| digits <= i16::from(*precision) - i16::from(*scale)),

        // Categorical and plain string representations of the same values
        (LogicalType::Enum, LogicalType::Utf8) | (LogicalType::Utf8, LogicalType::Enum) => true,

        _ => false,
    };

    if widens {
        TypeCompatibility::Compatible
    } else {
        TypeCompatibility::Incompatible
    }
}

/// Structs are compared member by member, by name
fn struct_compatibility(observed: &[FieldDescriptor], declared: &[FieldDescriptor]) -> TypeCompatibility {
    let mut result = TypeCompatibility::Compatible;
    for field in declared {
        let Some(found) = observed.iter().find(|candidate| candidate.name == field.name) else {
            return TypeCompatibility::Incompatible;
        };
        if found.nullable && !field.nullable {
            return TypeCompatibility::Incompatible;
        }
        result = result.and(check_type_compatibility(&found.logical_type, &field.logical_type));
        if result == TypeCompatibility::Incompatible {
            break;
        }
    }
    result
}

/// Identifies whether a logical type is numeric
#[must_use]
pub const fn is_numeric(logical: &LogicalType) -> bool {
    logical.is_integer() || logical.is_float() || matches!(logical, LogicalType::Decimal { .. })
}

/// Identifies whether a logical type is a date, time or timestamp
#[must_use]
pub const fn is_temporal(logical: &LogicalType) -> bool {
    matches!(
        logical,
        LogicalType::Date | LogicalType::Time(_) | LogicalType::Timestamp(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TimeUnit;

    use TypeCompatibility::{Compatible, Exact, Incompatible};

    #[test]
    fn test_integer_widening() {
        assert_eq!(check_type_compatibility(&LogicalType::Int32, &LogicalType::Int32), Exact);
        assert_eq!(check_type_compatibility(&LogicalType::Int8, &LogicalType::Int64), Compatible);
        assert_eq!(check_type_compatibility(&LogicalType::UInt32, &LogicalType::Int64), Compatible);
        assert_eq!(check_type_compatibility(&LogicalType::UInt32, &LogicalType::Int32), Incompatible);
        assert_eq!(check_type_compatibility(&LogicalType::Int64, &LogicalType::Int32), Incompatible);
        assert_eq!(check_type_compatibility(&LogicalType::Int8, &LogicalType::UInt64), Incompatible);
    }

    #[test]
    fn test_integer_to_float() {
        assert_eq!(check_type_compatibility(&LogicalType::Int16, &LogicalType::Float32), Compatible);
        assert_eq!(check_type_compatibility(&LogicalType::Int32, &LogicalType::Float32), Incompatible);
        assert_eq!(check_type_compatibility(&LogicalType::Int32, &LogicalType::Float64), Compatible);
        assert_eq!(check_type_compatibility(&LogicalType::Int64, &LogicalType::Float64), Incompatible);
        assert_eq!(check_type_compatibility(&LogicalType::Float64, &LogicalType::Float32), Incompatible);
    }

    #[test]
    fn test_temporal_precision() {
        let ms = LogicalType::Timestamp(TimeUnit::Millisecond);
        let ns = LogicalType::Timestamp(TimeUnit::Nanosecond);
        assert_eq!(check_type_compatibility(&ms, &ns), Compatible);
        assert_eq!(check_type_compatibility(&ns, &ms), Incompatible);
        assert_eq!(check_type_compatibility(&LogicalType::Date, &ms), Compatible);
        assert_eq!(check_type_compatibility(&ms, &LogicalType::Date), Incompatible);
    }

    #[test]
    fn test_decimal_widening() {
        let narrow = LogicalType::Decimal { precision: 10, scale: 2 };
        let wide = LogicalType::Decimal { precision: 12, scale: 3 };
        let less_scale = LogicalType::Decimal { precision: 20, scale: 1 };
        assert_eq!(check_type_compatibility(&narrow, &wide), Compatible);
        assert_eq!(check_type_compatibility(&wide, &narrow), Incompatible);
        assert_eq!(check_type_compatibility(&narrow, &less_scale), Incompatible);
        assert_eq!(
            check_type_compatibility(&LogicalType::Int32, &LogicalType::Decimal { precision: 12, scale: 2 }),
            Compatible
        );
        assert_eq!(
            check_type_compatibility(&LogicalType::Int64, &LogicalType::Decimal { precision: 18, scale: 0 }),
            Incompatible
        );
    }

    #[test]
    fn test_enum_and_string() {
        assert_eq!(check_type_compatibility(&LogicalType::Utf8, &LogicalType::Enum), Compatible);
        assert_eq!(check_type_compatibility(&LogicalType::Enum, &LogicalType::Utf8), Compatible);
    }

    #[test]
    fn test_nested_types() {
        let declared = LogicalType::Struct(vec![
            FieldDescriptor::new("a", LogicalType::Int64, false),
            FieldDescriptor::new("b", LogicalType::Utf8, true),
        ]);
        let widened = LogicalType::Struct(vec![
            FieldDescriptor::new("b", LogicalType::Utf8, true),
            FieldDescriptor::new("a", LogicalType::Int32, false),
        ]);
        let missing = LogicalType::Struct(vec![FieldDescriptor::new("a", LogicalType::Int64, false)]);
        assert_eq!(check_type_compatibility(&widened, &declared), Compatible);
        assert_eq!(check_type_compatibility(&missing, &declared), Incompatible);

        assert_eq!(
            check_type_compatibility(
                &LogicalType::list(LogicalType::Int32, false),
                &LogicalType::list(LogicalType::Int64, true)
            ),
            Compatible
        );
        assert_eq!(
            check_type_compatibility(
                &LogicalType::list(LogicalType::Int32, true),
                &LogicalType::list(LogicalType::Int32, false)
            ),
            Incompatible
        );
    }

    #[test]
    fn test_categories() {
        assert!(is_numeric(&LogicalType::Decimal { precision: 5, scale: 1 }));
        assert!(!is_numeric(&LogicalType::Utf8));
        assert!(is_temporal(&LogicalType::Time(TimeUnit::Second)));
        assert!(!is_temporal(&LogicalType::Int64));
    }
}
