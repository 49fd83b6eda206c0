//! Logical type mapping for JSON records.
//!
//! JSON carries types per value rather than per column, so the native token is
//! inferred by scanning values and merging what was seen. Only types JSON can
//! represent without an out-of-band convention are supported: booleans, 64-bit
//! integers, 64-bit floats, strings, objects and arrays.

use serde_json::Value as JsonValue;

use crate::backend::JsonBackend;
use crate::error::{BridgeError, Result};
use crate::mapping::{TypeCompatibility, TypeMapping, check_type_compatibility};
use crate::schema::{FieldDescriptor, LIST_ITEM_NAME, LogicalType};

const BACKEND: &str = "json";

/// Native JSON type of a column or member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonType {
    /// Only nulls were seen
    Null,
    Boolean,
    /// Numbers without a fractional part
    Integer,
    Number,
    String,
    Object(Vec<JsonField>),
    Array(Box<JsonField>),
    /// Values of conflicting kinds were seen
    Mixed,
}

/// A named JSON type with observed nullability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonField {
    pub name: String,
    pub json_type: JsonType,
    pub nullable: bool,
}

impl JsonField {
    #[must_use]
    pub fn new(name: impl Into<String>, json_type: JsonType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            json_type,
            nullable,
        }
    }
}

impl TypeMapping for JsonBackend {
    type Native = JsonType;

    const BACKEND: &'static str = BACKEND;

    fn to_native(&self, logical: &LogicalType) -> Result<JsonType> {
        json_type(logical)
    }

    fn from_native(&self, native: &JsonType) -> Result<LogicalType> {
        logical_type(native)
    }

    fn describe_native(&self, native: &JsonType) -> String {
        describe(native)
    }

    /// Whole numbers are written without a fraction, so a float column whose
    /// values all happen to be whole reads as `integer`
    fn compatibility(&self, observed: &LogicalType, declared: &LogicalType) -> TypeCompatibility {
        match (observed, declared) {
            (LogicalType::Int64, LogicalType::Float64) => TypeCompatibility::Compatible,
            _ => check_type_compatibility(observed, declared),
        }
    }
}

/// Native JSON type of a logical type
pub fn json_type(logical: &LogicalType) -> Result<JsonType> {
    let native = match logical {
        LogicalType::Boolean => JsonType::Boolean,
        LogicalType::Int64 => JsonType::Integer,
        LogicalType::Float64 => JsonType::Number,
        LogicalType::Utf8 => JsonType::String,
        LogicalType::Struct(children) => JsonType::Object(
            children
                .iter()
                .map(|child| {
                    Ok(JsonField::new(
                        &child.name,
                        json_type(&child.logical_type)?,
                        child.nullable,
                    ))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        LogicalType::List(item) => JsonType::Array(Box::new(JsonField::new(
            LIST_ITEM_NAME,
            json_type(&item.logical_type)?,
            item.nullable,
        ))),
        other => return Err(BridgeError::unsupported(BACKEND, other)),
    };
    Ok(native)
}

/// Logical type of a native JSON type
pub fn logical_type(native: &JsonType) -> Result<LogicalType> {
    let logical = match native {
        JsonType::Boolean => LogicalType::Boolean,
        JsonType::Integer => LogicalType::Int64,
        JsonType::Number => LogicalType::Float64,
        JsonType::String => LogicalType::Utf8,
        JsonType::Object(members) => LogicalType::Struct(
            members
                .iter()
                .map(|member| {
                    Ok(FieldDescriptor::new(
                        &member.name,
                        logical_type(&member.json_type)?,
                        member.nullable,
                    ))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        JsonType::Array(item) => {
            LogicalType::list(logical_type(&item.json_type)?, item.nullable)
        }
        JsonType::Null | JsonType::Mixed => {
            return Err(BridgeError::unsupported(BACKEND, describe(native)));
        }
    };
    Ok(logical)
}

/// Short type notation for reports, e.g. `object{a: integer, b: string?}`
#[must_use]
pub fn describe(native: &JsonType) -> String {
    match native {
        JsonType::Null => "null".to_string(),
        JsonType::Boolean => "boolean".to_string(),
        JsonType::Integer => "integer".to_string(),
        JsonType::Number => "number".to_string(),
        JsonType::String => "string".to_string(),
        JsonType::Mixed => "mixed".to_string(),
        JsonType::Object(members) => {
            let members: Vec<_> = members
                .iter()
                .map(|member| {
                    format!(
                        "{}: {}{}",
                        member.name,
                        describe(&member.json_type),
                        if member.nullable { "?" } else { "" }
                    )
                })
                .collect();
            format!("object{{{}}}", members.join(", "))
        }
        JsonType::Array(item) => format!(
            "array<{}{}>",
            describe(&item.json_type),
            if item.nullable { "?" } else { "" }
        ),
    }
}

/// Native type of a single JSON value
#[must_use]
pub fn infer_type(value: &JsonValue) -> JsonType {
    match value {
        JsonValue::Null => JsonType::Null,
        JsonValue::Bool(_) => JsonType::Boolean,
        JsonValue::Number(n) if n.is_f64() => JsonType::Number,
        JsonValue::Number(_) => JsonType::Integer,
        JsonValue::String(_) => JsonType::String,
        JsonValue::Array(items) => {
            let mut element = JsonType::Null;
            let mut nullable = false;
            for item in items {
                nullable |= item.is_null();
                element = merge(element, infer_type(item));
            }
            JsonType::Array(Box::new(JsonField::new(LIST_ITEM_NAME, element, nullable)))
        }
        JsonValue::Object(map) => JsonType::Object(
            map.iter()
                .map(|(name, member)| JsonField::new(name, infer_type(member), member.is_null()))
                .collect(),
        ),
    }
}

/// Least general type covering both observations
#[must_use]
pub fn merge(left: JsonType, right: JsonType) -> JsonType {
    match (left, right) {
        (JsonType::Null, other) | (other, JsonType::Null) => other,
        (JsonType::Integer, JsonType::Number) | (JsonType::Number, JsonType::Integer) => {
            JsonType::Number
        }
        (JsonType::Object(left), JsonType::Object(right)) => {
            JsonType::Object(merge_members(left, right))
        }
        (JsonType::Array(left), JsonType::Array(right)) => JsonType::Array(Box::new(JsonField::new(
            LIST_ITEM_NAME,
            merge(left.json_type, right.json_type),
            left.nullable || right.nullable,
        ))),
        (left, right) if left == right => left,
        _ => JsonType::Mixed,
    }
}

/// Union of object members; a member missing on one side becomes nullable
fn merge_members(left: Vec<JsonField>, mut right: Vec<JsonField>) -> Vec<JsonField> {
    let mut merged = Vec::with_capacity(left.len().max(right.len()));
    for member in left {
        match right.iter().position(|other| other.name == member.name) {
            Some(index) => {
                let other = right.remove(index);
                merged.push(JsonField::new(
                    member.name,
                    merge(member.json_type, other.json_type),
                    member.nullable || other.nullable,
                ));
            }
            None => merged.push(JsonField {
                nullable: true,
                ..member
            }),
        }
    }
    merged.extend(right.into_iter().map(|member| JsonField {
        nullable: true,
        ..member
    }));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_every_supported_type() {
        let backend = JsonBackend::default();
        let types = [
            LogicalType::Boolean,
            LogicalType::Int64,
            LogicalType::Float64,
            LogicalType::Utf8,
            LogicalType::list(LogicalType::Utf8, true),
            LogicalType::Struct(vec![
                FieldDescriptor::new("a", LogicalType::Int64, false),
                FieldDescriptor::new("b", LogicalType::list(LogicalType::Boolean, false), true),
            ]),
        ];
        for logical in types {
            let native = backend.to_native(&logical).unwrap();
            assert_eq!(backend.from_native(&native).unwrap(), logical);
        }
    }

    #[test]
    fn test_unsupported_types() {
        for logical in [
            LogicalType::Int32,
            LogicalType::Date,
            LogicalType::Enum,
            LogicalType::Decimal { precision: 10, scale: 2 },
        ] {
            assert!(matches!(
                json_type(&logical),
                Err(BridgeError::UnsupportedType { backend: "json", .. })
            ));
        }
        assert!(logical_type(&JsonType::Mixed).is_err());
    }

    #[test]
    fn test_whole_numbers_stand_in_for_floats() {
        let backend = JsonBackend::default();
        assert_eq!(
            backend.compatibility(&LogicalType::Int64, &LogicalType::Float64),
            TypeCompatibility::Compatible
        );
        assert_eq!(
            backend.compatibility(&LogicalType::Float64, &LogicalType::Int64),
            TypeCompatibility::Incompatible
        );
        assert_eq!(
            backend.compatibility(&LogicalType::Utf8, &LogicalType::Utf8),
            TypeCompatibility::Exact
        );
    }

    #[test]
    fn test_inference_and_merge() {
        let first = infer_type(&json!({"id": 1, "score": 2, "tags": ["a", null]}));
        let second = infer_type(&json!({"id": 2, "score": 2.5, "extra": true}));
        let merged = merge(first, second);

        let JsonType::Object(members) = &merged else {
            panic!("expected object, got {merged:?}");
        };
        assert_eq!(members[0], JsonField::new("id", JsonType::Integer, false));
        assert_eq!(members[1], JsonField::new("score", JsonType::Number, false));
        assert_eq!(
            members[2],
            JsonField::new(
                "tags",
                JsonType::Array(Box::new(JsonField::new("item", JsonType::String, true))),
                true
            )
        );
        assert_eq!(members[3], JsonField::new("extra", JsonType::Boolean, true));

        assert_eq!(merge(JsonType::String, JsonType::Integer), JsonType::Mixed);
        assert_eq!(describe(&merged), "object{id: integer, score: number, tags: array<string?>?, extra: boolean?}");
    }
}
