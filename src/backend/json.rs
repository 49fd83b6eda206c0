//! Row-oriented backend over JSON objects.
//!
//! A frame is a sequence of JSON objects, one per row. Column types and
//! nullability are inferred by scanning every record; a key missing from a
//! record counts as a null in that column.

use rustc_hash::FxHashMap;
use serde_json::{Map, Number, Value as JsonValue};

use crate::backend::{Backend, ObservedColumn, RowIter};
use crate::error::{BridgeError, ConversionFailure, ConversionFailures, Result};
use crate::mapping::ensure_supported;
use crate::mapping::json::{JsonType, infer_type, merge};
use crate::schema::{FieldDescriptor, LogicalType, Schema};
use crate::value::{Row, Value};

/// One JSON object per row
pub type JsonRecords = Vec<Map<String, JsonValue>>;

/// Parse newline-delimited JSON objects, skipping blank lines
pub fn parse_json_lines(input: &str) -> Result<JsonRecords> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(BridgeError::from))
        .collect()
}

/// Render records as newline-delimited JSON
pub fn to_json_lines(records: &JsonRecords) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Backend whose frames are [`JsonRecords`]
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBackend;

impl JsonBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

struct ColumnScan {
    name: String,
    native: JsonType,
    /// Records holding a non-null value for the column
    present: usize,
}

impl Backend for JsonBackend {
    type Frame = JsonRecords;

    fn observe(&self, frame: &JsonRecords) -> Result<Vec<ObservedColumn<JsonType>>> {
        let mut columns: Vec<ColumnScan> = Vec::new();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();

        for record in frame {
            for (name, value) in record {
                let slot = *index.entry(name.clone()).or_insert_with(|| {
                    columns.push(ColumnScan {
                        name: name.clone(),
                        native: JsonType::Null,
                        present: 0,
                    });
                    columns.len() - 1
                });
                let column = &mut columns[slot];
                if !value.is_null() {
                    column.present += 1;
                }
                let seen = std::mem::replace(&mut column.native, JsonType::Null);
                column.native = merge(seen, infer_type(value));
            }
        }

        Ok(columns
            .into_iter()
            .map(|column| {
                let native = (column.native != JsonType::Null).then_some(column.native);
                ObservedColumn::new(column.name, native, column.present < frame.len())
            })
            .collect())
    }

    fn rows_to_frame(&self, rows: &[Row], schema: &Schema) -> Result<JsonRecords> {
        ensure_supported(schema, self)?;
        let mut failures = Vec::new();
        let mut records = Vec::with_capacity(rows.len());

        for (row, values) in rows.iter().enumerate() {
            if values.len() != schema.len() {
                failures.push(ConversionFailure {
                    row,
                    field: "*".to_string(),
                    reason: format!("row has {} values for {} fields", values.len(), schema.len()),
                });
                continue;
            }
            let mut record = Map::new();
            for (field, value) in schema.iter().zip(values) {
                match encode(value, field) {
                    Ok(json) => {
                        record.insert(field.name.clone(), json);
                    }
                    Err((path, reason)) => failures.push(ConversionFailure {
                        row,
                        field: path,
                        reason,
                    }),
                }
            }
            records.push(record);
        }

        if failures.is_empty() {
            Ok(records)
        } else {
            Err(BridgeError::Conversion(ConversionFailures(failures)))
        }
    }

    fn frame_to_rows<'f>(&self, frame: &'f JsonRecords, schema: &Schema) -> Result<RowIter<'f>> {
        let names: Vec<String> = schema.iter().map(|field| field.name.clone()).collect();
        Ok(Box::new(frame.iter().map(move |record| {
            Ok(names
                .iter()
                .map(|name| record.get(name).map_or(Value::Null, decode))
                .collect())
        })))
    }
}

/// JSON form of a value; errors carry the dotted path within the field
fn encode(value: &Value, field: &FieldDescriptor) -> std::result::Result<JsonValue, (String, String)> {
    let fail = |reason: String| (field.name.clone(), reason);
    let nested = |(path, reason): (String, String)| (format!("{}.{path}", field.name), reason);

    if value.is_null() {
        return if field.nullable {
            Ok(JsonValue::Null)
        } else {
            Err(fail("null value for non-nullable field".to_string()))
        };
    }

    match (&field.logical_type, value) {
        (LogicalType::Boolean, Value::Boolean(v)) => Ok(JsonValue::Bool(*v)),
        (LogicalType::Int64, Value::Int64(v)) => Ok(JsonValue::from(*v)),
        (LogicalType::Float64, Value::Float64(v)) => Number::from_f64(*v)
            .map(JsonValue::Number)
            .ok_or_else(|| fail(format!("{v} is not representable in JSON"))),
        (LogicalType::Utf8, Value::Utf8(v)) => Ok(JsonValue::String(v.clone())),
        (LogicalType::Struct(children), Value::Struct(members)) => {
            let mut object = Map::new();
            for child in children {
                let member = members
                    .iter()
                    .find(|(name, _)| *name == child.name)
                    .map_or(&Value::Null, |(_, member)| member);
                object.insert(child.name.clone(), encode(member, child).map_err(nested)?);
            }
            Ok(JsonValue::Object(object))
        }
        (LogicalType::List(item), Value::List(items)) => items
            .iter()
            .map(|element| encode(element, item).map_err(nested))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        (logical, other) => Err(fail(format!("expected {logical}, found {}", other.kind()))),
    }
}

/// Native value of a JSON value
fn decode(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(v) => Value::Boolean(*v),
        JsonValue::Number(n) => {
            if let Some(v) = n.as_i64() {
                Value::Int64(v)
            } else if let Some(v) = n.as_u64() {
                Value::UInt64(v)
            } else {
                n.as_f64().map_or(Value::Null, Value::Float64)
            }
        }
        JsonValue::String(s) => Value::Utf8(s.clone()),
        JsonValue::Array(items) => Value::List(items.iter().map(decode).collect()),
        JsonValue::Object(map) => Value::Struct(
            map.iter()
                .map(|(name, member)| (name.clone(), decode(member)))
                .collect(),
        ),
    }
}
