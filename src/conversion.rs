//! Conversion between model instances and backend frames.
//!
//! Serialization is all-or-nothing: every field of every instance is coerced
//! first and all failures are reported together. Deserialization is lazy and
//! per row: a row that breaks the schema yields an error and the iterator
//! moves on to the next one.

use std::marker::PhantomData;

use crate::backend::{Backend, RowIter};
use crate::config::CoercionConfig;
use crate::error::{BridgeError, ConversionFailure, ConversionFailures, Result};
use crate::mapping::{coerce, ensure_supported};
use crate::schema::{Model, Schema};
use crate::value::{Record, Row, Value};

/// Build a frame from model instances
///
/// # Arguments
///
/// * `instances` - Instances in output row order
/// * `schema` - Schema extracted from the model
/// * `backend` - Backend producing the frame
/// * `config` - Coercion settings
///
/// # Returns
///
/// * `Result<B::Frame>` - The frame, or a `Conversion` error listing every
///   row and field that could not be coerced
pub fn serialize<M: Model, B: Backend>(
    instances: &[M],
    schema: &Schema,
    backend: &B,
    config: &CoercionConfig,
) -> Result<B::Frame> {
    ensure_supported(schema, backend)?;

    let mut rows: Vec<Row> = Vec::with_capacity(instances.len());
    let mut failures = Vec::new();

    for (row, instance) in instances.iter().enumerate() {
        let mut values = Vec::with_capacity(schema.len());
        for field in schema {
            let Some(value) = instance.field_value(&field.name) else {
                failures.push(ConversionFailure {
                    row,
                    field: field.name.clone(),
                    reason: "model has no such field".to_string(),
                });
                continue;
            };
            match coerce(value, field, config) {
                Ok(value) => values.push(value),
                Err(err) => failures.push(ConversionFailure {
                    row,
                    field: err.path,
                    reason: err.reason,
                }),
            }
        }
        rows.push(values);
    }

    if !failures.is_empty() {
        log::debug!(
            "Serialization to {} aborted with {} failure(s)",
            B::BACKEND,
            failures.len()
        );
        return Err(BridgeError::Conversion(ConversionFailures(failures)));
    }

    let frame = backend.rows_to_frame(&rows, schema)?;
    log::info!("Serialized {} instances to a {} frame", rows.len(), B::BACKEND);
    Ok(frame)
}

/// Read model instances from a frame
///
/// Fails up front only when the schema does not map onto the backend or the
/// frame cannot be opened; everything else is reported per row by [`Rows`].
pub fn deserialize<'f, M: Model, B: Backend>(
    frame: &'f B::Frame,
    schema: &Schema,
    backend: &B,
    config: &CoercionConfig,
) -> Result<Rows<'f, M>> {
    ensure_supported(schema, backend)?;
    let inner = backend.frame_to_rows(frame, schema)?;
    log::debug!("Reading {} fields from a {} frame", schema.len(), B::BACKEND);
    Ok(Rows {
        inner,
        schema: schema.clone(),
        config: config.clone(),
        row: 0,
        _model: PhantomData,
    })
}

/// Lazy sequence of model instances read from a frame, in frame order
///
/// Each item is the instance built from one row, or a
/// [`BridgeError::ConstraintViolation`] naming the row and field that could not
/// be read. Iteration continues past failed rows.
pub struct Rows<'f, M> {
    inner: RowIter<'f>,
    schema: Schema,
    config: CoercionConfig,
    row: usize,
    _model: PhantomData<fn() -> M>,
}

impl<M> std::fmt::Debug for Rows<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("schema", &self.schema)
            .field("row", &self.row)
            .finish_non_exhaustive()
    }
}

impl<M: Model> Rows<'_, M> {
    /// Index of the next row to be read
    #[must_use]
    pub const fn position(&self) -> usize {
        self.row
    }

    fn build(&self, row: usize, values: Row) -> Result<M> {
        let mut record = Record::new();
        for (field, value) in self.schema.iter().zip(values) {
            let value: Value = coerce(value, field, &self.config).map_err(|err| {
                BridgeError::ConstraintViolation {
                    row,
                    field: err.path,
                    reason: err.reason,
                }
            })?;
            record.insert(field.name.clone(), value);
        }

        M::from_record(record).map_err(|err| BridgeError::ConstraintViolation {
            row,
            field: err.field_path().unwrap_or_else(|| "*".to_string()),
            reason: err.root_cause().to_string(),
        })
    }
}

impl<M: Model> Iterator for Rows<'_, M> {
    type Item = Result<M>;

    fn next(&mut self) -> Option<Self::Item> {
        let values = self.inner.next()?;
        let row = self.row;
        self.row += 1;
        Some(values.and_then(|values| self.build(row, values)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JsonBackend;
    use crate::error::ValueError;
    use crate::schema::{DeclaredField, ModelDefinition, extract};

    #[derive(Debug, PartialEq)]
    struct Person {
        id: i64,
        name: Option<String>,
    }

    impl Model for Person {
        fn definition() -> ModelDefinition {
            ModelDefinition::for_type::<Self>("Person")
                .field(DeclaredField::of::<i64>("id"))
                .field(DeclaredField::of::<Option<String>>("name"))
        }

        fn field_value(&self, name: &str) -> Option<Value> {
            use crate::schema::FieldValue;
            match name {
                "id" => Some(self.id.to_value()),
                "name" => Some(self.name.to_value()),
                _ => None,
            }
        }

        fn from_record(mut record: Record) -> std::result::Result<Self, ValueError> {
            use crate::schema::FieldValue;
            Ok(Self {
                id: i64::from_value(record.take("id")).map_err(|e| e.in_field("id"))?,
                name: FieldValue::from_value(record.take("name")).map_err(|e| e.in_field("name"))?,
            })
        }
    }

    #[test]
    fn test_serialize_then_deserialize() {
        let schema = extract(&Person::definition()).unwrap();
        let people = vec![
            Person { id: 1, name: Some("a".into()) },
            Person { id: 2, name: None },
        ];
        let frame = serialize(&people, &schema, &JsonBackend, &CoercionConfig::default()).unwrap();
        let back: Vec<Person> = deserialize(&frame, &schema, &JsonBackend, &CoercionConfig::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(back, people);
    }

    #[test]
    fn test_violations_do_not_stop_iteration() {
        let schema = extract(&Person::definition()).unwrap();
        let frame = crate::backend::json::parse_json_lines(
            r#"
            {"id": 1, "name": "a"}
            {"id": null, "name": "b"}
            {"id": "x"}
            {"id": 4}
            "#,
        )
        .unwrap();
        let mut rows = deserialize::<Person, _>(&frame, &schema, &JsonBackend, &CoercionConfig::default())
            .unwrap();

        assert_eq!(rows.next().unwrap().unwrap().id, 1);
        assert!(matches!(
            rows.next().unwrap(),
            Err(BridgeError::ConstraintViolation { row: 1, ref field, .. }) if field == "id"
        ));
        assert!(matches!(
            rows.next().unwrap(),
            Err(BridgeError::ConstraintViolation { row: 2, .. })
        ));
        assert_eq!(rows.position(), 3);
        assert_eq!(rows.next().unwrap().unwrap(), Person { id: 4, name: None });
        assert!(rows.next().is_none());
    }
}
