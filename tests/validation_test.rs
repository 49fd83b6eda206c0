mod utils;

use std::sync::Arc;
use arrow::array::Array;

use arrow::array::{
    ArrayRef, Float64Array, Int32Array, Int64Array, ListBuilder, StringArray, StringBuilder,
    StructArray,
};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use schema_bridge::backend::json::parse_json_lines;
use schema_bridge::validation::{self, check_all};
use schema_bridge::{
    ArrowBackend, Expected, JsonBackend, LogicalType, Model, Observed, ParquetBackend, Severity,
    ValidationReport, extract_schema, from_frame, to_frame, validate,
};

use crate::utils::{Order, OrderText, Person, Point, init_logging, orders, people};

#[derive(Debug, Clone, PartialEq, Model)]
struct LoosePerson {
    id: Option<i64>,
    name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Model)]
struct Shipment {
    id: i64,
    location: Point,
    tags: Vec<String>,
}

fn person_batch(ids: Vec<Option<i64>>, names: Vec<Option<&str>>) -> RecordBatch {
    RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ])),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(names)),
        ],
    )
    .unwrap()
}

/// A conforming frame yields no mismatches on every backend
#[test]
fn test_conforming_frames() -> anyhow::Result<()> {
    init_logging();

    let batch = person_batch(vec![Some(1), Some(2)], vec![Some("a"), None]);
    assert!(validate::<Person, _>(&batch, &ArrowBackend)?.is_empty());

    let parquet = to_frame(&people(), &ParquetBackend::default())?;
    assert!(validate::<Person, _>(&parquet, &ParquetBackend::default())?.is_empty());

    let json = parse_json_lines("{\"id\": 1, \"name\": \"a\"}\n{\"id\": 2, \"name\": null}")?;
    assert!(validate::<Person, _>(&json, &JsonBackend)?.is_empty());
    Ok(())
}

/// A null in a non-nullable column is a single error on that column
#[test]
fn test_null_in_required_column() -> anyhow::Result<()> {
    init_logging();

    let batch = person_batch(vec![None], vec![Some("a")]);
    let arrow = validate::<Person, _>(&batch, &ArrowBackend)?;

    let loose = vec![LoosePerson {
        id: None,
        name: Some("a".to_string()),
    }];
    let parquet_frame = to_frame(&loose, &ParquetBackend::default())?;
    let parquet = validate::<Person, _>(&parquet_frame, &ParquetBackend::default())?;

    let json_frame = parse_json_lines("{\"id\": null, \"name\": \"a\"}")?;
    let json = validate::<Person, _>(&json_frame, &JsonBackend)?;

    for mismatches in [arrow, parquet, json] {
        assert_eq!(mismatches.len(), 1, "{mismatches:?}");
        assert_eq!(mismatches[0].field, "id");
        assert_eq!(mismatches[0].expected, Expected::Nullable(false));
        assert_eq!(mismatches[0].observed, Observed::Nullable(true));
        assert_eq!(mismatches[0].severity, Severity::Error);
    }
    Ok(())
}

/// Every declared field is checked even after the first finding
#[test]
fn test_missing_column_is_absent() -> anyhow::Result<()> {
    let batch = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![Field::new("name", DataType::Utf8, true)])),
        vec![Arc::new(StringArray::from(vec![Some("a")]))],
    )?;
    let mismatches = validate::<Person, _>(&batch, &ArrowBackend)?;
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].field, "id");
    assert_eq!(mismatches[0].observed, Observed::Absent);
    assert_eq!(mismatches[0].expected, Expected::Type(LogicalType::Int64));
    Ok(())
}

/// Representation differences that read back losslessly are warnings
#[test]
fn test_compatible_representations_warn() -> anyhow::Result<()> {
    init_logging();

    let as_text: Vec<OrderText> = orders()
        .into_iter()
        .map(|order| OrderText {
            id: order.id,
            amount: order.amount,
            placed_at: order.placed_at,
            status: "Active".to_string(),
            location: order.location,
            tags: order.tags,
        })
        .collect();
    let batch = to_frame(&as_text, &ArrowBackend)?;

    let report = ValidationReport::from(validate::<Order, _>(&batch, &ArrowBackend)?);
    assert!(report.is_valid(), "{report}");
    assert_eq!(report.warnings().count(), 1);
    assert_eq!(report.fields(), ["status"]);

    let widened = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("name", DataType::Utf8, true),
        ])),
        vec![
            Arc::new(Int32Array::from(vec![1])),
            Arc::new(StringArray::from(vec![Some("a")])),
        ],
    )?;
    let mismatches = validate::<Person, _>(&widened, &ArrowBackend)?;
    assert_eq!(mismatches[0].severity, Severity::Warning);
    assert_eq!(mismatches[0].observed, Observed::Type(LogicalType::Int32));
    Ok(())
}

/// Whole numbers in a float column warn, and the rows still read back
#[test]
fn test_json_whole_numbers_in_float_fields() -> anyhow::Result<()> {
    init_logging();

    let frame = parse_json_lines("{\"x\": 2, \"y\": 3.5}")?;
    let mismatches = validate::<Point, _>(&frame, &JsonBackend)?;
    assert_eq!(mismatches.len(), 1, "{mismatches:?}");
    assert_eq!(mismatches[0].field, "x");
    assert_eq!(mismatches[0].observed, Observed::Type(LogicalType::Int64));
    assert_eq!(mismatches[0].severity, Severity::Warning);

    let points = from_frame::<Point, _>(&frame, &JsonBackend)?.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(points, [Point { x: 2.0, y: 3.5 }]);
    Ok(())
}

/// Nested children declared nullable by another producer pass when they hold no nulls
#[test]
fn test_externally_built_nested_batch() -> anyhow::Result<()> {
    init_logging();

    let location = StructArray::from(vec![
        (
            Arc::new(Field::new("x", DataType::Float64, true)),
            Arc::new(Float64Array::from(vec![1.0, 5.0])) as ArrayRef,
        ),
        (
            Arc::new(Field::new("y", DataType::Float64, true)),
            Arc::new(Float64Array::from(vec![2.0, 6.0])) as ArrayRef,
        ),
    ]);
    let mut tags = ListBuilder::new(StringBuilder::new());
    tags.values().append_value("fragile");
    tags.append(true);
    tags.append(true);
    let tags = tags.finish();

    let batch = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("location", location.data_type().clone(), true),
            Field::new("tags", tags.data_type().clone(), true),
        ])),
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(location),
            Arc::new(tags),
        ],
    )?;

    let mismatches = validate::<Shipment, _>(&batch, &ArrowBackend)?;
    assert!(mismatches.is_empty(), "{mismatches:?}");

    let shipments =
        from_frame::<Shipment, _>(&batch, &ArrowBackend)?.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(
        shipments,
        [
            Shipment {
                id: 1,
                location: Point { x: 1.0, y: 2.0 },
                tags: vec!["fragile".to_string()],
            },
            Shipment {
                id: 2,
                location: Point { x: 5.0, y: 6.0 },
                tags: vec![],
            },
        ]
    );
    Ok(())
}

/// Nested findings use dotted paths
#[test]
fn test_nested_mismatch_paths() -> anyhow::Result<()> {
    let frame = parse_json_lines(
        r#"{"id": 1.5, "location": {"x": "east", "y": 2.0}, "tags": ["a", null]}"#,
    )?;
    let schema = extract_schema::<Shipment>()?;
    let mismatches = validation::check(&JsonBackend, &frame, &schema)?;
    let fields: Vec<_> = mismatches
        .iter()
        .map(|m| (m.field.as_str(), m.severity))
        .collect();
    assert_eq!(
        fields,
        [
            ("id", Severity::Error),
            ("location.x", Severity::Error),
            ("tags.item", Severity::Error),
        ]
    );
    Ok(())
}

/// Frames are validated independently and in order
#[test]
fn test_check_all_in_parallel() -> anyhow::Result<()> {
    let frames = vec![
        person_batch(vec![Some(1)], vec![None]),
        person_batch(vec![None], vec![None]),
        person_batch(vec![Some(3), Some(4)], vec![Some("c"), Some("d")]),
    ];
    let schema = extract_schema::<Person>()?;
    let results = check_all(&ArrowBackend, &frames, &schema);
    let counts: Vec<usize> = results
        .into_iter()
        .map(|result| result.map(|mismatches| mismatches.len()))
        .collect::<Result<_, _>>()?;
    assert_eq!(counts, [0, 1, 0]);
    Ok(())
}

/// Reports serialize to JSON for emission
#[test]
fn test_report_to_json() -> anyhow::Result<()> {
    let batch = person_batch(vec![None], vec![None]);
    let report = ValidationReport::from(validate::<Person, _>(&batch, &ArrowBackend)?);
    let json = serde_json::to_string(&report)?;
    assert!(json.contains("\"field\":\"id\""), "{json}");
    assert!(!report.is_valid());
    Ok(())
}
