//! In-memory columnar backend over Arrow record batches.
//!
//! Rows are encoded with one typed builder per column and decoded cell by cell
//! from the batch's arrays, dispatching on each array's own data type. The
//! decoded value is the array's native value; bringing it to the declared type
//! is the conversion engine's job.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryBuilder, BooleanBuilder, GenericListArray, ListArray,
    OffsetSizeTrait, PrimitiveBuilder, StringBuilder, StringDictionaryBuilder, StructArray,
    new_null_array,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{
    ArrowDictionaryKeyType, ArrowNativeType, ArrowPrimitiveType, DataType, Date32Type, Date64Type,
    Decimal128Type, Field, FieldRef, Fields, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
    Time64NanosecondType, TimeUnit as ArrowTimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type,
    UInt32Type, UInt64Type,
};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};

use crate::backend::{Backend, ObservedColumn, RowIter};
use crate::error::{BridgeError, ConversionFailure, ConversionFailures, Result};
use crate::mapping::arrow::{arrow_field, arrow_schema, arrow_type};
use crate::mapping::coerce::{decimal_digits, nanos_per_tick};
use crate::mapping::ensure_supported;
use crate::schema::{FieldDescriptor, LIST_ITEM_NAME, LogicalType, Schema, TimeUnit};
use crate::value::{Row, Value};

/// Days from 0001-01-01 to 1970-01-01
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

static NULL: Value = Value::Null;

/// Backend whose frames are Arrow [`RecordBatch`]es
///
/// Nullability is taken from the data: a column is nullable when it holds at
/// least one null, and a nested child when it holds a null under a valid
/// parent slot. Declared field flags are not consulted.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrowBackend;

impl ArrowBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Backend for ArrowBackend {
    type Frame = RecordBatch;

    fn observe(&self, frame: &RecordBatch) -> Result<Vec<ObservedColumn<DataType>>> {
        Ok(frame
            .schema()
            .fields()
            .iter()
            .zip(frame.columns())
            .map(|(field, column)| {
                ObservedColumn::new(
                    field.name(),
                    Some(observed_type(column.as_ref(), None)),
                    column.null_count() > 0,
                )
            })
            .collect())
    }

    fn rows_to_frame(&self, rows: &[Row], schema: &Schema) -> Result<RecordBatch> {
        ensure_supported(schema, self)?;
        build_batch(rows, schema)
    }

    fn frame_to_rows<'f>(&self, frame: &'f RecordBatch, schema: &Schema) -> Result<RowIter<'f>> {
        Ok(Box::new(BatchRows::new(frame, schema)))
    }
}

/// Data type of `array` with nested nullability flags derived from its data
///
/// `valid` masks the slots whose parents are present; nulls under a null
/// parent do not make a child nullable.
fn observed_type(array: &dyn Array, valid: Option<&NullBuffer>) -> DataType {
    match array.data_type() {
        DataType::Struct(_) => {
            let Some(parent) = array.as_struct_opt() else {
                return array.data_type().clone();
            };
            let valid = NullBuffer::union(valid, parent.nulls());
            let children: Fields = parent
                .fields()
                .iter()
                .zip(parent.columns())
                .map(|(field, child)| observed_field(field, child.as_ref(), valid.as_ref()))
                .collect();
            DataType::Struct(children)
        }
        DataType::List(item) => match array.as_list_opt::<i32>() {
            Some(list) => DataType::List(observed_item(item, list, valid)),
            None => array.data_type().clone(),
        },
        DataType::LargeList(item) => match array.as_list_opt::<i64>() {
            Some(list) => DataType::LargeList(observed_item(item, list, valid)),
            None => array.data_type().clone(),
        },
        other => other.clone(),
    }
}

fn observed_field(field: &Field, array: &dyn Array, valid: Option<&NullBuffer>) -> FieldRef {
    Arc::new(
        Field::new(
            field.name(),
            observed_type(array, valid),
            has_visible_null(array, valid),
        )
        .with_metadata(field.metadata().clone()),
    )
}

/// Item field of a list, masking the items of null or masked list slots
fn observed_item<O: OffsetSizeTrait>(
    item: &Field,
    list: &GenericListArray<O>,
    valid: Option<&NullBuffer>,
) -> FieldRef {
    let slots = NullBuffer::union(valid, list.nulls());
    let values = list.values();
    let mut items = vec![false; values.len()];
    for (slot, window) in list.offsets().windows(2).enumerate() {
        if slots.as_ref().is_none_or(|slots| slots.is_valid(slot)) {
            items[window[0].as_usize()..window[1].as_usize()].fill(true);
        }
    }
    observed_field(item, values.as_ref(), Some(&NullBuffer::from(items)))
}

/// Whether `array` holds a null in a slot `valid` keeps
fn has_visible_null(array: &dyn Array, valid: Option<&NullBuffer>) -> bool {
    let Some(nulls) = array.logical_nulls() else {
        return false;
    };
    match valid {
        None => nulls.null_count() > 0,
        Some(valid) => nulls
            .iter()
            .zip(valid.iter())
            .any(|(present, parent)| parent && !present),
    }
}

/// Encode rows into a record batch laid out like `schema`
pub(crate) fn build_batch(rows: &[Row], schema: &Schema) -> Result<RecordBatch> {
    let target = Arc::new(arrow_schema(schema)?);
    let mut encoder = Encoder::default();

    for (row, values) in rows.iter().enumerate() {
        if values.len() != schema.len() {
            encoder.fail(
                row,
                "*",
                format!("row has {} values for {} fields", values.len(), schema.len()),
            );
        }
    }

    let mut columns = Vec::with_capacity(schema.len());
    for (index, field) in schema.iter().enumerate() {
        let cells: Vec<Cell<'_>> = rows
            .iter()
            .enumerate()
            .map(|(row, values)| Cell {
                row,
                value: Some(values.get(index).unwrap_or(&NULL)),
            })
            .collect();
        columns.push(encoder.build(field, &field.name, &cells)?);
    }

    if !encoder.failures.is_empty() {
        return Err(BridgeError::Conversion(ConversionFailures(encoder.failures)));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(target, columns, &options)?)
}

#[derive(Debug, Clone, Copy)]
struct Cell<'v> {
    row: usize,
    /// `None` when a null parent masks the slot
    value: Option<&'v Value>,
}

impl Cell<'_> {
    const fn masked(row: usize) -> Self {
        Self { row, value: None }
    }
}

fn join(path: &str, name: &str) -> String {
    format!("{path}.{name}")
}

fn expected(field: &FieldDescriptor, value: &Value) -> String {
    format!("expected {}, found {}", field.logical_type, value.kind())
}

#[derive(Debug, Default)]
struct Encoder {
    failures: Vec<ConversionFailure>,
}

impl Encoder {
    fn fail(&mut self, row: usize, path: &str, reason: impl Into<String>) {
        self.failures.push(ConversionFailure {
            row,
            field: path.to_string(),
            reason: reason.into(),
        });
    }

    /// The cell's value when it is present, recording nulls in non-nullable fields
    fn present<'v>(&mut self, cell: &Cell<'v>, field: &FieldDescriptor, path: &str) -> Option<&'v Value> {
        match cell.value {
            None => None,
            Some(Value::Null) => {
                if !field.nullable {
                    self.fail(cell.row, path, "null value for non-nullable field");
                }
                None
            }
            Some(value) => Some(value),
        }
    }

    fn primitive<T: ArrowPrimitiveType>(
        &mut self,
        field: &FieldDescriptor,
        path: &str,
        cells: &[Cell<'_>],
        mut builder: PrimitiveBuilder<T>,
        encode: impl Fn(&Value) -> std::result::Result<T::Native, String>,
    ) -> ArrayRef {
        for cell in cells {
            match self.present(cell, field, path).map(&encode) {
                Some(Ok(native)) => builder.append_value(native),
                Some(Err(reason)) => {
                    self.fail(cell.row, path, reason);
                    builder.append_null();
                }
                None => builder.append_null(),
            }
        }
        Arc::new(builder.finish())
    }

    fn build(&mut self, field: &FieldDescriptor, path: &str, cells: &[Cell<'_>]) -> Result<ArrayRef> {
        let n = cells.len();

        macro_rules! exact {
            ($variant:ident) => {
                |value: &Value| match value {
                    Value::$variant(v) => Ok(*v),
                    other => Err(expected(field, other)),
                }
            };
        }

        let array: ArrayRef = match &field.logical_type {
            LogicalType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(n);
                for cell in cells {
                    match self.present(cell, field, path) {
                        Some(Value::Boolean(v)) => builder.append_value(*v),
                        Some(other) => {
                            self.fail(cell.row, path, expected(field, other));
                            builder.append_null();
                        }
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            LogicalType::Int8 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<Int8Type>::with_capacity(n),
                exact!(Int8),
            ),
            LogicalType::Int16 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<Int16Type>::with_capacity(n),
                exact!(Int16),
            ),
            LogicalType::Int32 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<Int32Type>::with_capacity(n),
                exact!(Int32),
            ),
            LogicalType::Int64 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<Int64Type>::with_capacity(n),
                exact!(Int64),
            ),
            LogicalType::UInt8 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<UInt8Type>::with_capacity(n),
                exact!(UInt8),
            ),
            LogicalType::UInt16 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<UInt16Type>::with_capacity(n),
                exact!(UInt16),
            ),
            LogicalType::UInt32 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<UInt32Type>::with_capacity(n),
                exact!(UInt32),
            ),
            LogicalType::UInt64 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<UInt64Type>::with_capacity(n),
                exact!(UInt64),
            ),
            LogicalType::Float32 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<Float32Type>::with_capacity(n),
                exact!(Float32),
            ),
            LogicalType::Float64 => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<Float64Type>::with_capacity(n),
                exact!(Float64),
            ),
            LogicalType::Utf8 => {
                let mut builder = StringBuilder::with_capacity(n, n * 8);
                for cell in cells {
                    match self.present(cell, field, path) {
                        Some(Value::Utf8(v)) => builder.append_value(v),
                        Some(other) => {
                            self.fail(cell.row, path, expected(field, other));
                            builder.append_null();
                        }
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            LogicalType::Binary => {
                let mut builder = BinaryBuilder::with_capacity(n, n * 8);
                for cell in cells {
                    match self.present(cell, field, path) {
                        Some(Value::Binary(v)) => builder.append_value(v),
                        Some(other) => {
                            self.fail(cell.row, path, expected(field, other));
                            builder.append_null();
                        }
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            LogicalType::Date => self.primitive(
                field,
                path,
                cells,
                PrimitiveBuilder::<Date32Type>::with_capacity(n),
                |value| match value {
                    Value::Date(date) => Ok(date.num_days_from_ce() - EPOCH_DAYS_FROM_CE),
                    other => Err(expected(field, other)),
                },
            ),
            LogicalType::Time(unit) => {
                let unit = *unit;
                let ticks = move |value: &Value| match value {
                    Value::Time(time) => time_ticks(*time, unit),
                    other => Err(expected(field, other)),
                };
                let narrow = move |value: &Value| {
                    ticks(value).and_then(|t| i32::try_from(t).map_err(|e| e.to_string()))
                };
                match unit {
                    TimeUnit::Second => self.primitive(
                        field,
                        path,
                        cells,
                        PrimitiveBuilder::<Time32SecondType>::with_capacity(n),
                        narrow,
                    ),
                    TimeUnit::Millisecond => self.primitive(
                        field,
                        path,
                        cells,
                        PrimitiveBuilder::<Time32MillisecondType>::with_capacity(n),
                        narrow,
                    ),
                    TimeUnit::Microsecond => self.primitive(
                        field,
                        path,
                        cells,
                        PrimitiveBuilder::<Time64MicrosecondType>::with_capacity(n),
                        ticks,
                    ),
                    TimeUnit::Nanosecond => self.primitive(
                        field,
                        path,
                        cells,
                        PrimitiveBuilder::<Time64NanosecondType>::with_capacity(n),
                        ticks,
                    ),
                }
            }
            LogicalType::Timestamp(unit) => {
                let unit = *unit;
                let ticks = move |value: &Value| match value {
                    Value::Timestamp(datetime) => timestamp_ticks(*datetime, unit),
                    other => Err(expected(field, other)),
                };
                match unit {
                    TimeUnit::Second => self.primitive(
                        field,
                        path,
                        cells,
                        PrimitiveBuilder::<TimestampSecondType>::with_capacity(n),
                        ticks,
                    ),
                    TimeUnit::Millisecond => self.primitive(
                        field,
                        path,
                        cells,
                        PrimitiveBuilder::<TimestampMillisecondType>::with_capacity(n),
                        ticks,
                    ),
                    TimeUnit::Microsecond => self.primitive(
                        field,
                        path,
                        cells,
                        PrimitiveBuilder::<TimestampMicrosecondType>::with_capacity(n),
                        ticks,
                    ),
                    TimeUnit::Nanosecond => self.primitive(
                        field,
                        path,
                        cells,
                        PrimitiveBuilder::<TimestampNanosecondType>::with_capacity(n),
                        ticks,
                    ),
                }
            }
            LogicalType::Decimal { precision, scale } => {
                let (precision, scale) = (*precision, *scale);
                let builder = PrimitiveBuilder::<Decimal128Type>::with_capacity(n)
                    .with_precision_and_scale(precision, scale)?;
                self.primitive(field, path, cells, builder, |value| match value {
                    Value::Decimal { value, scale: s } if *s == scale => {
                        if decimal_digits(*value) > u32::from(precision) {
                            Err(format!("decimal {value}e-{s} exceeds precision {precision}"))
                        } else {
                            Ok(*value)
                        }
                    }
                    Value::Decimal { scale: s, .. } => {
                        Err(format!("decimal scale {s} does not match declared scale {scale}"))
                    }
                    other => Err(expected(field, other)),
                })
            }
            LogicalType::Enum => {
                let mut builder = StringDictionaryBuilder::<Int32Type>::new();
                for cell in cells {
                    match self.present(cell, field, path) {
                        Some(Value::Enum(v) | Value::Utf8(v)) => {
                            builder.append(v)?;
                        }
                        Some(other) => {
                            self.fail(cell.row, path, expected(field, other));
                            builder.append_null();
                        }
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            LogicalType::Struct(children) => self.build_struct(field, children, path, cells)?,
            LogicalType::List(item) => self.build_list(field, item, path, cells)?,
        };
        Ok(array)
    }

    fn build_struct(
        &mut self,
        field: &FieldDescriptor,
        children: &[FieldDescriptor],
        path: &str,
        cells: &[Cell<'_>],
    ) -> Result<ArrayRef> {
        let before = self.failures.len();
        let mut validity = Vec::with_capacity(cells.len());
        let mut child_cells: Vec<Vec<Cell<'_>>> = vec![Vec::with_capacity(cells.len()); children.len()];

        for cell in cells {
            match self.present(cell, field, path) {
                Some(Value::Struct(members)) => {
                    validity.push(true);
                    for (child, slot) in children.iter().zip(child_cells.iter_mut()) {
                        let member = members
                            .iter()
                            .find(|(name, _)| *name == child.name)
                            .map_or(&NULL, |(_, value)| value);
                        slot.push(Cell {
                            row: cell.row,
                            value: Some(member),
                        });
                    }
                }
                other => {
                    if let Some(other) = other {
                        self.fail(cell.row, path, expected(field, other));
                    }
                    validity.push(false);
                    for slot in &mut child_cells {
                        slot.push(Cell::masked(cell.row));
                    }
                }
            }
        }

        let arrays = children
            .iter()
            .zip(&child_cells)
            .map(|(child, slot)| self.build(child, &join(path, &child.name), slot))
            .collect::<Result<Vec<_>>>()?;

        if self.failures.len() > before {
            // Discarded by the caller; avoid tripping nested nullability checks
            return Ok(new_null_array(&arrow_type(&field.logical_type)?, cells.len()));
        }

        let fields = Fields::from(children.iter().map(arrow_field).collect::<Result<Vec<_>>>()?);
        let nulls = validity.contains(&false).then(|| NullBuffer::from(validity));
        Ok(Arc::new(StructArray::try_new(fields, arrays, nulls)?))
    }

    fn build_list(
        &mut self,
        field: &FieldDescriptor,
        item: &FieldDescriptor,
        path: &str,
        cells: &[Cell<'_>],
    ) -> Result<ArrayRef> {
        let before = self.failures.len();
        let mut validity = Vec::with_capacity(cells.len());
        let mut lengths = Vec::with_capacity(cells.len());
        let mut elements = Vec::new();

        for cell in cells {
            match self.present(cell, field, path) {
                Some(Value::List(items)) => {
                    validity.push(true);
                    lengths.push(items.len());
                    elements.extend(items.iter().map(|value| Cell {
                        row: cell.row,
                        value: Some(value),
                    }));
                }
                other => {
                    if let Some(other) = other {
                        self.fail(cell.row, path, expected(field, other));
                    }
                    validity.push(false);
                    lengths.push(0);
                }
            }
        }

        let values = self.build(item, &join(path, LIST_ITEM_NAME), &elements)?;
        if self.failures.len() > before {
            return Ok(new_null_array(&arrow_type(&field.logical_type)?, cells.len()));
        }

        let nulls = validity.contains(&false).then(|| NullBuffer::from(validity));
        Ok(Arc::new(ListArray::try_new(
            Arc::new(arrow_field(item)?),
            OffsetBuffer::from_lengths(lengths),
            values,
            nulls,
        )?))
    }
}

fn time_ticks(time: NaiveTime, unit: TimeUnit) -> std::result::Result<i64, String> {
    let step = nanos_per_tick(unit);
    if time.nanosecond() % step != 0 {
        return Err(format!("time {time} has precision finer than {}", unit.suffix()));
    }
    Ok(i64::from(time.num_seconds_from_midnight()) * unit.ticks_per_second()
        + i64::from(time.nanosecond() / step))
}

fn timestamp_ticks(datetime: NaiveDateTime, unit: TimeUnit) -> std::result::Result<i64, String> {
    let step = nanos_per_tick(unit);
    if datetime.nanosecond() % step != 0 {
        return Err(format!(
            "timestamp {datetime} has precision finer than {}",
            unit.suffix()
        ));
    }
    let utc = datetime.and_utc();
    match unit {
        TimeUnit::Second => Ok(utc.timestamp()),
        TimeUnit::Millisecond => Ok(utc.timestamp_millis()),
        TimeUnit::Microsecond => Ok(utc.timestamp_micros()),
        TimeUnit::Nanosecond => utc
            .timestamp_nanos_opt()
            .ok_or_else(|| format!("timestamp {datetime} is outside the nanosecond range")),
    }
}

/// Rows of a record batch, decoded on demand
pub(crate) struct BatchRows {
    /// Column per schema field; `None` when the batch lacks it
    columns: Vec<Option<ArrayRef>>,
    row: usize,
    len: usize,
}

impl BatchRows {
    pub(crate) fn new(batch: &RecordBatch, schema: &Schema) -> Self {
        Self {
            columns: schema
                .iter()
                .map(|field| batch.column_by_name(&field.name).cloned())
                .collect(),
            row: 0,
            len: batch.num_rows(),
        }
    }

    fn decode_row(&self, row: usize) -> Result<Row> {
        self.columns
            .iter()
            .map(|column| match column {
                Some(array) => decode(array.as_ref(), row),
                None => Ok(Value::Null),
            })
            .collect()
    }
}

impl Iterator for BatchRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.len {
            return None;
        }
        let row = self.row;
        self.row += 1;
        Some(self.decode_row(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.row;
        (remaining, Some(remaining))
    }
}

fn layout_error(data_type: &DataType) -> BridgeError {
    BridgeError::Arrow(ArrowError::InvalidArgumentError(format!(
        "array does not match its data type {data_type}"
    )))
}

fn out_of_range(data_type: &DataType, row: usize) -> BridgeError {
    BridgeError::Arrow(ArrowError::ComputeError(format!(
        "{data_type} value at row {row} is outside the supported range"
    )))
}

/// Native value of one cell
pub(crate) fn decode(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let data_type = array.data_type();

    macro_rules! primitive {
        ($arrow:ty, $variant:ident) => {
            Value::$variant(
                array
                    .as_primitive_opt::<$arrow>()
                    .ok_or_else(|| layout_error(data_type))?
                    .value(row),
            )
        };
    }
    macro_rules! temporal {
        ($arrow:ty, $convert:ident, $variant:ident) => {
            Value::$variant(
                array
                    .as_primitive_opt::<$arrow>()
                    .ok_or_else(|| layout_error(data_type))?
                    .$convert(row)
                    .ok_or_else(|| out_of_range(data_type, row))?,
            )
        };
    }

    let value = match data_type {
        DataType::Boolean => Value::Boolean(
            array
                .as_boolean_opt()
                .ok_or_else(|| layout_error(data_type))?
                .value(row),
        ),
        DataType::Int8 => primitive!(Int8Type, Int8),
        DataType::Int16 => primitive!(Int16Type, Int16),
        DataType::Int32 => primitive!(Int32Type, Int32),
        DataType::Int64 => primitive!(Int64Type, Int64),
        DataType::UInt8 => primitive!(UInt8Type, UInt8),
        DataType::UInt16 => primitive!(UInt16Type, UInt16),
        DataType::UInt32 => primitive!(UInt32Type, UInt32),
        DataType::UInt64 => primitive!(UInt64Type, UInt64),
        DataType::Float32 => primitive!(Float32Type, Float32),
        DataType::Float64 => primitive!(Float64Type, Float64),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            Value::Utf8(string_at(array, row)?.to_string())
        }
        DataType::Binary => Value::Binary(
            array
                .as_binary_opt::<i32>()
                .ok_or_else(|| layout_error(data_type))?
                .value(row)
                .to_vec(),
        ),
        DataType::LargeBinary => Value::Binary(
            array
                .as_binary_opt::<i64>()
                .ok_or_else(|| layout_error(data_type))?
                .value(row)
                .to_vec(),
        ),
        DataType::BinaryView => Value::Binary(
            array
                .as_binary_view_opt()
                .ok_or_else(|| layout_error(data_type))?
                .value(row)
                .to_vec(),
        ),
        DataType::FixedSizeBinary(_) => Value::Binary(
            array
                .as_fixed_size_binary_opt()
                .ok_or_else(|| layout_error(data_type))?
                .value(row)
                .to_vec(),
        ),
        DataType::Date32 => temporal!(Date32Type, value_as_date, Date),
        DataType::Date64 => temporal!(Date64Type, value_as_date, Date),
        DataType::Time32(ArrowTimeUnit::Second) => temporal!(Time32SecondType, value_as_time, Time),
        DataType::Time32(ArrowTimeUnit::Millisecond) => {
            temporal!(Time32MillisecondType, value_as_time, Time)
        }
        DataType::Time64(ArrowTimeUnit::Microsecond) => {
            temporal!(Time64MicrosecondType, value_as_time, Time)
        }
        DataType::Time64(ArrowTimeUnit::Nanosecond) => {
            temporal!(Time64NanosecondType, value_as_time, Time)
        }
        DataType::Timestamp(ArrowTimeUnit::Second, _) => {
            temporal!(TimestampSecondType, value_as_datetime, Timestamp)
        }
        DataType::Timestamp(ArrowTimeUnit::Millisecond, _) => {
            temporal!(TimestampMillisecondType, value_as_datetime, Timestamp)
        }
        DataType::Timestamp(ArrowTimeUnit::Microsecond, _) => {
            temporal!(TimestampMicrosecondType, value_as_datetime, Timestamp)
        }
        DataType::Timestamp(ArrowTimeUnit::Nanosecond, _) => {
            temporal!(TimestampNanosecondType, value_as_datetime, Timestamp)
        }
        DataType::Decimal128(_, scale) => Value::Decimal {
            value: array
                .as_primitive_opt::<Decimal128Type>()
                .ok_or_else(|| layout_error(data_type))?
                .value(row),
            scale: *scale,
        },
        DataType::Dictionary(key, _) => {
            let (values, index) = match key.as_ref() {
                DataType::Int8 => dictionary_entry::<Int8Type>(array, row)?,
                DataType::Int16 => dictionary_entry::<Int16Type>(array, row)?,
                DataType::Int32 => dictionary_entry::<Int32Type>(array, row)?,
                DataType::Int64 => dictionary_entry::<Int64Type>(array, row)?,
                DataType::UInt8 => dictionary_entry::<UInt8Type>(array, row)?,
                DataType::UInt16 => dictionary_entry::<UInt16Type>(array, row)?,
                DataType::UInt32 => dictionary_entry::<UInt32Type>(array, row)?,
                DataType::UInt64 => dictionary_entry::<UInt64Type>(array, row)?,
                _ => return Err(BridgeError::unsupported("arrow", data_type)),
            };
            Value::Enum(string_at(values.as_ref(), index)?.to_string())
        }
        DataType::Struct(fields) => {
            let array = array.as_struct_opt().ok_or_else(|| layout_error(data_type))?;
            let members = fields
                .iter()
                .zip(array.columns())
                .map(|(field, column)| Ok((field.name().clone(), decode(column.as_ref(), row)?)))
                .collect::<Result<Vec<_>>>()?;
            Value::Struct(members)
        }
        DataType::List(_) => {
            let items = array
                .as_list_opt::<i32>()
                .ok_or_else(|| layout_error(data_type))?
                .value(row);
            decode_all(items.as_ref())?
        }
        DataType::LargeList(_) => {
            let items = array
                .as_list_opt::<i64>()
                .ok_or_else(|| layout_error(data_type))?
                .value(row);
            decode_all(items.as_ref())?
        }
        DataType::FixedSizeList(_, _) => {
            let items = array
                .as_fixed_size_list_opt()
                .ok_or_else(|| layout_error(data_type))?
                .value(row);
            decode_all(items.as_ref())?
        }
        other => return Err(BridgeError::unsupported("arrow", other)),
    };
    Ok(value)
}

fn decode_all(items: &dyn Array) -> Result<Value> {
    (0..items.len())
        .map(|index| decode(items, index))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

fn string_at(array: &dyn Array, row: usize) -> Result<&str> {
    let data_type = array.data_type();
    if array.is_null(row) {
        return Err(BridgeError::Arrow(ArrowError::InvalidArgumentError(
            "null dictionary value".to_string(),
        )));
    }
    match data_type {
        DataType::Utf8 => Ok(array
            .as_string_opt::<i32>()
            .ok_or_else(|| layout_error(data_type))?
            .value(row)),
        DataType::LargeUtf8 => Ok(array
            .as_string_opt::<i64>()
            .ok_or_else(|| layout_error(data_type))?
            .value(row)),
        DataType::Utf8View => Ok(array
            .as_string_view_opt()
            .ok_or_else(|| layout_error(data_type))?
            .value(row)),
        other => Err(BridgeError::unsupported("arrow", other)),
    }
}

/// Values array and value index of a dictionary-encoded cell
fn dictionary_entry<K: ArrowDictionaryKeyType>(array: &dyn Array, row: usize) -> Result<(ArrayRef, usize)> {
    let dictionary = array
        .as_dictionary_opt::<K>()
        .ok_or_else(|| layout_error(array.data_type()))?;
    let index = dictionary
        .key(row)
        .ok_or_else(|| layout_error(array.data_type()))?;
    if index >= dictionary.values().len() {
        return Err(BridgeError::Arrow(ArrowError::InvalidArgumentError(format!(
            "dictionary key {index} out of bounds for {} values",
            dictionary.values().len()
        ))));
    }
    Ok((Arc::clone(dictionary.values()), index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema as ArrowSchema};
    use chrono::NaiveDate;

    fn person_schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::new("id", LogicalType::Int64, false),
            FieldDescriptor::new("name", LogicalType::Utf8, true),
        ])
    }

    #[test]
    fn test_observe_reports_data_nullability() {
        let batch = RecordBatch::try_new(
            Arc::new(ArrowSchema::new(vec![
                Field::new("id", DataType::Int64, true),
                Field::new("name", DataType::Utf8, true),
            ])),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("a"), None])),
            ],
        )
        .unwrap();
        let observed = ArrowBackend.observe(&batch).unwrap();
        assert_eq!(observed[0], ObservedColumn::new("id", Some(DataType::Int64), false));
        assert_eq!(observed[1], ObservedColumn::new("name", Some(DataType::Utf8), true));

        let schema = ArrowBackend.read_schema(&batch).unwrap();
        assert_eq!(schema, person_schema());
    }

    #[test]
    fn test_nested_nullability_follows_visible_data() {
        let parents = NullBuffer::from(vec![true, false, true]);
        let point = StructArray::try_new(
            Fields::from(vec![
                Field::new("x", DataType::Float64, true),
                Field::new("y", DataType::Float64, true),
            ]),
            vec![
                Arc::new(Float64Array::from(vec![Some(1.0), None, Some(3.0)])),
                Arc::new(Float64Array::from(vec![Some(2.0), Some(4.0), None])),
            ],
            Some(parents.clone()),
        )
        .unwrap();
        let tags = ListArray::try_new(
            Arc::new(Field::new("item", DataType::Utf8, true)),
            OffsetBuffer::new(vec![0, 1, 2, 3].into()),
            Arc::new(StringArray::from(vec![Some("a"), None, Some("b")])),
            Some(parents),
        )
        .unwrap();
        let batch = RecordBatch::try_new(
            Arc::new(ArrowSchema::new(vec![
                Field::new("point", point.data_type().clone(), true),
                Field::new("tags", tags.data_type().clone(), true),
            ])),
            vec![Arc::new(point), Arc::new(tags)],
        )
        .unwrap();

        let schema = ArrowBackend.read_schema(&batch).unwrap();
        assert_eq!(
            schema.field(0).unwrap().logical_type,
            LogicalType::Struct(vec![
                FieldDescriptor::new("x", LogicalType::Float64, false),
                FieldDescriptor::new("y", LogicalType::Float64, true),
            ])
        );
        assert_eq!(
            schema.field(1).unwrap().logical_type,
            LogicalType::list(LogicalType::Utf8, false)
        );
    }

    #[test]
    fn test_rows_round_trip_with_nested_types() {
        let point = LogicalType::Struct(vec![
            FieldDescriptor::new("x", LogicalType::Int32, false),
            FieldDescriptor::new("y", LogicalType::Int32, false),
        ]);
        let schema = Schema::new(vec![
            FieldDescriptor::new("when", LogicalType::Timestamp(TimeUnit::Millisecond), false),
            FieldDescriptor::new("day", LogicalType::Date, true),
            FieldDescriptor::new("price", LogicalType::Decimal { precision: 8, scale: 2 }, false),
            FieldDescriptor::new("color", LogicalType::Enum, false),
            FieldDescriptor::new("point", point, true),
            FieldDescriptor::new("tags", LogicalType::list(LogicalType::Utf8, true), false),
        ]);
        let when = NaiveDate::from_ymd_opt(2023, 5, 17)
            .unwrap()
            .and_hms_milli_opt(9, 30, 0, 125)
            .unwrap();
        let rows = vec![
            vec![
                Value::Timestamp(when),
                Value::Date(when.date()),
                Value::Decimal { value: 1999, scale: 2 },
                Value::Enum("Red".into()),
                Value::Struct(vec![("x".into(), Value::Int32(1)), ("y".into(), Value::Int32(2))]),
                Value::List(vec![Value::Utf8("a".into()), Value::Null]),
            ],
            vec![
                Value::Timestamp(when),
                Value::Null,
                Value::Decimal { value: -5, scale: 2 },
                Value::Enum("Blue".into()),
                Value::Null,
                Value::List(vec![]),
            ],
        ];

        let batch = ArrowBackend.rows_to_frame(&rows, &schema).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(ArrowBackend.read_schema(&batch).unwrap().field(3).unwrap().logical_type, LogicalType::Enum);

        let decoded: Vec<Row> = ArrowBackend
            .frame_to_rows(&batch, &schema)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(decoded, rows);
    }

    #[test]
    fn test_build_collects_every_failure() {
        let rows = vec![
            vec![Value::Null, Value::Utf8("a".into())],
            vec![Value::Int64(2), Value::Int32(7)],
            vec![Value::Int64(3)],
        ];
        let err = ArrowBackend.rows_to_frame(&rows, &person_schema()).unwrap_err();
        let BridgeError::Conversion(failures) = err else {
            panic!("expected conversion failures, got {err}");
        };
        let found: Vec<_> = failures.iter().map(|f| (f.row, f.field.as_str())).collect();
        assert_eq!(found, [(2, "*"), (0, "id"), (1, "name")]);
    }

    #[test]
    fn test_absent_columns_read_as_null() {
        let batch = RecordBatch::try_new(
            Arc::new(ArrowSchema::new(vec![Field::new("id", DataType::Int32, false)])),
            vec![Arc::new(Int32Array::from(vec![10]))],
        )
        .unwrap();
        let rows: Vec<Row> = ArrowBackend
            .frame_to_rows(&batch, &person_schema())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int32(10), Value::Null]]);
    }

    #[test]
    fn test_unsupported_schema_rejected_before_rows() {
        let schema = Schema::new(vec![FieldDescriptor::new(
            "big",
            LogicalType::Decimal { precision: 40, scale: 0 },
            false,
        )]);
        assert!(matches!(
            ArrowBackend.rows_to_frame(&[], &schema),
            Err(BridgeError::UnsupportedType { .. })
        ));
    }
}
