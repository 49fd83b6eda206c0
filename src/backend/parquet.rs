//! Parquet backend.
//!
//! Frames are Parquet files, either held in memory or referenced by path. Schema
//! observation reads only the footer metadata; rows are decoded batch by batch
//! as the row iterator is advanced. Both block on file I/O for path-backed
//! frames.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::{
    ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReader,
    ParquetRecordBatchReaderBuilder,
};
use parquet::file::metadata::ParquetMetaData;
use parquet::file::properties::WriterProperties;

use crate::backend::arrow::{BatchRows, build_batch};
use crate::backend::{Backend, ObservedColumn, RowIter};
use crate::config::{BridgeConfig, ParquetConfig};
use crate::error::Result;
use crate::mapping::ensure_supported;
use crate::mapping::parquet::{ParquetType, native_field};
use crate::schema::Schema;
use crate::value::Row;

/// A Parquet file, in memory or on disk
#[derive(Debug, Clone)]
pub enum ParquetFrame {
    Bytes(Bytes),
    File(PathBuf),
}

impl ParquetFrame {
    /// Frame over an in-memory Parquet file
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Frame over a file on disk; nothing is read until the frame is used
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// Footer metadata of the file
    pub fn metadata(&self) -> Result<Arc<ParquetMetaData>> {
        let options = ArrowReaderOptions::default();
        let loaded = match self {
            Self::Bytes(bytes) => ArrowReaderMetadata::load(bytes, options)?,
            Self::File(path) => ArrowReaderMetadata::load(&File::open(path)?, options)?,
        };
        Ok(Arc::clone(loaded.metadata()))
    }

    /// Total number of rows across all row groups
    pub fn num_rows(&self) -> Result<i64> {
        Ok(self.metadata()?.file_metadata().num_rows())
    }

    /// Write the file to `path` and return a frame referring to it
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match self {
            Self::Bytes(bytes) => std::fs::write(path, bytes)?,
            Self::File(source) => {
                if source != path {
                    std::fs::copy(source, path)?;
                }
            }
        }
        Ok(Self::open(path))
    }

    fn reader(&self, batch_size: usize) -> Result<ParquetRecordBatchReader> {
        let reader = match self {
            Self::Bytes(bytes) => ParquetRecordBatchReaderBuilder::try_new(bytes.clone())?
                .with_batch_size(batch_size)
                .build()?,
            Self::File(path) => {
                log::debug!("Opening parquet file {}", path.display());
                ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?
                    .with_batch_size(batch_size)
                    .build()?
            }
        };
        Ok(reader)
    }
}

impl From<Bytes> for ParquetFrame {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

/// Backend whose frames are Parquet files
///
/// Observed nullability comes from column-chunk statistics where every row
/// group has them and the column is a top-level primitive; otherwise from the
/// declared repetition.
#[derive(Debug, Clone, Default)]
pub struct ParquetBackend {
    config: ParquetConfig,
}

impl ParquetBackend {
    #[must_use]
    pub const fn new(config: ParquetConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ParquetConfig {
        &self.config
    }

    /// Summed null count of a leaf column, if every row group records one
    fn null_count(metadata: &ParquetMetaData, leaf: usize) -> Option<u64> {
        metadata
            .row_groups()
            .iter()
            .map(|group| group.column(leaf).statistics()?.null_count_opt())
            .sum()
    }
}

impl From<&BridgeConfig> for ParquetBackend {
    fn from(config: &BridgeConfig) -> Self {
        Self::new(config.parquet.clone())
    }
}

impl Backend for ParquetBackend {
    type Frame = ParquetFrame;

    fn observe(&self, frame: &ParquetFrame) -> Result<Vec<ObservedColumn<ParquetType>>> {
        let metadata = frame.metadata()?;
        let descriptor = metadata.file_metadata().schema_descr();

        let columns = descriptor
            .root_schema()
            .get_fields()
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let field = native_field(node);
                let declared = field.is_optional();

                let leaf = (0..descriptor.num_columns())
                    .find(|&leaf| descriptor.get_column_root_idx(leaf) == index);
                let from_statistics = match leaf {
                    Some(leaf) if self.config.use_statistics && node.is_primitive() => {
                        Self::null_count(&metadata, leaf).map(|nulls| nulls > 0)
                    }
                    _ => None,
                };
                if from_statistics.is_none() {
                    log::debug!(
                        "Column '{}': nullability from declared repetition",
                        field.name
                    );
                }

                ObservedColumn::new(
                    field.name,
                    Some(field.parquet_type),
                    from_statistics.unwrap_or(declared),
                )
            })
            .collect();
        Ok(columns)
    }

    fn rows_to_frame(&self, rows: &[Row], schema: &Schema) -> Result<ParquetFrame> {
        ensure_supported(schema, self)?;
        let batch = build_batch(rows, schema)?;

        let props = WriterProperties::builder()
            .set_max_row_group_size(self.config.max_row_group_size)
            .build();
        let mut buffer = Vec::new();
        {
            let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
            writer.write(&batch)?;
            writer.close()?;
        }

        log::debug!(
            "Wrote {} rows to an in-memory parquet file of {} bytes",
            batch.num_rows(),
            buffer.len()
        );
        Ok(ParquetFrame::from_bytes(buffer))
    }

    fn frame_to_rows<'f>(&self, frame: &'f ParquetFrame, schema: &Schema) -> Result<RowIter<'f>> {
        let reader = frame.reader(self.config.batch_size)?;
        Ok(Box::new(ParquetRows {
            reader,
            schema: schema.clone(),
            current: None,
            done: false,
        }))
    }
}

/// Rows of a Parquet file, decoding the next record batch when the current
/// one is exhausted
struct ParquetRows {
    reader: ParquetRecordBatchReader,
    schema: Schema,
    current: Option<BatchRows>,
    done: bool,
}

impl Iterator for ParquetRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.current.as_mut().and_then(Iterator::next) {
                return Some(row);
            }
            if self.done {
                return None;
            }
            match self.reader.next() {
                Some(Ok(batch)) => self.current = Some(BatchRows::new(&batch, &self.schema)),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::mapping::TypeMapping;
    use crate::schema::{FieldDescriptor, LogicalType, TimeUnit};
    use crate::value::Value;
    use chrono::NaiveDate;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::new("id", LogicalType::Int64, false),
            FieldDescriptor::new("name", LogicalType::Utf8, true),
            FieldDescriptor::new("score", LogicalType::Decimal { precision: 12, scale: 3 }, false),
            FieldDescriptor::new("seen", LogicalType::Timestamp(TimeUnit::Microsecond), true),
            FieldDescriptor::new("tags", LogicalType::list(LogicalType::Int32, false), true),
            FieldDescriptor::new(
                "point",
                LogicalType::Struct(vec![FieldDescriptor::new("x", LogicalType::Float64, false)]),
                true,
            ),
        ])
    }

    fn rows(count: i64) -> Vec<Row> {
        let seen = NaiveDate::from_ymd_opt(2022, 12, 31)
            .unwrap()
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .unwrap();
        (0..count)
            .map(|i| {
                vec![
                    Value::Int64(i),
                    if i % 2 == 0 { Value::Utf8(format!("n{i}")) } else { Value::Null },
                    Value::Decimal { value: i128::from(i) * 1_001, scale: 3 },
                    Value::Timestamp(seen),
                    Value::List(vec![Value::Int32(1), Value::Int32(2)]),
                    Value::Struct(vec![("x".into(), Value::Float64(0.5))]),
                ]
            })
            .collect()
    }

    #[test]
    fn test_backend_from_bridge_config() {
        let mut config = BridgeConfig::default();
        config.parquet.batch_size = 16;
        let backend = ParquetBackend::from(&config);
        assert_eq!(backend.config().batch_size, 16);
        assert!(backend.config().use_statistics);
    }

    #[test]
    fn test_rows_round_trip_across_batches() {
        let backend = ParquetBackend::new(ParquetConfig {
            batch_size: 3,
            max_row_group_size: 4,
            use_statistics: true,
        });
        let input = rows(10);
        let frame = backend.rows_to_frame(&input, &schema()).unwrap();
        assert_eq!(frame.num_rows().unwrap(), 10);
        assert_eq!(frame.metadata().unwrap().num_row_groups(), 3);

        let output: Vec<Row> = backend
            .frame_to_rows(&frame, &schema())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_nullability_from_statistics() {
        let backend = ParquetBackend::default();
        let frame = backend.rows_to_frame(&rows(1), &schema()).unwrap();
        let observed = backend.observe(&frame).unwrap();
        let nullable: Vec<_> = observed.iter().map(|c| (c.name.as_str(), c.nullable)).collect();
        // Only row 0 exists, so `name` holds no null; nested columns fall back to repetition
        assert_eq!(
            nullable,
            [
                ("id", false),
                ("name", false),
                ("score", false),
                ("seen", false),
                ("tags", true),
                ("point", true),
            ]
        );

        let declared_only = ParquetBackend::new(ParquetConfig {
            use_statistics: false,
            ..ParquetConfig::default()
        });
        let observed = declared_only.observe(&frame).unwrap();
        assert!(observed[1].nullable);
        assert!(!observed[0].nullable);
    }

    #[test]
    fn test_read_schema_matches_declared_types() {
        let backend = ParquetBackend::new(ParquetConfig {
            use_statistics: false,
            ..ParquetConfig::default()
        });
        let frame = backend.rows_to_frame(&rows(2), &schema()).unwrap();
        assert_eq!(backend.read_schema(&frame).unwrap(), schema());
        for (column, field) in backend.observe(&frame).unwrap().iter().zip(schema().iter()) {
            let native = column.native.as_ref().unwrap();
            assert_eq!(backend.from_native(native).unwrap(), field.logical_type);
        }
    }

    /// Per-test file under the temp directory
    fn temp_path(test: &str) -> PathBuf {
        std::env::temp_dir().join(format!("schema-bridge-{test}-{}.parquet", std::process::id()))
    }

    #[test]
    fn test_file_backed_frame() {
        let backend = ParquetBackend::default();
        let path = temp_path("test_file_backed_frame");
        let frame = backend.rows_to_frame(&rows(3), &schema()).unwrap().persist(&path).unwrap();
        assert!(matches!(frame, ParquetFrame::File(_)));
        let count = backend.frame_to_rows(&frame, &schema()).unwrap().count();
        assert_eq!(count, 3);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            ParquetFrame::open(&path).metadata(),
            Err(BridgeError::Io(_))
        ));
    }

    #[test]
    fn test_enum_is_rejected_before_writing() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("color", LogicalType::Enum, false).with_variants(["Red"]),
        ]);
        let err = ParquetBackend::default()
            .rows_to_frame(&[vec![Value::Enum("Red".into())]], &schema)
            .unwrap_err();
        assert!(err.to_string().contains("field 'color'"));
    }
}
