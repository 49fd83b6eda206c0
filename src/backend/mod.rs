//! Backend adapters
//!
//! This module provides the uniform capability set every dataframe backend
//! exposes to the validation and conversion engines. Each backend pairs a
//! native frame type with its [`TypeMapping`], so the engines never touch a
//! frame directly.

pub mod arrow;
pub mod json;
pub mod parquet;

use std::fmt::Debug;

use crate::error::Result;
use crate::mapping::{TypeMapping, ensure_supported};
use crate::schema::{FieldDescriptor, Schema};
use crate::validation::{self, Mismatch};
use crate::value::Row;

pub use self::arrow::ArrowBackend;
pub use self::json::{JsonBackend, JsonRecords};
pub use self::parquet::{ParquetBackend, ParquetFrame};

/// Lazy, single-pass sequence of rows read from a frame
pub type RowIter<'f> = Box<dyn Iterator<Item = Result<Row>> + 'f>;

/// A column as a backend reports it, before mapping to a logical type
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedColumn<N> {
    pub name: String,
    /// Native type, or `None` when it cannot be determined (e.g. a JSON column
    /// holding only nulls)
    pub native: Option<N>,
    /// Whether the column may hold nulls, per the backend's nullability strategy
    pub nullable: bool,
}

impl<N> ObservedColumn<N> {
    pub fn new(name: impl Into<String>, native: Option<N>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            native,
            nullable,
        }
    }
}

/// Core adapter trait defining the capabilities of a dataframe backend
///
/// Implementations hold only immutable configuration set at construction, so
/// one backend value can serve any number of calls and threads.
pub trait Backend: TypeMapping + Debug + Send + Sync {
    /// The native frame type
    type Frame;

    /// Report the frame's columns in frame order
    ///
    /// # Arguments
    ///
    /// * `frame` - The frame to inspect
    ///
    /// # Returns
    ///
    /// * `Result<Vec<ObservedColumn<Self::Native>>>` - One entry per column
    fn observe(&self, frame: &Self::Frame) -> Result<Vec<ObservedColumn<Self::Native>>>;

    /// Schema describing the frame's columns, with observed nullability
    ///
    /// Fails with `UnsupportedType` when a column's native type has no logical
    /// equivalent or cannot be determined.
    fn read_schema(&self, frame: &Self::Frame) -> Result<Schema> {
        let fields = self
            .observe(frame)?
            .into_iter()
            .map(|column| {
                let native = column.native.ok_or_else(|| {
                    crate::error::BridgeError::unsupported(
                        Self::BACKEND,
                        format!("column '{}' of undetermined type", column.name),
                    )
                })?;
                Ok(FieldDescriptor::new(
                    column.name,
                    self.from_native(&native)?,
                    column.nullable,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema::new(fields))
    }

    /// Compare the frame against a declared schema
    ///
    /// # Arguments
    ///
    /// * `frame` - The frame to check
    /// * `schema` - The declared schema
    ///
    /// # Returns
    ///
    /// * `Result<Vec<Mismatch>>` - Findings ordered by declared field; empty when
    ///   the frame conforms
    fn validate(&self, frame: &Self::Frame, schema: &Schema) -> Result<Vec<Mismatch>> {
        ensure_supported(schema, self)?;
        let observed = self.observe(frame)?;
        Ok(validation::compare(schema, &observed, self))
    }

    /// Build a native frame from rows laid out in schema field order
    ///
    /// Values must already match their declared types; a value the native
    /// builder rejects fails the whole call with `Conversion`.
    fn rows_to_frame(&self, rows: &[Row], schema: &Schema) -> Result<Self::Frame>;

    /// Read the frame's rows in native order, laid out in schema field order
    ///
    /// A schema field missing from the frame reads as nulls.
    fn frame_to_rows<'f>(&self, frame: &'f Self::Frame, schema: &Schema) -> Result<RowIter<'f>>;
}
