//! A Rust library that keeps one typed-model schema in sync with Arrow, Parquet
//! and JSON-row dataframes: schema extraction, validation of existing frames,
//! and conversion of model instances in both directions.

extern crate self as schema_bridge;

pub mod api;
pub mod backend;
pub mod config;
pub mod conversion;
pub mod error;
pub mod mapping;
pub mod schema;
pub mod validation;
pub mod value;

// Re-export the most common types for easier use
// Core types
pub use config::{BridgeConfig, CoercionConfig, DateFormatConfig, ParquetConfig};
pub use error::{BridgeError, ConversionFailure, ConversionFailures, Result, ValueError};
pub use value::{Record, Row, Value};

// Schema and model definition
pub use schema::{
    Blob, Decimal, DeclaredField, DeclaredType, FieldDescriptor, FieldValue, LogicalType, Model,
    ModelDefinition, Schema, SchemaCache, TimeUnit, extract,
};
pub use schema_bridge_macros::{Model, ModelEnum};

// Backends and type mapping
pub use backend::{ArrowBackend, Backend, JsonBackend, JsonRecords, ParquetBackend, ParquetFrame};
pub use mapping::{TypeCompatibility, TypeMapping, check_type_compatibility, from_native, to_native};

// Validation and conversion
pub use conversion::Rows;
pub use validation::{Expected, Mismatch, Observed, Severity, ValidationReport};

// Public API
pub use api::{
    extract_schema, from_frame, from_frame_with_config, to_frame, to_frame_with_config, validate,
};
