//! Type mapping table between logical types and backend-native type tokens.
//!
//! Each backend implements [`TypeMapping`] for its own native token type. The
//! mapping is total over the logical types a backend supports and fails with
//! [`BridgeError::UnsupportedType`] for the rest. For every supported type
//! `from_native(to_native(t)) == t`.

pub mod arrow;
pub mod coerce;
pub mod compatibility;
pub mod date_utils;
pub mod json;
pub mod parquet;

use std::fmt::Debug;

use crate::error::{BridgeError, Result};
use crate::schema::{LogicalType, Schema};

pub use coerce::{CoercionError, coerce};
pub use compatibility::{TypeCompatibility, check_type_compatibility, is_numeric, is_temporal};

/// Bidirectional mapping between logical types and one backend's native types
pub trait TypeMapping {
    /// The backend's native type token
    type Native: Clone + Debug + PartialEq + Send + Sync;

    /// Backend name used in error messages and logs
    const BACKEND: &'static str;

    /// Native type for a logical type
    fn to_native(&self, logical: &LogicalType) -> Result<Self::Native>;

    /// Logical type for a native type
    fn from_native(&self, native: &Self::Native) -> Result<LogicalType>;

    /// Human-readable form of a native type for reports
    fn describe_native(&self, native: &Self::Native) -> String {
        format!("{native:?}")
    }

    /// How data observed as `observed` relates to the declared type here
    fn compatibility(&self, observed: &LogicalType, declared: &LogicalType) -> TypeCompatibility {
        check_type_compatibility(observed, declared)
    }
}

/// Native type of `logical` on `backend`
pub fn to_native<M: TypeMapping + ?Sized>(
    logical: &LogicalType,
    backend: &M,
) -> Result<M::Native> {
    backend.to_native(logical)
}

/// Logical type of `native` on `backend`
pub fn from_native<M: TypeMapping + ?Sized>(
    native: &M::Native,
    backend: &M,
) -> Result<LogicalType> {
    backend.from_native(native)
}

/// Check that every field of a schema maps on a backend
///
/// A gap here is a configuration error: callers run this before touching any
/// row so that no partial work happens against an unusable backend.
pub fn ensure_supported<M: TypeMapping + ?Sized>(schema: &Schema, backend: &M) -> Result<()> {
    for field in schema {
        backend.to_native(&field.logical_type).map_err(|err| match err {
            BridgeError::UnsupportedType { backend, logical } => BridgeError::UnsupportedType {
                backend,
                logical: format!("{logical} (field '{}')", field.name),
            },
            other => other,
        })?;
    }
    Ok(())
}
