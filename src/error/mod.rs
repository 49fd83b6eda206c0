//! Error handling for schema-bridge.
//!
//! Extraction and mapping problems are fatal and surface immediately. Conversion
//! failures are collected over the whole input before they are reported, and
//! constraint violations are raised per row so the caller can decide whether to
//! keep reading. Validation findings are never errors: see
//! [`crate::validation::Mismatch`].

use std::io;

use arrow::error::ArrowError;
use itertools::Itertools;
use parquet::errors::ParquetError;

/// A single value that could not be coerced while building a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    /// Index of the offending row in the input sequence
    pub row: usize,
    /// Field path (dotted for nested fields)
    pub field: String,
    /// What went wrong
    pub reason: String,
}

/// Every conversion failure found in one serialization attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionFailures(pub Vec<ConversionFailure>);

impl ConversionFailures {
    /// Number of failed values
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the failures in input order
    pub fn iter(&self) -> impl Iterator<Item = &ConversionFailure> {
        self.0.iter()
    }
}

impl std::fmt::Display for ConversionFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const SHOWN: usize = 5;
        let listed = self
            .0
            .iter()
            .take(SHOWN)
            .map(|failure| format!("row {} field '{}': {}", failure.row, failure.field, failure.reason))
            .join("; ");
        write!(f, "{} value(s) could not be converted: {listed}", self.0.len())?;
        if self.0.len() > SHOWN {
            write!(f, "; and {} more", self.0.len() - SHOWN)?;
        }
        Ok(())
    }
}

/// Errors raised by schema extraction, type mapping and conversion
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The model definition cannot be resolved to a schema
    #[error("Schema extraction error in model '{model}' at '{path}': {reason}")]
    SchemaExtraction {
        model: String,
        path: String,
        reason: String,
    },

    /// The type mapping table has no native equivalent for a logical type
    #[error("Unsupported type: the {backend} backend has no mapping for {logical}")]
    UnsupportedType {
        backend: &'static str,
        logical: String,
    },

    /// One or more values could not be converted while building a frame
    #[error("Conversion error: {0}")]
    Conversion(ConversionFailures),

    /// A decoded row breaks the declared schema
    #[error("Constraint violation at row {row}, field '{field}': {reason}")]
    ConstraintViolation {
        row: usize,
        field: String,
        reason: String,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl BridgeError {
    /// Build an [`BridgeError::UnsupportedType`] for a backend
    pub fn unsupported(backend: &'static str, logical: impl ToString) -> Self {
        Self::UnsupportedType {
            backend,
            logical: logical.to_string(),
        }
    }

    /// Build a conversion error carrying a single failure
    pub fn conversion(row: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion(ConversionFailures(vec![ConversionFailure {
            row,
            field: field.into(),
            reason: reason.into(),
        }]))
    }
}

/// Errors raised by a [`crate::FieldValue`] or [`crate::Model`] implementation
/// when a value does not fit the Rust field it is assigned to
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The value kind does not match the Rust type
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: &'static str,
    },

    /// The value is outside the range of the Rust type
    #[error("value {value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    /// The string is not a variant of the enum
    #[error("unknown variant '{0}'")]
    UnknownVariant(String),

    /// An error inside a named field
    #[error("field '{field}': {source}")]
    InField {
        field: String,
        #[source]
        source: Box<ValueError>,
    },
}

impl ValueError {
    /// Value kind mismatch
    #[must_use]
    pub const fn unexpected(expected: &'static str, found: &crate::Value) -> Self {
        Self::Unexpected {
            expected,
            found: found.kind(),
        }
    }

    /// Attach the name of the field this error occurred in
    #[must_use]
    pub fn in_field(self, field: &str) -> Self {
        Self::InField {
            field: field.to_string(),
            source: Box::new(self),
        }
    }

    /// Dotted path of the field the error occurred in, if any
    #[must_use]
    pub fn field_path(&self) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = self;
        while let Self::InField { field, source } = current {
            segments.push(field.as_str());
            current = source.as_ref();
        }
        (!segments.is_empty()).then(|| segments.join("."))
    }

    /// The innermost error, without field context
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::InField { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for schema-bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_error_field_path() {
        let err = ValueError::UnknownVariant("Purple".into())
            .in_field("color")
            .in_field("address");
        assert_eq!(err.field_path().as_deref(), Some("address.color"));
        assert_eq!(err.root_cause(), &ValueError::UnknownVariant("Purple".into()));
    }

    #[test]
    fn test_conversion_failures_display_truncates() {
        let failures = ConversionFailures(
            (0..7)
                .map(|row| ConversionFailure {
                    row,
                    field: "id".into(),
                    reason: "null value for non-nullable field".into(),
                })
                .collect(),
        );
        let message = BridgeError::Conversion(failures).to_string();
        assert!(message.starts_with("Conversion error: 7 value(s)"));
        assert!(message.ends_with("and 2 more"));
    }
}
