//! Validation of frames against a declared schema.
//!
//! Validation never fails on a bad frame: every difference between what the
//! schema declares and what a backend observes becomes a [`Mismatch`], and an
//! empty list means the frame conforms. Only backend I/O and unmappable
//! declared types are errors.

use std::fmt;

use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, ObservedColumn};
use crate::error::Result;
use crate::mapping::{TypeCompatibility, TypeMapping};
use crate::schema::{FieldDescriptor, LIST_ITEM_NAME, LogicalType, Schema};

/// How serious a mismatch is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// The frame cannot be read as declared
    Error,
    /// The frame is readable, but its representation differs from the declaration
    Warning,
}

/// What the schema declares for a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expected {
    Type(LogicalType),
    Nullable(bool),
}

/// What the backend reports for a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Observed {
    Type(LogicalType),
    /// A native type with no logical equivalent, as the backend describes it
    Native(String),
    Nullable(bool),
    /// The field has no column in the frame
    Absent,
}

/// A single difference between a declared field and a frame column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Field path, dotted for nested fields
    pub field: String,
    pub expected: Expected,
    pub observed: Observed,
    pub severity: Severity,
}

impl Mismatch {
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        expected: Expected,
        observed: Observed,
        severity: Severity,
    ) -> Self {
        Self {
            field: field.into(),
            expected,
            observed,
            severity,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(logical) => write!(f, "{logical}"),
            Self::Nullable(true) => write!(f, "nullable"),
            Self::Nullable(false) => write!(f, "non-nullable"),
        }
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(logical) => write!(f, "{logical}"),
            Self::Native(native) => write!(f, "unmappable native type {native}"),
            Self::Nullable(true) => write!(f, "nullable"),
            Self::Nullable(false) => write!(f, "non-nullable"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} on '{}': expected {}, observed {}",
            self.severity, self.field, self.expected, self.observed
        )
    }
}

/// Mismatches collected from one validation, with severity filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    /// Whether no mismatch is an error; warnings alone leave a frame valid
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.mismatches.iter().any(Mismatch::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Mismatch> {
        self.mismatches.iter().filter(|m| m.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Mismatch> {
        self.mismatches.iter().filter(|m| m.severity == Severity::Warning)
    }

    /// Distinct field paths with at least one mismatch, in report order
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.mismatches.iter().map(|m| m.field.as_str()).unique().collect()
    }
}

impl From<Vec<Mismatch>> for ValidationReport {
    fn from(mismatches: Vec<Mismatch>) -> Self {
        Self { mismatches }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mismatches.is_empty() {
            return write!(f, "frame conforms to schema");
        }
        write!(f, "{}", self.mismatches.iter().join("\n"))
    }
}

/// Validate a frame against a schema through a backend
pub fn check<B: Backend>(backend: &B, frame: &B::Frame, schema: &Schema) -> Result<Vec<Mismatch>> {
    let mismatches = backend.validate(frame, schema)?;
    log::info!(
        "Validated {} fields against a {} frame: {} error(s), {} warning(s)",
        schema.len(),
        B::BACKEND,
        mismatches.iter().filter(|m| m.is_error()).count(),
        mismatches.iter().filter(|m| !m.is_error()).count()
    );
    Ok(mismatches)
}

/// Validate many frames against one schema in parallel
///
/// Results are returned in the order of `frames`; each is independent of the
/// others.
pub fn check_all<B>(backend: &B, frames: &[B::Frame], schema: &Schema) -> Vec<Result<Vec<Mismatch>>>
where
    B: Backend,
    B::Frame: Sync,
{
    frames
        .par_iter()
        .map(|frame| check(backend, frame, schema))
        .collect()
}

/// Compare declared fields with the columns a backend observed
///
/// Findings are ordered by declared field, nested findings directly after
/// their parent. Observed columns the schema does not declare are ignored.
pub fn compare<B: TypeMapping + ?Sized>(
    schema: &Schema,
    observed: &[ObservedColumn<B::Native>],
    backend: &B,
) -> Vec<Mismatch> {
    let mut findings = Findings::default();

    for field in schema {
        let Some(column) = observed.iter().find(|column| column.name == field.name) else {
            findings.push(Mismatch::new(
                &field.name,
                Expected::Type(field.logical_type.clone()),
                Observed::Absent,
                Severity::Error,
            ));
            continue;
        };

        findings.nullability(&field.name, field, column.nullable);

        match &column.native {
            None => log::debug!(
                "Column '{}' has no inferable type; checking nullability only",
                field.name
            ),
            Some(native) => match backend.from_native(native) {
                Ok(logical) => findings.types(backend, &field.name, &field.logical_type, &logical),
                Err(_) => findings.push(Mismatch::new(
                    &field.name,
                    Expected::Type(field.logical_type.clone()),
                    Observed::Native(backend.describe_native(native)),
                    Severity::Error,
                )),
            },
        }
    }

    findings.0
}

#[derive(Default)]
struct Findings(Vec<Mismatch>);

impl Findings {
    fn push(&mut self, mismatch: Mismatch) {
        if mismatch.severity == Severity::Warning {
            log::warn!("{mismatch}");
        }
        self.0.push(mismatch);
    }

    fn nullability(&mut self, path: &str, declared: &FieldDescriptor, observed_nullable: bool) {
        if observed_nullable && !declared.nullable {
            self.push(Mismatch::new(
                path,
                Expected::Nullable(false),
                Observed::Nullable(true),
                Severity::Error,
            ));
        }
    }

    fn types<B: TypeMapping + ?Sized>(
        &mut self,
        backend: &B,
        path: &str,
        declared: &LogicalType,
        observed: &LogicalType,
    ) {
        match (declared, observed) {
            (LogicalType::Struct(declared_children), LogicalType::Struct(observed_children)) => {
                for child in declared_children {
                    let child_path = format!("{path}.{}", child.name);
                    match observed_children.iter().find(|o| o.name == child.name) {
                        None => self.push(Mismatch::new(
                            child_path,
                            Expected::Type(child.logical_type.clone()),
                            Observed::Absent,
                            Severity::Error,
                        )),
                        Some(found) => {
                            self.nullability(&child_path, child, found.nullable);
                            self.types(
                                backend,
                                &child_path,
                                &child.logical_type,
                                &found.logical_type,
                            );
                        }
                    }
                }
            }
            (LogicalType::List(declared_item), LogicalType::List(observed_item)) => {
                let item_path = format!("{path}.{LIST_ITEM_NAME}");
                self.nullability(&item_path, declared_item, observed_item.nullable);
                self.types(
                    backend,
                    &item_path,
                    &declared_item.logical_type,
                    &observed_item.logical_type,
                );
            }
            _ => {
                let severity = match backend.compatibility(observed, declared) {
                    TypeCompatibility::Exact => return,
                    TypeCompatibility::Compatible => Severity::Warning,
                    TypeCompatibility::Incompatible => Severity::Error,
                };
                self.push(Mismatch::new(
                    path,
                    Expected::Type(declared.clone()),
                    Observed::Type(observed.clone()),
                    severity,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ArrowBackend, JsonBackend};
    use crate::mapping::json::{JsonField, JsonType};
    use arrow::datatypes::DataType;

    fn people() -> Schema {
        Schema::new(vec![
            FieldDescriptor::new("id", LogicalType::Int64, false),
            FieldDescriptor::new("name", LogicalType::Utf8, true),
        ])
    }

    #[test]
    fn test_conforming_columns_produce_nothing() {
        let observed = vec![
            ObservedColumn::new("name", Some(DataType::Utf8), true),
            ObservedColumn::new("id", Some(DataType::Int64), false),
            ObservedColumn::new("extra", Some(DataType::Boolean), true),
        ];
        assert!(compare(&people(), &observed, &ArrowBackend).is_empty());
    }

    #[test]
    fn test_absent_and_nullable_columns_are_errors() {
        let observed = vec![ObservedColumn::new("id", Some(DataType::Int64), true)];
        let mismatches = compare(&people(), &observed, &ArrowBackend);
        assert_eq!(
            mismatches,
            vec![
                Mismatch::new("id", Expected::Nullable(false), Observed::Nullable(true), Severity::Error),
                Mismatch::new("name", Expected::Type(LogicalType::Utf8), Observed::Absent, Severity::Error),
            ]
        );
    }

    #[test]
    fn test_widening_warns_and_narrowing_errors() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("wide", LogicalType::Int64, false),
            FieldDescriptor::new("narrow", LogicalType::Int16, false),
            FieldDescriptor::new("label", LogicalType::Enum, false),
        ]);
        let observed = vec![
            ObservedColumn::new("wide", Some(DataType::Int32), false),
            ObservedColumn::new("narrow", Some(DataType::Int64), false),
            ObservedColumn::new("label", Some(DataType::Utf8), false),
        ];
        let report = ValidationReport::from(compare(&schema, &observed, &ArrowBackend));
        let severities: Vec<_> = report
            .mismatches
            .iter()
            .map(|m| (m.field.as_str(), m.severity))
            .collect();
        assert_eq!(
            severities,
            [
                ("wide", Severity::Warning),
                ("narrow", Severity::Error),
                ("label", Severity::Warning)
            ]
        );
        assert!(!report.is_valid());
        assert_eq!(report.errors().count(), 1);
        assert_eq!(report.warnings().count(), 2);
    }

    #[test]
    fn test_nested_findings_follow_parent() {
        let schema = Schema::new(vec![
            FieldDescriptor::new(
                "point",
                LogicalType::Struct(vec![
                    FieldDescriptor::new("x", LogicalType::Int64, false),
                    FieldDescriptor::new("y", LogicalType::Int64, false),
                ]),
                false,
            ),
            FieldDescriptor::new("tags", LogicalType::list(LogicalType::Utf8, false), false),
        ]);
        let observed = vec![
            ObservedColumn::new(
                "point",
                Some(JsonType::Object(vec![JsonField::new("x", JsonType::Number, true)])),
                false,
            ),
            ObservedColumn::new(
                "tags",
                Some(JsonType::Array(Box::new(JsonField::new("item", JsonType::String, true)))),
                false,
            ),
        ];
        let mismatches = compare(&schema, &observed, &JsonBackend);
        let fields: Vec<_> = mismatches
            .iter()
            .map(|m| (m.field.as_str(), &m.observed))
            .collect();
        assert_eq!(
            fields,
            [
                ("point.x", &Observed::Nullable(true)),
                ("point.x", &Observed::Type(LogicalType::Float64)),
                ("point.y", &Observed::Absent),
                ("tags.item", &Observed::Nullable(true)),
            ]
        );
    }

    #[test]
    fn test_unmappable_and_undetermined_natives() {
        let observed = vec![
            ObservedColumn::new("id", Some(JsonType::Mixed), false),
            ObservedColumn::new("name", None, true),
        ];
        let mismatches = compare(&people(), &observed, &JsonBackend);
        assert_eq!(
            mismatches,
            vec![Mismatch::new(
                "id",
                Expected::Type(LogicalType::Int64),
                Observed::Native("mixed".into()),
                Severity::Error
            )]
        );
    }

    #[test]
    fn test_report_serializes() {
        let report = ValidationReport::from(vec![Mismatch::new(
            "id",
            Expected::Nullable(false),
            Observed::Nullable(true),
            Severity::Error,
        )]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mismatches"][0]["field"], "id");
        assert_eq!(json["mismatches"][0]["severity"], "Error");
        assert_eq!(report.fields(), ["id"]);
    }
}
