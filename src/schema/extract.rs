//! Schema extraction from model definitions.
//!
//! Extraction is pure: the same definition always yields the same schema, with
//! fields in declaration order. Nested models are resolved recursively into
//! struct descriptors; a model that reaches itself again along the resolution
//! path is rejected rather than expanded.

use std::any::TypeId;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{BridgeError, Result};
use crate::schema::model::{DeclaredType, Model, ModelDefinition};
use crate::schema::{FieldDescriptor, LIST_ITEM_NAME, LogicalType, Schema};

/// Largest decimal precision any backend can hold
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Extract the schema of a model type
pub fn extract_schema<M: Model>() -> Result<Schema> {
    extract(&M::definition())
}

/// Extract a schema from a model definition
pub fn extract(definition: &ModelDefinition) -> Result<Schema> {
    let mut resolver = Resolver {
        root: definition.name(),
        stack: vec![definition.identity().to_string()],
    };
    let fields = resolver.resolve_fields(definition, "")?;
    log::debug!(
        "Extracted schema for model '{}' with {} top-level fields",
        definition.name(),
        fields.len()
    );
    Ok(Schema::new(fields))
}

struct Resolver<'a> {
    root: &'a str,
    /// Identities of the models currently being resolved, outermost first
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn error(&self, path: &str, reason: impl Into<String>) -> BridgeError {
        BridgeError::SchemaExtraction {
            model: self.root.to_string(),
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    fn resolve_fields(
        &mut self,
        definition: &ModelDefinition,
        prefix: &str,
    ) -> Result<Vec<FieldDescriptor>> {
        let mut seen = FxHashSet::default();
        let mut fields = Vec::with_capacity(definition.fields().len());

        for declared in definition.fields() {
            let path = join_path(prefix, &declared.name);
            if !seen.insert(declared.name.as_str()) {
                return Err(self.error(
                    &path,
                    format!("duplicate field name in model '{}'", definition.name()),
                ));
            }
            fields.push(self.resolve(&declared.name, &declared.declared_type, declared.nullable, &path)?);
        }

        Ok(fields)
    }

    fn resolve(
        &mut self,
        name: &str,
        declared: &DeclaredType,
        nullable: bool,
        path: &str,
    ) -> Result<FieldDescriptor> {
        match declared {
            DeclaredType::Logical(logical) => {
                self.check_primitive(logical, path)?;
                Ok(FieldDescriptor::new(name, logical.clone(), nullable))
            }
            DeclaredType::Enum(variants) => {
                if variants.is_empty() {
                    return Err(self.error(path, "enum declares no variants"));
                }
                Ok(FieldDescriptor::new(name, LogicalType::Enum, nullable)
                    .with_variants(variants.iter().cloned()))
            }
            DeclaredType::Model(definition) => {
                let definition = definition();
                if self.stack.iter().any(|identity| identity == definition.identity()) {
                    return Err(self.error(
                        path,
                        format!("recursive reference to model '{}'", definition.name()),
                    ));
                }
                self.stack.push(definition.identity().to_string());
                let children = self.resolve_fields(&definition, path);
                self.stack.pop();
                Ok(FieldDescriptor::new(name, LogicalType::Struct(children?), nullable))
            }
            DeclaredType::List {
                element,
                nullable: element_nullable,
            } => {
                let item_path = join_path(path, LIST_ITEM_NAME);
                let item = self.resolve(LIST_ITEM_NAME, element, *element_nullable, &item_path)?;
                Ok(FieldDescriptor::new(
                    name,
                    LogicalType::List(Box::new(item)),
                    nullable,
                ))
            }
            DeclaredType::Any => Err(self.error(path, "type has no logical mapping")),
        }
    }

    /// Primitive declarations must not smuggle in nested types and must carry
    /// valid decimal parameters
    fn check_primitive(&self, logical: &LogicalType, path: &str) -> Result<()> {
        match logical {
            LogicalType::Decimal { precision, scale } => {
                if *precision == 0 || *precision > MAX_DECIMAL_PRECISION {
                    return Err(self.error(
                        path,
                        format!("decimal precision {precision} outside 1..={MAX_DECIMAL_PRECISION}"),
                    ));
                }
                if i16::from(*scale) > i16::from(*precision) {
                    return Err(self.error(
                        path,
                        format!("decimal scale {scale} exceeds precision {precision}"),
                    ));
                }
                Ok(())
            }
            LogicalType::Enum => Err(self.error(path, "enum declared without variants")),
            LogicalType::Struct(_) | LogicalType::List(_) => Err(self.error(
                path,
                "nested types must be declared as models or lists",
            )),
            _ => Ok(()),
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Memoized schemas keyed by model type
///
/// Owned by the caller; nothing in the crate keeps schemas alive between calls.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: FxHashMap<TypeId, Arc<Schema>>,
}

impl SchemaCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached schema of `M`, extracting it on first use
    pub fn get_or_extract<M: Model + 'static>(&mut self) -> Result<Arc<Schema>> {
        if let Some(schema) = self.schemas.get(&TypeId::of::<M>()) {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(extract_schema::<M>()?);
        self.schemas.insert(TypeId::of::<M>(), Arc::clone(&schema));
        Ok(schema)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
