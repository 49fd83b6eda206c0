//! Entry points tying a model type to a backend.
//!
//! Each call extracts the model's schema afresh; callers converting many
//! batches of the same model can hold a [`crate::SchemaCache`] and use the
//! engines in [`crate::validation`] and [`crate::conversion`] directly.

use crate::backend::Backend;
use crate::config::CoercionConfig;
use crate::conversion::{self, Rows};
use crate::error::Result;
use crate::schema::Model;
use crate::validation::{self, Mismatch};

pub use crate::schema::extract_schema;

/// Validate a frame against the schema of model `M`
///
/// An empty result means the frame conforms.
pub fn validate<M: Model, B: Backend>(frame: &B::Frame, backend: &B) -> Result<Vec<Mismatch>> {
    let schema = extract_schema::<M>()?;
    validation::check(backend, frame, &schema)
}

/// Serialize instances of `M` into a frame with default coercion settings
pub fn to_frame<M: Model, B: Backend>(instances: &[M], backend: &B) -> Result<B::Frame> {
    to_frame_with_config(instances, backend, &CoercionConfig::default())
}

/// Serialize instances of `M` into a frame
pub fn to_frame_with_config<M: Model, B: Backend>(
    instances: &[M],
    backend: &B,
    config: &CoercionConfig,
) -> Result<B::Frame> {
    let schema = extract_schema::<M>()?;
    conversion::serialize(instances, &schema, backend, config)
}

/// Read instances of `M` from a frame with default coercion settings
pub fn from_frame<'f, M: Model, B: Backend>(frame: &'f B::Frame, backend: &B) -> Result<Rows<'f, M>> {
    from_frame_with_config(frame, backend, &CoercionConfig::default())
}

/// Read instances of `M` from a frame
pub fn from_frame_with_config<'f, M: Model, B: Backend>(
    frame: &'f B::Frame,
    backend: &B,
    config: &CoercionConfig,
) -> Result<Rows<'f, M>> {
    let schema = extract_schema::<M>()?;
    conversion::deserialize(frame, &schema, backend, config)
}
