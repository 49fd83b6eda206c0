//! Procedural macros for the schema-bridge crate
//!
//! `#[derive(Model)]` turns a struct with named fields into a typed model that
//! schema-bridge can extract a schema from, serialize and rebuild.
//! `#[derive(ModelEnum)]` turns a unit-only enum into a categorical field type.

use proc_macro::TokenStream;

mod model_derive;
mod model_enum;
mod utils;

/// Derive macro for typed models
///
/// Generates `Model` (field declarations, accessor, constructor) and
/// `FieldValue`, so the model can also be nested inside other models, as an
/// element of a `Vec` or behind `Option`/`Box`.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Model)]
/// #[model(name = "person")]
/// struct Person {
///     id: i64,
///
///     #[model(rename = "full_name")]
///     name: Option<String>,
///
///     home: Option<Address>,
///
///     #[model(skip)]
///     cached_score: f64,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model_derive::process_derive_model(input)
}

/// Derive macro for categorical enums
///
/// Each unit variant becomes one enum value, named after the variant unless
/// renamed.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(ModelEnum)]
/// enum Color {
///     Red,
///     #[model(rename = "GREEN")]
///     Green,
/// }
/// ```
#[proc_macro_derive(ModelEnum, attributes(model))]
pub fn derive_model_enum(input: TokenStream) -> TokenStream {
    model_enum::process_derive_model_enum(input)
}
