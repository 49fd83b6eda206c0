//! ModelEnum derive macro implementation

use darling::{FromDeriveInput, FromVariant, ast};
use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

use crate::utils;

/// Receiver for the enum that derives `ModelEnum`
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(model), supports(enum_unit))]
struct ModelEnumReceiver {
    ident: syn::Ident,
    data: ast::Data<ModelVariantReceiver, ()>,
}

/// Receiver for the variants in the enum
#[derive(Debug, FromVariant)]
#[darling(attributes(model))]
struct ModelVariantReceiver {
    ident: syn::Ident,
    /// Stored value, defaults to the variant name
    #[darling(default)]
    rename: Option<String>,
}

/// Process the ModelEnum derive macro
pub fn process_derive_model_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let receiver = match ModelEnumReceiver::from_derive_input(&input) {
        Ok(receiver) => receiver,
        Err(err) => return err.write_errors().into(),
    };

    let ast::Data::Enum(variants) = &receiver.data else {
        unreachable!("Darling ensures this is an enum")
    };

    let enum_name = &receiver.ident;
    let expected = enum_name.to_string();
    let krate = utils::crate_path();

    let idents: Vec<_> = variants.iter().map(|variant| &variant.ident).collect();
    let names: Vec<_> = variants
        .iter()
        .map(|variant| utils::column_name(&variant.ident, variant.rename.as_deref()))
        .collect();

    let expanded = quote! {
        impl #krate::FieldValue for #enum_name {
            fn declared_type() -> #krate::DeclaredType {
                #krate::DeclaredType::Enum(::std::vec![#(::std::string::String::from(#names)),*])
            }

            fn to_value(&self) -> #krate::Value {
                let name: &str = match *self {
                    #(Self::#idents => #names,)*
                };
                #krate::Value::Enum(::std::string::String::from(name))
            }

            fn from_value(value: #krate::Value) -> ::core::result::Result<Self, #krate::ValueError> {
                match value {
                    #krate::Value::Enum(name) | #krate::Value::Utf8(name) => match name.as_str() {
                        #(#names => ::core::result::Result::Ok(Self::#idents),)*
                        other => ::core::result::Result::Err(
                            #krate::ValueError::UnknownVariant(::std::string::String::from(other)),
                        ),
                    },
                    other => ::core::result::Result::Err(#krate::ValueError::unexpected(#expected, &other)),
                }
            }
        }
    };

    TokenStream::from(expanded)
}
