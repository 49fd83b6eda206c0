//! Model derive macro implementation

use darling::{FromDeriveInput, FromField, ast};
use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

use crate::utils;

/// Receiver for the struct that derives `Model`
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(model), supports(struct_named))]
struct ModelReceiver {
    ident: syn::Ident,
    generics: syn::Generics,
    /// Model name from `#[model(name = "...")]`, defaults to the struct name
    #[darling(default)]
    name: Option<String>,
    data: ast::Data<(), ModelFieldReceiver>,
}

/// Receiver for the fields in the struct
#[derive(Debug, FromField)]
#[darling(attributes(model))]
struct ModelFieldReceiver {
    ident: Option<syn::Ident>,
    ty: syn::Type,
    /// Column name, defaults to the field name
    #[darling(default)]
    rename: Option<String>,
    /// Leave the field out of the schema; rebuilt with `Default::default()`
    #[darling(default)]
    skip: bool,
}

/// Process the Model derive macro
pub fn process_derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let receiver = match ModelReceiver::from_derive_input(&input) {
        Ok(receiver) => receiver,
        Err(err) => return err.write_errors().into(),
    };

    let ast::Data::Struct(fields) = &receiver.data else {
        unreachable!("Darling ensures this is a struct")
    };

    let model_name = receiver
        .name
        .clone()
        .unwrap_or_else(|| receiver.ident.to_string());

    TokenStream::from(generate_model_impl(&receiver, &model_name, fields))
}

fn generate_model_impl(
    receiver: &ModelReceiver,
    model_name: &str,
    fields: &ast::Fields<ModelFieldReceiver>,
) -> proc_macro2::TokenStream {
    let struct_name = &receiver.ident;
    let (impl_generics, ty_generics, where_clause) = receiver.generics.split_for_impl();
    let krate = utils::crate_path();

    let mut declarations = Vec::new();
    let mut accessors = Vec::new();
    let mut members = Vec::new();
    let mut constructors = Vec::new();

    for field in fields.iter() {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if field.skip {
            constructors.push(quote! { #ident: ::core::default::Default::default() });
            continue;
        }

        let ty = &field.ty;
        let column = utils::column_name(ident, field.rename.as_deref());

        declarations.push(quote! {
            .field(#krate::DeclaredField::of::<#ty>(#column))
        });
        accessors.push(quote! {
            #column => ::core::option::Option::Some(#krate::FieldValue::to_value(&self.#ident))
        });
        members.push(quote! {
            (::std::string::String::from(#column), #krate::FieldValue::to_value(&self.#ident))
        });
        constructors.push(quote! {
            #ident: <#ty as #krate::FieldValue>::from_value(record.take(#column))
                .map_err(|err| err.in_field(#column))?
        });
    }

    quote! {
        impl #impl_generics #krate::Model for #struct_name #ty_generics #where_clause {
            fn definition() -> #krate::ModelDefinition {
                #krate::ModelDefinition::for_type::<Self>(#model_name)
                    #(#declarations)*
            }

            fn field_value(&self, name: &str) -> ::core::option::Option<#krate::Value> {
                match name {
                    #(#accessors,)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_mut, unused_variables)]
            fn from_record(
                mut record: #krate::Record,
            ) -> ::core::result::Result<Self, #krate::ValueError> {
                ::core::result::Result::Ok(Self {
                    #(#constructors,)*
                })
            }
        }

        impl #impl_generics #krate::FieldValue for #struct_name #ty_generics #where_clause {
            fn declared_type() -> #krate::DeclaredType {
                #krate::DeclaredType::Model(<Self as #krate::Model>::definition)
            }

            fn to_value(&self) -> #krate::Value {
                #krate::Value::Struct(::std::vec![#(#members),*])
            }

            fn from_value(value: #krate::Value) -> ::core::result::Result<Self, #krate::ValueError> {
                match value {
                    #krate::Value::Struct(members) => {
                        <Self as #krate::Model>::from_record(#krate::Record::from(members))
                    }
                    other => ::core::result::Result::Err(#krate::ValueError::unexpected(#model_name, &other)),
                }
            }
        }
    }
}
