//! Utility functions for procedural macros

use proc_macro2::TokenStream;
use quote::quote;

/// Path of the runtime crate in generated code
pub fn crate_path() -> TokenStream {
    quote! { ::schema_bridge }
}

/// Column or variant name: the explicit rename, else the identifier without a
/// raw-identifier prefix
pub fn column_name(ident: &syn::Ident, rename: Option<&str>) -> String {
    rename.map_or_else(
        || {
            let name = ident.to_string();
            name.strip_prefix("r#").map_or_else(|| name.clone(), str::to_string)
        },
        str::to_string,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_name() {
        let ident: syn::Ident = syn::parse_str("full_name").unwrap();
        assert_eq!(column_name(&ident, None), "full_name");
        assert_eq!(column_name(&ident, Some("name")), "name");

        let raw: syn::Ident = syn::parse_str("r#type").unwrap();
        assert_eq!(column_name(&raw, None), "type");
    }
}
