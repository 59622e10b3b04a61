//! Procedural macros for entity-dispatch

use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for #[derive(Entity)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(entity), supports(struct_named))]
struct EntityOpts {
    ident: syn::Ident,
    generics: syn::Generics,
    data: darling::ast::Data<(), EntityField>,

    /// Store name, defaults to the snake_case type name
    #[darling(default)]
    name: Option<String>,

    /// Payload of create/update, defaults to `Self`
    #[darling(default)]
    input: Option<syn::Path>,
}

/// Field-level attributes
#[derive(Debug, FromField)]
#[darling(attributes(entity))]
struct EntityField {
    ident: Option<syn::Ident>,

    /// Marks the identifier field
    #[darling(default)]
    id: bool,
}

/// Convert a PascalCase type name to snake_case
fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Derive macro for the Entity trait
///
/// The id is the field marked `#[entity(id)]`, or the field named `id`.
/// Its type must implement `AsRef<str>` (`String`, `Box<str>`, `Arc<str>`).
///
/// # Attributes
///
/// - `#[entity(name = "pregnancy")]`: store name (default: snake_case type name)
/// - `#[entity(input = PregnancyInput)]`: create/update payload (default: `Self`)
/// - `#[entity(id)]` on a field: use it as the identifier
///
/// # Example
/// ```ignore
/// #[derive(Entity, Clone, Debug, PartialEq)]
/// #[entity(name = "patient", input = PatientInput)]
/// struct Patient {
///     #[entity(id)]
///     uuid: String,
///     last_name: String,
/// }
///
/// assert_eq!(Patient::NAME, "patient");
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match EntityOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let ident = &opts.ident;

    let fields = match &opts.data {
        darling::ast::Data::Struct(fields) => &fields.fields,
        _ => {
            return syn::Error::new_spanned(&input, "Entity can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let marked: Vec<&EntityField> = fields.iter().filter(|f| f.id).collect();
    let id_field = match marked.as_slice() {
        [field] => field.ident.clone(),
        [] => fields
            .iter()
            .filter_map(|f| f.ident.clone())
            .find(|name| name == "id"),
        _ => {
            return syn::Error::new_spanned(&input, "only one field can be marked #[entity(id)]")
                .to_compile_error()
                .into();
        }
    };
    let Some(id_field) = id_field else {
        return syn::Error::new_spanned(
            &input,
            "Entity needs a field named `id` or a field marked #[entity(id)]",
        )
        .to_compile_error()
        .into();
    };

    let name = opts
        .name
        .clone()
        .unwrap_or_else(|| to_snake_case(&ident.to_string()));
    let input_ty = match &opts.input {
        Some(path) => quote! { #path },
        None => quote! { Self },
    };
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::entity_dispatch::Entity for #ident #ty_generics #where_clause {
            type Input = #input_ty;

            const NAME: &'static str = #name;

            fn id(&self) -> &str {
                ::core::convert::AsRef::<str>::as_ref(&self.#id_field)
            }
        }
    };

    TokenStream::from(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("Patient"), "patient");
        assert_eq!(to_snake_case("MedicalAntecedent"), "medical_antecedent");
        assert_eq!(to_snake_case("Centre"), "centre");
    }
}
