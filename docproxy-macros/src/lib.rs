//! Procedural macros for the docproxy project.
//!
//! `#[derive(Model)]` binds a struct to a collection and generates a trait of
//! typed field accessors for its records. The struct's fields describe the
//! stored document; the struct itself is never instantiated by the library.
//!
//! ```ignore
//! #[derive(Model)]
//! #[model(collection = "widgets")]
//! pub struct Widget {
//!     pub color: String,
//!     #[model(rename = "qty")]
//!     pub count: i64,
//!     #[model(skip)]
//!     pub scratch: (),
//! }
//! ```
//!
//! generates `impl Model for Widget` and a `WidgetFields` trait, implemented for
//! `TypedRecord<'_, B, Widget>`, with `color()`, `set_color(..)`, `count()` and
//! `set_count(..)`. Getters deserialize the stored value and setters serialize
//! their argument, so field types must implement `Serialize`, `DeserializeOwned`,
//! `Send` and `Sync`. The collection name defaults to the snake-cased type name.

#[allow(unused_extern_crates)]
extern crate self as docproxy_macros;

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_model(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct FieldAccessor {
    ident: syn::Ident,
    stored_name: String,
    ty: syn::Type,
}

/// Methods reachable on a typed record that generated accessors must not shadow.
const RECORD_METHODS: [&str; 13] = [
    "id", "collection", "get", "get_as", "set", "set_as", "set_fields", "push", "inc",
    "inc_by", "typed", "into_inner", "clone",
];

fn expand_model(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let vis = &input.vis;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic types",
        ));
    }

    let collection = collection_name(input)?;
    let accessors = field_accessors(input)?;
    let fields_trait = format_ident!("{}Fields", ident);
    let trait_doc = format!("Typed field accessors for records of [`{ident}`].");

    let signatures = accessors.iter().map(|FieldAccessor { ident, ty, .. }| {
        let setter = format_ident!("set_{}", ident);

        quote! {
            fn #ident(&self) -> impl ::core::future::Future<
                Output = ::docproxy::error::DocumentStoreResult<::core::option::Option<#ty>>
            > + Send;

            fn #setter(&self, value: #ty) -> impl ::core::future::Future<
                Output = ::docproxy::error::DocumentStoreResult<()>
            > + Send;
        }
    });

    let implementations = accessors.iter().map(|FieldAccessor { ident, stored_name, ty }| {
        let setter = format_ident!("set_{}", ident);

        quote! {
            fn #ident(&self) -> impl ::core::future::Future<
                Output = ::docproxy::error::DocumentStoreResult<::core::option::Option<#ty>>
            > + Send {
                async move { self.get_as::<#ty>(#stored_name).await }
            }

            fn #setter(&self, value: #ty) -> impl ::core::future::Future<
                Output = ::docproxy::error::DocumentStoreResult<()>
            > + Send {
                async move { self.set_as(#stored_name, &value).await }
            }
        }
    });

    Ok(quote! {
        impl ::docproxy::model::Model for #ident {
            fn collection_name() -> &'static str {
                #collection
            }
        }

        #[doc = #trait_doc]
        #vis trait #fields_trait {
            #(#signatures)*
        }

        impl<'a, B> #fields_trait for ::docproxy::record::TypedRecord<'a, B, #ident>
        where
            B: ::docproxy::backend::StoreBackend,
        {
            #(#implementations)*
        }
    })
}

fn collection_name(input: &DeriveInput) -> syn::Result<String> {
    let mut collection = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let name: LitStr = meta.value()?.parse()?;
                if name.value().is_empty() {
                    return Err(meta.error("collection name must not be empty"));
                }
                collection = Some(name.value());
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;
    }

    Ok(collection.unwrap_or_else(|| to_snake_case(&input.ident.to_string())))
}

fn field_accessors(input: &DeriveInput) -> syn::Result<Vec<FieldAccessor>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => return Ok(Vec::new()),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                Span::call_site(),
                "Model can only be derived for structs",
            ));
        }
    };

    let mut accessors = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };

        let mut stored_name = ident.to_string().trim_start_matches("r#").to_string();
        let mut skip = false;

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let name: LitStr = meta.value()?.parse()?;
                    stored_name = name.value();
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `rename = \"...\"` or `skip`"))
                }
            })?;
        }

        if skip {
            continue;
        }

        let accessor = ident.to_string().trim_start_matches("r#").to_string();
        let setter = format!("set_{accessor}");
        if RECORD_METHODS.contains(&accessor.as_str()) || RECORD_METHODS.contains(&setter.as_str()) {
            return Err(syn::Error::new_spanned(
                &ident,
                format!("`{accessor}` would shadow a record method; rename the field and use `#[model(rename = \"{stored_name}\")]`"),
            ));
        }

        if stored_name == "_id" || stored_name.is_empty() || stored_name.starts_with('$') || stored_name.contains('.') {
            return Err(syn::Error::new_spanned(
                &ident,
                format!("`{stored_name}` cannot be used as a stored field name"),
            ));
        }

        accessors.push(FieldAccessor {
            ident,
            stored_name,
            ty: field.ty.clone(),
        });
    }

    Ok(accessors)
}

fn to_snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);

    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                snake.push('_');
            }
            snake.extend(ch.to_lowercase());
        } else {
            snake.push(ch);
        }
    }

    snake
}
