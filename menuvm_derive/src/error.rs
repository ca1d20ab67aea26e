//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations,
//! plus `From` conversions for wrapped component errors.
//!
//! # Usage
//!
//! ```ignore
//! use menuvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum RunError {
//!     #[error("unknown node: {0}")]
//!     UnknownNode(String),
//!
//!     #[error("page {index} out of range ({pages} pages)")]
//!     Browse { index: usize, pages: usize },
//!
//!     #[error("{0}")]
//!     Cache(#[from] CacheError),
//! }
//! ```
//!
//! # Supported Features
//!
//! - Unit variants: `#[error("message")]`
//! - Tuple variants with positional args: `#[error("error: {0}")]`
//! - Struct variants with named args: `#[error("expected {expected}")]`
//! - `#[from]` on the only field of a tuple variant emits `impl From<Field>`

use proc_macro::TokenStream;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, Variant, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (display_body, conversions) = match &input.data {
        Data::Enum(data) => {
            let mut arms = Vec::with_capacity(data.variants.len());
            let mut conversions = Vec::new();
            for variant in &data.variants {
                arms.push(display_arm(variant)?);
                if let Some(conversion) = from_impl(name, variant)? {
                    conversions.push(conversion);
                }
            }
            (quote! { match self { #(#arms)* } }, conversions)
        }
        Data::Struct(data) => {
            let message = message_from_attrs(
                &input.attrs,
                &input.ident,
                &format!("type `{}`", input.ident),
            )?;
            let body = match &data.fields {
                Fields::Unit => quote! { write!(f, #message) },
                Fields::Named(fields) => {
                    let names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                    quote! { write!(f, #message, #(#names = self.#names),*) }
                }
                Fields::Unnamed(fields) => {
                    let count = fields.unnamed.len();
                    let idents: Vec<_> = (0..count).map(|i| format_ident!("f{}", i)).collect();
                    let indices: Vec<_> = (0..count).map(syn::Index::from).collect();
                    let message = positional_to_named(&message, count);
                    quote! { write!(f, #message, #(#idents = self.#indices),*) }
                }
            };
            (body, Vec::new())
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #display_body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}

        #(#conversions)*
    })
}

fn display_arm(variant: &Variant) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &variant.ident;
    let message = message_from_attrs(
        &variant.attrs,
        &variant.ident,
        &format!("variant `{}`", variant.ident),
    )?;

    Ok(match &variant.fields {
        Fields::Unit => quote! {
            Self::#ident => write!(f, #message),
        },
        Fields::Unnamed(fields) => {
            let count = fields.unnamed.len();
            let idents: Vec<_> = (0..count).map(|i| format_ident!("f{}", i)).collect();
            let message = positional_to_named(&message, count);
            quote! {
                Self::#ident(#(#idents),*) => write!(f, #message, #(#idents = #idents),*),
            }
        }
        Fields::Named(fields) => {
            let names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
            quote! {
                Self::#ident { #(#names),* } => write!(f, #message, #(#names = #names),*),
            }
        }
    })
}

/// Emits `impl From<T> for Enum` when the variant's single field carries `#[from]`.
fn from_impl(
    name: &syn::Ident,
    variant: &Variant,
) -> syn::Result<Option<proc_macro2::TokenStream>> {
    let Fields::Unnamed(fields) = &variant.fields else {
        return reject_from(variant);
    };
    let marked = fields
        .unnamed
        .iter()
        .filter(|f| f.attrs.iter().any(|a| a.path().is_ident("from")))
        .count();
    if marked == 0 {
        return Ok(None);
    }
    if fields.unnamed.len() != 1 {
        return Err(syn::Error::new_spanned(
            variant,
            "#[from] requires a variant with exactly one field",
        ));
    }

    let ident = &variant.ident;
    let ty = &fields.unnamed[0].ty;
    Ok(Some(quote! {
        impl ::std::convert::From<#ty> for #name {
            fn from(source: #ty) -> Self {
                Self::#ident(source)
            }
        }
    }))
}

fn reject_from(variant: &Variant) -> syn::Result<Option<proc_macro2::TokenStream>> {
    let has_from = variant
        .fields
        .iter()
        .any(|f| f.attrs.iter().any(|a| a.path().is_ident("from")));
    if has_from {
        return Err(syn::Error::new_spanned(
            variant,
            "#[from] is only supported on tuple variants",
        ));
    }
    Ok(None)
}

fn message_from_attrs<T: ToTokens>(
    attrs: &[syn::Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<String> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("error")) else {
        return Err(syn::Error::new_spanned(
            target,
            format!("missing #[error(\"...\")] attribute on {}", target_desc),
        ));
    };

    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")]",
        ));
    };

    match syn::parse2::<Lit>(list.tokens.clone()) {
        Ok(Lit::Str(lit)) => Ok(lit.value()),
        _ => Err(syn::Error::new_spanned(
            &attr.meta,
            "#[error] message must be a string literal, e.g. #[error(\"bad opcode: {0}\")]",
        )),
    }
}

/// Rewrites `{0}`, `{1}` into `{f0}`, `{f1}` so tuple fields bind by name.
fn positional_to_named(message: &str, field_count: usize) -> String {
    let mut out = message.to_string();
    for i in (0..field_count).rev() {
        out = out.replace(&format!("{{{}}}", i), &format!("{{f{}}}", i));
        out = out.replace(&format!("{{{}:", i), &format!("{{f{}:", i));
    }
    out
}
