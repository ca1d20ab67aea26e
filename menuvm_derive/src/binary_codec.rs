//! Derive macro for the persisted-state binary codec.
//!
//! Generates `Encode` and `Decode` implementations against
//! `crate::types::encoding` for structs and enums.
//!
//! # Binary Format
//!
//! - Struct fields: encoded in declaration order, no framing
//! - Enums: a `u8` discriminant followed by the variant's fields
//!
//! # Example
//!
//! ```ignore
//! use menuvm_derive::BinaryCodec;
//!
//! #[derive(BinaryCodec)]
//! pub struct Snapshot {
//!     pub moves: u32,
//!     pub exec_path: Vec<String>,
//! }
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Fields, parse_macro_input};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => struct_bodies(&data.fields),
        Data::Enum(data) => match enum_bodies(data) {
            Ok(bodies) => bodies,
            Err(err) => return err.to_compile_error().into(),
        },
        Data::Union(_) => {
            return syn::Error::new_spanned(&input, "BinaryCodec derive does not support unions")
                .to_compile_error()
                .into();
        }
    };

    TokenStream::from(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

fn struct_bodies(fields: &Fields) -> (proc_macro2::TokenStream, proc_macro2::TokenStream) {
    match fields {
        Fields::Named(named) => {
            let names: Vec<_> = named.named.iter().map(|f| &f.ident).collect();
            (
                quote! { #( crate::types::encoding::Encode::encode(&self.#names, out); )* },
                quote! {
                    Ok(Self { #( #names: crate::types::encoding::Decode::decode(input)?, )* })
                },
            )
        }
        Fields::Unnamed(unnamed) => {
            let indices: Vec<_> = (0..unnamed.unnamed.len()).map(syn::Index::from).collect();
            let decodes = indices
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)? });
            (
                quote! { #( crate::types::encoding::Encode::encode(&self.#indices, out); )* },
                quote! { Ok(Self( #(#decodes),* )) },
            )
        }
        Fields::Unit => (quote! {}, quote! { Ok(Self) }),
    }
}

fn enum_bodies(
    data: &DataEnum,
) -> syn::Result<(proc_macro2::TokenStream, proc_macro2::TokenStream)> {
    let tags = discriminants(data)?;
    let mut encode_arms = Vec::with_capacity(tags.len());
    let mut decode_arms = Vec::with_capacity(tags.len());

    for (variant, tag) in data.variants.iter().zip(tags) {
        let ident = &variant.ident;
        match &variant.fields {
            Fields::Unit => {
                encode_arms.push(quote! {
                    Self::#ident => crate::types::encoding::Encode::encode(&#tag, out),
                });
                decode_arms.push(quote! { #tag => Ok(Self::#ident), });
            }
            Fields::Unnamed(fields) => {
                let binds: Vec<_> = (0..fields.unnamed.len())
                    .map(|i| format_ident!("f{}", i))
                    .collect();
                let decodes = binds
                    .iter()
                    .map(|_| quote! { crate::types::encoding::Decode::decode(input)? });
                encode_arms.push(quote! {
                    Self::#ident(#(#binds),*) => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #( crate::types::encoding::Encode::encode(#binds, out); )*
                    }
                });
                decode_arms.push(quote! { #tag => Ok(Self::#ident(#(#decodes),*)), });
            }
            Fields::Named(fields) => {
                let names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                encode_arms.push(quote! {
                    Self::#ident { #(#names),* } => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #( crate::types::encoding::Encode::encode(#names, out); )*
                    }
                });
                decode_arms.push(quote! {
                    #tag => Ok(Self::#ident {
                        #( #names: crate::types::encoding::Decode::decode(input)?, )*
                    }),
                });
            }
        }
    }

    Ok((
        quote! { match self { #(#encode_arms)* } },
        quote! {
            let tag: u8 = crate::types::encoding::Decode::decode(input)?;
            match tag {
                #(#decode_arms)*
                _ => Err(crate::types::encoding::DecodeError::InvalidValue),
            }
        },
    ))
}

/// Resolves each variant's `u8` tag: explicit `= N` literals win, otherwise
/// the previous tag plus one.
fn discriminants(data: &DataEnum) -> syn::Result<Vec<u8>> {
    let mut tags = Vec::with_capacity(data.variants.len());
    let mut next: u16 = 0;

    for variant in &data.variants {
        let tag = match &variant.discriminant {
            Some((_, syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Int(lit),
                ..
            }))) => lit.base10_parse::<u8>()?,
            Some((_, expr)) => {
                return Err(syn::Error::new_spanned(
                    expr,
                    "discriminant must be an integer literal",
                ));
            }
            None => u8::try_from(next).map_err(|_| {
                syn::Error::new_spanned(variant, "too many variants for a u8 tag")
            })?,
        };
        tags.push(tag);
        next = u16::from(tag) + 1;
    }

    Ok(tags)
}
