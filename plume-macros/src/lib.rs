#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Field, Fields, Ident, LitStr, Type, parse_macro_input};

/// Derive `plume::Record`, `plume::Codec` and `plume::Embed` for a struct
/// with named fields.
#[proc_macro_derive(Record, attributes(plume))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Parsed `#[plume(...)]` field attributes.
#[derive(Default)]
struct FieldAttrs {
    rename: Option<LitStr>,
    omit_empty: bool,
    string: bool,
    flatten: bool,
    skip: bool,
}

impl FieldAttrs {
    fn parse(field: &Field) -> syn::Result<Self> {
        let mut attrs = Self::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("plume")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    attrs.rename = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("omit_empty") {
                    attrs.omit_empty = true;
                } else if meta.path.is_ident("string") {
                    attrs.string = true;
                } else if meta.path.is_ident("flatten") {
                    attrs.flatten = true;
                } else if meta.path.is_ident("skip") {
                    attrs.skip = true;
                } else {
                    return Err(meta.error("unknown plume attribute"));
                }
                Ok(())
            })?;
        }

        if attrs.flatten && (attrs.rename.is_some() || attrs.omit_empty || attrs.string) {
            return Err(syn::Error::new(
                field.span(),
                "`flatten` cannot be combined with `rename`, `omit_empty` or `string`",
            ));
        }
        if let Some(rename) = &attrs.rename
            && rename.value().is_empty()
        {
            return Err(syn::Error::new(rename.span(), "wire key cannot be empty"));
        }
        Ok(attrs)
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "#[derive(Record)] does not support generic structs",
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new(
                    name.span(),
                    "#[derive(Record)] requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "#[derive(Record)] can only be used on structs",
            ));
        }
    };

    let mut entries = Vec::new();
    for field in fields {
        let attrs = FieldAttrs::parse(field)?;
        if attrs.skip {
            continue;
        }
        // named fields always have an ident
        let Some(ident) = &field.ident else { continue };
        entries.push(field_entry(name, ident, &field.ty, &attrs));
    }

    let name_str = name.to_string();
    Ok(quote! {
        #[automatically_derived]
        impl ::plume::Record for #name {
            const NAME: &'static str = #name_str;

            fn shape() -> ::plume::RecordShape<Self> {
                ::plume::RecordShape::new()
                    #(.field(#entries))*
            }

            fn plan() -> &'static ::plume::RecordPlan<Self> {
                static PLAN: ::std::sync::OnceLock<::plume::RecordPlan<#name>> =
                    ::std::sync::OnceLock::new();
                ::plume::init_plan(&PLAN)
            }
        }

        #[automatically_derived]
        impl ::plume::Codec for #name {
            fn decode(
                &mut self,
                buf: &[u8],
                cursor: usize,
                cx: ::plume::DecodeContext,
            ) -> ::plume::Result<usize> {
                ::plume::decode_record(self, buf, cursor, cx)
            }

            fn decode_stream(
                &mut self,
                stream: &mut ::plume::Stream<'_>,
                cx: ::plume::DecodeContext,
            ) -> ::plume::Result<()> {
                ::plume::decode_record_from_stream(self, stream, cx)
            }

            fn encode(&self, enc: &mut ::plume::Encoder<'_>, _quoted: bool) {
                ::plume::encode_record(self, enc)
            }
        }

        #[automatically_derived]
        impl ::plume::Embed for #name {
            type Target = Self;
            const INDIRECT: bool = false;

            fn embedded(&self) -> ::core::option::Option<&Self> {
                ::core::option::Option::Some(self)
            }

            fn embedded_mut(&mut self) -> &mut Self {
                self
            }
        }
    })
}

/// One `FieldShape` constructor call.
fn field_entry(record: &Ident, ident: &Ident, ty: &Type, attrs: &FieldAttrs) -> TokenStream2 {
    let wire_name = ident.to_string();
    let wire_name = wire_name.strip_prefix("r#").unwrap_or(&wire_name);
    let accessors = quote! {
        {
            fn get(record: &#record) -> &#ty {
                &record.#ident
            }
            get
        },
        {
            fn get_mut(record: &mut #record) -> &mut #ty {
                &mut record.#ident
            }
            get_mut
        }
    };
    let offset = quote! { ::core::mem::offset_of!(#record, #ident) };

    if attrs.flatten {
        return quote! {
            ::plume::FieldShape::flatten::<#ty>(#wire_name, #offset, #accessors)
        };
    }

    let mut options = quote! { ::plume::WireOptions::new() };
    if let Some(rename) = &attrs.rename {
        options = quote! { #options.rename(#rename) };
    }
    if attrs.omit_empty {
        options = quote! { #options.omit_empty() };
    }
    if attrs.string {
        options = quote! { #options.quoted() };
    }
    quote! {
        ::plume::FieldShape::value::<#ty>(#wire_name, #offset, #options, #accessors)
    }
}
