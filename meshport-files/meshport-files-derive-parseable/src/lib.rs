extern crate proc_macro2;

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{Data, DeriveInput, Field, Fields, Ident, parse_macro_input, punctuated::Punctuated, spanned::Spanned, token::Comma};

/// Reads every named field in declaration order through its own `Parseable` impl.
#[proc_macro_derive(Parse)]
pub fn derive_parseable(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    derive_parse_internal(input).into()
}

/// Writes every named field in declaration order through its own `Emittable` impl.
/// Together with `Parse`, this keeps the byte layout of a record defined in exactly one place.
#[proc_macro_derive(Emit)]
pub fn derive_emittable(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    derive_emit_internal(input).into()
}

fn files_crate() -> TokenStream {
    let found_crate = crate_name("meshport-files").expect("meshport-files is present in `Cargo.toml`");

    match found_crate {
        FoundCrate::Itself => quote!(crate),
        FoundCrate::Name(name) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(#ident)
        }
    }
}

fn named_fields<'a>(data: &'a Data, ident: &Ident, derive: &str) -> &'a Punctuated<Field, Comma> {
    match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(ref fields) => &fields.named,
            _ => panic!(
                "`#[derive({})]` only supports named struct fields at the moment: {}",
                derive, ident
            ),
        },
        _ => panic!("`#[derive({})]` is only available on structs: {}", derive, ident),
    }
}

// taken from sharnoff/derive-syn-parse: put it into a separate function for testability
pub(crate) fn derive_parse_internal(input: DeriveInput) -> TokenStream {
    let crate_name = files_crate();
    let ident = input.ident;

    // Fully qualified calls, so that the deriving module neither needs `Read` nor `Parseable` in scope.
    let recurse = named_fields(&input.data, &ident, "Parse").iter().map(|f| {
        let name = &f.ident;
        let ftype = &f.ty;
        quote_spanned! {f.span()=>
            #name: <#ftype as #crate_name::common::reader::Parseable<#ftype>>::parse(rdr)?,
        }
    });

    quote!(
        impl #crate_name::common::reader::Parseable<#ident> for #ident {
            fn parse<R: ::std::io::Read>(rdr: &mut R) -> ::std::result::Result<#ident, #crate_name::ParserError> {
                Ok(#ident {
                    #(#recurse)*
                })
            }
        }
    )
}

pub(crate) fn derive_emit_internal(input: DeriveInput) -> TokenStream {
    let crate_name = files_crate();
    let ident = input.ident;

    let recurse = named_fields(&input.data, &ident, "Emit").iter().map(|f| {
        let name = &f.ident;
        quote_spanned! {f.span()=>
            #crate_name::common::writer::Emittable::emit(&self.#name, wtr)?;
        }
    });

    quote!(
        impl #crate_name::common::writer::Emittable for #ident {
            fn emit<W: ::std::io::Write>(&self, wtr: &mut W) -> ::std::result::Result<(), #crate_name::ParserError> {
                #(#recurse)*
                Ok(())
            }
        }
    )
}
