use proc_macro::TokenStream;

use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, parse_macro_input};

fn make_error(ident: &Ident, msg: &str) -> TokenStream {
    syn::Error::new_spanned(ident, msg).to_compile_error().into()
}

/// Derives `DvSerialize`/`DvDeserialize` for a fixed-layout struct by
/// (de)serializing each field in declaration order. Every field type must
/// itself implement `DvSerialize`/`DvDeserialize` — the primitives and
/// fixed arrays in `dvida_serialize::numbers` cover the on-disk structs
/// this crate needs.
#[proc_macro_derive(DvDeSer)]
pub fn derive_dv_deser(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident,
        generics,
        data,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let data_struct = match data {
        Data::Struct(data_struct) => data_struct,
        _ => return make_error(&ident, "DvDeSer can only be derived for structs"),
    };

    let fields = match data_struct.fields {
        Fields::Named(named) => named.named,
        _ => return make_error(&ident, "DvDeSer requires named fields"),
    };

    let field_idents: Vec<&Ident> = fields
        .iter()
        .map(|f| f.ident.as_ref().expect("named field"))
        .collect();

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let serialize_fields = field_idents.iter().map(|name| {
        quote! {
            acc += self.#name.serialize(endianness, &mut target[acc..])?;
        }
    });

    let deserialize_fields = field_idents.iter().map(|name| {
        quote! {
            let (#name, read) = ::dvida_serialize::DvDeserialize::deserialize(endianness, &input[acc..])?;
            acc += read;
        }
    });

    let expanded = quote! {
        impl #impl_generics ::dvida_serialize::DvSerialize for #ident #ty_generics #where_clause {
            fn serialize(
                &self,
                endianness: ::dvida_serialize::Endianness,
                target: &mut [u8],
            ) -> ::core::result::Result<usize, ::dvida_serialize::DvSerErr> {
                let mut acc: usize = 0;
                #(#serialize_fields)*
                Ok(acc)
            }
        }

        impl #impl_generics ::dvida_serialize::DvDeserialize for #ident #ty_generics #where_clause {
            fn deserialize(
                endianness: ::dvida_serialize::Endianness,
                input: &[u8],
            ) -> ::core::result::Result<(Self, usize), ::dvida_serialize::DvDeErr> {
                let mut acc: usize = 0;
                #(#deserialize_fields)*
                Ok((
                    #ident {
                        #(#field_idents),*
                    },
                    acc,
                ))
            }
        }
    };

    expanded.into()
}
