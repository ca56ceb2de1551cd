use proc_macro::{self, TokenStream};
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

///
/// A derive macro which implements TryFrom<u8> for a fieldless enum.
///
/// Each variant is matched against its own discriminant, so enums with
/// explicit (and non-contiguous) discriminants decode correctly.
///
/// usage:
/// ```rust
/// #[derive(TryFromByte)]
/// #[repr(u8)]
/// ```
///
#[proc_macro_derive(TryFromByte)]
pub fn try_from_byte(input: TokenStream) -> TokenStream {
    // parse the code into DeriveInput
    let DeriveInput { ident, data, .. } = parse_macro_input!(input);
    let variants = match data {
        Data::Enum(enum_item) => enum_item.variants,
        _ => panic!("TryFromByte only works on Enums"),
    };
    let arms = variants.iter().map(|variant| {
        if !matches!(variant.fields, Fields::Unit) {
            panic!("TryFromByte only works on fieldless variants");
        }
        let name = &variant.ident;
        quote! {
            x if x == #ident::#name as u8 => Ok(#ident::#name),
        }
    });
    let error_message = format!("invalid {} value", ident);
    let output = quote! {
        impl ::std::convert::TryFrom<u8> for #ident {
            type Error = &'static str;
            fn try_from(x: u8) -> ::std::result::Result<Self, Self::Error> {
                match x {
                    #(#arms)*
                    _ => Err(#error_message),
                }
            }
        }
    };
    output.into()
}
