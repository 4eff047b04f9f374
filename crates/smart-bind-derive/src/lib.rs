//! `#[derive(Bind)]` implementation.

extern crate proc_macro;

use proc_macro::TokenStream;
use syn::DeriveInput;

mod expand;
mod parse;

#[proc_macro_derive(Bind, attributes(bind))]
pub fn derive_bind(input: TokenStream) -> TokenStream {
    let input: DeriveInput = syn::parse_macro_input!(input as DeriveInput);
    let record = match parse::parse_record(&input) {
        Ok(record) => record,
        Err(err) => return err.into_compile_error().into(),
    };
    expand::expand(&record).into()
}
