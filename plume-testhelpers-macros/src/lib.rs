use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, parse_macro_input};

/// Test attribute macro that sets up tracing before running the test.
///
/// # Usage
///
/// ```ignore
/// use plume_testhelpers::test;
///
/// #[test]
/// fn my_test() {
///     // tracing is set up automatically
/// }
/// ```
///
/// A different test attribute can be passed through:
///
/// ```ignore
/// #[plume_testhelpers::test(some_runtime::test)]
/// fn my_other_test() {}
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    let test_attr = if attr.is_empty() {
        quote! { #[::core::prelude::rust_2024::test] }
    } else {
        let attr = proc_macro2::TokenStream::from(attr);
        quote! { #[#attr] }
    };

    quote! {
        #test_attr
        #(#attrs)*
        #vis #sig {
            ::plume_testhelpers::setup();

            #block
        }
    }
    .into()
}
