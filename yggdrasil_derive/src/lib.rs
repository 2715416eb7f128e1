mod attrs;
mod reflect;

use proc_macro::TokenStream;
use proc_macro_error::{abort, proc_macro_error};
use syn::spanned::Spanned;
use syn::{parse_macro_input, Data, DeriveInput};

/// Makes a struct serializable as an object node, or a fieldless enum as an enum node.
///
/// Container attributes: `#[yggdrasil(extended)]`, `#[yggdrasil(no_default)]`,
/// `#[yggdrasil(value)]`. `#[yggdrasil(crate = "...")]` names the runtime crate when it is not
/// reachable as `::yggdrasil`, for example from code that only depends on `yggdrasil_base`.
/// Field attributes: `skip`, `base`, `default`, `rename = "..."`.
/// Variant attributes: `rename = "..."`, `alias = "..."`.
#[proc_macro_derive(Yggdrasil, attributes(yggdrasil))]
#[proc_macro_error]
pub fn yggdrasil_fn(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    if input.generics.lt_token.is_some() {
        abort!(input.generics.span(), "Generics are not supported");
    }
    let container = attrs::Container::parse(&input.attrs);

    let ts = match &input.data {
        Data::Struct(ds) => reflect::process_struct(&input.ident, &container, ds),
        Data::Enum(de) => reflect::process_enum(&input.ident, &container, de),
        Data::Union(_) => {
            abort!(input.span(), "Unions are not supported");
        }
    };
    ts.into()
}
