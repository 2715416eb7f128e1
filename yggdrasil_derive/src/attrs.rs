use proc_macro_error::abort;
use syn::meta::ParseNestedMeta;
use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use syn::{Attribute, LitStr, Path};

fn for_each_meta(attrs: &[Attribute], mut f: impl FnMut(ParseNestedMeta) -> syn::Result<()>) {
    for attr in attrs.iter().filter(|a| a.path().is_ident("yggdrasil")) {
        if let Err(e) = attr.parse_nested_meta(&mut f) {
            abort!(e.span(), "{}", e);
        }
    }
}

#[derive(Default)]
pub struct Container {
    /// The type implements `Serializable` by hand.
    pub extended: bool,
    pub no_default: bool,
    /// Also generate a by-value `Field` impl.
    pub value: bool,
    /// Path the generated code names the runtime by, `::yggdrasil` unless overridden.
    pub krate: Option<Path>,
}

impl Container {
    pub fn parse(attrs: &[Attribute]) -> Self {
        let mut container = Container::default();
        for_each_meta(attrs, |meta| {
            if meta.path.is_ident("extended") {
                container.extended = true;
            } else if meta.path.is_ident("no_default") {
                container.no_default = true;
            } else if meta.path.is_ident("value") {
                container.value = true;
            } else if meta.path.is_ident("crate") {
                let path: LitStr = meta.value()?.parse()?;
                container.krate = Some(path.parse()?);
            } else {
                return Err(meta.error("unsupported container attribute"));
            }
            Ok(())
        });
        container
    }

    pub fn has_struct_attrs(&self) -> bool {
        self.extended || self.no_default || self.value
    }

    pub fn krate(&self) -> TokenStream {
        match &self.krate {
            Some(path) => path.to_token_stream(),
            None => quote!(::yggdrasil),
        }
    }
}

#[derive(Default)]
pub struct FieldAttrs {
    pub skip: bool,
    pub base: bool,
    pub default: bool,
    pub rename: Option<String>,
}

impl FieldAttrs {
    pub fn parse(attrs: &[Attribute]) -> Self {
        let mut field = FieldAttrs::default();
        for_each_meta(attrs, |meta| {
            if meta.path.is_ident("skip") {
                field.skip = true;
            } else if meta.path.is_ident("base") {
                field.base = true;
            } else if meta.path.is_ident("default") {
                field.default = true;
            } else if meta.path.is_ident("rename") {
                let name: LitStr = meta.value()?.parse()?;
                field.rename = Some(name.value());
            } else {
                return Err(meta.error("unsupported field attribute"));
            }
            Ok(())
        });
        field
    }
}

#[derive(Default)]
pub struct VariantAttrs {
    pub rename: Option<String>,
    pub aliases: Vec<String>,
}

impl VariantAttrs {
    pub fn parse(attrs: &[Attribute]) -> Self {
        let mut variant = VariantAttrs::default();
        for_each_meta(attrs, |meta| {
            if meta.path.is_ident("rename") {
                let name: LitStr = meta.value()?.parse()?;
                variant.rename = Some(name.value());
            } else if meta.path.is_ident("alias") {
                let name: LitStr = meta.value()?.parse()?;
                variant.aliases.push(name.value());
            } else {
                return Err(meta.error("unsupported variant attribute"));
            }
            Ok(())
        });
        variant
    }
}
