use crate::attrs::{Container, FieldAttrs, VariantAttrs};
use proc_macro2::TokenStream;
use proc_macro_error::abort;
use quote::{quote, TokenStreamExt};
use std::collections::HashSet;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{DataEnum, DataStruct, Fields, Ident, Index, Member, Type};

pub fn process_struct(ident: &Ident, container: &Container, ds: &DataStruct) -> TokenStream {
    let krate = container.krate();
    let mut base: Option<(Member, &Type)> = None;
    let mut names = HashSet::new();
    let mut declared = quote!();
    let mut snapshot = quote!();
    let mut arms = quote!();

    for (idx, f) in ds.fields.iter().enumerate() {
        let attrs = FieldAttrs::parse(&f.attrs);
        if attrs.skip {
            continue;
        }
        let member = match &f.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(idx)),
        };
        let ty = &f.ty;
        if attrs.base {
            if base.is_some() {
                abort!(f.span(), "Only one base field is supported");
            }
            base = Some((member, ty));
            continue;
        }
        let name = attrs.rename.unwrap_or_else(|| match &f.ident {
            Some(ident) => ident.unraw().to_string(),
            None => idx.to_string(),
        });
        if !names.insert(name.clone()) {
            abort!(f.span(), "Field name '{}' is used twice", name);
        }
        let optional = if attrs.default {
            quote!(.optional())
        } else {
            quote!()
        };

        declared.append_all(quote!(
            out.push(
                #krate::FieldInfo::new(
                    #name,
                    <#ty as #krate::Field>::field_type(),
                )#optional
            );
        ));
        snapshot.append_all(quote!(
            out.push(#krate::FieldContext::new(
                #name,
                #krate::Field::to_field_value(&self.#member),
            ));
        ));
        arms.append_all(quote!(
            #name => match <#ty as #krate::Field>::from_field_value(value) {
                ::std::result::Result::Ok(v) => {
                    self.#member = v;
                    #krate::Assign::Done
                }
                ::std::result::Result::Err(v) => #krate::Assign::Incompatible(v),
            },
        ));
    }

    // Base fields go first, the way a superclass precedes its subclass.
    let (base_declared, base_snapshot, fallback) = match base {
        Some((member, ty)) => (
            quote!(<#ty as #krate::Reflect>::declared_fields(out);),
            quote!(#krate::Reflect::snapshot(&self.#member, out);),
            quote!(_ => #krate::Reflect::assign(&mut self.#member, name, value),),
        ),
        None => (
            quote!(),
            quote!(),
            quote!(_ => #krate::Assign::Unknown(value),),
        ),
    };

    let class = if container.no_default {
        quote!(#krate::Class::without_constructor::<Self>())
    } else {
        quote!(#krate::Class::of::<Self>())
    };

    let mut ts = quote!(
        #[allow(unused_variables)]
        impl #krate::Reflect for #ident {
            fn type_class() -> #krate::Class {
                #class
            }

            fn declared_fields(out: &mut ::std::vec::Vec<#krate::FieldInfo>) {
                #base_declared
                #declared
            }

            fn class(&self) -> #krate::Class {
                <Self as #krate::Reflect>::type_class()
            }

            fn snapshot(&self, out: &mut ::std::vec::Vec<#krate::FieldContext>) {
                #base_snapshot
                #snapshot
            }

            fn assign(
                &mut self,
                name: &str,
                value: #krate::FieldValue,
            ) -> #krate::Assign {
                match name {
                    #arms
                    #fallback
                }
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn as_serializable_mut(&mut self) -> &mut dyn #krate::Serializable {
                self
            }
        }
    );

    if !container.extended {
        ts.append_all(quote!(
            impl #krate::Serializable for #ident {}
        ));
    }

    if container.value {
        ts.append_all(quote!(
            impl #krate::Field for #ident {
                fn field_type() -> #krate::Type {
                    #krate::Type::Named(<Self as #krate::Reflect>::type_class())
                }

                fn to_value(&self) -> #krate::Value {
                    #krate::Value::Object(#krate::Handle::new(
                        ::std::clone::Clone::clone(self),
                    ))
                }

                fn from_value(
                    value: #krate::Value,
                ) -> ::std::result::Result<Self, #krate::Value> {
                    #krate::field::object_from_value(value)
                }
            }
        ));
    }

    ts
}

pub fn process_enum(ident: &Ident, container: &Container, de: &DataEnum) -> TokenStream {
    if container.has_struct_attrs() {
        abort!(ident.span(), "Container attributes are only supported on structs");
    }
    let krate = container.krate();
    if de.variants.is_empty() {
        abort!(ident.span(), "Enums without variants are not supported");
    }

    let mut seen = HashSet::new();
    let mut names = quote!();
    let mut lookups = quote!();
    let mut values = Vec::new();

    for variant in de.variants.iter() {
        if !matches!(variant.fields, Fields::Unit) {
            abort!(variant.span(), "Only fieldless enums are supported");
        }
        let attrs = VariantAttrs::parse(&variant.attrs);
        let var = &variant.ident;
        let name = attrs
            .rename
            .unwrap_or_else(|| var.unraw().to_string());
        for n in std::iter::once(&name).chain(attrs.aliases.iter()) {
            if !seen.insert(n.clone()) {
                abort!(variant.span(), "Constant name '{}' is used twice", n);
            }
        }
        let aliases = &attrs.aliases;

        names.append_all(quote!(
            #ident::#var => #name,
        ));
        lookups.append_all(quote!(
            #name #(| #aliases)* => ::std::option::Option::Some(#ident::#var),
        ));
        values.push(quote!(#ident::#var));
    }

    quote!(
        impl #krate::Enumeration for #ident {
            fn name(&self) -> &'static str {
                match self {
                    #names
                }
            }

            fn from_name(name: &str) -> ::std::option::Option<Self> {
                match name {
                    #lookups
                    _ => ::std::option::Option::None,
                }
            }

            fn values() -> &'static [Self] {
                &[#(#values),*]
            }
        }

        impl #krate::Field for #ident {
            fn field_type() -> #krate::Type {
                #krate::Type::Named(#krate::Class::enumeration::<Self>())
            }

            fn to_value(&self) -> #krate::Value {
                #krate::Value::Enum(#krate::EnumValue::of(self))
            }

            fn from_value(
                value: #krate::Value,
            ) -> ::std::result::Result<Self, #krate::Value> {
                #krate::field::enum_from_value(value)
            }
        }
    )
}
