//! Generates `BindRecord`/`BindFields` impls from a parsed [`BoundRecord`].

use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::{spanned::Spanned, Ident, Type};

use crate::parse::{BoundField, BoundRecord};

fn last_ident(ty: &Type) -> Option<&Ident> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|segment| &segment.ident),
        _ => None,
    }
}

/// Peels `Option<_>` and then `Box<_>`/`Option<Box<_>>`, returning `(is_option, is_boxed, leaf)`.
fn peel_wrappers(ty: &Type) -> (bool, bool, &Type) {
    let is_option = last_ident(ty).is_some_and(|ident| ident == "Option");
    let after_option = if is_option { BoundField::inner_type(ty).unwrap_or(ty) } else { ty };
    let is_boxed = last_ident(after_option).is_some_and(|ident| ident == "Box");
    let leaf = if is_boxed {
        BoundField::inner_type(after_option).unwrap_or(after_option)
    } else {
        after_option
    };
    (is_option, is_boxed, leaf)
}

fn tag_tokens(field: &BoundField) -> TokenStream {
    let entries = field.tags.iter().map(|tag| {
        let family_ident = format_ident!("{}", capitalize(tag.family));
        let primary = &tag.primary;
        let aliases = &tag.aliases;
        quote! {
            ::smart_bind::FieldTag {
                family: ::smart_bind::TagFamily::#family_ident,
                primary: #primary,
                aliases: &[#(#aliases),*],
            }
        }
    });
    quote!(&[#(#entries),*])
}

fn capitalize(family: &str) -> String {
    match family {
        "path" => "Path".to_owned(),
        "query" => "Query".to_owned(),
        "form" => "Form".to_owned(),
        "header" => "Header".to_owned(),
        "cookie" => "Cookie".to_owned(),
        "json" => "Json".to_owned(),
        "xml" => "Xml".to_owned(),
        "toml" => "Toml".to_owned(),
        "msgpack" => "MsgPack".to_owned(),
        "protobuf" => "Protobuf".to_owned(),
        other => other.to_owned(),
    }
}

fn field_shape_tokens(field: &BoundField) -> TokenStream {
    let name = field.ident.to_string();
    let ty = &field.ty;
    let type_name = quote!(#ty).to_string();
    let tags = tag_tokens(field);
    let kind_ident = format_ident!("{}", field.kind());
    let enum_values = match &field.enum_values {
        Some(values) => quote!(Some(&[#(#values),*])),
        None => quote!(None),
    };
    let (_, _, leaf) = peel_wrappers(&field.ty);
    let nested_shape = if field.nested {
        quote!(Some(<#leaf as ::smart_bind::BindRecord>::shape))
    } else {
        quote!(None)
    };
    let has_default = field.default.is_some();
    let required = field.required;

    quote! {
        ::smart_bind::FieldShape {
            name: #name,
            type_name: #type_name,
            tags: #tags,
            kind: ::smart_bind::FieldKind::#kind_ident,
            enum_values: #enum_values,
            nested_shape: #nested_shape,
            has_default: #has_default,
            required: #required,
        }
    }
}

fn empty_field_tokens(field: &BoundField) -> TokenStream {
    let ident = &field.ident;
    let span = ident.span();
    if let Some(default) = &field.default {
        quote_spanned!(span=> #ident: #default)
    } else {
        quote_spanned!(span=> #ident: ::core::default::Default::default())
    }
}

/// Type actually passed to `FromBoundStr` for a single element of this field: the inner type of
/// `Vec<T>`/`HashMap<String, T>` for `Slice`/`Map` fields (after unwrapping a surrounding
/// `Option`), or the scalar-after-unwrapping-`Option` otherwise.
fn element_type(field: &BoundField) -> &Type {
    let is_option = last_ident(&field.ty).is_some_and(|ident| ident == "Option");
    let unwrapped = if is_option { BoundField::inner_type(&field.ty).unwrap_or(&field.ty) } else { &field.ty };
    match field.kind() {
        "Slice" => BoundField::inner_type(unwrapped).unwrap_or(unwrapped),
        "Map" => BoundField::map_value_type(unwrapped).unwrap_or(unwrapped),
        _ => unwrapped,
    }
}

fn apply_family_arm(field: &BoundField) -> TokenStream {
    let ident = &field.ident;
    let name = ident.to_string();
    let span = ident.span();
    let tags = tag_tokens(field);
    let (is_option, is_boxed, nested_leaf) = peel_wrappers(&field.ty);
    let leaf = if field.kind() == "Nested" { nested_leaf } else { element_type(field) };
    let type_name = quote!(#leaf).to_string();

    let enum_check = field.enum_values.as_ref().map(|values| {
        quote_spanned! {span=>
            if !::smart_bind::bind::check_enum(raw, &[#(#values),*]).is_ok() {
                ctx.push_error(
                    ::core::option::Option::Some(family),
                    #type_name,
                    ::smart_bind::BindErrorKind::EnumViolation,
                    ::std::format!("{raw:?} is not one of the declared values"),
                    ::core::option::Option::Some(raw.to_owned()),
                );
                continue_field = false;
            }
        }
    });

    let body = match field.kind() {
        "Nested" => {
            // Pointer fields (`Option<T>`/`Option<Box<T>>`) stay nil until at least one
            // sub-key under this field's prefix is present; a bare `T`/`Box<T>` field always
            // has a value, so it's bound (and defaulted) on every pass regardless of sub-keys.
            let access = match (is_option, is_boxed) {
                (true, true) => quote_spanned!(span=> self.#ident.as_deref_mut()),
                (true, false) => quote_spanned!(span=> self.#ident.as_mut()),
                (false, true) => quote_spanned!(span=> ::core::option::Option::Some(&mut *self.#ident)),
                (false, false) => quote_spanned!(span=> ::core::option::Option::Some(&mut self.#ident)),
            };
            let alloc = match (is_option, is_boxed) {
                (true, true) => quote_spanned!(span=> self.#ident = ::core::option::Option::Some(::std::boxed::Box::new(<#leaf as ::smart_bind::BindFields>::empty()));),
                (true, false) => quote_spanned!(span=> self.#ident = ::core::option::Option::Some(<#leaf as ::smart_bind::BindFields>::empty());),
                (false, _) => quote!(),
            };
            quote_spanned! {span=>
                {
                    const TAGS: &[::smart_bind::FieldTag] = #tags;
                    if let Some(tag) = TAGS.iter().find(|t| t.family == family) {
                        ctx.push_field(#name);
                        match ctx.enter_nested() {
                            Ok(()) => {
                                let scoped = ::smart_bind::ScopedSource::new(source, tag.primary);
                                let already_present = #access.is_some();
                                if !scoped.keys().is_empty() || already_present {
                                    if #access.is_none() {
                                        #alloc
                                    }
                                    if let ::core::option::Option::Some(nested) = #access {
                                        let nested_touched: ::std::collections::HashSet<_> =
                                            nested.apply_family(family, &scoped, ctx).into_iter().collect();
                                        nested.apply_defaults(&nested_touched, ctx);
                                        touched.push(#name);
                                    }
                                }
                                ctx.exit_nested();
                            }
                            Err(kind) => ctx.push_error(
                                ::core::option::Option::Some(family),
                                #type_name,
                                kind,
                                "nesting too deep",
                                ::core::option::Option::None,
                            ),
                        }
                        ctx.pop_field();
                    }
                }
            }
        }
        "Slice" => {
            quote_spanned! {span=>
                {
                    const TAGS: &[::smart_bind::FieldTag] = #tags;
                    if let Some(tag) = TAGS.iter().find(|t| t.family == family) {
                        let values = ::smart_bind::bind::resolve_multi(source, tag);
                        if !values.is_empty() {
                            ctx.push_field(#name);
                            if values.len() > ctx.options().max_slice_len {
                                ctx.push_error(
                                    ::core::option::Option::Some(family),
                                    #type_name,
                                    ::smart_bind::BindErrorKind::MaxSliceLenExceeded,
                                    "too many values",
                                    ::core::option::Option::None,
                                );
                            } else {
                                let mut items = ::std::vec::Vec::new();
                                for raw in values {
                                    match <#leaf as ::smart_bind::FromBoundStr>::from_bound_str(raw) {
                                        Ok(value) => items.push(value),
                                        Err(err) => ctx.push_error(
                                            ::core::option::Option::Some(family),
                                            #type_name,
                                            ::smart_bind::BindErrorKind::Convert(err.kind()),
                                            err.to_string(),
                                            ::core::option::Option::Some(raw.to_owned()),
                                        ),
                                    }
                                }
                                self.#ident = items;
                                touched.push(#name);
                            }
                            ctx.pop_field();
                        }
                    }
                }
            }
        }
        "Map" => {
            quote_spanned! {span=>
                {
                    const TAGS: &[::smart_bind::FieldTag] = #tags;
                    if let Some(tag) = TAGS.iter().find(|t| t.family == family) {
                        ctx.push_field(#name);
                        match ::smart_bind::bind::resolve_map_entries(source, tag) {
                            Ok(entries) if !entries.is_empty() => {
                                if entries.len() > ctx.options().max_map_len {
                                    ctx.push_error(
                                        ::core::option::Option::Some(family),
                                        #type_name,
                                        ::smart_bind::BindErrorKind::MaxMapLenExceeded,
                                        "too many entries",
                                        ::core::option::Option::None,
                                    );
                                } else {
                                    let mut map = ::std::collections::HashMap::new();
                                    for (key, raw) in entries {
                                        match <#leaf as ::smart_bind::FromBoundStr>::from_bound_str(&raw) {
                                            Ok(value) => { map.insert(key, value); }
                                            Err(err) => ctx.push_error(
                                                ::core::option::Option::Some(family),
                                                #type_name,
                                                ::smart_bind::BindErrorKind::Convert(err.kind()),
                                                err.to_string(),
                                                ::core::option::Option::Some(raw),
                                            ),
                                        }
                                    }
                                    self.#ident = map;
                                    touched.push(#name);
                                }
                            }
                            Ok(_) => {}
                            Err(kind) => ctx.push_error(
                                ::core::option::Option::Some(family),
                                #type_name,
                                kind,
                                "unsupported map key syntax",
                                ::core::option::Option::None,
                            ),
                        }
                        ctx.pop_field();
                    }
                }
            }
        }
        // Scalar or Option<Scalar>.
        _ => {
            let assign = if is_option {
                quote_spanned!(span=> self.#ident = ::core::option::Option::Some(value);)
            } else {
                quote_spanned!(span=> self.#ident = value;)
            };
            quote_spanned! {span=>
                {
                    const TAGS: &[::smart_bind::FieldTag] = #tags;
                    if let Some(tag) = TAGS.iter().find(|t| t.family == family) {
                        if let Some(raw) = ::smart_bind::bind::resolve_scalar(source, tag) {
                            ctx.push_field(#name);
                            #[allow(unused_mut)]
                            let mut continue_field = true;
                            #enum_check
                            if continue_field {
                                match <#leaf as ::smart_bind::FromBoundStr>::from_bound_str(raw) {
                                    Ok(value) => {
                                        #assign
                                        touched.push(#name);
                                    }
                                    Err(err) => ctx.push_error(
                                        ::core::option::Option::Some(family),
                                        #type_name,
                                        ::smart_bind::BindErrorKind::Convert(err.kind()),
                                        err.to_string(),
                                        ::core::option::Option::Some(raw.to_owned()),
                                    ),
                                }
                            }
                            ctx.pop_field();
                        }
                    }
                }
            }
        }
    };

    body
}

fn apply_defaults_arm(field: &BoundField) -> TokenStream {
    let ident = &field.ident;
    let name = ident.to_string();
    let span = ident.span();
    let default_expr = field.default.as_ref().map(|default| quote_spanned!(span=> self.#ident = #default;));
    let required = field.required;

    if let Some(default_expr) = default_expr {
        quote_spanned! {span=>
            if !touched.contains(#name) {
                #default_expr
            }
        }
    } else if required {
        let type_name = {
            let ty = &field.ty;
            quote!(#ty).to_string()
        };
        quote_spanned! {span=>
            if !touched.contains(#name) {
                ctx.push_field(#name);
                ctx.push_error(
                    ::core::option::Option::None,
                    #type_name,
                    ::smart_bind::BindErrorKind::Convert(::smart_bind::ConvertErrorKind::UnsupportedType),
                    "missing required field",
                    ::core::option::Option::None,
                );
                ctx.pop_field();
            }
        }
    } else {
        quote!()
    }
}

pub(crate) fn expand(record: &BoundRecord) -> TokenStream {
    let ident = &record.ident;
    let name_str = ident.to_string();

    let field_shapes = record.fields.iter().map(field_shape_tokens);
    let empty_fields = record.fields.iter().map(empty_field_tokens);
    let apply_family_arms = record.fields.iter().map(apply_family_arm);
    let apply_defaults_arms = record.fields.iter().map(apply_defaults_arm);

    quote! {
        #[automatically_derived]
        impl ::smart_bind::BindRecord for #ident {
            fn shape() -> &'static ::smart_bind::RecordShape {
                static FIELDS: &[::smart_bind::FieldShape] = &[#(#field_shapes),*];
                static SHAPE: ::smart_bind::RecordShape = ::smart_bind::RecordShape {
                    name: #name_str,
                    fields: FIELDS,
                };
                &SHAPE
            }
        }

        #[automatically_derived]
        impl ::smart_bind::BindFields for #ident {
            fn empty() -> Self {
                Self { #(#empty_fields),* }
            }

            fn apply_family(
                &mut self,
                family: ::smart_bind::TagFamily,
                source: &dyn ::smart_bind::ValueSource,
                ctx: &mut ::smart_bind::BindContext<'_>,
            ) -> ::std::vec::Vec<&'static str> {
                let mut touched = ::std::vec::Vec::new();
                #(#apply_family_arms)*
                touched
            }

            fn apply_defaults(
                &mut self,
                touched: &::std::collections::HashSet<&'static str>,
                ctx: &mut ::smart_bind::BindContext<'_>,
            ) {
                #(#apply_defaults_arms)*
            }
        }
    }
}
