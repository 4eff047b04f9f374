//! Miscellaneous utils: attribute parsing and the intermediate representation shared by
//! the `DescribeConfig` / `DeserializeConfig` codegen.

use proc_macro2::{Ident, Span, TokenStream};
use quote::{quote, quote_spanned, ToTokens};
use syn::{spanned::Spanned, Attribute, Data, DeriveInput, Expr, Fields, LitStr, Meta, Path, Token, Type};

/// Corresponds to the type kind in the main crate. Necessary because `TypeId::of()` is not a `const fn`
/// and unlikely to get stabilized as one in the near future.
#[derive(Debug)]
pub(crate) enum TypeKind {
    Bool,
    Integer,
    Float,
    String,
    Path,
}

const BUILTIN_INTEGER_TYPES: &[&str] = &[
    "u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "u128", "i128", "usize", "isize",
];
const BUILTIN_FLOAT_TYPES: &[&str] = &["f32", "f64"];
const STD_INTEGER_TYPES: &[&str] = &[
    "NonZeroU8",
    "NonZeroI8",
    "NonZeroU16",
    "NonZeroI16",
    "NonZeroU32",
    "NonZeroI32",
    "NonZeroU64",
    "NonZeroI64",
    "NonZeroUsize",
    "NonZeroIsize",
];

impl TypeKind {
    pub fn detect(ty: &Type) -> Option<Self> {
        let Type::Path(ty) = ty else {
            return None;
        };

        if let Some(ident) = ty.path.get_ident() {
            // Only recognize built-in types if the type isn't qualified
            if ident == "bool" {
                return Some(Self::Bool);
            } else if BUILTIN_INTEGER_TYPES.iter().any(|&name| ident == name) {
                return Some(Self::Integer);
            } else if BUILTIN_FLOAT_TYPES.iter().any(|&name| ident == name) {
                return Some(Self::Float);
            }
        }

        let last_segment = ty.path.segments.last()?;
        if !last_segment.arguments.is_empty() {
            return None;
        }
        if last_segment.ident == "String" {
            return Some(Self::String);
        } else if last_segment.ident == "PathBuf" {
            return Some(Self::Path);
        } else if STD_INTEGER_TYPES
            .iter()
            .any(|&name| last_segment.ident == name)
        {
            return Some(Self::Integer);
        }
        None
    }

    #[allow(dead_code)] // kept for parity with the runtime `TypeKind`; not currently emitted
    pub fn to_tokens(&self, cr: &TokenStream) -> TokenStream {
        match self {
            Self::Bool => quote!(#cr::TypeKind::Bool),
            Self::Integer => quote!(#cr::TypeKind::Integer),
            Self::Float => quote!(#cr::TypeKind::Float),
            Self::String => quote!(#cr::TypeKind::String),
            Self::Path => quote!(#cr::TypeKind::Path),
        }
    }
}

/// Rule for converting a Rust identifier into a param/variant name.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RenameRule {
    LowerCase,
    SnakeCase,
    KebabCase,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        match lit.value().as_str() {
            "lowercase" => Ok(Self::LowerCase),
            "snake_case" => Ok(Self::SnakeCase),
            "kebab-case" => Ok(Self::KebabCase),
            other => Err(syn::Error::new(
                lit.span(),
                format!(
                    "unsupported rename rule `{other}`; use one of: \"lowercase\", \"snake_case\", \"kebab-case\""
                ),
            )),
        }
    }

    pub fn apply(self, name: &str) -> String {
        match self {
            Self::LowerCase => name.to_lowercase(),
            Self::SnakeCase => to_snake_case(name),
            Self::KebabCase => to_snake_case(name).replace('_', "-"),
        }
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, ch) in name.char_indices() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Wraps an optional token stream in `Some(..)` / `None`, for const contexts where the
/// element type can't always be named.
pub(crate) fn wrap_in_option(value: Option<TokenStream>) -> TokenStream {
    match value {
        Some(value) => quote!(::core::option::Option::Some(#value)),
        None => quote!(::core::option::Option::None),
    }
}

/// A parameter / nested config alias, as specified via `#[config(alias = "..")]` or
/// `#[config(deprecated = "..")]`.
#[derive(Debug, Clone)]
pub(crate) struct Alias {
    pub lit: LitStr,
    pub is_deprecated: bool,
}

impl ToTokens for Alias {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        let lit = &self.lit;
        let maybe_deprecated = self.is_deprecated.then(|| quote!(.deprecated()));
        tokens.extend(quote_spanned! {lit.span()=>
            (#lit, ::smart_config::metadata::AliasOptions::new()#maybe_deprecated)
        });
    }
}

/// A `#[config(validate(..))]` entry.
#[derive(Debug, Clone)]
pub(crate) struct Validation {
    pub expr: Expr,
    pub description: Option<String>,
}

/// Default value for a param or nested config, as specified via `#[config(default)]`,
/// `#[config(default = path::to::fn)]` or `#[config(default_t = expr)]`.
#[derive(Debug, Clone)]
pub(crate) enum DefaultValue {
    /// Bare `#[config(default)]`; uses `Default::default()`.
    DefaultTrait,
    /// `#[config(default = some_fn)]`; calls the named function.
    Path(Path),
    /// `#[config(default_t = expr)]`; uses the expression directly.
    Expr(Expr),
}

impl DefaultValue {
    pub fn instance(&self, span: Span) -> TokenStream {
        match self {
            Self::DefaultTrait => quote_spanned!(span=> ::core::default::Default::default()),
            Self::Path(path) => quote_spanned!(span=> #path()),
            Self::Expr(expr) => quote_spanned!(span=> #expr),
        }
    }
}

/// Parsed `#[config(..)]` attributes on a struct / enum field.
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldAttrs {
    pub with: Option<Expr>,
    pub is_secret: bool,
    pub deserialize_if: Option<Validation>,
    pub validations: Vec<Validation>,
    pub default: Option<DefaultValue>,
    pub example: Option<Expr>,
    pub fallback: Option<Expr>,
    pub rename: Option<LitStr>,
    pub aliases: Vec<Alias>,
    pub nest: bool,
    pub flatten: bool,
}

/// A single config field (struct field, or a field of an enum variant).
#[derive(Debug, Clone)]
pub(crate) struct ConfigField {
    pub name: Ident,
    pub ty: Type,
    pub docs: String,
    pub attrs: FieldAttrs,
}

impl ConfigField {
    pub fn is_option(ty: &Type) -> bool {
        Self::unwrap_option(ty).is_some()
    }

    pub fn unwrap_option(ty: &Type) -> Option<&Type> {
        let Type::Path(path) = ty else {
            return None;
        };
        let last = path.path.segments.last()?;
        if last.ident != "Option" {
            return None;
        }
        let syn::PathArguments::AngleBracketed(args) = &last.arguments else {
            return None;
        };
        args.args.iter().find_map(|arg| match arg {
            syn::GenericArgument::Type(ty) => Some(ty),
            _ => None,
        })
    }

    pub fn name_span(&self) -> Span {
        self.name.span()
    }

    /// Whether this field holds a nested config, either under its own path segment
    /// (`#[config(nest)]`) or flattened into the parent (`#[config(flatten)]`).
    pub fn is_nested(&self) -> bool {
        self.attrs.nest || self.attrs.flatten
    }

    pub fn param_name(&self) -> String {
        self.attrs
            .rename
            .as_ref()
            .map(LitStr::value)
            .unwrap_or_else(|| self.name.to_string())
    }

    pub fn default_fn(&self) -> Option<TokenStream> {
        let default = self.attrs.default.as_ref()?;
        let span = self.name_span();
        let ty = &self.ty;
        let instance = default.instance(span);
        Some(quote_spanned!(span=> || -> #ty { #instance }))
    }

    /// Synthesizes the field describing an enum tag (the discriminant param).
    pub fn from_tag(
        cr: &TokenStream,
        tag: &LitStr,
        expected_variants: impl Iterator<Item = String>,
        default: Option<&str>,
    ) -> Self {
        let variants: Vec<_> = expected_variants.collect();
        let default = match default {
            Some(default) => {
                let lit = LitStr::new(default, tag.span());
                quote_spanned!(tag.span()=> ::core::option::Option::Some(#lit))
            }
            None => quote_spanned!(tag.span()=> ::core::option::Option::None),
        };
        let with: Expr = syn::parse_quote_spanned! {tag.span()=>
            #cr::de::_private::TagDeserializer::new(&[#(#variants,)*], #default)
        };
        ConfigField {
            name: Ident::new("tag", tag.span()),
            ty: syn::parse_quote!(&'static str),
            docs: String::new(),
            attrs: FieldAttrs {
                with: Some(with),
                rename: Some(tag.clone()),
                ..FieldAttrs::default()
            },
        }
    }
}

/// Parsed `#[config(..)]` attributes on an enum variant.
#[derive(Debug, Clone, Default)]
pub(crate) struct VariantAttrs {
    pub default: bool,
    pub aliases: Vec<Alias>,
    pub help: String,
    pub rename: Option<LitStr>,
}

#[derive(Debug, Clone)]
pub(crate) struct ConfigEnumVariant {
    pub name: Ident,
    pub fields: Vec<ConfigField>,
    pub attrs: VariantAttrs,
}

impl ConfigEnumVariant {
    /// Wire name for the variant, honoring `rename` / the container's `rename_all`.
    pub fn name(&self, rename_rule: Option<RenameRule>) -> String {
        if let Some(rename) = &self.attrs.rename {
            return rename.value();
        }
        let raw = self.name.to_string();
        rename_rule.map_or_else(|| raw.clone(), |rule| rule.apply(&raw))
    }

    pub fn expected_variants(
        &self,
        rename_rule: Option<RenameRule>,
    ) -> impl Iterator<Item = String> {
        let mut names = vec![self.name(rename_rule)];
        names.extend(self.attrs.aliases.iter().map(|alias| alias.lit.value()));
        names.into_iter()
    }

}

/// Parsed container-level (struct / enum) `#[config(..)]` attributes.
#[derive(Debug, Clone, Default)]
pub(crate) struct ContainerAttrs {
    pub crate_path: Option<Path>,
    pub rename_all: Option<RenameRule>,
    pub derive_default: bool,
    pub validations: Vec<Validation>,
}

pub(crate) enum ConfigContainerFields {
    Struct(Vec<ConfigField>),
    Enum {
        tag: LitStr,
        variants: Vec<ConfigEnumVariant>,
    },
}

impl ConfigContainerFields {
    /// Flattens struct fields / all enum variant fields into a single list, tagging each
    /// with the index of the enum variant it belongs to (always `0` for plain structs).
    pub fn all_fields(&self) -> Vec<(usize, &ConfigField)> {
        match self {
            Self::Struct(fields) => fields.iter().map(|field| (0, field)).collect(),
            Self::Enum { variants, .. } => variants
                .iter()
                .enumerate()
                .flat_map(|(idx, variant)| variant.fields.iter().map(move |field| (idx, field)))
                .collect(),
        }
    }
}

pub(crate) struct ConfigContainer {
    pub name: Ident,
    pub help: String,
    pub fields: ConfigContainerFields,
    pub attrs: ContainerAttrs,
}

impl ConfigContainer {
    /// The crate path to use in generated code. Defaults to `::smart_config`; tests defined
    /// inside the crate itself use `#[config(crate = crate)]` to refer to the local crate root.
    pub fn cr(&self, span: Span) -> TokenStream {
        match &self.attrs.crate_path {
            Some(path) => quote_spanned!(span=> #path),
            None => quote_spanned!(span=> ::smart_config),
        }
    }

    pub fn new(input: &DeriveInput) -> syn::Result<Self> {
        let name = input.ident.clone();
        let help = extract_doc_comment(&input.attrs);
        let raw_attrs = RawContainerAttrs::parse(&input.attrs)?;

        let fields = match &input.data {
            Data::Struct(data) => ConfigContainerFields::Struct(parse_fields(&data.fields)?),
            Data::Enum(data) => {
                let tag = raw_attrs.tag.clone().ok_or_else(|| {
                    syn::Error::new(
                        name.span(),
                        "enum configs require #[config(tag = \"..\")] on the container",
                    )
                })?;
                let variants = data
                    .variants
                    .iter()
                    .map(ConfigEnumVariant::parse)
                    .collect::<syn::Result<Vec<_>>>()?;
                ConfigContainerFields::Enum { tag, variants }
            }
            Data::Union(_) => {
                return Err(syn::Error::new(
                    name.span(),
                    "unions are not supported by this derive macro",
                ))
            }
        };

        Ok(Self {
            name,
            help,
            fields,
            attrs: raw_attrs.into_container_attrs(),
        })
    }
}

/// Scratch struct for parsed container attrs; carries `tag` separately since it belongs to
/// [`ConfigContainerFields::Enum`], not [`ContainerAttrs`].
#[derive(Default)]
struct RawContainerAttrs {
    crate_path: Option<Path>,
    rename_all: Option<RenameRule>,
    derive_default: bool,
    validations: Vec<Validation>,
    tag: Option<LitStr>,
}

impl RawContainerAttrs {
    fn into_container_attrs(self) -> ContainerAttrs {
        ContainerAttrs {
            crate_path: self.crate_path,
            rename_all: self.rename_all,
            derive_default: self.derive_default,
            validations: self.validations,
        }
    }

    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in attrs {
            if !attr.path().is_ident("config") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("crate") {
                    meta.input.parse::<Token![=]>()?;
                    this.crate_path = Some(meta.input.parse::<Path>()?);
                } else if meta.path.is_ident("rename_all") {
                    meta.input.parse::<Token![=]>()?;
                    let lit: LitStr = meta.input.parse()?;
                    this.rename_all = Some(RenameRule::parse(&lit)?);
                } else if meta.path.is_ident("derive") {
                    let content;
                    syn::parenthesized!(content in meta.input);
                    let derived: Path = content.parse()?;
                    if derived.is_ident("Default") {
                        this.derive_default = true;
                    } else {
                        return Err(syn::Error::new(
                            derived.span(),
                            "only `derive(Default)` is supported here",
                        ));
                    }
                } else if meta.path.is_ident("tag") {
                    meta.input.parse::<Token![=]>()?;
                    this.tag = Some(meta.input.parse::<LitStr>()?);
                } else if meta.path.is_ident("validate") {
                    this.validations.push(parse_validation(&meta)?);
                } else {
                    return Err(meta.error("unrecognized container-level #[config(..)] attribute"));
                }
                Ok(())
            })?;
        }
        Ok(this)
    }
}

fn parse_validation(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<Validation> {
    let content;
    syn::parenthesized!(content in meta.input);
    let expr: Expr = content.parse()?;
    let description = if content.peek(Token![,]) {
        content.parse::<Token![,]>()?;
        let lit: LitStr = content.parse()?;
        Some(lit.value())
    } else {
        None
    };
    Ok(Validation { expr, description })
}

fn extract_doc_comment(attrs: &[Attribute]) -> String {
    let mut lines = vec![];
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let Meta::NameValue(meta) = &attr.meta {
            if let Expr::Lit(expr_lit) = &meta.value {
                if let syn::Lit::Str(lit) = &expr_lit.lit {
                    lines.push(lit.value().trim().to_owned());
                }
            }
        }
    }
    lines.join("\n")
}

fn parse_fields(fields: &Fields) -> syn::Result<Vec<ConfigField>> {
    let Fields::Named(fields) = fields else {
        return Err(syn::Error::new(
            fields.span(),
            "only named fields are supported by this derive macro",
        ));
    };
    fields
        .named
        .iter()
        .map(|field| {
            let name = field.ident.clone().expect("checked by Fields::Named");
            let docs = extract_doc_comment(&field.attrs);
            let attrs = FieldAttrs::parse(&field.attrs)?;
            Ok(ConfigField {
                name,
                ty: field.ty.clone(),
                docs,
                attrs,
            })
        })
        .collect()
}

impl FieldAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in attrs {
            if !attr.path().is_ident("config") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("with") {
                    meta.input.parse::<Token![=]>()?;
                    this.with = Some(meta.input.parse()?);
                } else if meta.path.is_ident("secret") {
                    this.is_secret = true;
                } else if meta.path.is_ident("deserialize_if") {
                    this.deserialize_if = Some(parse_validation(&meta)?);
                } else if meta.path.is_ident("validate") {
                    this.validations.push(parse_validation(&meta)?);
                } else if meta.path.is_ident("default") {
                    if meta.input.peek(Token![=]) {
                        meta.input.parse::<Token![=]>()?;
                        this.default = Some(DefaultValue::Path(meta.input.parse()?));
                    } else {
                        this.default = Some(DefaultValue::DefaultTrait);
                    }
                } else if meta.path.is_ident("default_t") {
                    meta.input.parse::<Token![=]>()?;
                    this.default = Some(DefaultValue::Expr(meta.input.parse()?));
                } else if meta.path.is_ident("example") {
                    meta.input.parse::<Token![=]>()?;
                    this.example = Some(meta.input.parse()?);
                } else if meta.path.is_ident("fallback") {
                    meta.input.parse::<Token![=]>()?;
                    this.fallback = Some(meta.input.parse()?);
                } else if meta.path.is_ident("rename") {
                    meta.input.parse::<Token![=]>()?;
                    this.rename = Some(meta.input.parse()?);
                } else if meta.path.is_ident("alias") {
                    meta.input.parse::<Token![=]>()?;
                    this.aliases.push(Alias {
                        lit: meta.input.parse()?,
                        is_deprecated: false,
                    });
                } else if meta.path.is_ident("deprecated") {
                    meta.input.parse::<Token![=]>()?;
                    this.aliases.push(Alias {
                        lit: meta.input.parse()?,
                        is_deprecated: true,
                    });
                } else if meta.path.is_ident("nest") {
                    this.nest = true;
                } else if meta.path.is_ident("flatten") {
                    this.flatten = true;
                } else {
                    return Err(meta.error("unrecognized field-level #[config(..)] attribute"));
                }
                Ok(())
            })?;
        }
        if this.nest && this.flatten {
            return Err(syn::Error::new(
                Span::call_site(),
                "`nest` and `flatten` cannot be combined on the same field",
            ));
        }
        Ok(this)
    }
}

impl ConfigEnumVariant {
    fn parse(variant: &syn::Variant) -> syn::Result<Self> {
        let name = variant.ident.clone();
        let help = extract_doc_comment(&variant.attrs);
        let fields = parse_fields(&variant.fields)?;
        let mut attrs = VariantAttrs {
            help,
            ..VariantAttrs::default()
        };

        for attr in &variant.attrs {
            if !attr.path().is_ident("config") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    attrs.default = true;
                } else if meta.path.is_ident("rename") {
                    meta.input.parse::<Token![=]>()?;
                    attrs.rename = Some(meta.input.parse()?);
                } else if meta.path.is_ident("alias") {
                    meta.input.parse::<Token![=]>()?;
                    attrs.aliases.push(Alias {
                        lit: meta.input.parse()?,
                        is_deprecated: false,
                    });
                } else if meta.path.is_ident("deprecated") {
                    meta.input.parse::<Token![=]>()?;
                    attrs.aliases.push(Alias {
                        lit: meta.input.parse()?,
                        is_deprecated: true,
                    });
                } else {
                    return Err(meta.error("unrecognized variant-level #[config(..)] attribute"));
                }
                Ok(())
            })?;
        }

        Ok(Self {
            name,
            fields,
            attrs,
        })
    }
}
