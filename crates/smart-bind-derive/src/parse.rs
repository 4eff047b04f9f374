//! Parses `#[bind(...)]` field attributes into a structured form the codegen side consumes.

use syn::{Data, DeriveInput, Expr, Fields, Ident, LitStr, Type};

pub(crate) const FAMILIES: &[&str] = &[
    "path", "query", "form", "header", "cookie", "json", "xml", "toml", "msgpack", "protobuf",
];

pub(crate) struct FieldTagSpec {
    pub family: &'static str,
    pub primary: String,
    pub aliases: Vec<String>,
}

pub(crate) struct BoundField {
    pub ident: Ident,
    pub ty: Type,
    pub tags: Vec<FieldTagSpec>,
    pub enum_values: Option<Vec<String>>,
    pub default: Option<Expr>,
    pub nested: bool,
    /// Set by the `required` tag modifier (grammar: `alias := <name> | "omitempty" | "required" | "-"`).
    /// Requiredness is opt-in: a scalar with no `default` and no `required` modifier simply binds
    /// to its zero value when absent, it isn't an error.
    pub required: bool,
}

pub(crate) struct BoundRecord {
    pub ident: Ident,
    pub fields: Vec<BoundField>,
}

impl BoundField {
    fn is_option(ty: &Type) -> bool {
        Self::last_segment_ident(ty).is_some_and(|ident| ident == "Option")
    }

    fn is_vec(ty: &Type) -> bool {
        Self::last_segment_ident(ty).is_some_and(|ident| ident == "Vec")
    }

    fn is_map(ty: &Type) -> bool {
        Self::last_segment_ident(ty)
            .is_some_and(|ident| ident == "HashMap" || ident == "BTreeMap")
    }

    fn last_segment_ident(ty: &Type) -> Option<&Ident> {
        match ty {
            Type::Path(path) => path.path.segments.last().map(|segment| &segment.ident),
            _ => None,
        }
    }

    /// Extracts `T` out of `Option<T>`/`Vec<T>`/`Box<T>`, if `ty` is one of those wrappers.
    pub(crate) fn inner_type(ty: &Type) -> Option<&Type> {
        let Type::Path(path) = ty else { return None };
        let segment = path.path.segments.last()?;
        let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
            return None;
        };
        args.args.iter().find_map(|arg| match arg {
            syn::GenericArgument::Type(ty) => Some(ty),
            _ => None,
        })
    }

    /// Extracts `V` out of `HashMap<String, V>`/`BTreeMap<String, V>` (the second type argument).
    pub(crate) fn map_value_type(ty: &Type) -> Option<&Type> {
        let Type::Path(path) = ty else { return None };
        let segment = path.path.segments.last()?;
        let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
            return None;
        };
        args.args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .nth(1)
    }

    /// Classifies the field's Rust type. Note that `Vec<T>`/`HashMap<String, T>` must appear
    /// bare (not wrapped in `Option`) to be picked up as `Slice`/`Map` — those collections
    /// already have a natural "absent" state (empty), so there's no need for an extra `Option`
    /// layer, and supporting both would double the assignment cases generated code has to cover.
    pub(crate) fn kind(&self) -> &'static str {
        if self.nested {
            "Nested"
        } else if Self::is_vec(&self.ty) {
            "Slice"
        } else if Self::is_map(&self.ty) {
            "Map"
        } else if Self::is_option(&self.ty) {
            "Option"
        } else {
            "Scalar"
        }
    }
}

pub(crate) fn parse_record(input: &DeriveInput) -> syn::Result<BoundRecord> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(input, "`Bind` can only be derived for structs"));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(input, "`Bind` requires named fields"));
    };

    let fields = named
        .named
        .iter()
        .map(|field| {
            let ident = field.ident.clone().expect("named field");
            let ty = field.ty.clone();
            let mut tags = Vec::new();
            let mut enum_values = None;
            let mut default = None;
            let mut nested = false;
            let mut required = false;

            for attr in &field.attrs {
                if !attr.path().is_ident("bind") {
                    continue;
                }
                attr.parse_nested_meta(|meta| {
                    if let Some(family) = FAMILIES.iter().find(|name| meta.path.is_ident(name)) {
                        let value: LitStr = meta.value()?.parse()?;
                        let mut parts = value.value().split(',').map(str::trim).map(str::to_owned);
                        let primary = parts.next().unwrap_or_default();
                        let mut aliases = Vec::new();
                        for part in parts {
                            match part.as_str() {
                                "required" => required = true,
                                "omitempty" => {}
                                _ => aliases.push(part),
                            }
                        }
                        tags.push(FieldTagSpec { family, primary, aliases });
                        return Ok(());
                    }
                    if meta.path.is_ident("enum") {
                        let value: LitStr = meta.value()?.parse()?;
                        enum_values = Some(
                            value.value().split(',').map(str::trim).map(str::to_owned).collect(),
                        );
                        return Ok(());
                    }
                    if meta.path.is_ident("default") {
                        default = Some(meta.value()?.parse()?);
                        return Ok(());
                    }
                    if meta.path.is_ident("nested") {
                        nested = true;
                        return Ok(());
                    }
                    if meta.path.is_ident("required") {
                        required = true;
                        return Ok(());
                    }
                    Err(meta.error("unrecognized `bind` attribute"))
                })?;
            }

            Ok(BoundField { ident, ty, tags, enum_values, default, nested, required })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(BoundRecord { ident: input.ident.clone(), fields })
}
