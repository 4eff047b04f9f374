//! The binder (C4): drives a `SourceSet` through a record's generated field setters, one tag
//! family at a time, then fills in defaults for whatever no source touched.

use std::collections::HashSet;

use crate::{
    error::{BindError, BindErrorKind, BindErrors},
    shape::{BindRecord, FieldTag},
    source::{SourceSet, TagFamily, ValueSource},
};

/// Limits and strictness knobs for a single bind call.
#[derive(Debug, Clone)]
pub struct BindOptions {
    pub max_depth: usize,
    pub max_slice_len: usize,
    pub max_map_len: usize,
    /// If true, a body codec field rejects input containing keys the target struct doesn't
    /// declare (scenario: MessagePack payload with an `unknown` key bound into a 2-field struct).
    pub strict_unknown_fields: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_slice_len: 4096,
            max_map_len: 4096,
            strict_unknown_fields: false,
        }
    }
}

/// Per-call state threaded through generated field setters: the current nesting depth and field
/// path (for error messages), and the accumulated errors themselves.
#[derive(Debug)]
pub struct BindContext<'a> {
    options: &'a BindOptions,
    errors: BindErrors,
    depth: usize,
    path: Vec<String>,
}

impl<'a> BindContext<'a> {
    #[must_use]
    pub fn new(options: &'a BindOptions) -> Self {
        Self {
            options,
            errors: BindErrors::default(),
            depth: 0,
            path: Vec::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &BindOptions {
        self.options
    }

    pub fn push_field(&mut self, name: &str) {
        self.path.push(name.to_owned());
    }

    pub fn pop_field(&mut self) {
        self.path.pop();
    }

    #[must_use]
    pub fn current_path(&self) -> String {
        self.path.join(".")
    }

    /// Enters a nested record, failing if doing so would exceed the configured max depth.
    pub fn enter_nested(&mut self) -> Result<(), BindErrorKind> {
        if self.depth >= self.options.max_depth {
            return Err(BindErrorKind::MaxDepthExceeded);
        }
        self.depth += 1;
        Ok(())
    }

    pub fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn push_error(
        &mut self,
        family: Option<TagFamily>,
        target_type: &'static str,
        kind: BindErrorKind,
        reason: impl Into<String>,
        raw_value: Option<String>,
    ) {
        let mut error = BindError::new(family, self.current_path(), target_type, kind, reason);
        if let Some(raw_value) = raw_value {
            error = error.with_raw_value(raw_value);
        }
        self.errors.push(error);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_errors(self) -> BindErrors {
        self.errors
    }
}

/// Implemented by `#[derive(Bind)]`. Binding proceeds in two kinds of pass: `apply_family` is run
/// once per registered source (in the order it appears in the `SourceSet`), and `apply_defaults`
/// runs once at the end for whatever field no pass touched — this is what lets scenario 1 (a
/// struct with some fields from `path` and others from `query`) work out of a single `SourceSet`.
pub trait BindFields: crate::shape::BindRecord + Sized {
    /// Builds a value with every field at its zero/empty state, ready to be filled in.
    fn empty() -> Self;

    /// Sets every field tagged for `family` that has a value in `source`. Returns the names of
    /// the fields that were actually present (and therefore should not receive a default later).
    fn apply_family(
        &mut self,
        family: TagFamily,
        source: &dyn ValueSource,
        ctx: &mut BindContext<'_>,
    ) -> Vec<&'static str>;

    /// Applies the declared default (or leaves the zero value) for every field whose name isn't
    /// in `touched`, failing for any `required` field that was never touched.
    fn apply_defaults(&mut self, touched: &HashSet<&'static str>, ctx: &mut BindContext<'_>);
}

/// Binds `SourceSet`s into `BindFields` records.
#[derive(Debug, Clone, Default)]
pub struct Binder {
    options: BindOptions,
}

impl Binder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: BindOptions) -> Self {
        Self { options }
    }

    /// Binds a record out of every source in `sources`, applying each family's pass in
    /// registration order and defaulting anything left untouched.
    pub fn bind<R: BindFields>(&self, sources: &SourceSet) -> Result<R, BindErrors> {
        let mut ctx = BindContext::new(&self.options);
        let mut record = R::empty();
        let mut touched = HashSet::new();

        for (family, source) in sources.iter() {
            for name in record.apply_family(family, source, &mut ctx) {
                touched.insert(name);
            }
            if family.is_body() && self.options.strict_unknown_fields {
                reject_unknown_fields::<R>(family, source, &mut ctx);
            }
        }
        record.apply_defaults(&touched, &mut ctx);

        if ctx.has_errors() {
            Err(ctx.into_errors())
        } else {
            Ok(record)
        }
    }
}

/// Reports every top-level key in `source` that no field of `R` declares a tag for under
/// `family`, used for body codecs (`json`/`xml`/`toml`/`msgpack`/`protobuf`) when
/// [`BindOptions::strict_unknown_fields`] is set. A key's "top level" is the segment before its
/// first `.` or `[`, so `settings.page_size` is checked against the `settings` tag, not rejected
/// field-by-field for every leaf underneath it.
fn reject_unknown_fields<R: BindRecord>(
    family: TagFamily,
    source: &dyn ValueSource,
    ctx: &mut BindContext<'_>,
) {
    let shape = R::shape();
    let mut reported = HashSet::new();
    for key in source.keys() {
        let top = key.split(['.', '[']).next().unwrap_or(key);
        if !reported.insert(top) {
            continue;
        }
        let known = shape.fields.iter().any(|field| {
            field
                .tags
                .iter()
                .any(|tag| tag.family == family && (tag.primary == top || tag.aliases.contains(&top)))
        });
        if !known {
            ctx.push_error(
                Some(family),
                shape.name,
                BindErrorKind::UnknownField,
                format!("unrecognized field `{top}`"),
                None,
            );
        }
    }
}

/// Finds the first value a tag resolves to, trying its primary name then its aliases in order.
#[must_use]
pub fn resolve_scalar<'a>(source: &'a dyn ValueSource, tag: &FieldTag) -> Option<&'a str> {
    for name in std::iter::once(tag.primary).chain(tag.aliases.iter().copied()) {
        if let Some(value) = source.values(name).into_iter().next() {
            return Some(value);
        }
    }
    None
}

/// Like [`resolve_scalar`], but returns every value registered for the first name that has any
/// (used for `Vec<T>` fields fed by repeated query/form parameters).
#[must_use]
pub fn resolve_multi<'a>(source: &'a dyn ValueSource, tag: &FieldTag) -> Vec<&'a str> {
    for name in std::iter::once(tag.primary).chain(tag.aliases.iter().copied()) {
        let values = source.values(name);
        if !values.is_empty() {
            return values;
        }
    }
    Vec::new()
}

/// Collects the map entries for a field tagged `tag.primary`, recognizing both dot-notation
/// (`root.sub=v`) and bracket-notation (`root[sub]=v`, with optional quoting for keys containing
/// `.`/`-`) keys. Nested brackets (`root[a][b]`) are rejected.
pub fn resolve_map_entries(
    source: &dyn ValueSource,
    tag: &FieldTag,
) -> Result<Vec<(String, String)>, BindErrorKind> {
    let mut entries = Vec::new();
    for key in source.keys() {
        let Some(sub_key) = match_map_key(key, tag.primary)? else {
            continue;
        };
        if let Some(value) = source.values(key).into_iter().next() {
            entries.push((sub_key, value.to_owned()));
        }
    }
    Ok(entries)
}

fn match_map_key(key: &str, prefix: &str) -> Result<Option<String>, BindErrorKind> {
    let Some(rest) = key.strip_prefix(prefix) else {
        return Ok(None);
    };

    if let Some(sub) = rest.strip_prefix('.') {
        return if sub.is_empty() { Ok(None) } else { Ok(Some(sub.to_owned())) };
    }

    if let Some(bracket) = rest.strip_prefix('[') {
        let Some(end) = bracket.find(']') else {
            return Ok(None);
        };
        let (inner, after) = bracket.split_at(end);
        let after = &after[1..];
        if after.starts_with('[') {
            return Err(BindErrorKind::NestedBracketsUnsupported);
        }
        if inner.is_empty() {
            return Ok(None);
        }
        return Ok(Some(unquote_bracket_key(inner)));
    }

    Ok(None)
}

fn unquote_bracket_key(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return raw[1..raw.len() - 1].to_owned();
        }
    }
    raw.to_owned()
}

/// Fails unless `value` is one of `allowed`, for `enum`-constrained fields.
pub fn check_enum(value: &str, allowed: &'static [&'static str]) -> Result<(), ()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        shape::{BindRecord, FieldKind, FieldShape, RecordShape},
        source::{PathParams, QueryParams},
    };

    #[derive(Debug, PartialEq, Eq)]
    struct Params {
        id: i64,
        page: i64,
        name: String,
    }

    static FIELDS: &[FieldShape] = &[
        FieldShape {
            name: "id",
            type_name: "i64",
            tags: &[FieldTag { family: TagFamily::Path, primary: "id", aliases: &[] }],
            kind: FieldKind::Scalar,
            enum_values: None,
            nested_shape: None,
            has_default: false,
            required: true,
        },
        FieldShape {
            name: "page",
            type_name: "i64",
            tags: &[FieldTag { family: TagFamily::Query, primary: "page", aliases: &[] }],
            kind: FieldKind::Scalar,
            enum_values: None,
            nested_shape: None,
            has_default: false,
            required: true,
        },
        FieldShape {
            name: "name",
            type_name: "String",
            tags: &[FieldTag { family: TagFamily::Query, primary: "name", aliases: &[] }],
            kind: FieldKind::Scalar,
            enum_values: None,
            nested_shape: None,
            has_default: false,
            required: true,
        },
    ];

    static SHAPE: RecordShape = RecordShape { name: "Params", fields: FIELDS };

    impl BindRecord for Params {
        fn shape() -> &'static RecordShape {
            &SHAPE
        }
    }

    impl BindFields for Params {
        fn empty() -> Self {
            Self { id: 0, page: 0, name: String::new() }
        }

        fn apply_family(
            &mut self,
            family: TagFamily,
            source: &dyn ValueSource,
            ctx: &mut BindContext<'_>,
        ) -> Vec<&'static str> {
            use crate::convert::FromBoundStr;

            let mut touched = Vec::new();
            for field in SHAPE.fields {
                let Some(tag) = field.tag_for(family) else { continue };
                let Some(raw) = resolve_scalar(source, tag) else { continue };
                ctx.push_field(field.name);
                match field.name {
                    "id" => match i64::from_bound_str(raw) {
                        Ok(value) => self.id = value,
                        Err(err) => ctx.push_error(
                            Some(family),
                            "i64",
                            BindErrorKind::Convert(err.kind()),
                            err.to_string(),
                            Some(raw.to_owned()),
                        ),
                    },
                    "page" => match i64::from_bound_str(raw) {
                        Ok(value) => self.page = value,
                        Err(err) => ctx.push_error(
                            Some(family),
                            "i64",
                            BindErrorKind::Convert(err.kind()),
                            err.to_string(),
                            Some(raw.to_owned()),
                        ),
                    },
                    "name" => self.name = raw.to_owned(),
                    _ => unreachable!(),
                }
                ctx.pop_field();
                touched.push(field.name);
            }
            touched
        }

        fn apply_defaults(&mut self, touched: &HashSet<&'static str>, ctx: &mut BindContext<'_>) {
            for field in SHAPE.fields {
                if !touched.contains(field.name) && field.required {
                    ctx.push_field(field.name);
                    ctx.push_error(
                        None,
                        field.type_name,
                        BindErrorKind::Convert(crate::error::ConvertErrorKind::UnsupportedType),
                        "missing required field",
                        None,
                    );
                    ctx.pop_field();
                }
            }
        }
    }

    #[test]
    fn binds_from_multiple_families_in_one_call() {
        let mut path = PathParams::new();
        path.insert("id", "42");
        let mut query = QueryParams::new();
        query.insert("page", "3");
        query.insert("name", "dave");

        let sources = SourceSet::new()
            .add(TagFamily::Path, path)
            .add(TagFamily::Query, query);

        let bound: Params = Binder::new().bind(&sources).unwrap();
        assert_eq!(bound, Params { id: 42, page: 3, name: "dave".to_owned() });
    }

    #[test]
    fn missing_required_field_is_reported() {
        let sources = SourceSet::new().add(TagFamily::Path, PathParams::new());
        let result: Result<Params, _> = Binder::new().bind(&sources);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().len(), 3);
    }

    #[test]
    fn strict_unknown_fields_rejects_undeclared_body_keys() {
        #[derive(Debug, Default)]
        struct Small {
            id: i64,
        }

        static SMALL_FIELDS: &[FieldShape] = &[FieldShape {
            name: "id",
            type_name: "i64",
            tags: &[FieldTag { family: TagFamily::Json, primary: "id", aliases: &[] }],
            kind: FieldKind::Scalar,
            enum_values: None,
            nested_shape: None,
            has_default: false,
            required: true,
        }];
        static SMALL_SHAPE: RecordShape = RecordShape { name: "Small", fields: SMALL_FIELDS };

        impl BindRecord for Small {
            fn shape() -> &'static RecordShape {
                &SMALL_SHAPE
            }
        }

        impl BindFields for Small {
            fn empty() -> Self {
                Self::default()
            }

            fn apply_family(
                &mut self,
                family: TagFamily,
                source: &dyn ValueSource,
                ctx: &mut BindContext<'_>,
            ) -> Vec<&'static str> {
                use crate::convert::FromBoundStr;

                let mut touched = Vec::new();
                let Some(tag) = SMALL_SHAPE.fields[0].tag_for(family) else { return touched };
                let Some(raw) = resolve_scalar(source, tag) else { return touched };
                ctx.push_field("id");
                match i64::from_bound_str(raw) {
                    Ok(value) => {
                        self.id = value;
                        touched.push("id");
                    }
                    Err(err) => ctx.push_error(
                        Some(family),
                        "i64",
                        BindErrorKind::Convert(err.kind()),
                        err.to_string(),
                        Some(raw.to_owned()),
                    ),
                }
                ctx.pop_field();
                touched
            }

            fn apply_defaults(&mut self, _touched: &HashSet<&'static str>, _ctx: &mut BindContext<'_>) {}
        }

        let mut body = crate::source::ValueMap::new();
        body.insert("id", "7");
        body.insert("unexpected", "oops");

        let sources = SourceSet::new().add(TagFamily::Json, body);
        let strict = Binder::with_options(BindOptions { strict_unknown_fields: true, ..BindOptions::default() });
        let result: Result<Small, _> = strict.bind(&sources);
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| matches!(e.kind(), BindErrorKind::UnknownField)));

        let lenient = Binder::new();
        let ok: Small = lenient.bind(&sources).unwrap();
        assert_eq!(ok.id, 7);
    }

    #[test]
    fn dot_and_bracket_map_keys_are_recognized() {
        let mut query = QueryParams::new();
        query.insert("settings.page_size", "10");
        query.insert("settings[width]", "210");
        query.insert("settings[a][b]", "ignored-by-caller-before-error");

        let tag = FieldTag { family: TagFamily::Query, primary: "settings", aliases: &[] };
        let err = resolve_map_entries(&query, &tag).unwrap_err();
        assert!(matches!(err, BindErrorKind::NestedBracketsUnsupported));
    }
}
