//! Static, per-type binding metadata (C3): what a derived record's fields are called, which tag
//! families they answer to, and whether they carry an enum constraint. The metadata itself is
//! emitted as `'static` data by `#[derive(Bind)]` — there's no runtime reflection involved, only a
//! small cache that lets repeated `(type, family)` lookups skip back to the same descriptor.

use std::{
    any::TypeId,
    collections::HashMap,
    sync::{OnceLock, PoisonError, RwLock},
};

use crate::source::TagFamily;

/// One family's tag on a field: its primary name plus any aliases accepted in its place.
#[derive(Debug, Clone, Copy)]
pub struct FieldTag {
    pub family: TagFamily,
    pub primary: &'static str,
    pub aliases: &'static [&'static str],
}

impl FieldTag {
    /// True if `name` is this tag's primary name or one of its aliases.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.primary == name || self.aliases.contains(&name)
    }
}

/// The shape of value a field expects, used to pick the right resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A single scalar convertible via `FromBoundStr`.
    Scalar,
    /// `Option<T>`: absent is not an error.
    Option,
    /// A pointer to a nested record (`Box<T>`/`Option<Box<T>>`), allocated on first touch.
    Nested,
    /// `Vec<T>` built from repeated values or comma-separated scalars.
    Slice,
    /// `HashMap<String, T>` built from dot- or bracket-notation keys.
    Map,
}

/// Static description of a single struct field.
#[derive(Debug, Clone, Copy)]
pub struct FieldShape {
    pub name: &'static str,
    pub type_name: &'static str,
    pub tags: &'static [FieldTag],
    pub kind: FieldKind,
    pub enum_values: Option<&'static [&'static str]>,
    pub nested_shape: Option<fn() -> &'static RecordShape>,
    pub has_default: bool,
    pub required: bool,
}

impl FieldShape {
    /// The tag declared for `family`, if this field answers to it.
    #[must_use]
    pub fn tag_for(&self, family: TagFamily) -> Option<&'static FieldTag> {
        self.tags.iter().find(|tag| tag.family == family)
    }
}

/// Static description of a whole record (struct) eligible for binding.
#[derive(Debug, Clone, Copy)]
pub struct RecordShape {
    pub name: &'static str,
    pub fields: &'static [FieldShape],
}

impl RecordShape {
    /// Looks up a field by its Rust name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldShape> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Implemented by `#[derive(Bind)]` for every bindable struct. `shape()` is cheap to call (it
/// just returns a reference to a `static` built at compile time); [`shape_for`] exists so callers
/// keyed on `(TypeId, TagFamily)` don't need to care that every family maps to the same shape.
pub trait BindRecord: Sized {
    fn shape() -> &'static RecordShape;
}

type ShapeCache = RwLock<HashMap<(TypeId, TagFamily), &'static RecordShape>>;

static SHAPE_CACHE: OnceLock<ShapeCache> = OnceLock::new();

/// Looks up (and memoizes) the canonical shape for `R` under `family`.
///
/// A single struct can carry fields tagged for several families at once — one field bound from
/// `path`, another from `query` — so the shape itself is per-type, not per-`(type, family)`. The
/// cache still keys on the pair because that's how callers look it up; every family for a given
/// type simply resolves to the same canonical [`RecordShape`].
pub fn shape_for<R: BindRecord + 'static>(family: TagFamily) -> &'static RecordShape {
    let key = (TypeId::of::<R>(), family);
    let cache = SHAPE_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    if let Some(shape) = cache.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
        return shape;
    }
    let shape = R::shape();
    cache
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, shape);
    shape
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Toy;

    static TOY_FIELDS: &[FieldShape] = &[FieldShape {
        name: "id",
        type_name: "i64",
        tags: &[FieldTag {
            family: TagFamily::Path,
            primary: "id",
            aliases: &[],
        }],
        kind: FieldKind::Scalar,
        enum_values: None,
        nested_shape: None,
        has_default: false,
        required: true,
    }];

    static TOY_SHAPE: RecordShape = RecordShape {
        name: "Toy",
        fields: TOY_FIELDS,
    };

    impl BindRecord for Toy {
        fn shape() -> &'static RecordShape {
            &TOY_SHAPE
        }
    }

    #[test]
    fn shape_lookup_is_stable_across_families() {
        let by_path = shape_for::<Toy>(TagFamily::Path);
        let by_query = shape_for::<Toy>(TagFamily::Query);
        assert_eq!(by_path.name, "Toy");
        assert!(std::ptr::eq(by_path, by_query));
    }

    #[test]
    fn field_lookup_by_name() {
        let field = TOY_SHAPE.field("id").unwrap();
        assert_eq!(field.kind, FieldKind::Scalar);
        assert!(field.tag_for(TagFamily::Path).is_some());
        assert!(field.tag_for(TagFamily::Query).is_none());
    }
}
