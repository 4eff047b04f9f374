//! Reflection-free, multi-source request binder.
//!
//! A struct derives [`Bind`](smart_bind_derive::Bind) once; the derive macro emits a `'static`
//! [`shape::RecordShape`] describing its fields and tag families, plus the concrete per-field
//! setters `bind::BindFields` needs. Binding then pulls typed values out of whichever
//! [`source::ValueSource`]s (path params, query strings, form bodies, headers, cookies, decoded
//! JSON/XML/TOML/MessagePack/Protobuf bodies) the caller registers in a [`source::SourceSet`].

pub mod bind;
pub mod convert;
pub mod error;
pub mod shape;
pub mod source;

pub use bind::{BindContext, BindFields, BindOptions, Binder};
pub use convert::FromBoundStr;
pub use error::{BindError, BindErrorKind, BindErrors, ConvertError, ConvertErrorKind};
pub use shape::{BindRecord, FieldKind, FieldShape, FieldTag, RecordShape};
pub use smart_bind_derive::Bind;
pub use source::{
    BodySource, BodyValidator, Cookies, FormParams, Headers, PathParams, QueryParams,
    ScopedSource, SourceSet, TagFamily, ValueMap, ValueSource,
};

/// Binds `R` out of `sources` using the default [`BindOptions`].
///
/// ```ignore
/// #[derive(Bind)]
/// struct Params {
///     #[bind(path = "id")]
///     id: u64,
/// }
///
/// let sources = SourceSet::new().add(TagFamily::Path, path_params);
/// let params: Params = smart_bind::bind(&sources)?;
/// ```
pub fn bind<R: BindFields>(sources: &SourceSet) -> Result<R, BindErrors> {
    Binder::new().bind(sources)
}
