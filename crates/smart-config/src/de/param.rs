//! Built-in [`DeserializeParam`] implementations for "well-known" scalar Rust types, plus
//! the combinators (`Optional`, `WithDefault`, `OrString`, `Qualified`) used to compose them.
//!
//! Array / map / set deserializers live in [`super::repeated`]; this module only covers leaves.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{de::Error as DeError, Deserialize};

use super::DeserializeContext;
use crate::{
    error::ErrorWithOrigin,
    metadata::{BasicTypes, ParamMetadata, TypeDescription},
    value::{StrValue, Value},
};

/// Type-erasure-friendly deserializer for a single configuration parameter.
///
/// Implementors describe the basic JSON shape(s) they accept via [`Self::EXPECTING`] and convert
/// the raw value reachable through [`DeserializeContext`] into `T`.
pub trait DeserializeParam<T>: fmt::Debug + 'static {
    /// Basic types accepted by this deserializer.
    const EXPECTING: BasicTypes;

    /// Updates the type description with information specific to this deserializer.
    fn describe(&self, description: &mut TypeDescription);

    /// Performs deserialization given the context.
    fn deserialize_param(
        &self,
        ctx: DeserializeContext<'_>,
        param: &'static ParamMetadata,
    ) -> Result<T, ErrorWithOrigin>;

    /// Serializes a previously deserialized (or default) value back to JSON, e.g. for dumping.
    fn serialize_param(&self, param: &T) -> serde_json::Value;
}

/// Marker trait for types with an unambiguous default deserializer, so that `#[config(...)]` /
/// `#[bind(...)]` fields don't need to specify `with = _` explicitly.
pub trait WellKnown: Sized {
    /// Default deserializer for this type.
    type Deserializer: DeserializeParam<Self>;
    /// Default deserializer instance.
    const DE: Self::Deserializer;
}

/// Deserializes any param implementing [`serde::Deserialize`]/[`serde::Serialize`] directly.
#[derive(Debug)]
pub struct Serde<const EXPECTING: u8>;

impl<const EXPECTING: u8, T> DeserializeParam<T> for Serde<EXPECTING>
where
    T: for<'de> Deserialize<'de> + serde::Serialize + 'static,
{
    const EXPECTING: BasicTypes = BasicTypes::from_raw(EXPECTING);

    fn describe(&self, _description: &mut TypeDescription) {}

    fn deserialize_param(
        &self,
        ctx: DeserializeContext<'_>,
        param: &'static ParamMetadata,
    ) -> Result<T, ErrorWithOrigin> {
        T::deserialize(ctx.current_value_deserializer(param.name)?)
    }

    fn serialize_param(&self, param: &T) -> serde_json::Value {
        serde_json::to_value(param).unwrap_or(serde_json::Value::Null)
    }
}

macro_rules! impl_well_known_for_serde {
    ($expecting:expr, $($ty:ty),+ $(,)?) => {
        $(
        impl WellKnown for $ty {
            type Deserializer = Serde<{ $expecting.raw() }>;
            const DE: Self::Deserializer = Serde;
        }
        )+
    };
}

impl_well_known_for_serde!(BasicTypes::BOOL, bool);
impl_well_known_for_serde!(
    BasicTypes::INTEGER,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
);
impl_well_known_for_serde!(BasicTypes::FLOAT, f32, f64);
impl_well_known_for_serde!(BasicTypes::STRING, String);

/// Deserializer for types parsed from a string via [`FromStr`], falling back to the base
/// deserializer `De` for non-string JSON shapes.
#[derive(Debug)]
pub struct OrString<De> {
    inner: De,
    qualifier: &'static str,
}

impl<De> OrString<De> {
    /// Wraps the provided base deserializer, labeling the string form with `qualifier`.
    pub const fn new(inner: De, qualifier: &'static str) -> Self {
        Self { inner, qualifier }
    }
}

impl<T, De> DeserializeParam<T> for OrString<De>
where
    T: FromStr + 'static,
    T::Err: fmt::Display,
    De: DeserializeParam<T>,
{
    const EXPECTING: BasicTypes = De::EXPECTING.or(BasicTypes::STRING);

    fn describe(&self, description: &mut TypeDescription) {
        self.inner.describe(description);
        description.set_details(self.qualifier);
    }

    fn deserialize_param(
        &self,
        ctx: DeserializeContext<'_>,
        param: &'static ParamMetadata,
    ) -> Result<T, ErrorWithOrigin> {
        if let Some(current_value) = ctx.current_value() {
            if let Value::String(StrValue::Plain(s)) = &current_value.inner {
                return s.parse().map_err(|err| {
                    ErrorWithOrigin::json(DeError::custom(err), current_value.origin.clone())
                });
            }
        }
        self.inner.deserialize_param(ctx, param)
    }

    fn serialize_param(&self, param: &T) -> serde_json::Value {
        self.inner.serialize_param(param)
    }
}

/// Labels the underlying deserializer with a human-readable qualifier (e.g. "filesystem path")
/// without changing its behavior.
#[derive(Debug)]
pub struct Qualified<De> {
    inner: De,
    qualifier: &'static str,
}

impl<De> Qualified<De> {
    /// Creates a qualified wrapper.
    pub const fn new(inner: De, qualifier: &'static str) -> Self {
        Self { inner, qualifier }
    }
}

impl<T, De: DeserializeParam<T>> DeserializeParam<T> for Qualified<De> {
    const EXPECTING: BasicTypes = De::EXPECTING;

    fn describe(&self, description: &mut TypeDescription) {
        self.inner.describe(description);
        description.set_details(self.qualifier);
    }

    fn deserialize_param(
        &self,
        ctx: DeserializeContext<'_>,
        param: &'static ParamMetadata,
    ) -> Result<T, ErrorWithOrigin> {
        self.inner.deserialize_param(ctx, param)
    }

    fn serialize_param(&self, param: &T) -> serde_json::Value {
        self.inner.serialize_param(param)
    }
}

impl WellKnown for PathBuf {
    type Deserializer = Qualified<Serde<{ BasicTypes::STRING.raw() }>>;
    const DE: Self::Deserializer = Qualified::new(Serde, "filesystem path");
}

/// Makes the wrapped deserializer accept an absent value, producing `None`.
#[derive(Debug)]
pub struct Optional<De>(pub De);

impl<T, De: DeserializeParam<T>> DeserializeParam<Option<T>> for Optional<De> {
    const EXPECTING: BasicTypes = De::EXPECTING;

    fn describe(&self, description: &mut TypeDescription) {
        self.0.describe(description);
    }

    fn deserialize_param(
        &self,
        ctx: DeserializeContext<'_>,
        param: &'static ParamMetadata,
    ) -> Result<Option<T>, ErrorWithOrigin> {
        if ctx.current_value().is_none() {
            return Ok(None);
        }
        self.0.deserialize_param(ctx, param).map(Some)
    }

    fn serialize_param(&self, param: &Option<T>) -> serde_json::Value {
        match param {
            Some(value) => self.0.serialize_param(value),
            None => serde_json::Value::Null,
        }
    }
}

impl<T: WellKnown> WellKnown for Option<T> {
    type Deserializer = Optional<T::Deserializer>;
    const DE: Self::Deserializer = Optional(T::DE);
}

/// Falls back to a default value (computed eagerly via a `fn` pointer) when the underlying value is absent.
#[derive(Debug)]
pub struct WithDefault<T: 'static, De> {
    inner: De,
    default: fn() -> T,
}

impl<T, De> WithDefault<T, De> {
    /// Wraps `inner`, falling back to `default()` when no value is present.
    pub const fn new(inner: De, default: fn() -> T) -> Self {
        Self { inner, default }
    }
}

impl<T, De: DeserializeParam<T>> DeserializeParam<T> for WithDefault<T, De> {
    const EXPECTING: BasicTypes = De::EXPECTING;

    fn describe(&self, description: &mut TypeDescription) {
        self.inner.describe(description);
    }

    fn deserialize_param(
        &self,
        ctx: DeserializeContext<'_>,
        param: &'static ParamMetadata,
    ) -> Result<T, ErrorWithOrigin> {
        if ctx.current_value().is_none() {
            return Ok((self.default)());
        }
        self.inner.deserialize_param(ctx, param)
    }

    fn serialize_param(&self, param: &T) -> serde_json::Value {
        self.inner.serialize_param(param)
    }
}
