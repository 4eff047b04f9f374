//! Config deserialization errors.

use std::{fmt, sync::Arc};

use serde::de;

use crate::{
    metadata::{ConfigMetadata, NestedConfigMetadata, ParamMetadata},
    value::{ValueOrigin, WithOrigin},
};

/// Coarse classification of a parse failure, used e.g. to tell a config that's simply absent
/// from every source apart from one that's present but malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorCategory {
    /// A required parameter or nested config was absent from every merged source.
    MissingField,
    /// Malformed syntax in the underlying format (unexpected token, unterminated string, ...).
    Syntax,
    /// Input ended before a complete value could be read.
    Eof,
    /// An I/O error surfaced through a custom deserializer.
    Io,
    /// A `#[config(validate(..))]` check or a config-level [`Validate`](crate::validation::Validate) impl failed.
    Validation,
    /// Value was read but had the wrong shape, range, or type for its target.
    Data,
}

impl ParseErrorCategory {
    fn from_json(category: serde_json::error::Category) -> Self {
        match category {
            serde_json::error::Category::Io => Self::Io,
            serde_json::error::Category::Syntax => Self::Syntax,
            serde_json::error::Category::Eof => Self::Eof,
            serde_json::error::Category::Data => Self::Data,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum LocationInConfig {
    Param(usize),
    Nested(usize),
}

/// Coarse classification of a low-level parse failure, mirrored from [`ParseErrorCategory`]
/// so that callers can match on it without depending on `serde_json` directly.
pub(crate) enum LowLevelError {
    /// A `serde`-level error with an attached category.
    Json {
        err: serde_json::Error,
        category: ParseErrorCategory,
    },
    /// Hand-rolled sentinel raised by sequence/map visitors; never surfaced to [`ParseErrors`]
    /// directly (the originating `serde::de::Error::invalid_type` call already produced a `Json` error).
    InvalidArray,
    InvalidObject,
    /// Raised by config/field-level [`crate::validation::Validate`] checks.
    Validation,
}

pub(crate) struct ErrorWithOrigin {
    pub(crate) inner: LowLevelError,
    pub(crate) origin: Arc<ValueOrigin>,
}

impl ErrorWithOrigin {
    pub(crate) fn new(inner: LowLevelError, origin: Arc<ValueOrigin>) -> Self {
        Self { inner, origin }
    }

    pub(crate) fn json(err: serde_json::Error, origin: Arc<ValueOrigin>) -> Self {
        let category = ParseErrorCategory::from_json(err.classify());
        Self::new(LowLevelError::Json { err, category }, origin)
    }
}

impl de::Error for ErrorWithOrigin {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::json(de::Error::custom(msg), Arc::default())
    }

    fn missing_field(field: &'static str) -> Self {
        Self::new(
            LowLevelError::Json {
                err: de::Error::custom(format!("missing field `{field}`")),
                category: ParseErrorCategory::MissingField,
            },
            Arc::default(),
        )
    }
}

impl fmt::Display for ErrorWithOrigin {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            LowLevelError::Json { err, .. } => write!(formatter, "[{}]: {err}", self.origin),
            LowLevelError::InvalidArray => write!(formatter, "[{}]: expected array", self.origin),
            LowLevelError::InvalidObject => write!(formatter, "[{}]: expected object", self.origin),
            LowLevelError::Validation => write!(formatter, "[{}]: validation failed", self.origin),
        }
    }
}

/// Config deserialization errors.
pub struct ParseError {
    inner: serde_json::Error,
    pub(crate) category: ParseErrorCategory,
    path: Option<String>,
    origin: Option<Arc<ValueOrigin>>,
    config: Option<&'static ConfigMetadata>,
    location_in_config: Option<LocationInConfig>,
    /// Set if this error was raised by a `#[config(validate(..))]` / `#[config(filter(..))]` check
    /// rather than by type conversion; holds the validation's human-readable description.
    validation: Option<String>,
}

impl fmt::Debug for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ParseError")
            .field("inner", &self.inner)
            .field("category", &self.category)
            .field("origin", &self.origin)
            .field("path", &self.path)
            .field("config.ty", &self.config.map(|meta| meta.ty))
            .field("location_in_config", &self.location_in_config)
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.location_in_config.and_then(|location| {
            Some(match location {
                LocationInConfig::Param(idx) => {
                    let param = self.config?.params.get(idx)?;
                    format!("param `{}`", param.name)
                }
                LocationInConfig::Nested(idx) => {
                    let nested = self.config?.nested_configs.get(idx)?;
                    format!("nested config `{}`", nested.meta.ty.name_in_code())
                }
            })
        });
        let field = field.as_deref().unwrap_or("value");
        let config = self.config.map_or_else(String::new, |config| {
            format!(" in `{}`", config.ty.name_in_code())
        });
        let at = self
            .path
            .as_ref()
            .map_or_else(String::new, |path| format!(" at `{path}`"));
        let origin = self
            .origin
            .as_ref()
            .map_or_else(String::new, |origin| format!(" [origin: {origin}]"));
        let validation = self
            .validation
            .as_ref()
            .map_or_else(String::new, |descr| format!(" (validation: {descr})"));

        write!(
            formatter,
            "error parsing {field}{config}{at}{origin}: {err}{validation}",
            err = self.inner
        )
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            category: ParseErrorCategory::from_json(err.classify()),
            inner: err,
            origin: None,
            path: None,
            config: None,
            location_in_config: None,
            validation: None,
        }
    }
}

impl ParseError {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        inner: serde_json::Error,
        category: ParseErrorCategory,
        path: Option<String>,
        origin: Option<Arc<ValueOrigin>>,
        config: Option<&'static ConfigMetadata>,
        location_in_config: Option<LocationInConfig>,
        validation: Option<String>,
    ) -> Self {
        Self {
            inner,
            category,
            path,
            origin,
            config,
            location_in_config,
            validation,
        }
    }

    /// Returns a generic error for a config that could not be deserialized without any more
    /// specific errors having been recorded (e.g. an internal inconsistency). Should be rare
    /// in practice since [`DeserializeContext`](crate::de::DeserializeContext) records a
    /// dedicated error for every field it visits.
    pub(crate) fn generic(path: String, config: &'static ConfigMetadata) -> Self {
        Self {
            inner: de::Error::custom("deserialization failed with no specific errors recorded"),
            category: ParseErrorCategory::Data,
            path: Some(path),
            origin: None,
            config: Some(config),
            location_in_config: None,
            validation: None,
        }
    }

    /// Returns the wrapped error.
    pub fn inner(&self) -> &serde_json::Error {
        &self.inner
    }

    /// Returns the coarse category of the underlying error.
    pub fn category(&self) -> ParseErrorCategory {
        self.category
    }

    /// Returns the description of the failing `#[config(validate(..))]` check, if this error
    /// originated from one rather than from type conversion.
    pub fn validation(&self) -> Option<&str> {
        self.validation.as_deref()
    }

    /// Returns an absolute path on which this error has occurred, if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns an origin of the value deserialization of which failed, if any.
    pub fn origin(&self) -> Option<&ValueOrigin> {
        self.origin.as_deref()
    }

    /// Returns metadata for the failing config, if any.
    pub fn config(&self) -> Option<&'static ConfigMetadata> {
        self.config
    }

    /// Returns metadata for the failing parameter if this error concerns a parameter. The parameter
    /// is guaranteed to be contained in [`Self::config()`].
    pub fn param(&self) -> Option<&'static ParamMetadata> {
        if let LocationInConfig::Param(idx) = self.location_in_config? {
            self.config?.params.get(idx)
        } else {
            None
        }
    }

    /// Returns metadata for the failing nested config if this error concerns a nested config. The config
    /// is guaranteed to be nested in [`Self::config()`].
    pub fn nested_config(&self) -> Option<&'static NestedConfigMetadata> {
        if let LocationInConfig::Nested(idx) = self.location_in_config? {
            self.config?.nested_configs.get(idx)
        } else {
            None
        }
    }

    pub(crate) fn with_origin(mut self, origin: Option<&Arc<ValueOrigin>>) -> Self {
        if self.origin.is_none() {
            self.origin = origin.cloned();
        }
        self
    }

    pub(crate) fn with_path(mut self, path: &str) -> Self {
        if self.path.is_none() {
            self.path = Some(path.to_owned());
        }
        self
    }

    pub(crate) fn for_config(mut self, metadata: Option<&'static ConfigMetadata>) -> Self {
        self.config = self.config.or(metadata);
        self
    }

    pub(crate) fn with_location(
        mut self,
        metadata: Option<&'static ConfigMetadata>,
        location: LocationInConfig,
    ) -> Self {
        if metadata.is_some() {
            self.config = metadata;
            self.location_in_config = Some(location);
        }
        self
    }
}

#[derive(Debug, Default)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    #[doc(hidden)]
    pub fn push(&mut self, err: ParseError) {
        self.errors.push(err);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseError> + '_ {
        self.errors.iter()
    }

    #[allow(clippy::len_without_is_empty)] // is_empty should always return false
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn first(&self) -> &ParseError {
        self.errors.first().expect("no errors")
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for err in &self.errors {
            writeln!(formatter, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

/// Sentinel error returned by fallible steps inside config/param deserialization once at least one
/// real error has been recorded into the ambient [`ParseErrors`] accumulator. Carries no payload of
/// its own; callers should inspect the accumulator, not this value, to learn what went wrong.
#[derive(Debug)]
pub(crate) struct DeserializeConfigError(());

impl DeserializeConfigError {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

impl fmt::Display for DeserializeConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("configuration could not be deserialized; see `ParseErrors` for details")
    }
}

impl std::error::Error for DeserializeConfigError {}
