//! Structured errors produced while binding or converting values.

use std::fmt;

use crate::source::TagFamily;

/// Coarse kind of a single scalar conversion failure (C2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConvertErrorKind {
    /// Value doesn't parse as an unsigned integer, or doesn't fit the target width.
    InvalidUnsignedInteger,
    /// Value doesn't parse as a signed integer, or doesn't fit the target width.
    InvalidSignedInteger,
    /// Value is empty, has multiple decimal points, or contains non-numeric characters.
    InvalidFloat,
    /// Value isn't one of the accepted boolean spellings.
    InvalidBool,
    /// Value doesn't match any of the accepted time layouts.
    InvalidTime,
    /// Value isn't a valid human-readable duration (e.g. `"1h2m3s"`).
    InvalidDuration,
    /// Value isn't a valid IP address.
    InvalidIpAddr,
    /// Value isn't a valid IP network (CIDR) notation.
    InvalidNetwork,
    /// Value isn't a valid URL.
    InvalidUrl,
    /// Value isn't a valid regular expression.
    InvalidRegex,
    /// The target Rust type has no registered conversion.
    UnsupportedType,
    /// A user `FromBoundStr` impl rejected the value with a custom reason.
    Custom,
}

impl fmt::Display for ConvertErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::InvalidUnsignedInteger => "invalid unsigned integer",
            Self::InvalidSignedInteger => "invalid signed integer",
            Self::InvalidFloat => "invalid float",
            Self::InvalidBool => "invalid bool",
            Self::InvalidTime => "invalid time",
            Self::InvalidDuration => "invalid duration",
            Self::InvalidIpAddr => "invalid IP address",
            Self::InvalidNetwork => "invalid IP network",
            Self::InvalidUrl => "invalid URL",
            Self::InvalidRegex => "invalid regular expression",
            Self::UnsupportedType => "unsupported type",
            Self::Custom => "conversion failed",
        })
    }
}

/// A single conversion failure, with the raw text that caused it and an optional custom reason
/// (populated by `FromBoundStr` impls).
#[derive(Debug, Clone)]
pub struct ConvertError {
    pub(crate) kind: ConvertErrorKind,
    pub(crate) raw_value: String,
    pub(crate) reason: Option<String>,
}

impl ConvertError {
    /// Creates an error of the given kind for the given raw input.
    pub fn new(kind: ConvertErrorKind, raw_value: impl Into<String>) -> Self {
        Self {
            kind,
            raw_value: raw_value.into(),
            reason: None,
        }
    }

    /// Attaches a human-readable reason, used by custom `FromBoundStr` impls.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ConvertErrorKind {
        self.kind
    }

    /// Returns the raw value that failed to convert.
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {:?}", self.kind, self.raw_value)?;
        if let Some(reason) = &self.reason {
            write!(formatter, " ({reason})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConvertError {}

/// What went wrong binding a single field.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum BindErrorKind {
    /// A scalar (or slice/map element) failed to convert.
    Convert(ConvertErrorKind),
    /// A value didn't match any of the declared `enum` values.
    EnumViolation,
    /// Recursion into a nested record exceeded the configured maximum depth.
    MaxDepthExceeded,
    /// A slice field had more elements than the configured maximum.
    MaxSliceLenExceeded,
    /// A map field had more entries than the configured maximum.
    MaxMapLenExceeded,
    /// A map key used unsupported nested bracket syntax (`root[a][b]`).
    NestedBracketsUnsupported,
    /// Decoding the whole request body via a registered codec failed.
    CodecFailure,
    /// A body codec source carried a top-level key the target record doesn't declare a tag for,
    /// under [`crate::bind::BindOptions::strict_unknown_fields`].
    UnknownField,
}

impl fmt::Display for BindErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convert(kind) => fmt::Display::fmt(kind, formatter),
            Self::EnumViolation => formatter.write_str("value not in declared enum set"),
            Self::MaxDepthExceeded => formatter.write_str("maximum nesting depth exceeded"),
            Self::MaxSliceLenExceeded => formatter.write_str("maximum slice length exceeded"),
            Self::MaxMapLenExceeded => formatter.write_str("maximum map size exceeded"),
            Self::NestedBracketsUnsupported => {
                formatter.write_str("nested bracket map keys are not supported")
            }
            Self::CodecFailure => formatter.write_str("body codec failed"),
            Self::UnknownField => formatter.write_str("unknown field"),
        }
    }
}

/// A single structured bind failure.
#[derive(Debug, Clone)]
pub struct BindError {
    pub(crate) family: Option<TagFamily>,
    pub(crate) path: String,
    pub(crate) raw_value: Option<String>,
    pub(crate) target_type: &'static str,
    pub(crate) kind: BindErrorKind,
    pub(crate) reason: String,
}

impl BindError {
    pub(crate) fn new(
        family: Option<TagFamily>,
        path: impl Into<String>,
        target_type: &'static str,
        kind: BindErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            family,
            path: path.into(),
            raw_value: None,
            target_type,
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn with_raw_value(mut self, raw_value: impl Into<String>) -> Self {
        self.raw_value = Some(raw_value.into());
        self
    }

    /// Tag family the failing field was resolved from, if any.
    pub fn family(&self) -> Option<TagFamily> {
        self.family
    }

    /// Dot-separated field path within the record being bound.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw text that failed to convert, if the failure happened during conversion.
    pub fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }

    /// Name of the Rust type the field was being converted into.
    pub fn target_type(&self) -> &'static str {
        self.target_type
    }

    /// Coarse failure kind.
    pub fn kind(&self) -> &BindErrorKind {
        &self.kind
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "field `{}`", self.path)?;
        if let Some(family) = self.family {
            write!(formatter, " ({family})")?;
        }
        write!(
            formatter,
            ": {} (expected {}): {}",
            self.kind, self.target_type, self.reason
        )?;
        if let Some(raw) = &self.raw_value {
            write!(formatter, ", got {raw:?}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BindError {}

/// Accumulates every field failure from a single bind call, so one bad field doesn't hide the
/// rest — mirrors the way `smart_config::ParseErrors` collects per-param failures.
#[derive(Debug, Default, Clone)]
pub struct BindErrors {
    errors: Vec<BindError>,
}

impl BindErrors {
    pub(crate) fn push(&mut self, error: BindError) {
        self.errors.push(error);
    }

    /// True if no field failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of accumulated failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterates over the accumulated failures.
    pub fn iter(&self) -> impl Iterator<Item = &BindError> {
        self.errors.iter()
    }
}

impl fmt::Display for BindErrors {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} error(s) binding record:", self.errors.len())?;
        for err in &self.errors {
            write!(formatter, "\n  {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BindErrors {}
