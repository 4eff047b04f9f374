//! Scalar conversion kernel (C2): turns a raw string pulled from some source into a typed value.

use std::{
    net::IpAddr,
    str::FromStr,
    time::Duration as StdDuration,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ipnetwork::IpNetwork;
use regex::Regex;
use url::Url;

use crate::error::{ConvertError, ConvertErrorKind};

/// Implemented for every scalar type a field can bind to. Blanket impls below cover the built-in
/// set; user code can implement this for its own newtypes to plug into the same machinery.
pub trait FromBoundStr: Sized {
    /// Parses `raw` (already trimmed of surrounding whitespace by the caller) into `Self`.
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError>;
}

impl FromBoundStr for String {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        Ok(raw.to_owned())
    }
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {
        $(
        impl FromBoundStr for $ty {
            fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
                raw.parse().map_err(|_| {
                    ConvertError::new(ConvertErrorKind::InvalidUnsignedInteger, raw)
                })
            }
        }
        )*
    };
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {
        $(
        impl FromBoundStr for $ty {
            fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
                raw.parse().map_err(|_| {
                    ConvertError::new(ConvertErrorKind::InvalidSignedInteger, raw)
                })
            }
        }
        )*
    };
}

macro_rules! impl_float {
    ($($ty:ty),*) => {
        $(
        impl FromBoundStr for $ty {
            fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
                if raw.is_empty() {
                    return Err(ConvertError::new(ConvertErrorKind::InvalidFloat, raw));
                }
                raw.parse().map_err(|_| ConvertError::new(ConvertErrorKind::InvalidFloat, raw))
            }
        }
        )*
    };
}

impl_unsigned!(u8, u16, u32, u64, u128, usize);
impl_signed!(i8, i16, i32, i64, i128, isize);
impl_float!(f32, f64);

impl FromBoundStr for bool {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Ok(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Ok(false),
            _ => Err(ConvertError::new(ConvertErrorKind::InvalidBool, raw)),
        }
    }
}

/// Time layouts are tried in this exact order; the first that parses wins.
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(
            date.and_hms_opt(0, 0, 0).expect("midnight is always valid"),
            Utc,
        ));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

impl FromBoundStr for DateTime<Utc> {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        parse_datetime(raw).ok_or_else(|| ConvertError::new(ConvertErrorKind::InvalidTime, raw))
    }
}

impl FromBoundStr for NaiveDate {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ConvertError::new(ConvertErrorKind::InvalidTime, raw))
    }
}

impl FromBoundStr for StdDuration {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        humantime::parse_duration(raw)
            .map_err(|_| ConvertError::new(ConvertErrorKind::InvalidDuration, raw))
    }
}

impl FromBoundStr for IpAddr {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        IpAddr::from_str(raw).map_err(|_| ConvertError::new(ConvertErrorKind::InvalidIpAddr, raw))
    }
}

impl FromBoundStr for IpNetwork {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        IpNetwork::from_str(raw).map_err(|_| ConvertError::new(ConvertErrorKind::InvalidNetwork, raw))
    }
}

impl FromBoundStr for Url {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        Url::parse(raw).map_err(|_| ConvertError::new(ConvertErrorKind::InvalidUrl, raw))
    }
}

impl FromBoundStr for Regex {
    fn from_bound_str(raw: &str) -> Result<Self, ConvertError> {
        Regex::new(raw).map_err(|_| ConvertError::new(ConvertErrorKind::InvalidRegex, raw))
    }
}
