//! Value sources (C1): uniform access to path params, query strings, form bodies, headers,
//! cookies and decoded request bodies, all normalized to flat dot-path string maps so the binder
//! can resolve any of them the same way.

use std::{collections::BTreeMap, fmt};

use smart_config::codec::{CodecId, CodecRegistry};

/// A family of tags (`path`, `query`, `form`, ...) a struct field can be bound from. A single
/// field may carry tags for more than one family; [`crate::bind::Binder`] applies each registered
/// source in turn, skipping fields that have no tag for that family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum TagFamily {
    Path,
    Query,
    Form,
    Header,
    Cookie,
    Json,
    Xml,
    Toml,
    MsgPack,
    Protobuf,
}

impl TagFamily {
    /// The struct tag name this family is declared with, e.g. `#[bind(query = "page")]`.
    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Form => "form",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Toml => "toml",
            Self::MsgPack => "msgpack",
            Self::Protobuf => "protobuf",
        }
    }

    /// True for families that decode a whole request body rather than looking up individual
    /// named parameters.
    pub fn is_body(self) -> bool {
        matches!(
            self,
            Self::Json | Self::Xml | Self::Toml | Self::MsgPack | Self::Protobuf
        )
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.tag_name())
    }
}

/// Something the binder can pull named, possibly-repeated string values out of.
pub trait ValueSource: fmt::Debug {
    /// All values registered under `key` (more than one for repeated query/form params), in
    /// declaration order. Empty if the key is absent.
    fn values(&self, key: &str) -> Vec<&str>;

    /// Every key present in the source, used to enumerate a field bound as a map.
    fn keys(&self) -> Vec<&str>;
}

/// A flat `dot.path -> [values]` map shared by every concrete source below.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl ValueMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value under `key`, preserving any values already registered there.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    fn flatten_json(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, Vec<String>>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, nested) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::flatten_json(&path, nested, out);
                }
            }
            serde_json::Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let path = format!("{prefix}.{index}");
                    Self::flatten_json(&path, item, out);
                }
            }
            serde_json::Value::Null => {}
            serde_json::Value::Bool(value) => {
                out.entry(prefix.to_owned()).or_default().push(value.to_string());
            }
            serde_json::Value::Number(value) => {
                out.entry(prefix.to_owned()).or_default().push(value.to_string());
            }
            serde_json::Value::String(value) => {
                out.entry(prefix.to_owned()).or_default().push(value.clone());
            }
        }
    }

    /// Builds a map by flattening a decoded JSON-like value into dot-paths.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut entries = BTreeMap::new();
        Self::flatten_json("", value, &mut entries);
        Self { entries }
    }

    /// Builds a map from a `key=value&key2=value2`-style percent-encoded string.
    #[must_use]
    pub fn from_urlencoded(raw: &str) -> Self {
        let mut map = Self::new();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            map.insert(key.into_owned(), value.into_owned());
        }
        map
    }
}

impl ValueSource for ValueMap {
    fn values(&self, key: &str) -> Vec<&str> {
        self.entries
            .get(key)
            .map(|values| values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

macro_rules! value_map_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $name(ValueMap);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Appends a value under `key`.
            pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
                self.0.insert(key, value);
            }
        }

        impl From<ValueMap> for $name {
            fn from(map: ValueMap) -> Self {
                Self(map)
            }
        }

        impl ValueSource for $name {
            fn values(&self, key: &str) -> Vec<&str> {
                self.0.values(key)
            }

            fn keys(&self) -> Vec<&str> {
                self.0.keys()
            }
        }
    };
}

value_map_newtype!(
    /// Path parameters extracted by a router (e.g. `/users/{id}`).
    PathParams
);
value_map_newtype!(
    /// Parsed `?key=value` query string parameters; repeated keys keep every value.
    QueryParams
);
value_map_newtype!(
    /// Parsed `application/x-www-form-urlencoded` body parameters.
    FormParams
);
value_map_newtype!(
    /// Request headers, keyed by lowercase header name.
    Headers
);
value_map_newtype!(
    /// Parsed `Cookie` header values, keyed by cookie name.
    Cookies
);

impl QueryParams {
    /// Parses a raw query string (without the leading `?`).
    #[must_use]
    pub fn from_query_str(raw: &str) -> Self {
        Self(ValueMap::from_urlencoded(raw))
    }
}

impl FormParams {
    /// Parses a raw `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn from_body(raw: &[u8]) -> Self {
        Self(ValueMap::from_urlencoded(&String::from_utf8_lossy(raw)))
    }
}

impl Headers {
    /// Builds headers from an [`http::HeaderMap`], lowercasing names and skipping any value
    /// that isn't valid UTF-8.
    #[must_use]
    pub fn from_header_map(headers: &http::HeaderMap) -> Self {
        let mut map = ValueMap::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                map.insert(name.as_str().to_ascii_lowercase(), value.to_owned());
            }
        }
        Self(map)
    }
}

impl Cookies {
    /// Parses a raw `Cookie` header value (`name=value; name2=value2`).
    pub fn from_header_value(raw: &str) -> anyhow::Result<Self> {
        let mut map = ValueMap::new();
        for cookie in cookie::Cookie::split_parse(raw) {
            let cookie = cookie?;
            map.insert(cookie.name().to_owned(), cookie.value().to_owned());
        }
        Ok(Self(map))
    }
}

/// Runs against a body's decoded JSON representation before it's flattened for binding, letting a
/// caller reject a payload as a whole (cross-field checks a single field setter can't express)
/// rather than through `#[derive(Bind)]`'s per-field setters. Mirrors `smart-config`'s own
/// `Validate<T>` trait (`validation/mod.rs`), one level earlier in the pipeline.
pub trait BodyValidator: fmt::Debug {
    /// Returns an error message if `value` should be rejected.
    fn validate(&self, value: &serde_json::Value) -> Result<(), String>;
}

/// A whole request body, decoded by a registered codec into JSON and flattened for lookup.
#[derive(Debug, Clone)]
pub struct BodySource {
    family: TagFamily,
    map: ValueMap,
}

impl BodySource {
    /// Decodes `bytes` with the codec registered under `codec_id`, flattening the result without
    /// running any validator. Equivalent to `decode_validated(family, codec_id, bytes, None)`.
    pub fn decode(family: TagFamily, codec_id: CodecId, bytes: &[u8]) -> anyhow::Result<Self> {
        Self::decode_validated(family, codec_id, bytes, None)
    }

    /// Decodes `bytes` with the codec registered under `codec_id`, then runs `validator` (if any)
    /// against the decoded value before flattening it. A panicking validator is trapped the same
    /// way `smart-config` traps a panicking user validation callback, and reported as an error
    /// rather than propagated.
    pub fn decode_validated(
        family: TagFamily,
        codec_id: CodecId,
        bytes: &[u8],
        validator: Option<&dyn BodyValidator>,
    ) -> anyhow::Result<Self> {
        let codec = CodecRegistry::get(codec_id)
            .ok_or_else(|| anyhow::anyhow!("no codec registered for {codec_id:?}"))?;
        let decoded = codec.decode(bytes)?;

        if let Some(validator) = validator {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                validator.validate(&decoded)
            }));
            let result = outcome.unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "body validator panicked".to_owned());
                Err(message)
            });
            if let Err(message) = result {
                anyhow::bail!("body validation failed: {message}");
            }
        }

        Ok(Self {
            family,
            map: ValueMap::from_json(&decoded),
        })
    }

    /// The body family this source was decoded for (`json`, `xml`, ...).
    pub fn family(&self) -> TagFamily {
        self.family
    }
}

impl ValueSource for BodySource {
    fn values(&self, key: &str) -> Vec<&str> {
        self.map.values(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.map.keys()
    }
}

/// A view over another source that transparently strips a dot-path prefix, so a nested record's
/// generated `apply_family` can address its own fields (`page_size.width`) without knowing it's
/// embedded under a parent field (`settings.page_size.width`).
#[derive(Debug, Clone, Copy)]
pub struct ScopedSource<'a> {
    prefix: &'a str,
    inner: &'a dyn ValueSource,
}

impl<'a> ScopedSource<'a> {
    #[must_use]
    pub fn new(inner: &'a dyn ValueSource, prefix: &'a str) -> Self {
        Self { prefix, inner }
    }

    fn scoped_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.prefix)
        }
    }
}

impl ValueSource for ScopedSource<'_> {
    fn values(&self, key: &str) -> Vec<&str> {
        // `values` needs an owned lookup key; delegate through a temporary and re-fetch to keep
        // the returned slice borrowed from `inner`, not from this temporary.
        let scoped = self.scoped_key(key);
        self.inner.values(&scoped)
    }

    fn keys(&self) -> Vec<&str> {
        let prefix_dot = format!("{}.", self.prefix);
        self.inner
            .keys()
            .into_iter()
            .filter_map(|key| key.strip_prefix(prefix_dot.as_str()))
            .collect()
    }
}

/// The ordered collection of sources a single bind call draws from. Order matters only in that
/// it determines iteration order for diagnostics; each field is resolved from whichever source(s)
/// its tags name.
#[derive(Debug, Default)]
pub struct SourceSet {
    sources: Vec<(TagFamily, Box<dyn ValueSource>)>,
}

impl SourceSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under the given family.
    #[must_use]
    pub fn add(mut self, family: TagFamily, source: impl ValueSource + 'static) -> Self {
        self.sources.push((family, Box::new(source)));
        self
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (TagFamily, &dyn ValueSource)> {
        self.sources.iter().map(|(family, source)| (*family, source.as_ref()))
    }
}
