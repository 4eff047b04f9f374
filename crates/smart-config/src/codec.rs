//! Pluggable encoders/decoders for configuration file formats and scalar remote-KV values.
//!
//! Codecs operate on a JSON intermediate representation ([`serde_json::Value`]), which is also
//! the crate's internal object model (see [`crate::value`]); this lets any codec feed directly
//! into [`crate::source::File`] / [`crate::dump::Dump`] and into `smart-bind`'s body decoding
//! without a format-specific fast path for each.

use std::{
    any,
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

/// Identifier of a registered [`Codec`], e.g. `"json"` or `"msgpack"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecId(&'static str);

impl CodecId {
    /// Creates an identifier from a static string.
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    /// Returns the underlying string.
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.0)
    }
}

/// A pluggable encoder/decoder for a configuration wire format.
pub trait Codec: fmt::Debug + Send + Sync {
    /// Identifier this codec is registered under.
    fn id(&self) -> CodecId;

    /// Decodes raw bytes into the JSON intermediate representation.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` isn't valid input for this codec.
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value>;

    /// Encodes a JSON value into this codec's wire format.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented in this format, or if the format
    /// doesn't support encoding at all (e.g. `env_var`).
    fn encode(&self, value: &serde_json::Value) -> anyhow::Result<Vec<u8>>;
}

/// Process-wide registry of [`Codec`]s, keyed by [`CodecId`].
#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: HashMap<&'static str, Arc<dyn Codec>>,
}

static REGISTRY: OnceLock<RwLock<CodecRegistry>> = OnceLock::new();

impl CodecRegistry {
    fn global() -> &'static RwLock<Self> {
        REGISTRY.get_or_init(|| RwLock::new(Self::default()))
    }

    /// Registers a codec, replacing any previously registered under the same id.
    pub fn register(codec: impl Codec + 'static) {
        let mut registry = Self::global().write().unwrap_or_else(PoisonError::into_inner);
        registry.codecs.insert(codec.id().as_str(), Arc::new(codec));
    }

    /// Looks up a codec by id.
    #[must_use]
    pub fn get(id: CodecId) -> Option<Arc<dyn Codec>> {
        Self::global()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .codecs
            .get(id.as_str())
            .cloned()
    }

    /// Maps a file extension (without the leading dot) to a registered codec, if recognized.
    #[must_use]
    pub fn for_extension(ext: &str) -> Option<Arc<dyn Codec>> {
        let id = match ext {
            "json" => "json",
            "yaml" | "yml" => "yaml",
            "toml" => "toml",
            "xml" => "xml",
            "msgpack" | "mp" => "msgpack",
            "proto" | "pb" => "proto",
            _ => return None,
        };
        Self::get(CodecId::new(id))
    }
}

/// Registers all built-in codecs. Idempotent; safe to call from multiple entry points
/// (`ConfigRepository::new`, `smart_bind::Binder::new`).
pub fn register_builtin_codecs() {
    CodecRegistry::register(JsonCodec);
    CodecRegistry::register(YamlCodec);
    CodecRegistry::register(TomlCodec);
    CodecRegistry::register(XmlCodec);
    CodecRegistry::register(MsgPackCodec);
    CodecRegistry::register(ProtoCodec);
    CodecRegistry::register(EnvVarCodec);
}

#[derive(Debug)]
struct JsonCodec;

impl Codec for JsonCodec {
    fn id(&self) -> CodecId {
        CodecId::new("json")
    }

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        // Unlike YAML/TOML, an empty JSON document isn't valid input, so this is a genuine error.
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode(&self, value: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(value)?)
    }
}

#[derive(Debug)]
struct YamlCodec;

impl Codec for YamlCodec {
    fn id(&self) -> CodecId {
        CodecId::new("yaml")
    }

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        let value: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
        Ok(match value {
            serde_yaml::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => serde_json::to_value(other)?,
        })
    }

    fn encode(&self, value: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        Ok(serde_yaml::to_string(value)?.into_bytes())
    }
}

#[derive(Debug)]
struct TomlCodec;

impl Codec for TomlCodec {
    fn id(&self) -> CodecId {
        CodecId::new("toml")
    }

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        let text = std::str::from_utf8(bytes)?;
        let table: toml::Table = text.parse()?;
        Ok(serde_json::to_value(table)?)
    }

    fn encode(&self, value: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        let table: toml::Value = serde_json::from_value(value.clone())?;
        Ok(toml::to_string_pretty(&table)?.into_bytes())
    }
}

#[derive(Debug)]
struct XmlCodec;

impl Codec for XmlCodec {
    fn id(&self) -> CodecId {
        CodecId::new("xml")
    }

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        let text = std::str::from_utf8(bytes)?;
        Ok(quick_xml::de::from_str(text)?)
    }

    fn encode(&self, value: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        Ok(quick_xml::se::to_string(value)?.into_bytes())
    }
}

#[derive(Debug)]
struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn id(&self) -> CodecId {
        CodecId::new("msgpack")
    }

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    fn encode(&self, value: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }
}

/// Placeholder for Protobuf decoding, which (unlike the other built-ins) requires a concrete
/// `prost::Message` type and can't operate on the untyped JSON model; callers that need Protobuf
/// support decode via `prost` directly against their generated message type and bypass this
/// codec's JSON round trip. It's kept registered so `CodecId::new("proto")` resolves and so
/// callers get a clear error rather than an unknown-codec one.
#[derive(Debug)]
struct ProtoCodec;

impl Codec for ProtoCodec {
    fn id(&self) -> CodecId {
        CodecId::new("proto")
    }

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        if bytes.is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        anyhow::bail!(
            "Protobuf decoding requires a concrete `prost::Message` type; decode directly instead of via `CodecRegistry`"
        )
    }

    fn encode(&self, _value: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("Protobuf encoding requires a concrete `prost::Message` type")
    }
}

#[derive(Debug)]
struct EnvVarCodec;

impl Codec for EnvVarCodec {
    fn id(&self) -> CodecId {
        CodecId::new("env_var")
    }

    /// Parses `KEY=VALUE` lines into a nested mapping: each key is lowercased, then split on
    /// `_` to form nesting levels (consecutive underscores collapse, an all-underscore key is
    /// dropped). Where a later key conflicts with an earlier one, scalar vs. nested, the later
    /// declaration wins outright.
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        let text = std::str::from_utf8(bytes)?;
        let mut root = serde_json::Map::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let lower = key.trim().to_ascii_lowercase();
            let parts: Vec<&str> = lower.split('_').filter(|part| !part.is_empty()).collect();
            if parts.is_empty() {
                continue;
            }
            set_nested_env_value(&mut root, &parts, serde_json::Value::String(value.trim().to_owned()));
        }
        Ok(serde_json::Value::Object(root))
    }

    fn encode(&self, _value: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("the `env_var` codec doesn't support encoding")
    }
}

/// Inserts `value` at the nesting path described by `parts`, overwriting whatever previously
/// occupied each level (scalar or object) as later keys are processed.
fn set_nested_env_value(map: &mut serde_json::Map<String, serde_json::Value>, parts: &[&str], value: serde_json::Value) {
    let Some((head, rest)) = parts.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert((*head).to_owned(), value);
        return;
    }
    let entry = map
        .entry((*head).to_owned())
        .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    if !entry.is_object() {
        *entry = serde_json::Value::Object(serde_json::Map::new());
    }
    if let serde_json::Value::Object(nested) = entry {
        set_nested_env_value(nested, rest, value);
    }
}

/// Converts a single scalar string (as found in environment variables / remote-KV values) into
/// a JSON value of the given target kind. Registered per-type under ids like `caster-i64` by
/// consumers (`smart-bind`'s form/query binding, `RemoteKv`'s scalar decode) that know the
/// target type statically; this module only provides the common primitive casters.
pub trait ScalarCaster: fmt::Debug + Send + Sync {
    /// Identifier this caster is registered under, e.g. `caster-i64`.
    fn id(&self) -> CodecId;

    /// Casts `raw` to the target JSON representation.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` can't be parsed as the target type.
    fn cast(&self, raw: &str) -> anyhow::Result<serde_json::Value>;
}

macro_rules! impl_numeric_caster {
    ($name:ident, $id:literal, $ty:ty) => {
        #[derive(Debug)]
        struct $name;

        impl ScalarCaster for $name {
            fn id(&self) -> CodecId {
                CodecId::new($id)
            }

            fn cast(&self, raw: &str) -> anyhow::Result<serde_json::Value> {
                let parsed: $ty = raw.parse()?;
                Ok(serde_json::to_value(parsed)?)
            }
        }
    };
}

impl_numeric_caster!(I64Caster, "caster-i64", i64);
impl_numeric_caster!(U64Caster, "caster-u64", u64);
impl_numeric_caster!(F64Caster, "caster-f64", f64);

#[derive(Debug)]
struct BoolCaster;

impl ScalarCaster for BoolCaster {
    fn id(&self) -> CodecId {
        CodecId::new("caster-bool")
    }

    fn cast(&self, raw: &str) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::Value::Bool(raw.parse()?))
    }
}

#[derive(Debug)]
struct StringCaster;

impl ScalarCaster for StringCaster {
    fn id(&self) -> CodecId {
        CodecId::new("caster-string")
    }

    fn cast(&self, raw: &str) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::Value::String(raw.to_owned()))
    }
}

/// Registry for [`ScalarCaster`]s, mirroring [`CodecRegistry`] but for single-value casts.
#[derive(Debug, Default)]
pub struct CasterRegistry {
    casters: HashMap<&'static str, Arc<dyn ScalarCaster>>,
}

static CASTERS: OnceLock<RwLock<CasterRegistry>> = OnceLock::new();

impl CasterRegistry {
    fn global() -> &'static RwLock<Self> {
        CASTERS.get_or_init(|| {
            let mut registry = Self::default();
            for caster in [
                Arc::new(I64Caster) as Arc<dyn ScalarCaster>,
                Arc::new(U64Caster),
                Arc::new(F64Caster),
                Arc::new(BoolCaster),
                Arc::new(StringCaster),
            ] {
                registry.casters.insert(caster.id().as_str(), caster);
            }
            RwLock::new(registry)
        })
    }

    /// Registers a caster, replacing any previously registered under the same id.
    pub fn register(caster: impl ScalarCaster + 'static) {
        let mut registry = Self::global().write().unwrap_or_else(PoisonError::into_inner);
        registry.casters.insert(caster.id().as_str(), Arc::new(caster));
    }

    /// Looks up a caster by id.
    #[must_use]
    pub fn get(id: CodecId) -> Option<Arc<dyn ScalarCaster>> {
        Self::global()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .casters
            .get(id.as_str())
            .cloned()
    }
}

fn _assert_send_sync<T: Send + Sync>() {}
fn _assert_registry_bounds() {
    _assert_send_sync::<CodecRegistry>();
    _assert_send_sync::<CasterRegistry>();
    let _ = any::type_name::<CodecRegistry>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_codec_round_trip() {
        register_builtin_codecs();
        let codec = CodecRegistry::get(CodecId::new("json")).unwrap();
        let value = serde_json::json!({"a": 1, "b": [true, null]});
        let bytes = codec.encode(&value).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn yaml_codec_empty_input_is_empty_object() {
        register_builtin_codecs();
        let codec = CodecRegistry::get(CodecId::new("yaml")).unwrap();
        let value = codec.decode(b"").unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn json_codec_empty_input_is_an_error() {
        register_builtin_codecs();
        let codec = CodecRegistry::get(CodecId::new("json")).unwrap();
        assert!(codec.decode(b"").is_err());
    }

    #[test]
    fn extension_lookup() {
        register_builtin_codecs();
        assert_eq!(CodecRegistry::for_extension("yml").unwrap().id(), CodecId::new("yaml"));
        assert!(CodecRegistry::for_extension("exe").is_none());
    }

    #[test]
    fn casting_scalars() {
        let caster = CasterRegistry::get(CodecId::new("caster-i64")).unwrap();
        assert_eq!(caster.cast("42").unwrap(), serde_json::json!(42));
        assert!(caster.cast("nope").is_err());
    }

    #[test]
    fn env_var_codec_does_not_support_encoding() {
        register_builtin_codecs();
        let codec = CodecRegistry::get(CodecId::new("env_var")).unwrap();
        assert!(codec.encode(&serde_json::json!("x")).is_err());
    }

    #[test]
    fn env_var_codec_builds_nested_mapping() {
        register_builtin_codecs();
        let codec = CodecRegistry::get(CodecId::new("env_var")).unwrap();
        let decoded = codec
            .decode(b"DATABASE_HOST=localhost\nDATABASE_USER_NAME=admin\n")
            .unwrap();
        assert_eq!(decoded["database"]["host"], serde_json::json!("localhost"));
        assert_eq!(decoded["database"]["user"]["name"], serde_json::json!("admin"));
    }

    #[test]
    fn env_var_codec_later_key_overwrites_earlier_across_conflict() {
        register_builtin_codecs();
        let codec = CodecRegistry::get(CodecId::new("env_var")).unwrap();
        // `A` is first a scalar, then gets a nested child; the nested form wins.
        let decoded = codec.decode(b"A=1\nA_B=2\n").unwrap();
        assert_eq!(decoded["a"]["b"], serde_json::json!("2"));

        // And the reverse: nested first, then a plain scalar at the same key.
        let decoded = codec.decode(b"A_B=2\nA=1\n").unwrap();
        assert_eq!(decoded["a"], serde_json::json!("1"));
    }

    #[test]
    fn env_var_codec_collapses_and_drops_empty_parts() {
        register_builtin_codecs();
        let codec = CodecRegistry::get(CodecId::new("env_var")).unwrap();
        let decoded = codec.decode(b"DATABASE__HOST=localhost\n___=dropped\n").unwrap();
        assert_eq!(decoded["database"]["host"], serde_json::json!("localhost"));
        assert!(decoded.get("").is_none());
    }
}
