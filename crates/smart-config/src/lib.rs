//! Schema-driven, layered configuration system with support for multiple configuration formats,
//! remote key-value backends, JSON Schema validation, and atomic hot-reloadable snapshots.

pub use smart_config_derive::{DescribeConfig, DeserializeConfig};

use self::{error::DeserializeConfigError, metadata::ConfigMetadata};
pub use self::{
    codec::{Codec, CodecId, CodecRegistry},
    de::ValueDeserializer,
    dump::Dump,
    error::{ParseError, ParseErrorCategory, ParseErrors},
    schema::ConfigSchema,
    schema_validation::{SchemaValidation, SchemaViolations},
    snapshot::{ConfigAccessor, ConfigSnapshot},
    source::{
        ConfigRepository, ConfigSource, Environment, File, Json, KeyValueMap, RemoteKv, Toml, Yaml,
    },
    types::ByteSize,
    validation::Validate,
};

pub mod codec;
mod de;
pub mod dump;
mod error;
pub mod fallback;
pub mod metadata;
pub mod schema;
pub mod schema_validation;
pub mod snapshot;
mod source;
#[cfg(feature = "testing")]
pub mod testing;
#[cfg(test)]
mod testonly;
mod types;
mod utils;
pub mod validation;
pub mod value;
mod visit;

/// Context passed through the deserialization tree; re-exported so downstream derive macro
/// output can name it without reaching into `de`.
pub use self::de::{
    DeserializeConfig, DeserializeContext, DeserializeParam, DeserializerOptions,
};

/// Describes a configuration (i.e., a group of related parameters).
pub trait DescribeConfig: 'static {
    /// Metadata for this configuration.
    const DESCRIPTION: ConfigMetadata;
}
