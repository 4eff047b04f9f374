//! Test-only fixtures shared among multiple test modules.

use std::{collections::HashMap, collections::HashSet, path::PathBuf, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{
    de::{self, DeserializeContext, DeserializerOptions},
    metadata::TimeUnit,
    source::{ConfigContents, ConfigSource},
    value::{Map, Value, ValueOrigin, WithOrigin},
    ByteSize, DescribeConfig, DeserializeConfig, ParseError, ParseErrors,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SimpleEnum {
    First,
    Second,
}

/// Plain `serde`-deserialized param, used to test [`crate::de::ValueDeserializer`] directly,
/// bypassing the [`DeserializeConfig`] derive.
#[derive(Debug, Deserialize)]
pub(crate) struct TestParam {
    pub int: i32,
    pub optional: Option<i32>,
    pub bool: bool,
    pub string: String,
    pub array: [i32; 3],
    #[serde(rename = "renamed")]
    pub single: SimpleEnum,
    pub repeated: HashSet<SimpleEnum>,
}

#[derive(Debug, Clone, PartialEq, Default, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
pub(crate) struct NestedConfig {
    #[config(rename = "renamed")]
    pub simple_enum: SimpleEnum,
    #[config(default_t = 42)]
    pub other_int: u32,
    #[config(default)]
    pub map: HashMap<String, u32>,
}

impl NestedConfig {
    pub fn default_nested() -> Self {
        Self {
            simple_enum: SimpleEnum::Second,
            other_int: 42,
            map: HashMap::new(),
        }
    }
}

impl Default for SimpleEnum {
    fn default() -> Self {
        Self::First
    }
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
pub(crate) enum EnumConfig {
    /// Empty variant.
    #[config(rename = "first")]
    First,
    /// Variant wrapping a flattened config.
    Nested {
        #[config(flatten)]
        nested: NestedConfig,
    },
    #[config(alias = "Fields", alias = "With")]
    WithFields {
        string: Option<String>,
        #[config(default_t = true)]
        flag: bool,
        #[config(default_t = HashSet::from([23, 42]))]
        set: HashSet<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate, derive(Default), tag = "kind")]
pub(crate) enum DefaultingEnumConfig {
    First,
    #[config(default)]
    Second {
        #[config(default)]
        int: u32,
    },
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
pub(crate) struct CompoundConfig {
    #[config(nest)]
    pub nested: NestedConfig,
    #[config(nest, rename = "default", default_t = NestedConfig::default_nested())]
    pub nested_default: NestedConfig,
    #[config(flatten)]
    pub flat: NestedConfig,
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
pub(crate) struct ConfigWithNesting {
    #[config(nest)]
    pub nested: NestedConfig,
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate, derive(Default))]
pub(crate) struct DefaultingConfig {
    #[config(default_t = 12)]
    pub int: u32,
    pub float: Option<f64>,
    #[config(default_t = Some("https://example.com/".to_owned()))]
    pub url: Option<String>,
    #[config(default_t = HashSet::new(), with = de::Delimited(","))]
    pub set: HashSet<SimpleEnum>,
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
pub(crate) struct ComposedConfig {
    #[config(default)]
    pub durations: Vec<Duration>,
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
pub(crate) struct ConfigWithComplexTypes {
    #[config(default, with = de::Delimited(","))]
    pub array: [u32; 2],
    #[config(default)]
    pub assumed: f64,
    #[config(default)]
    pub path: PathBuf,
    #[config(default_t = Duration::from_millis(100), with = TimeUnit::Millis)]
    pub short_dur: Duration,
    #[config(default_t = ByteSize(0), with = crate::metadata::SizeUnit::Bytes)]
    pub disk_size: ByteSize,
    #[config(default)]
    pub memory_size_mb: u64,
    #[config(default, with = de::Serde![str])]
    pub with_custom_deserializer: String,
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
pub(crate) struct NestedAliasedConfig {
    pub str: String,
    pub string: String,
}

#[derive(Debug, Clone, PartialEq, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
pub(crate) struct AliasedConfig {
    #[config(nest, alias = "nest")]
    pub nested: NestedAliasedConfig,
}

/// Converts a flat / hierarchical source into a root value, without going through
/// a [`crate::schema::ConfigSchema`]-driven nesting pass. Only fit for fixtures whose params
/// all live at the top level.
pub(crate) fn wrap_into_value(source: impl ConfigSource) -> WithOrigin {
    let contents = source.into_contents();
    let origin = contents.origin;
    let inner = match contents.inner.into() {
        ConfigContents::KeyValue(kv) => Value::Object(
            kv.into_iter()
                .map(|(key, value)| (key, value.map(Into::into)))
                .collect(),
        ),
        ConfigContents::Hierarchical(map) => Value::Object(map),
    };
    WithOrigin { inner, origin }
}

pub(crate) fn test_deserialize<C: DeserializeConfig>(value: &WithOrigin) -> Result<C, ParseErrors> {
    let options = DeserializerOptions::default();
    let mut errors = ParseErrors::default();
    let ctx = DeserializeContext::new(&options, value, String::new(), &C::DESCRIPTION, &mut errors);
    ctx.deserialize_config::<C>().map_err(|_| {
        if errors.len() == 0 {
            errors.push(ParseError::generic(String::new(), &C::DESCRIPTION));
        }
        errors
    })
}

pub(crate) fn test_deserialize_missing<C: DeserializeConfig>() -> Result<C, ParseErrors> {
    let root = WithOrigin::new(Value::Object(Map::new()), Arc::new(ValueOrigin::Unknown));
    test_deserialize(&root)
}
