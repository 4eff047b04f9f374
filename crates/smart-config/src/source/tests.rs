use assert_matches::assert_matches;

use super::*;

#[derive(Debug, Default, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
struct NestedConfig {
    #[config(rename = "renamed")]
    value: String,
    #[config(default_t = 42)]
    other_int: u32,
}

#[derive(Debug, Default, DescribeConfig, DeserializeConfig)]
#[config(crate = crate)]
struct ConfigWithNesting {
    #[config(default)]
    value: u32,
    #[config(default)]
    not_merged: String,
    #[config(nest)]
    nested: NestedConfig,
}

#[test]
fn nesting_json() {
    let env = Environment::from_iter(
        "",
        [
            ("value".to_owned(), "123".to_owned()),
            ("nested_renamed".to_owned(), "first".to_owned()),
            ("nested_other_int".to_owned(), "321".to_owned()),
        ],
    );

    let schema = ConfigSchema::new(&ConfigWithNesting::DESCRIPTION, "");
    let repo = ConfigRepository::new(&schema).with(env);

    let merged = repo.merged();
    assert_eq!(
        merged.get(Pointer("value")).unwrap().inner,
        Value::String("123".to_owned())
    );
    assert_eq!(
        merged.get(Pointer("nested.renamed")).unwrap().inner,
        Value::String("first".to_owned())
    );
    assert_eq!(
        merged.get(Pointer("nested.other_int")).unwrap().inner,
        Value::String("321".to_owned())
    );

    let config: ConfigWithNesting = repo.single().unwrap().parse().unwrap();
    assert_eq!(config.value, 123);
    assert_eq!(config.nested.value, "first");
    assert_eq!(config.nested.other_int, 321);
}

#[test]
fn merging_config_parts() {
    let mut schema = ConfigSchema::default();
    schema
        .insert(&ConfigWithNesting::DESCRIPTION, "")
        .unwrap()
        .push_alias("deprecated")
        .unwrap();

    let env = Environment::from_iter(
        "",
        [
            ("deprecated_value".to_owned(), "4".to_owned()),
            ("nested_renamed".to_owned(), "first".to_owned()),
        ],
    );
    let config: ConfigWithNesting = ConfigRepository::new(&schema)
        .with(env)
        .single()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(config.value, 4);
    assert_eq!(config.nested.value, "first");
    assert_eq!(config.nested.other_int, 42);

    // A value at the canonical location takes priority over the aliased one.
    let env = Environment::from_iter(
        "",
        [
            ("value".to_owned(), "123".to_owned()),
            ("deprecated_value".to_owned(), "4".to_owned()),
            ("nested_renamed".to_owned(), "first".to_owned()),
            ("nested_other_int".to_owned(), "321".to_owned()),
        ],
    );
    let config: ConfigWithNesting = ConfigRepository::new(&schema)
        .with(env)
        .single()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(config.value, 123);
    assert_eq!(config.nested.value, "first");
    assert_eq!(config.nested.other_int, 321);
}

#[test]
fn merging_configs() {
    let json = serde_json::json!({
        "value": 123,
        "not_merged": "base",
        "nested": {
            "renamed": "first",
            "other_int": 321,
        },
    });
    let serde_json::Value::Object(json) = json else {
        unreachable!();
    };
    let base = Json::new("base.json", json);

    let json = serde_json::json!({
        "not_merged": "override",
        "nested": {
            "other_int": 42,
        },
    });
    let serde_json::Value::Object(json) = json else {
        unreachable!();
    };
    let overrides = Json::new("overrides.json", json);

    let schema = ConfigSchema::new(&ConfigWithNesting::DESCRIPTION, "");
    let repo = ConfigRepository::new(&schema).with(base).with(overrides);

    let merged = repo.merged();
    assert_eq!(
        merged.get(Pointer("value")).unwrap().inner,
        Value::Number(123_u64.into())
    );
    let not_merged = merged.get(Pointer("not_merged")).unwrap();
    assert_eq!(not_merged.inner, Value::String("override".to_owned()));
    assert_matches!(
        not_merged.origin.as_ref(),
        ValueOrigin::Json { filename, .. } if filename.as_ref() == "overrides.json"
    );

    let renamed = merged.get(Pointer("nested.renamed")).unwrap();
    assert_eq!(renamed.inner, Value::String("first".to_owned()));
    assert_matches!(
        renamed.origin.as_ref(),
        ValueOrigin::Json { filename, .. } if filename.as_ref() == "base.json"
    );

    let other_int = merged.get(Pointer("nested.other_int")).unwrap();
    assert_eq!(other_int.inner, Value::Number(42_u64.into()));
    assert_matches!(
        other_int.origin.as_ref(),
        ValueOrigin::Json { filename, .. } if filename.as_ref() == "overrides.json"
    );

    let config: ConfigWithNesting = repo.single().unwrap().parse().unwrap();
    assert_eq!(config.value, 123);
    assert_eq!(config.not_merged, "override");
    assert_eq!(config.nested.value, "first");
    assert_eq!(config.nested.other_int, 42);
}

#[test]
fn using_aliases_with_object_config() {
    let mut schema = ConfigSchema::default();
    schema
        .insert(&ConfigWithNesting::DESCRIPTION, "test")
        .unwrap()
        .push_alias("deprecated")
        .unwrap();

    let json = serde_json::json!({
        "value": 123, // at a location not covered by the schema, should be ignored
        "deprecated": {
            "value": 321,
        },
        "test": {
            "nested": { "renamed": "first" },
        },
    });
    let serde_json::Value::Object(json) = json else {
        unreachable!();
    };
    let base = Json::new("base.json", json);
    let repo = ConfigRepository::new(&schema).with(base);

    let config: ConfigWithNesting = repo.single().unwrap().parse().unwrap();
    assert_eq!(config.value, 321);
    assert_eq!(config.nested.value, "first");
    assert_eq!(config.nested.other_int, 42);
}

#[test]
fn using_env_config_overrides() {
    let mut schema = ConfigSchema::default();
    schema
        .insert(&ConfigWithNesting::DESCRIPTION, "test")
        .unwrap()
        .push_alias("deprecated")
        .unwrap();

    let json = serde_json::json!({
        "test": {
            "value": 321,
            "nested": { "renamed": "first" },
        },
    });
    let serde_json::Value::Object(json) = json else {
        unreachable!();
    };
    let base = Json::new("base.json", json);

    let env = Environment::from_iter(
        "",
        [
            ("DEPRECATED_VALUE".to_owned(), "777".to_owned()), // lower priority than the canonical path
            ("TEST_NESTED_RENAMED".to_owned(), "second".to_owned()),
        ],
    );

    let repo = ConfigRepository::new(&schema).with(base).with(env);
    let enum_value = repo.merged().get(Pointer("test.nested.renamed")).unwrap();
    assert_eq!(enum_value.inner, Value::String("second".to_owned()));
    assert_matches!(enum_value.origin.as_ref(), ValueOrigin::EnvVar(_));

    let config: ConfigWithNesting = repo.single().unwrap().parse().unwrap();
    assert_eq!(config.value, 321);
    assert_eq!(config.nested.value, "second");

    let env = Environment::from_iter("", [("TEST_VALUE".to_owned(), "555".to_owned())]);
    let repo = repo.with(env);
    let int_value = repo.merged().get(Pointer("test.value")).unwrap();
    assert_eq!(int_value.inner, Value::String("555".to_owned()));

    let config: ConfigWithNesting = repo.single().unwrap().parse().unwrap();
    assert_eq!(config.value, 555);
    assert_eq!(config.nested.value, "second");
}
