//! End-to-end coverage for `#[derive(Bind)]`, driving the generated `BindFields` impls through
//! the scenarios documented for the binder rather than hand-rolling `BindFields` by hand.

use smart_bind::{
    BindOptions, Binder, BindErrorKind, Bind, PathParams, QueryParams, SourceSet, TagFamily,
};

#[derive(Debug, PartialEq, Bind)]
struct MultiSourceParams {
    #[bind(path = "id")]
    id: i64,
    #[bind(query = "page")]
    page: i64,
    #[bind(query = "name")]
    name: String,
}

#[test]
fn scenario_1_multi_source_bind() {
    let mut path = PathParams::new();
    path.insert("id", "42");
    let mut query = QueryParams::new();
    query.insert("page", "3");
    query.insert("name", "dave");

    let sources = SourceSet::new()
        .add(TagFamily::Path, path)
        .add(TagFamily::Query, query);

    let bound: MultiSourceParams = Binder::new().bind(&sources).unwrap();
    assert_eq!(bound, MultiSourceParams { id: 42, page: 3, name: "dave".to_owned() });
}

#[derive(Debug, PartialEq, Bind)]
struct PlainScalarParams {
    #[bind(query = "id")]
    id: i64,
    #[bind(query = "name")]
    name: String,
}

#[test]
fn absent_scalar_without_default_or_required_binds_to_zero_value() {
    let query = QueryParams::new();
    let sources = SourceSet::new().add(TagFamily::Query, query);
    let bound: PlainScalarParams = Binder::new().bind(&sources).unwrap();
    assert_eq!(bound, PlainScalarParams { id: 0, name: String::new() });
}

#[derive(Debug, PartialEq, Bind)]
struct RequiredModifierParams {
    #[bind(query = "id")]
    id: i64,
    #[bind(query = "code", required)]
    code: String,
}

#[test]
fn required_modifier_reports_missing_field() {
    let mut query = QueryParams::new();
    query.insert("id", "7");
    let sources = SourceSet::new().add(TagFamily::Query, query);
    let errors = Binder::new().bind::<RequiredModifierParams>(&sources).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.iter().next().unwrap().path(), "code");
}

#[derive(Debug, Bind)]
struct PageSize {
    #[bind(query = "width")]
    width: i32,
}

#[derive(Debug, Bind)]
struct Settings {
    #[bind(query = "copies")]
    copies: i32,
    #[bind(query = "page_size", nested)]
    page_size: Option<Box<PageSize>>,
}

#[derive(Debug, Bind)]
struct NestedPointerParams {
    #[bind(query = "settings", nested)]
    settings: Option<Box<Settings>>,
}

#[test]
fn scenario_2_nested_pointer_allocation() {
    let mut query = QueryParams::new();
    query.insert("settings.page_size.width", "210");

    let sources = SourceSet::new().add(TagFamily::Query, query);
    let bound: NestedPointerParams = Binder::new().bind(&sources).unwrap();

    let settings = bound.settings.expect("settings should be allocated");
    assert_eq!(settings.copies, 0);
    let page_size = settings.page_size.expect("page_size should be allocated");
    assert_eq!(page_size.width, 210);
}

#[test]
fn nested_pointer_stays_nil_without_any_sub_key() {
    let sources = SourceSet::new().add(TagFamily::Query, QueryParams::new());
    let bound: NestedPointerParams = Binder::new().bind(&sources).unwrap();
    assert!(bound.settings.is_none());
}

#[derive(Debug, Bind)]
struct StatusParams {
    #[bind(query = "status", enum = "active,inactive")]
    status: String,
}

#[test]
fn scenario_4_enum_rejection() {
    let mut query = QueryParams::new();
    query.insert("status", "deleted");

    let sources = SourceSet::new().add(TagFamily::Query, query);
    let errors = Binder::new().bind::<StatusParams>(&sources).unwrap_err();

    let error = errors.iter().find(|e| matches!(e.kind(), BindErrorKind::EnumViolation)).unwrap();
    assert_eq!(error.path(), "status");
    assert_eq!(error.raw_value(), Some("deleted"));
}

#[derive(Debug, PartialEq, Bind)]
struct CodecParams {
    #[bind(msgpack = "name")]
    name: String,
    #[bind(msgpack = "port")]
    port: i64,
}

#[test]
fn scenario_6_codec_with_unknown_field_strictness() {
    use smart_bind::BodySource;
    use smart_config::codec::{Codec, CodecId, CodecRegistry};

    smart_config::codec::register_builtin_codecs();
    let codec = CodecRegistry::get(CodecId::new("msgpack")).unwrap();
    let bytes = codec
        .encode(&serde_json::json!({ "name": "svc", "port": 8080, "unknown": "oops" }))
        .unwrap();

    let lenient_source = BodySource::decode(TagFamily::MsgPack, CodecId::new("msgpack"), &bytes).unwrap();
    let sources = SourceSet::new().add(TagFamily::MsgPack, lenient_source);
    let bound: CodecParams = Binder::new().bind(&sources).unwrap();
    assert_eq!(bound, CodecParams { name: "svc".to_owned(), port: 8080 });

    let strict_source = BodySource::decode(TagFamily::MsgPack, CodecId::new("msgpack"), &bytes).unwrap();
    let sources = SourceSet::new().add(TagFamily::MsgPack, strict_source);
    let strict = Binder::with_options(BindOptions { strict_unknown_fields: true, ..BindOptions::default() });
    let errors = strict.bind::<CodecParams>(&sources).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e.kind(), BindErrorKind::UnknownField) && e.to_string().contains("unknown")));
}

#[derive(Debug)]
struct RejectNegativePort;

impl smart_bind::BodyValidator for RejectNegativePort {
    fn validate(&self, value: &serde_json::Value) -> Result<(), String> {
        match value.get("port").and_then(serde_json::Value::as_i64) {
            Some(port) if port < 0 => Err(format!("port {port} must not be negative")),
            _ => Ok(()),
        }
    }
}

#[test]
fn body_validator_runs_before_flattening() {
    use smart_bind::BodySource;
    use smart_config::codec::{Codec, CodecId, CodecRegistry};

    smart_config::codec::register_builtin_codecs();
    let codec = CodecRegistry::get(CodecId::new("msgpack")).unwrap();

    let good_bytes = codec.encode(&serde_json::json!({ "name": "svc", "port": 8080 })).unwrap();
    let source = BodySource::decode_validated(
        TagFamily::MsgPack,
        CodecId::new("msgpack"),
        &good_bytes,
        Some(&RejectNegativePort),
    )
    .unwrap();
    let sources = SourceSet::new().add(TagFamily::MsgPack, source);
    let bound: CodecParams = Binder::new().bind(&sources).unwrap();
    assert_eq!(bound, CodecParams { name: "svc".to_owned(), port: 8080 });

    let bad_bytes = codec.encode(&serde_json::json!({ "name": "svc", "port": -1 })).unwrap();
    let result = BodySource::decode_validated(
        TagFamily::MsgPack,
        CodecId::new("msgpack"),
        &bad_bytes,
        Some(&RejectNegativePort),
    );
    assert!(result.unwrap_err().to_string().contains("must not be negative"));
}
