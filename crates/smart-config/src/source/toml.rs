use std::sync::Arc;

use super::ConfigSource;
use crate::value::{FileFormat, Map, Pointer, StrValue, Value, ValueOrigin, WithOrigin};

/// TOML-based configuration source.
#[derive(Debug)]
pub struct Toml {
    origin: Arc<ValueOrigin>,
    inner: Map,
}

impl Toml {
    /// Creates a source with the specified filename and contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the input doesn't conform to the JSON object model (e.g. TOML
    /// datetimes, which have no direct JSON equivalent, are mapped to strings instead, so this
    /// only fails for genuinely unsupported shapes).
    pub fn new(filename: &str, object: toml::Table) -> anyhow::Result<Self> {
        let origin = Arc::new(ValueOrigin::File {
            name: filename.to_owned(),
            format: FileFormat::Toml,
        });
        let inner = Self::map_value(toml::Value::Table(object), &origin, String::new())?.inner;
        let Value::Object(inner) = inner else {
            unreachable!();
        };
        Ok(Self { origin, inner })
    }

    fn map_value(
        value: toml::Value,
        file_origin: &Arc<ValueOrigin>,
        path: String,
    ) -> anyhow::Result<WithOrigin> {
        let inner = match value {
            toml::Value::Boolean(value) => Value::Bool(value),
            toml::Value::Integer(value) => Value::Number(value.into()),
            toml::Value::Float(value) => serde_json::Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::String(value) => Value::String(StrValue::Plain(value)),
            // TOML datetimes have no JSON equivalent; represent them as RFC 3339 strings.
            toml::Value::Datetime(value) => Value::String(StrValue::Plain(value.to_string())),
            toml::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| {
                        let child_path = Pointer(&path).join(&i.to_string());
                        Self::map_value(value, file_origin, child_path)
                    })
                    .collect::<anyhow::Result<_>>()?,
            ),
            toml::Value::Table(items) => Value::Object(
                items
                    .into_iter()
                    .map(|(key, value)| {
                        let child_path = Pointer(&path).join(&key);
                        anyhow::Ok((key, Self::map_value(value, file_origin, child_path)?))
                    })
                    .collect::<anyhow::Result<_>>()?,
            ),
        };

        Ok(WithOrigin {
            inner,
            origin: Arc::new(ValueOrigin::Path {
                source: file_origin.clone(),
                path,
            }),
        })
    }
}

impl ConfigSource for Toml {
    type Map = Map;

    fn into_contents(self) -> WithOrigin<Map> {
        WithOrigin {
            inner: self.inner,
            origin: self.origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const TOML_CONFIG: &str = r#"
bool = true

[nested]
int = 123
string = "what?"
"#;

    #[test]
    fn creating_toml_config() {
        let parsed: toml::Table = TOML_CONFIG.parse().unwrap();
        let toml = Toml::new("test.toml", parsed).unwrap();

        assert_matches!(toml.inner["bool"].inner, Value::Bool(true));
        let str = toml.inner["nested"].get(Pointer("string")).unwrap();
        assert_matches!(&str.inner, Value::String(StrValue::Plain(s)) if s == "what?");
    }
}
