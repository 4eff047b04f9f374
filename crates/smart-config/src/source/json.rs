use std::sync::Arc;

use super::ConfigSource;
use crate::value::{FileFormat, Map, Pointer, StrValue, Value, ValueOrigin, WithOrigin};

/// JSON-based configuration source.
#[derive(Debug)]
pub struct Json {
    origin: Arc<ValueOrigin>,
    inner: Map,
}

impl Json {
    /// Creates a source with the specified filename and contents.
    pub fn new(filename: &str, object: serde_json::Map<String, serde_json::Value>) -> Self {
        let origin = Arc::new(ValueOrigin::File {
            name: filename.to_owned(),
            format: FileFormat::Json,
        });
        let inner =
            Self::map_value(serde_json::Value::Object(object), &origin, String::new()).inner;
        let Value::Object(inner) = inner else {
            unreachable!();
        };
        Self { origin, inner }
    }

    /// Creates an empty source with the specified name, useful as a base for [`Self::merge()`].
    pub fn empty(name: &str) -> Self {
        Self {
            origin: Arc::new(ValueOrigin::File {
                name: name.to_owned(),
                format: FileFormat::Json,
            }),
            inner: Map::new(),
        }
    }

    /// Merges a serializable value at the specified dot-separated path, overwriting whatever
    /// was there before. Mostly used via the [`crate::config!`] macro in tests.
    ///
    /// # Panics
    ///
    /// Panics if `value` cannot be serialized to JSON.
    pub fn merge(&mut self, path: &str, value: impl serde::Serialize) {
        let value = serde_json::to_value(value).expect("failed to serialize value for `Json`");
        let mapped = Self::map_value(value, &self.origin, path.to_owned());

        let mut root = WithOrigin {
            inner: Value::Object(std::mem::take(&mut self.inner)),
            origin: self.origin.clone(),
        };
        let origin = self.origin.clone();
        if let Some((parent, key)) = Pointer(path).split_last() {
            let map = root.ensure_object(parent, |_| origin.clone());
            map.insert(key.to_owned(), mapped);
        } else {
            let Value::Object(map) = &mut root.inner else {
                unreachable!();
            };
            map.insert(path.to_owned(), mapped);
        }

        let Value::Object(inner) = root.inner else {
            unreachable!();
        };
        self.inner = inner;
    }

    fn map_value(value: serde_json::Value, file_origin: &Arc<ValueOrigin>, path: String) -> WithOrigin {
        let inner = match value {
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(value) => Value::Number(value),
            serde_json::Value::String(value) => Value::String(StrValue::Plain(value)),
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Array(values) => Value::Array(
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| {
                        let child_path = Pointer(&path).join(&i.to_string());
                        Self::map_value(value, file_origin, child_path)
                    })
                    .collect(),
            ),
            serde_json::Value::Object(values) => Value::Object(
                values
                    .into_iter()
                    .map(|(key, value)| {
                        let child_path = Pointer(&path).join(&key);
                        (key, Self::map_value(value, file_origin, child_path))
                    })
                    .collect(),
            ),
        };

        WithOrigin {
            inner,
            origin: Arc::new(ValueOrigin::Path {
                source: file_origin.clone(),
                path,
            }),
        }
    }
}

impl ConfigSource for Json {
    type Map = Map;

    fn into_contents(self) -> WithOrigin<Map> {
        WithOrigin {
            inner: self.inner,
            origin: self.origin,
        }
    }
}
