use std::{collections::HashMap, env, sync::Arc};

use super::ConfigSource;
use crate::value::{Map, StrValue, Value, ValueOrigin, WithOrigin};

/// A key–value configuration source, most commonly environment variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    map: HashMap<String, WithOrigin<String>>,
}

impl Environment {
    /// Loads environment variables with the specified prefix (stripped from the resulting names).
    pub fn prefixed(prefix: &str) -> Self {
        Self::from_iter(prefix, env::vars())
    }

    /// Creates an environment from an iterator of `(name, value)` pairs, retaining only entries
    /// whose name starts with `prefix` (which is stripped).
    pub fn from_iter<K, V>(prefix: &str, env: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str> + Into<String>,
        V: Into<String>,
    {
        let map = env.into_iter().filter_map(|(name, value)| {
            let retained_name = name.as_ref().strip_prefix(prefix)?.to_owned();
            let origin = Arc::new(ValueOrigin::Path {
                source: Arc::new(ValueOrigin::EnvVars),
                path: name.into(),
            });
            Some((retained_name, WithOrigin::new(value.into(), origin)))
        });
        Self { map: map.collect() }
    }

    /// Adds the named process environment variables to this source, bypassing prefix filtering.
    /// Useful for vars that don't share the app's common prefix (e.g. `RUST_LOG`).
    #[must_use]
    pub fn with_vars(mut self, var_names: &[&str]) -> Self {
        let defined_vars = var_names.iter().filter_map(|&name| {
            let value = env::var_os(name)?.into_string().ok()?;
            let origin = Arc::new(ValueOrigin::Path {
                source: Arc::new(ValueOrigin::EnvVars),
                path: name.to_owned(),
            });
            Some((name.to_owned(), WithOrigin::new(value, origin)))
        });
        self.map.extend(defined_vars);
        self
    }

    /// Parses `.env`-style file contents (`KEY=VALUE` lines, `#`-prefixed comments, blank lines
    /// ignored) into an environment source. Values may be wrapped in matching single or double
    /// quotes, which are stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-empty, non-comment line isn't of the form `KEY=VALUE`.
    pub fn from_dotenv(filename: &str, contents: &str) -> anyhow::Result<Self> {
        let file_origin = Arc::new(ValueOrigin::File {
            name: filename.to_owned(),
            format: crate::value::FileFormat::Dotenv,
        });

        let mut map = HashMap::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, value) = line.split_once('=').ok_or_else(|| {
                anyhow::anyhow!("{filename}:{}: expected `KEY=VALUE`, got {line:?}", line_no + 1)
            })?;
            let name = name.trim().to_owned();
            let value = unquote(value.trim());

            let origin = Arc::new(ValueOrigin::Path {
                source: file_origin.clone(),
                path: name.clone(),
            });
            map.insert(name, WithOrigin::new(value, origin));
        }
        Ok(Self { map })
    }

    /// Strips `prefix` from all variable names, dropping entries that don't start with it.
    #[must_use]
    pub fn strip_prefix(self, prefix: &str) -> Self {
        let map = self
            .map
            .into_iter()
            .filter_map(|(name, value)| Some((name.strip_prefix(prefix)?.to_owned(), value)))
            .collect();
        Self { map }
    }
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_owned();
        }
    }
    value.to_owned()
}

impl ConfigSource for Environment {
    type Map = Map<String>;

    fn into_contents(self) -> WithOrigin<Map<String>> {
        let inner = self
            .map
            .into_iter()
            .map(|(name, value)| {
                (
                    name,
                    WithOrigin::new(Value::String(StrValue::Plain(value.inner)), value.origin),
                )
            })
            .collect();
        WithOrigin::new(inner, Arc::new(ValueOrigin::EnvVars))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn creating_environment_source() {
        let env = Environment::from_iter(
            "APP_",
            [
                ("APP_PORT", "8080"),
                ("APP_HOST", "localhost"),
                ("OTHER_VAR", "ignored"),
            ],
        );

        assert_eq!(env.map.len(), 2);
        assert_matches!(
            env.map["PORT"].origin.as_ref(),
            ValueOrigin::Path { path, .. } if path == "APP_PORT"
        );
        assert!(!env.map.contains_key("OTHER_VAR"));
    }
}
