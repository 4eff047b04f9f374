use std::{fs, path::Path};

use anyhow::Context;

use super::{json::Json, toml::Toml, yaml::Yaml, ConfigContents, ConfigSource};
use crate::value::{FileFormat, WithOrigin};

/// Raw contents of a [`File`] source, either read from disk or supplied in-memory (e.g. in tests).
#[derive(Debug, Clone)]
enum FileContent {
    Path(std::path::PathBuf),
    Raw(String),
}

/// File-based configuration source that infers its codec from the file extension (or an
/// explicitly provided [`FileFormat`]).
#[derive(Debug)]
pub struct File {
    name: String,
    content: FileContent,
    format: Option<FileFormat>,
}

impl File {
    /// Creates a source that will read the file at the given path, inferring the format
    /// from its extension.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        Self {
            name,
            content: FileContent::Path(path.to_owned()),
            format: None,
        }
    }

    /// Overrides the inferred format, useful for files with non-standard extensions.
    #[must_use]
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Creates a source from raw contents, bypassing the filesystem. `name` is used for
    /// diagnostics / value origins and, absent an explicit format, to infer one from its
    /// extension.
    pub fn from_contents(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: FileContent::Raw(contents.into()),
            format: None,
        }
    }

    fn format(&self) -> anyhow::Result<FileFormat> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        let ext = Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .with_context(|| format!("cannot infer format for file `{}`: no extension", self.name))?;
        FileFormat::from_extension(ext)
            .with_context(|| format!("unrecognized extension `{ext}` for file `{}`", self.name))
    }

    fn read(&self) -> anyhow::Result<String> {
        Ok(match &self.content {
            FileContent::Path(path) => fs::read_to_string(path)
                .with_context(|| format!("failed reading config file `{}`", path.display()))?,
            FileContent::Raw(contents) => contents.clone(),
        })
    }
}

impl ConfigSource for File {
    type Map = ConfigContents;

    fn into_contents(self) -> WithOrigin<ConfigContents> {
        match self.load_contents() {
            Ok(contents) => contents,
            Err(err) => {
                // Mirrors the rest of the crate's `ConfigSource` impls, which are infallible;
                // the error is surfaced as a synthetic parse failure on first use of the value.
                panic!("failed loading config file `{}`: {err:#}", self.name);
            }
        }
    }
}

impl File {
    /// Reads and parses the file, surfacing I/O and parse errors instead of panicking.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors and codec-specific parse errors.
    pub fn load_contents(&self) -> anyhow::Result<WithOrigin<ConfigContents>> {
        let format = self.format()?;
        let raw = self.read()?;

        Ok(match format {
            FileFormat::Json => {
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .with_context(|| format!("failed parsing `{}` as JSON", self.name))?;
                let serde_json::Value::Object(object) = value else {
                    anyhow::bail!("top-level value in `{}` is not a JSON object", self.name);
                };
                Json::new(&self.name, object).into_contents().map(Into::into)
            }
            FileFormat::Yaml => {
                let value: serde_yaml::Value = serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed parsing `{}` as YAML", self.name))?;
                let mapping = match value {
                    serde_yaml::Value::Mapping(mapping) => mapping,
                    serde_yaml::Value::Null => serde_yaml::Mapping::new(),
                    _ => anyhow::bail!("top-level value in `{}` is not a YAML mapping", self.name),
                };
                Yaml::new(&self.name, mapping)?.into_contents().map(Into::into)
            }
            FileFormat::Toml => {
                let table: toml::Table = raw
                    .parse()
                    .with_context(|| format!("failed parsing `{}` as TOML", self.name))?;
                Toml::new(&self.name, table)?.into_contents().map(Into::into)
            }
            FileFormat::Dotenv => {
                let map = super::env::Environment::from_dotenv(&self.name, &raw)?;
                map.into_contents().map(Into::into)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::value::{Pointer, StrValue, Value};

    #[test]
    fn loading_json_file_contents() {
        let file = File::from_contents("test.json", r#"{"a": {"b": 1}}"#);
        let contents = file.load_contents().unwrap();
        let ConfigContents::Hierarchical(map) = contents.inner else {
            panic!("expected hierarchical contents");
        };
        let value = map["a"].get(Pointer("b")).unwrap();
        assert_matches!(value.inner, Value::Number(_));
    }

    #[test]
    fn loading_dotenv_file_contents() {
        let file = File::from_contents("test.env", "APP_PORT=8080\n# comment\nAPP_HOST=localhost\n");
        let contents = file.load_contents().unwrap();
        let ConfigContents::KeyValue(map) = contents.inner else {
            panic!("expected key-value contents");
        };
        assert_matches!(&map["APP_PORT"].inner, Value::String(StrValue::Plain(s)) if s == "8080");
    }

    #[test]
    fn inferring_format_from_extension() {
        let file = File::new("config.toml");
        assert_matches!(file.format(), Ok(FileFormat::Toml));

        let file = File::from_contents("config.unknown", "");
        assert!(file.format().is_err());
    }
}
