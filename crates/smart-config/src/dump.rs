//! Writing configuration snapshots back out to disk (or any [`Write`]r), encoded via a
//! registered [`Codec`].

use std::{fs, io::Write, path::Path};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use anyhow::Context;

use crate::{
    codec::{CodecId, CodecRegistry},
    snapshot::ConfigSnapshot,
    value::{ExposeSecret, StrValue, Value, WithOrigin},
};

const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Default file permissions ([`Self::to_file`] applies these on Unix).
const DEFAULT_MODE: u32 = 0o644;

/// Dumps a [`ConfigSnapshot`] to a file or writer using a chosen wire format.
#[derive(Debug, Clone)]
pub struct Dump {
    codec: CodecId,
    redact_secrets: bool,
    mode: u32,
}

impl Dump {
    /// Creates a dumper using the codec registered under `codec`.
    #[must_use]
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            redact_secrets: true,
            mode: DEFAULT_MODE,
        }
    }

    /// Creates a dumper by inferring the codec from a file extension (without the leading dot).
    #[must_use]
    pub fn for_extension(ext: &str) -> Option<Self> {
        Some(Self::new(CodecRegistry::for_extension(ext)?.id()))
    }

    /// Includes secret values in plaintext instead of redacting them. Off by default.
    #[must_use]
    pub fn include_secrets(mut self) -> Self {
        self.redact_secrets = false;
        self
    }

    /// Overrides the Unix file mode applied by [`Self::to_file`] (default `0o644`).
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    fn encode(&self, snapshot: &ConfigSnapshot) -> anyhow::Result<Vec<u8>> {
        let codec = CodecRegistry::get(self.codec)
            .with_context(|| format!("codec `{}` is not registered", self.codec))?;
        let value = to_json(&snapshot.current(), self.redact_secrets);
        codec.encode(&value)
    }

    /// Encodes the snapshot and writes it to `writer`.
    ///
    /// # Errors
    ///
    /// Propagates encoding and I/O errors.
    pub fn to_writer(&self, snapshot: &ConfigSnapshot, writer: &mut impl Write) -> anyhow::Result<()> {
        let bytes = self.encode(snapshot)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Encodes the snapshot and atomically writes it to `path` (write to a temp file in the
    /// same directory, then rename over the destination).
    ///
    /// # Errors
    ///
    /// Propagates encoding and I/O errors.
    pub fn to_file(&self, snapshot: &ConfigSnapshot, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let bytes = self.encode(snapshot)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let tmp_name = format!(
            ".{}.tmp",
            path.file_name().and_then(|name| name.to_str()).unwrap_or("dump")
        );
        let tmp_path = dir.join(tmp_name);

        let write_result = (|| -> anyhow::Result<()> {
            let mut file = fs::File::create(&tmp_path)
                .with_context(|| format!("failed creating temp file `{}`", tmp_path.display()))?;
            file.write_all(&bytes)?;
            #[cfg(unix)]
            file.set_permissions(fs::Permissions::from_mode(self.mode))?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        fs::rename(&tmp_path, path)
            .with_context(|| format!("failed renaming `{}` to `{}`", tmp_path.display(), path.display()))?;
        Ok(())
    }
}

/// Also used by [`crate::schema_validation`] to build the document checked against a compiled
/// JSON Schema, always with secrets redacted so a schema violation message can never leak one.
pub(crate) fn to_json(value: &WithOrigin, redact_secrets: bool) -> serde_json::Value {
    match &value.inner {
        Value::Null => serde_json::Value::Null,
        Value::Bool(value) => serde_json::Value::Bool(*value),
        Value::Number(value) => serde_json::Value::Number(value.clone()),
        Value::String(StrValue::Plain(value)) => serde_json::Value::String(value.clone()),
        Value::String(StrValue::Secret(value)) => serde_json::Value::String(if redact_secrets {
            REDACTED_PLACEHOLDER.to_owned()
        } else {
            value.expose_secret().to_owned()
        }),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|item| to_json(item, redact_secrets)).collect())
        }
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), to_json(value, redact_secrets)))
                .collect(),
        ),
    }
}
