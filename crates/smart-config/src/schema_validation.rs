//! Optional whole-document JSON Schema validation (C7 item 1), run against the merged
//! configuration before any per-config deserialization.

use std::fmt;

use anyhow::Context;

use crate::{dump::to_json, value::WithOrigin};

/// A compiled JSON Schema checked against a [`crate::ConfigRepository`]'s merged document.
///
/// This is independent of the per-param/per-config [`crate::Validate`] machinery: it catches
/// structural problems (wrong types, missing required keys, extra keys if the schema forbids
/// them) in the raw merged document before any single config's deserializer even runs, the same
/// way a JSON Schema check would on an API request body.
pub struct SchemaValidation {
    validator: jsonschema::Validator,
}

impl fmt::Debug for SchemaValidation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("SchemaValidation").finish_non_exhaustive()
    }
}

impl SchemaValidation {
    /// Compiles `schema` for later use.
    ///
    /// # Errors
    /// Returns an error if `schema` isn't a valid JSON Schema document.
    pub fn compile(schema: &serde_json::Value) -> anyhow::Result<Self> {
        let validator = jsonschema::validator_for(schema).context("invalid JSON Schema document")?;
        Ok(Self { validator })
    }

    /// Validates `merged`, secrets redacted, collecting every violation rather than stopping at
    /// the first one (mirrors how [`crate::ParseErrors`] accumulates per-param failures).
    pub(crate) fn check(&self, merged: &WithOrigin) -> Result<(), SchemaViolations> {
        let document = to_json(merged, true);
        let violations: Vec<String> = self
            .validator
            .iter_errors(&document)
            .map(|err| format!("{} (at {})", err, err.instance_path))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolations { violations })
        }
    }
}

/// Every violation found by [`SchemaValidation::check`].
#[derive(Debug, Clone)]
pub struct SchemaViolations {
    violations: Vec<String>,
}

impl SchemaViolations {
    /// The individual violation messages.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.violations
    }
}

impl fmt::Display for SchemaViolations {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "configuration violates its JSON Schema:")?;
        for violation in &self.violations {
            write!(formatter, "\n  {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaViolations {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::value::{Map, Value};

    fn doc(value: Value) -> WithOrigin {
        WithOrigin::new(value, Arc::default())
    }

    #[test]
    fn valid_document_passes() {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["port"],
            "properties": { "port": { "type": "integer" } },
        });
        let validation = SchemaValidation::compile(&schema).unwrap();

        let mut object = Map::new();
        object.insert("port".to_owned(), doc(Value::Number(8080.into())));
        assert!(validation.check(&doc(Value::Object(object))).is_ok());
    }

    #[test]
    fn missing_required_key_is_reported() {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["port"],
        });
        let validation = SchemaValidation::compile(&schema).unwrap();

        let violations = validation.check(&doc(Value::Object(Map::new()))).unwrap_err();
        assert_eq!(violations.messages().len(), 1);
    }

    #[test]
    fn invalid_schema_document_fails_to_compile() {
        let schema = serde_json::json!({ "type": "not-a-real-type" });
        assert!(SchemaValidation::compile(&schema).is_err());
    }
}
