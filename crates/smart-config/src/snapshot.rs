//! Atomic, hot-reloadable snapshots of merged configuration values with typed point accessors.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};

use crate::value::{Pointer, StrValue, Value, WithOrigin};

/// Atomically swappable snapshot of a merged configuration value.
///
/// Readers call [`Self::accessor`], which clones the inner `Arc` under a short read lock and
/// then traverses it lock-free; writers call [`Self::store`], which swaps the inner `Arc` under
/// a write lock. Neither path blocks the other for longer than a single pointer exchange.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    inner: Arc<RwLock<Arc<WithOrigin>>>,
}

impl ConfigSnapshot {
    /// Creates a snapshot wrapping the given initial value.
    #[must_use]
    pub fn new(value: WithOrigin) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(value))),
        }
    }

    /// Atomically replaces the snapshotted value.
    pub fn store(&self, value: WithOrigin) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(value);
    }

    /// Returns an accessor over the value as of this call; subsequent [`Self::store`] calls
    /// don't affect accessors already handed out.
    #[must_use]
    pub fn accessor(&self) -> ConfigAccessor {
        ConfigAccessor {
            value: self.current(),
            prefix: String::new(),
        }
    }

    /// Returns the current value in its entirety, e.g. for dumping it back out to a file.
    #[must_use]
    pub fn current(&self) -> Arc<WithOrigin> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// A read-only, point-in-time view into a [`ConfigSnapshot`], optionally scoped to a dot-path
/// prefix.
#[derive(Debug, Clone)]
pub struct ConfigAccessor {
    value: Arc<WithOrigin>,
    prefix: String,
}

impl ConfigAccessor {
    /// Returns an accessor scoped to `prefix` relative to this one.
    #[must_use]
    pub fn scoped(&self, prefix: &str) -> Self {
        let prefix = Pointer(&self.prefix).join(prefix);
        Self {
            value: self.value.clone(),
            prefix,
        }
    }

    fn full_path(&self, key: &str) -> String {
        Pointer(&self.prefix).join(key)
    }

    /// Resolves `key` (relative to this accessor's scope), trying an exact dot-path match first
    /// and falling back to a case-insensitive one.
    fn resolve(&self, key: &str) -> Option<&WithOrigin> {
        let path = self.full_path(key);
        self.value
            .get(Pointer(&path))
            .or_else(|| Self::resolve_case_insensitive(&self.value, &path))
    }

    fn resolve_case_insensitive<'a>(root: &'a WithOrigin, path: &str) -> Option<&'a WithOrigin> {
        let mut current = root;
        for segment in Pointer(path).segments() {
            current = match &current.inner {
                Value::Object(map) => {
                    map.iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(segment))
                        .map(|(_, value)| value)?
                }
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns a string representation of the value at `key`, if any.
    #[must_use]
    pub fn string(&self, key: &str) -> Option<String> {
        value_as_string(self.resolve(key)?)
    }

    /// Like [`Self::string`], falling back to `default` if the key is absent.
    #[must_use]
    pub fn string_or_default(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_owned())
    }

    /// Returns the value at `key` parsed as an integer, if any.
    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        match &self.resolve(key)?.inner {
            Value::Number(num) => num.as_i64(),
            Value::String(s) => s.expose().parse().ok(),
            _ => None,
        }
    }

    /// Like [`Self::int`], falling back to `default` if the key is absent or unparsable.
    #[must_use]
    pub fn int_or_default(&self, key: &str, default: i64) -> i64 {
        self.int(key).unwrap_or(default)
    }

    /// Returns the value at `key` parsed as a boolean, if any.
    #[must_use]
    pub fn bool(&self, key: &str) -> Option<bool> {
        match &self.resolve(key)?.inner {
            Value::Bool(value) => Some(*value),
            Value::String(s) => s.expose().parse().ok(),
            _ => None,
        }
    }

    /// Like [`Self::bool`], falling back to `default` if the key is absent or unparsable.
    #[must_use]
    pub fn bool_or_default(&self, key: &str, default: bool) -> bool {
        self.bool(key).unwrap_or(default)
    }

    /// Returns the value at `key` parsed as a duration: a plain number of seconds, or a
    /// human-readable string (`"30s"`, `"5 min"`, ...).
    #[must_use]
    pub fn duration(&self, key: &str) -> Option<Duration> {
        match &self.resolve(key)?.inner {
            Value::Number(num) => num.as_f64().map(Duration::from_secs_f64),
            Value::String(s) => humantime::parse_duration(s.expose()).ok(),
            _ => None,
        }
    }

    /// Like [`Self::duration`], falling back to `default` if the key is absent or unparsable.
    #[must_use]
    pub fn duration_or_default(&self, key: &str, default: Duration) -> Duration {
        self.duration(key).unwrap_or(default)
    }

    /// Returns the value at `key` parsed as a UTC timestamp, trying each accepted layout in turn:
    /// RFC 3339, RFC 3339 with fractional seconds, a plain date (`YYYY-MM-DD`), a plain date and
    /// time (`YYYY-MM-DD HH:MM:SS`), and finally RFC 1123. The first layout that parses wins.
    #[must_use]
    pub fn time(&self, key: &str) -> Option<DateTime<Utc>> {
        let Value::String(s) = &self.resolve(key)?.inner else {
            return None;
        };
        parse_time_layouts(s.expose())
    }

    /// Like [`Self::time`], falling back to `default` if the key is absent or unparsable.
    #[must_use]
    pub fn time_or_default(&self, key: &str, default: DateTime<Utc>) -> DateTime<Utc> {
        self.time(key).unwrap_or(default)
    }

    /// Returns the value at `key` as a string slice: either a JSON array of strings, or a
    /// comma-separated string.
    #[must_use]
    pub fn slice(&self, key: &str) -> Option<Vec<String>> {
        match &self.resolve(key)?.inner {
            Value::Array(items) => Some(items.iter().filter_map(value_as_string).collect()),
            Value::String(s) => Some(
                s.expose()
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(ToOwned::to_owned)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Like [`Self::slice`], falling back to an empty vector if the key is absent.
    #[must_use]
    pub fn slice_or_default(&self, key: &str) -> Vec<String> {
        self.slice(key).unwrap_or_default()
    }

    /// Returns the value at `key` as a flat string-to-string map (only scalar entries are
    /// included; nested objects/arrays are skipped).
    #[must_use]
    pub fn map(&self, key: &str) -> Option<HashMap<String, String>> {
        let Value::Object(entries) = &self.resolve(key)?.inner else {
            return None;
        };
        Some(
            entries
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value_as_string(value)?)))
                .collect(),
        )
    }

    /// Like [`Self::map`], falling back to an empty map if the key is absent.
    #[must_use]
    pub fn map_or_default(&self, key: &str) -> HashMap<String, String> {
        self.map(key).unwrap_or_default()
    }
}

/// Tries each accepted time layout in order, returning the first that parses.
fn parse_time_layouts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
    {
        return Some(dt);
    }
    if let Some(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
    {
        return Some(dt);
    }
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn value_as_string(value: &WithOrigin) -> Option<String> {
    Some(match &value.inner {
        Value::String(s) => s.expose().to_owned(),
        Value::Bool(value) => value.to_string(),
        Value::Number(value) => value.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc as StdArc;

    use super::*;
    use crate::value::ValueOrigin;

    fn sample() -> WithOrigin {
        let json = serde_json::json!({
            "Server": {
                "port": 8080,
                "Timeout": "30s",
                "tags": ["a", "b"],
            },
        });
        map_json(json)
    }

    fn map_json(value: serde_json::Value) -> WithOrigin {
        fn go(value: serde_json::Value) -> Value {
            match value {
                serde_json::Value::Null => Value::Null,
                serde_json::Value::Bool(b) => Value::Bool(b),
                serde_json::Value::Number(n) => Value::Number(n),
                serde_json::Value::String(s) => Value::String(StrValue::Plain(s)),
                serde_json::Value::Array(items) => {
                    Value::Array(items.into_iter().map(|v| WithOrigin::new(go(v), StdArc::new(ValueOrigin::Unknown))).collect())
                }
                serde_json::Value::Object(entries) => Value::Object(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k, WithOrigin::new(go(v), StdArc::new(ValueOrigin::Unknown))))
                        .collect(),
                ),
            }
        }
        WithOrigin::new(go(value), StdArc::new(ValueOrigin::Unknown))
    }

    #[test]
    fn accessing_scalars() {
        let snapshot = ConfigSnapshot::new(sample());
        let accessor = snapshot.accessor().scoped("Server");

        assert_eq!(accessor.int("port"), Some(8080));
        // Case-insensitive fallback kicks in since the stored key is `port`, not `Port`.
        assert_eq!(accessor.int("Port"), Some(8080));
        assert_eq!(accessor.duration("Timeout"), Some(Duration::from_secs(30)));
        assert_eq!(accessor.slice("tags"), Some(vec!["a".to_owned(), "b".to_owned()]));
        assert_eq!(accessor.int_or_default("missing", -1), -1);
    }

    #[test]
    fn store_swaps_atomically() {
        let snapshot = ConfigSnapshot::new(sample());
        let before = snapshot.accessor();
        assert_eq!(before.scoped("Server").int("port"), Some(8080));

        snapshot.store(map_json(serde_json::json!({"Server": {"port": 9090}})));
        // Accessors already taken keep observing the old value.
        assert_eq!(before.scoped("Server").int("port"), Some(8080));
        assert_eq!(snapshot.accessor().scoped("Server").int("port"), Some(9090));
    }
}
