use std::{fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

use super::{ConfigContents, ConfigSource};
use crate::value::{Map, StrValue, Value, ValueOrigin, WithOrigin};

/// Options controlling a [`KvClient`] query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Token the client should watch to abort an in-flight request.
    pub cancellation: CancellationToken,
}

/// Single key-value pair returned by a [`KvClient`].
#[derive(Debug, Clone)]
pub struct KvPair {
    /// Full key as stored in the remote store.
    pub key: String,
    /// Raw value associated with the key.
    pub value: String,
}

/// Client for a remote key-value configuration store (e.g. Consul or etcd).
///
/// Implementations are expected to be cheap to clone / share (e.g. wrapping an `Arc`-ed
/// connection pool); [`RemoteKv`] does not cache responses across [`ConfigSource::into_contents`]
/// calls beyond the lifetime of a single one.
#[async_trait::async_trait]
pub trait KvClient: Send + Sync + fmt::Debug {
    /// Fetches the value at `key`, or `None` if it doesn't exist.
    async fn get(&self, key: &str, opts: QueryOptions) -> anyhow::Result<Option<KvPair>>;
}

/// Configuration source backed by a remote key-value store, queried for a fixed set of keys.
#[derive(Debug)]
pub struct RemoteKv<C> {
    client: C,
    store_name: String,
    keys: Vec<String>,
}

impl<C: KvClient> RemoteKv<C> {
    /// Creates a source that will query the specified `keys` from `client` on load.
    /// `store_name` is used purely for diagnostics (value origins).
    pub fn new(client: C, store_name: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            client,
            store_name: store_name.into(),
            keys,
        }
    }

    /// Queries the store for all configured keys, honoring `cancel`.
    ///
    /// # Errors
    ///
    /// Propagates errors from the underlying [`KvClient`].
    pub async fn load(&self, cancel: &CancellationToken) -> anyhow::Result<WithOrigin<ConfigContents>> {
        let origin = Arc::new(ValueOrigin::RemoteKv {
            store: self.store_name.clone(),
        });

        let mut map = Map::<String>::new();
        for key in &self.keys {
            let opts = QueryOptions {
                cancellation: cancel.clone(),
            };
            let Some(pair) = self.client.get(key, opts).await? else {
                continue;
            };
            // Only the final `/`-segment of the path becomes the config key, matching how
            // hierarchical KV namespaces (Consul, etcd) are conventionally laid out.
            let name = pair.key.rsplit('/').next().unwrap_or(&pair.key).to_owned();
            let entry_origin = Arc::new(ValueOrigin::Path {
                source: origin.clone(),
                path: pair.key.clone(),
            });
            map.insert(
                name,
                WithOrigin::new(Value::String(StrValue::Plain(pair.value)), entry_origin),
            );
        }

        Ok(WithOrigin::new(ConfigContents::KeyValue(map), origin))
    }
}

/// Plain key-value source for maps that have already been fetched / assembled in-memory
/// (e.g. by a [`RemoteKv`] load, or a secrets manager response).
#[derive(Debug, Clone, Default)]
pub struct KeyValueMap {
    map: Map<String>,
}

impl KeyValueMap {
    /// Creates a source from an iterator of `(key, value)` pairs with an unknown / default origin.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(key, value)| {
                (
                    key,
                    WithOrigin::new(value, Arc::new(ValueOrigin::Unknown)),
                )
            })
            .collect();
        Self { map }
    }
}

impl ConfigSource for KeyValueMap {
    type Map = Map<String>;

    fn into_contents(self) -> WithOrigin<Map<String>> {
        WithOrigin::new(self.map, Arc::new(ValueOrigin::Unknown))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug)]
    struct MockClient {
        values: HashMap<&'static str, &'static str>,
    }

    #[async_trait::async_trait]
    impl KvClient for MockClient {
        async fn get(&self, key: &str, _opts: QueryOptions) -> anyhow::Result<Option<KvPair>> {
            Ok(self.values.get(key).map(|&value| KvPair {
                key: key.to_owned(),
                value: value.to_owned(),
            }))
        }
    }

    #[tokio::test]
    async fn loading_remote_kv_values() {
        let client = MockClient {
            values: HashMap::from([("app/port", "8080"), ("app/host", "localhost")]),
        };
        let source = RemoteKv::new(
            client,
            "test-store",
            vec!["app/port".into(), "app/host".into(), "app/missing".into()],
        );

        let contents = source.load(&CancellationToken::new()).await.unwrap();
        let ConfigContents::KeyValue(map) = contents.inner else {
            panic!("expected key-value contents");
        };
        assert_eq!(map.len(), 2);
        assert_matches::assert_matches!(&map["port"].inner, Value::String(StrValue::Plain(s)) if s == "8080");
    }
}
