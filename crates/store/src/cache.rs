//! Namespaced object cache in front of the store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;

/// Cache namespace holding detailed user records, keyed by user id.
pub const CACHE_USERS: &str = "users";

/// Namespaced object cache.
///
/// Values are JSON so one cache can hold heterogeneous objects. A cache is
/// always an optimization: implementations may drop entries at any time and
/// callers must treat every `get` miss as "go to the store".
pub trait Cache: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<JsonValue>;
    fn put(&self, namespace: &str, key: &str, value: JsonValue);
    fn remove(&self, namespace: &str, key: &str);
}

impl<C> Cache for Arc<C>
where
    C: Cache + ?Sized,
{
    fn get(&self, namespace: &str, key: &str) -> Option<JsonValue> {
        (**self).get(namespace, key)
    }

    fn put(&self, namespace: &str, key: &str, value: JsonValue) {
        (**self).put(namespace, key, value)
    }

    fn remove(&self, namespace: &str, key: &str) {
        (**self).remove(namespace, key)
    }
}

/// In-memory cache for tests/dev.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: RwLock<HashMap<(String, String), JsonValue>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, for tests.
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, namespace: &str, key: &str) -> Option<JsonValue> {
        let map = self.inner.read().ok()?;
        map.get(&(namespace.to_owned(), key.to_owned())).cloned()
    }

    fn put(&self, namespace: &str, key: &str, value: JsonValue) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((namespace.to_owned(), key.to_owned()), value);
        }
    }

    fn remove(&self, namespace: &str, key: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&(namespace.to_owned(), key.to_owned()));
        }
    }
}
