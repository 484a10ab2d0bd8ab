//! Test-scoped fixture store.
//!
//! Fixtures are loaded from a [`FixtureSource`] on first reference and then
//! served from memory for the rest of the test, so in-place mutations are seen
//! by every rule that resolves the fixture afterwards. A store belongs to one
//! test; a new test gets a new store and re-reads the pristine documents.

mod source;

pub use source::{
    normalize_fixture_name, DirectoryFixtureSource, FixtureSource, InMemoryFixtureSource,
};

use crate::error::InterceptError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot of a fixture document.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub name: String,
    pub data: Value,
}

pub struct FixtureStore {
    source: Arc<dyn FixtureSource>,
    loaded: Mutex<HashMap<String, Value>>,
}

impl FixtureStore {
    pub fn new(source: Arc<dyn FixtureSource>) -> Self {
        Self {
            source,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Return the current state of a fixture, loading it on first use.
    pub fn load(&self, name: &str) -> Result<Fixture, InterceptError> {
        let key = normalize_fixture_name(name);
        let mut loaded = self.loaded.lock();
        let data = Self::entry(&self.source, &mut loaded, &key)?;
        Ok(Fixture {
            name: key,
            data: data.clone(),
        })
    }

    /// Apply an in-place transform and return whatever the closure returns.
    pub fn mutate<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> Result<R, InterceptError> {
        let key = normalize_fixture_name(name);
        let mut loaded = self.loaded.lock();
        let data = Self::entry(&self.source, &mut loaded, &key)?;
        let out = f(data);
        info!("Fixture '{}' mutated", key);
        Ok(out)
    }

    /// Replace a fixture wholesale.
    pub fn replace(&self, name: &str, data: Value) {
        let key = normalize_fixture_name(name);
        debug!("Fixture '{}' replaced", key);
        self.loaded.lock().insert(key, data);
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded
            .lock()
            .contains_key(&normalize_fixture_name(name))
    }

    /// Drop every loaded fixture. Called at the test boundary.
    pub fn reset(&self) {
        let mut loaded = self.loaded.lock();
        if !loaded.is_empty() {
            debug!("Discarding {} loaded fixture(s)", loaded.len());
        }
        loaded.clear();
    }

    fn entry<'a>(
        source: &Arc<dyn FixtureSource>,
        loaded: &'a mut HashMap<String, Value>,
        key: &str,
    ) -> Result<&'a mut Value, InterceptError> {
        if !loaded.contains_key(key) {
            let data = source.load(key).map_err(|e| InterceptError::Fixture {
                name: key.to_string(),
                reason: format!("{e:#}"),
            })?;
            debug!("Fixture '{}' loaded into test scope", key);
            loaded.insert(key.to_string(), data);
        }
        loaded.get_mut(key).ok_or_else(|| InterceptError::Fixture {
            name: key.to_string(),
            reason: "fixture vanished while loading".to_string(),
        })
    }
}

impl std::fmt::Debug for FixtureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureStore")
            .field("loaded", &self.loaded.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        inner: InMemoryFixtureSource,
        loads: AtomicUsize,
    }

    impl FixtureSource for CountingSource {
        fn load(&self, name: &str) -> anyhow::Result<Value> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(name)
        }
    }

    fn articles_source() -> Arc<CountingSource> {
        Arc::new(CountingSource {
            inner: InMemoryFixtureSource::new().with(
                "articles",
                json!({"articles": [{"slug": "a", "favoritesCount": 1}, {"slug": "b", "favoritesCount": 5}]}),
            ),
            loads: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_load_is_lazy_and_cached() {
        let source = articles_source();
        let store = FixtureStore::new(source.clone());
        assert!(!store.is_loaded("articles"));

        store.load("articles.json").unwrap();
        store.load("articles").unwrap();
        assert!(store.is_loaded("articles"));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mutation_visible_to_later_loads() {
        let store = FixtureStore::new(articles_source());
        let slug = store
            .mutate("articles", |data| {
                data["articles"][1]["favoritesCount"] = json!(6);
                data["articles"][1]["slug"].as_str().map(str::to_string)
            })
            .unwrap();
        assert_eq!(slug.as_deref(), Some("b"));
        assert_eq!(
            store.load("articles").unwrap().data["articles"][1]["favoritesCount"],
            json!(6)
        );
    }

    #[test]
    fn test_reset_restores_pristine_document() {
        let source = articles_source();
        let store = FixtureStore::new(source.clone());
        store
            .mutate("articles", |data| data["articles"][0]["favoritesCount"] = json!(99))
            .unwrap();
        store.reset();
        assert_eq!(
            store.load("articles").unwrap().data["articles"][0]["favoritesCount"],
            json!(1)
        );
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_fixture_is_error() {
        let store = FixtureStore::new(articles_source());
        let err = store.load("nope").unwrap_err();
        assert!(matches!(err, InterceptError::Fixture { ref name, .. } if name == "nope"));
        let err = store.mutate("nope", |_| ()).unwrap_err();
        assert!(matches!(err, InterceptError::Fixture { .. }));
    }

    #[test]
    fn test_replace() {
        let store = FixtureStore::new(articles_source());
        store.replace("tags.json", json!({"tags": ["x"]}));
        assert_eq!(store.load("tags").unwrap().data, json!({"tags": ["x"]}));
    }
}
