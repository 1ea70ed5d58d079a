//! Deduplicating cache for external JSON documents and byte buffers.
//!
//! Every URI is in exactly one of three states: unknown, in flight, or
//! resolved. Callers asking for an in-flight URI join the existing fetch
//! instead of starting another one. Resolved entries are immutable and
//! handed out as `Arc`s, so any number of properties can share them.
//!
//! Fetch failures never reach the caller: a failed JSON fetch resolves to
//! an empty object and a failed byte fetch to a zero-length buffer. The
//! degraded result is cached like any other, so a broken URI is fetched
//! once and then left alone.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};
use url::Url;

use super::{CacheConfig, ResourceFetcher};
use crate::util::{Error, Result};

/// Cloneable handle to a fetch that may still be in flight.
///
/// Clones of one handle observe the same underlying fetch.
pub type SharedFetch<T> = Shared<BoxFuture<'static, T>>;

/// One value inside a cached JSON document.
///
/// Holds the document itself rather than a copy of the value, so reading
/// through it never allocates and never diverges from the cache.
#[derive(Clone, Debug)]
pub struct CachedValue {
    document: Arc<Value>,
    key: String,
}

impl CachedValue {
    /// The value under this handle's key, if the document has one.
    #[inline]
    pub fn get(&self) -> Option<&Value> {
        self.document.get(&self.key)
    }

    /// The whole cached document.
    #[inline]
    pub fn document(&self) -> &Arc<Value> {
        &self.document
    }

    /// Key this handle reads.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Default)]
struct CacheState {
    json: HashMap<Url, Arc<Value>>,
    buffers: HashMap<Url, Arc<[u8]>>,
    json_in_flight: HashMap<Url, SharedFetch<Arc<Value>>>,
    buffers_in_flight: HashMap<Url, SharedFetch<Arc<[u8]>>>,
    /// One handle per (document, key), kept for the life of the cache.
    values: HashMap<(Url, String), SharedFetch<CachedValue>>,
}

/// Shared, explicitly owned cache of external resources.
///
/// Entries are never evicted; the cache lives as long as its owner keeps it.
/// Tables built against the same cache share every resource they fetch.
pub struct ResourceCache {
    config: CacheConfig,
    fetcher: Arc<dyn ResourceFetcher>,
    state: Arc<Mutex<CacheState>>,
}

impl ResourceCache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            config,
            fetcher,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Cache configuration.
    #[inline]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolve `uri` against the configured base location.
    pub fn resolve(&self, uri: &str) -> Result<Url> {
        self.config.base.join(uri).map_err(|e| Error::InvalidUri {
            uri: uri.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Fetch a whole JSON document.
    ///
    /// Resolves immediately (without touching the fetcher) when the
    /// document is already cached.
    pub fn fetch_json(&self, uri: &str) -> Result<SharedFetch<Arc<Value>>> {
        let url = self.resolve(uri)?;
        let mut state = self.state.lock();

        if let Some(document) = state.json.get(&url) {
            trace!(%url, "JSON cache hit");
            return Ok(future::ready(Arc::clone(document)).boxed().shared());
        }
        if let Some(in_flight) = state.json_in_flight.get(&url) {
            trace!(%url, "joining in-flight JSON fetch");
            return Ok(in_flight.clone());
        }

        debug!(%url, "fetching JSON");
        let request = self.fetcher.fetch_json(&url);
        let cache = Arc::clone(&self.state);
        let key = url.clone();
        let fetch = async move {
            let document = match request.await {
                Ok(document @ Value::Object(_)) => document,
                Ok(_) => {
                    warn!(url = %key, "JSON resource is not an object, caching empty document");
                    Value::Object(Map::new())
                }
                Err(e) => {
                    warn!(url = %key, error = %e, "JSON fetch failed, caching empty document");
                    Value::Object(Map::new())
                }
            };
            let document = Arc::new(document);
            let mut state = cache.lock();
            state.json_in_flight.remove(&key);
            state.json.insert(key, Arc::clone(&document));
            document
        }
        .boxed()
        .shared();

        state.json_in_flight.insert(url, fetch.clone());
        Ok(fetch)
    }

    /// Fetch the value stored under `key` in the JSON document at `uri`.
    ///
    /// The handle resolves with [`CachedValue::get`] returning `None` when
    /// the document lacks the key or could not be fetched. Repeated
    /// requests for the same key return clones of one handle.
    pub fn fetch_value(&self, uri: &str, key: &str) -> Result<SharedFetch<CachedValue>> {
        let id = (self.resolve(uri)?, key.to_owned());
        let existing = self.state.lock().values.get(&id).cloned();
        if let Some(handle) = existing {
            trace!(url = %id.0, key, "value handle cache hit");
            return Ok(handle);
        }

        let document = self.fetch_json(uri)?;
        let key = id.1.clone();
        let handle = document
            .map(move |document| CachedValue { document, key })
            .boxed()
            .shared();
        Ok(self.state.lock().values.entry(id).or_insert(handle).clone())
    }

    /// Fetch a raw byte buffer.
    pub fn fetch_buffer(&self, uri: &str) -> Result<SharedFetch<Arc<[u8]>>> {
        let url = self.resolve(uri)?;
        let mut state = self.state.lock();

        if let Some(buffer) = state.buffers.get(&url) {
            trace!(%url, "buffer cache hit");
            return Ok(future::ready(Arc::clone(buffer)).boxed().shared());
        }
        if let Some(in_flight) = state.buffers_in_flight.get(&url) {
            trace!(%url, "joining in-flight buffer fetch");
            return Ok(in_flight.clone());
        }

        debug!(%url, "fetching buffer");
        let request = self.fetcher.fetch_bytes(&url);
        let cache = Arc::clone(&self.state);
        let key = url.clone();
        let fetch = async move {
            let buffer: Arc<[u8]> = match request.await {
                Ok(bytes) => {
                    debug!(url = %key, len = bytes.len(), "buffer resolved");
                    Arc::from(bytes)
                }
                Err(e) => {
                    warn!(url = %key, error = %e, "buffer fetch failed, caching empty buffer");
                    Arc::from(Vec::new())
                }
            };
            let mut state = cache.lock();
            state.buffers_in_flight.remove(&key);
            state.buffers.insert(key, Arc::clone(&buffer));
            buffer
        }
        .boxed()
        .shared();

        state.buffers_in_flight.insert(url, fetch.clone());
        Ok(fetch)
    }

    /// Number of resolved JSON documents.
    pub fn json_len(&self) -> usize {
        self.state.lock().json.len()
    }

    /// Number of resolved byte buffers.
    pub fn buffer_len(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Number of fetches still in flight.
    pub fn in_flight_len(&self) -> usize {
        let state = self.state.lock();
        state.json_in_flight.len() + state.buffers_in_flight.len()
    }

    /// Check whether `uri` has a resolved entry (JSON or buffer).
    pub fn is_resolved(&self, uri: &str) -> bool {
        let Ok(url) = self.resolve(uri) else {
            return false;
        };
        let state = self.state.lock();
        state.json.contains_key(&url) || state.buffers.contains_key(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MemoryFetcher;
    use futures::executor::block_on;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("https://example.com/tiles/").unwrap()
    }

    fn cache_with(fetcher: &Arc<MemoryFetcher>) -> ResourceCache {
        let fetcher: Arc<dyn ResourceFetcher> = fetcher.clone();
        ResourceCache::new(CacheConfig::new(base()), fetcher)
    }

    #[test]
    fn test_resolve_relative() {
        let cache = cache_with(&Arc::new(MemoryFetcher::new()));
        let url = cache.resolve("data/a.bin").unwrap();
        assert_eq!(url.as_str(), "https://example.com/tiles/data/a.bin");
        let url = cache.resolve("../b.json").unwrap();
        assert_eq!(url.as_str(), "https://example.com/b.json");
    }

    #[test]
    fn test_concurrent_requests_share_one_fetch() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let url = base().join("a.bin").unwrap();
        fetcher.insert_bytes(url.clone(), vec![1u8, 2, 3, 4]);
        let cache = cache_with(&fetcher);

        let first = cache.fetch_buffer("a.bin").unwrap();
        let second = cache.fetch_buffer("a.bin").unwrap();
        assert!(Shared::ptr_eq(&first, &second));
        assert_eq!(cache.in_flight_len(), 1);

        let (a, b) = block_on(future::join(first, second));
        assert_eq!(&a[..], &[1, 2, 3, 4]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(fetcher.request_count(&url), 1);
        assert_eq!(cache.in_flight_len(), 0);
        assert!(cache.is_resolved("a.bin"));
    }

    #[test]
    fn test_resolved_entry_needs_no_fetch() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let url = base().join("doc.json").unwrap();
        fetcher.insert_json(url.clone(), &json!({"names": ["x", "y"]}));
        let cache = cache_with(&fetcher);

        block_on(cache.fetch_json("doc.json").unwrap());
        let value = cache
            .fetch_value("doc.json", "names")
            .unwrap()
            .now_or_never()
            .expect("resolved entry completes without waiting");
        assert_eq!(value.get(), Some(&json!(["x", "y"])));
        assert_eq!(fetcher.request_count(&url), 1);
        assert_eq!(cache.json_len(), 1);
    }

    #[test]
    fn test_value_handles_shared_per_key() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let url = base().join("doc.json").unwrap();
        fetcher.insert_json(url.clone(), &json!({"names": ["x"], "ids": [1]}));
        let cache = cache_with(&fetcher);

        let first = cache.fetch_value("doc.json", "names").unwrap();
        let second = cache.fetch_value("./doc.json", "names").unwrap();
        let other = cache.fetch_value("doc.json", "ids").unwrap();
        assert!(Shared::ptr_eq(&first, &second));
        assert!(!Shared::ptr_eq(&first, &other));

        let (a, b) = block_on(future::join(first, other));
        assert_eq!(a.get(), Some(&json!(["x"])));
        assert_eq!(b.get(), Some(&json!([1])));
        assert!(Arc::ptr_eq(a.document(), b.document()));
        assert_eq!(fetcher.request_count(&url), 1);

        let third = cache.fetch_value("doc.json", "names").unwrap();
        assert!(Shared::ptr_eq(&second, &third));
    }

    #[test]
    fn test_failed_json_fetch_caches_empty_document() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let url = base().join("missing.json").unwrap();
        let cache = cache_with(&fetcher);

        let value = block_on(cache.fetch_value("missing.json", "names").unwrap());
        assert_eq!(value.get(), None);
        assert_eq!(**value.document(), json!({}));

        let again = block_on(cache.fetch_value("missing.json", "names").unwrap());
        assert_eq!(again.get(), None);
        assert_eq!(fetcher.request_count(&url), 1);
    }

    #[test]
    fn test_non_object_json_degrades_to_empty() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert_json(base().join("list.json").unwrap(), &json!([1, 2, 3]));
        let cache = cache_with(&fetcher);
        let document = block_on(cache.fetch_json("list.json").unwrap());
        assert_eq!(*document, json!({}));
    }

    #[test]
    fn test_failed_buffer_fetch_caches_empty_buffer() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let url = base().join("missing.bin").unwrap();
        let cache = cache_with(&fetcher);

        let buffer = block_on(cache.fetch_buffer("missing.bin").unwrap());
        assert!(buffer.is_empty());
        let buffer = block_on(cache.fetch_buffer("missing.bin").unwrap());
        assert!(buffer.is_empty());
        assert_eq!(fetcher.request_count(&url), 1);
        assert_eq!(cache.buffer_len(), 1);
    }

    #[test]
    fn test_invalid_uri() {
        let fetcher: Arc<dyn ResourceFetcher> = Arc::new(MemoryFetcher::new());
        let cache = ResourceCache::new(
            CacheConfig::new(Url::parse("data:text/plain,hello").unwrap()),
            fetcher,
        );
        assert!(matches!(cache.fetch_buffer("a.bin"), Err(Error::InvalidUri { .. })));
    }
}
