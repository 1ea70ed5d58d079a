//! Transport boundary for external resources.
//!
//! The cache only needs two operations: fetch a JSON document and fetch a
//! raw byte payload. Anything that can produce those (HTTP client, asset
//! bundle, test fixture) plugs in through [`ResourceFetcher`].

use std::collections::HashMap;
use std::path::PathBuf;

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::util::{Error, Result};

/// Fetches external resources for a [`ResourceCache`](super::ResourceCache).
///
/// Returned futures must be `'static`; they are stored by the cache and
/// shared between every caller asking for the same URL.
///
/// Property reads poll these futures without waiting, so polling must never
/// block. Blocking transports do their work before returning the future or
/// on a thread of their own.
pub trait ResourceFetcher: Send + Sync {
    /// Fetch and parse a JSON document.
    fn fetch_json(&self, url: &Url) -> BoxFuture<'static, Result<Value>>;

    /// Fetch a raw byte payload.
    fn fetch_bytes(&self, url: &Url) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Serves `file://` URLs from the local filesystem.
///
/// The file is read when the request is made; the returned future is
/// already complete.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFetcher;

impl FileFetcher {
    fn path_for(url: &Url) -> Result<PathBuf> {
        url.to_file_path()
            .map_err(|_| Error::fetch(format!("not a file URL: {url}")))
    }

    fn read(url: &Url) -> Result<Vec<u8>> {
        let path = Self::path_for(url)?;
        debug!(path = %path.display(), "reading resource file");
        Ok(std::fs::read(path)?)
    }
}

impl ResourceFetcher for FileFetcher {
    fn fetch_json(&self, url: &Url) -> BoxFuture<'static, Result<Value>> {
        let result = Self::read(url).and_then(|bytes| serde_json::from_slice(&bytes).map_err(Error::from));
        future::ready(result).boxed()
    }

    fn fetch_bytes(&self, url: &Url) -> BoxFuture<'static, Result<Vec<u8>>> {
        future::ready(Self::read(url)).boxed()
    }
}

/// In-memory URL → payload map.
///
/// Counts every request per URL, which makes it easy to verify that the
/// cache never issues a second fetch for the same resource.
#[derive(Default)]
pub struct MemoryFetcher {
    entries: RwLock<HashMap<Url, Vec<u8>>>,
    requests: Mutex<HashMap<Url, usize>>,
}

impl MemoryFetcher {
    /// Create an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a byte payload.
    pub fn insert_bytes(&self, url: Url, bytes: impl Into<Vec<u8>>) {
        self.entries.write().insert(url, bytes.into());
    }

    /// Register a JSON document.
    pub fn insert_json(&self, url: Url, value: &Value) {
        self.insert_bytes(url, value.to_string());
    }

    /// Number of fetches issued for `url` so far.
    pub fn request_count(&self, url: &Url) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    fn lookup(&self, url: &Url) -> Result<Vec<u8>> {
        *self.requests.lock().entry(url.clone()).or_insert(0) += 1;
        self.entries
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::fetch(format!("no resource at {url}")))
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn fetch_json(&self, url: &Url) -> BoxFuture<'static, Result<Value>> {
        let result: Result<Value> = self
            .lookup(url)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(Error::from));
        future::ready(result).boxed()
    }

    fn fetch_bytes(&self, url: &Url) -> BoxFuture<'static, Result<Vec<u8>>> {
        future::ready(self.lookup(url)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_memory_fetcher_counts_requests() {
        let fetcher = MemoryFetcher::new();
        let url = Url::parse("https://example.com/a.bin").unwrap();
        fetcher.insert_bytes(url.clone(), vec![1u8, 2, 3]);

        assert_eq!(block_on(fetcher.fetch_bytes(&url)).unwrap(), vec![1, 2, 3]);
        assert_eq!(fetcher.request_count(&url), 1);
        let _ = block_on(fetcher.fetch_bytes(&url));
        assert_eq!(fetcher.request_count(&url), 2);
    }

    #[test]
    fn test_memory_fetcher_missing() {
        let fetcher = MemoryFetcher::new();
        let url = Url::parse("https://example.com/missing.json").unwrap();
        let err = block_on(fetcher.fetch_json(&url)).unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert_eq!(fetcher.request_count(&url), 1);
    }

    #[test]
    fn test_memory_fetcher_json() {
        let fetcher = MemoryFetcher::new();
        let url = Url::parse("https://example.com/doc.json").unwrap();
        fetcher.insert_json(url.clone(), &json!({"names": ["a", "b"]}));
        let doc = block_on(fetcher.fetch_json(&url)).unwrap();
        assert_eq!(doc["names"][1], json!("b"));
    }

    #[test]
    fn test_file_fetcher_rejects_other_schemes() {
        let url = Url::parse("https://example.com/a.bin").unwrap();
        let err = block_on(FileFetcher.fetch_bytes(&url)).unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[test]
    fn test_file_fetcher_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [9u8, 8, 7]).unwrap();
        let url = Url::from_file_path(&path).unwrap();
        assert_eq!(block_on(FileFetcher.fetch_bytes(&url)).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn test_file_fetcher_reads_before_polling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let bytes = FileFetcher.fetch_bytes(&url);
        let doc = FileFetcher.fetch_json(&url);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(bytes.now_or_never().unwrap().unwrap(), br#"{"a": 1}"#.to_vec());
        assert_eq!(doc.now_or_never().unwrap().unwrap(), json!({"a": 1}));
    }
}
