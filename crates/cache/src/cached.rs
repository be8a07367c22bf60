//! The cached fetch decorator.
//!
//! Wraps an [`HttpTransport`] and remains a drop-in substitute for it:
//! same request in, same response out, with the cache as the only side
//! effect. Non-GET requests pass straight through. The store lives in
//! memory and is persisted as a single envelope blob in the key-value
//! store after every mutation, best-effort - a failed persist costs
//! durability, never correctness.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;

use overcoat_core::store::{HTTP_CACHE_KEY, KvStore};
use overcoat_core::{AppConfig, Error, envelope};

use crate::compress;
use crate::entry::{CacheCaps, CacheEntry, CacheStore, StoredBody};
use crate::key::cache_key;
use crate::policy;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Outcome of a conditional revalidation probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    /// Origin confirmed the entry is still current (304).
    NotModified,
    /// Origin has something newer; do a full fetch.
    Changed,
    /// Probe failed or timed out; trust the entry we have.
    Unreachable,
}

/// Caching wrapper around the network-fetch primitive.
pub struct CachedFetch {
    transport: Arc<dyn HttpTransport>,
    kv: KvStore,
    store: Mutex<CacheStore>,
    caps: CacheCaps,
    compress_threshold: usize,
    default_ttl: Duration,
    revalidate: bool,
    revalidate_timeout: Duration,
}

impl CachedFetch {
    /// Load the persisted cache blob and build the decorator.
    ///
    /// A missing, unreadable, or malformed blob starts the cache
    /// empty; nothing propagates.
    pub async fn open(transport: Arc<dyn HttpTransport>, kv: KvStore, config: &AppConfig) -> Self {
        let store = match kv.get(HTTP_CACHE_KEY).await {
            Ok(Some(json)) => match envelope::decode::<CacheStore>(&json) {
                Ok(store) => store,
                Err(e) => {
                    tracing::debug!("persisted cache blob unusable, starting empty: {}", e);
                    CacheStore::new()
                }
            },
            Ok(None) => CacheStore::new(),
            Err(e) => {
                tracing::warn!("key-value store unavailable, starting cache empty: {}", e);
                CacheStore::new()
            }
        };

        Self {
            transport,
            kv,
            store: Mutex::new(store),
            caps: CacheCaps { max_entries: config.cache_max_entries, max_total_bytes: config.cache_max_bytes },
            compress_threshold: config.compress_threshold,
            default_ttl: Duration::from_secs(config.default_ttl_secs),
            revalidate: config.revalidate,
            revalidate_timeout: config.revalidate_timeout(),
        }
    }

    /// Drop-in replacement for the wrapped transport's `execute`.
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        if request.method != "GET" || request.body.is_some() {
            return self.transport.execute(request).await;
        }

        let key = match cache_key(&request.url) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(url = %request.url, "url not cacheable, passing through: {}", e);
                return self.transport.execute(request).await;
            }
        };

        let now = chrono::Utc::now().timestamp_millis();
        let cached = { self.store.lock().await.get(&key).cloned() };

        if let Some(entry) = &cached {
            if !entry.is_expired(now) {
                let confirmed = if self.revalidate && entry.has_validators() {
                    self.probe(entry).await != Probe::Changed
                } else {
                    true
                };

                if confirmed {
                    match self.serve_cached(&key, entry).await {
                        Ok(response) => return Ok(response),
                        Err(e) => {
                            // Self-heal: a body we cannot materialize is a miss.
                            tracing::warn!(key = %key, "cached body unusable, refetching: {}", e);
                            self.store.lock().await.remove(&key);
                            self.persist().await;
                        }
                    }
                }
            }
        }

        match self.transport.execute(request.clone()).await {
            Ok(response) => {
                if policy::is_cacheable(&request, &response) {
                    self.store_response(key, &response).await;
                }
                Ok(response)
            }
            Err(e) if e.is_network() => {
                let stale = { self.store.lock().await.get(&key).cloned() };
                match stale {
                    Some(entry) => {
                        tracing::warn!(key = %key, "network failed, serving stale entry: {}", e);
                        self.serve_cached(&key, &entry).await.map_err(|_| e)
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Number of entries and aggregate stored bytes.
    pub async fn stats(&self) -> (usize, u64) {
        let store = self.store.lock().await;
        (store.entries.len(), store.total_stored_bytes())
    }

    /// Drop every entry, in memory and in the durable blob.
    pub async fn purge(&self) {
        {
            let mut store = self.store.lock().await;
            store.entries.clear();
        }
        if let Err(e) = self.kv.delete(HTTP_CACHE_KEY).await {
            tracing::warn!("failed to delete persisted cache blob: {}", e);
        }
    }

    /// Cheap conditional HEAD against the origin, bounded by the
    /// revalidation timeout.
    async fn probe(&self, entry: &CacheEntry) -> Probe {
        let mut request = HttpRequest::head(&entry.key);
        if let Some(etag) = &entry.etag {
            request = request.header("If-None-Match", etag);
        }
        if let Some(last_modified) = &entry.last_modified {
            request = request.header("If-Modified-Since", last_modified);
        }

        match tokio::time::timeout(self.revalidate_timeout, self.transport.execute(request)).await {
            Ok(Ok(response)) if response.status == 304 => Probe::NotModified,
            Ok(Ok(response)) if response.is_success() => Probe::Changed,
            Ok(Ok(response)) => {
                tracing::debug!(status = response.status, "unexpected revalidation status");
                Probe::Unreachable
            }
            Ok(Err(e)) => {
                tracing::debug!("revalidation probe failed: {}", e);
                Probe::Unreachable
            }
            Err(_) => {
                tracing::debug!("revalidation probe timed out");
                Probe::Unreachable
            }
        }
    }

    /// Serve an entry's body, decompressing lazily, and refresh its
    /// access time.
    async fn serve_cached(&self, key: &str, entry: &CacheEntry) -> Result<HttpResponse, Error> {
        let bytes = entry.body_bytes()?;

        let now = chrono::Utc::now().timestamp_millis();
        {
            let mut store = self.store.lock().await;
            store.touch(key, now);
        }
        self.persist().await;

        tracing::debug!(key = %key, "cache hit");
        Ok(HttpResponse { status: 200, headers: entry.headers.clone(), body: Bytes::from(bytes), from_cache: true })
    }

    async fn store_response(&self, key: String, response: &HttpResponse) {
        let raw_size = response.body.len() as u64;

        // Only textual bodies pass the cacheability test, so a
        // non-UTF-8 body means a lying Content-Type. Skip it.
        let Ok(text) = std::str::from_utf8(&response.body) else {
            tracing::debug!(key = %key, "response body is not valid utf-8, skipping cache");
            return;
        };

        let (body, stored_size) = if response.body.len() > self.compress_threshold {
            match compress::compress(&response.body) {
                Ok(data) => {
                    let len = data.len() as u64;
                    (StoredBody::Compressed { algorithm: compress::GZIP.into(), data }, len)
                }
                Err(e) => {
                    tracing::warn!(key = %key, "compression failed, storing inline: {}", e);
                    (StoredBody::Inline(text.to_string()), raw_size)
                }
            }
        } else {
            (StoredBody::Inline(text.to_string()), raw_size)
        };

        let ttl = policy::ttl_from_headers(&response.headers, self.default_ttl);
        let now = chrono::Utc::now().timestamp_millis();
        let entry = CacheEntry {
            key,
            body,
            stored_size,
            raw_size,
            headers: response.headers.clone(),
            etag: policy::header(&response.headers, "etag").map(str::to_string),
            last_modified: policy::header(&response.headers, "last-modified").map(str::to_string),
            expires_at: now + ttl.as_millis() as i64,
            last_accessed_at: now,
        };

        {
            let mut store = self.store.lock().await;
            store.insert(entry, self.caps);
        }
        self.persist().await;
    }

    /// Write the whole store to the key-value blob. Best-effort.
    async fn persist(&self) {
        let json = {
            let store = self.store.lock().await;
            match envelope::encode(&*store) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("failed to encode cache blob: {}", e);
                    return;
                }
            }
        };
        if let Err(e) = self.kv.put(HTTP_CACHE_KEY, &json).await {
            tracing::warn!("failed to persist cache blob: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;

    /// Transport that replays queued outcomes and records requests.
    struct StubTransport {
        outcomes: StdMutex<VecDeque<Result<HttpResponse, Error>>>,
        requests: StdMutex<Vec<HttpRequest>>,
    }

    impl StubTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self { outcomes: StdMutex::new(VecDeque::new()), requests: StdMutex::new(Vec::new()) })
        }

        fn queue(&self, outcome: Result<HttpResponse, Error>) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }

        fn calls(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
            self.requests.lock().unwrap().push(request);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::HttpError("stub exhausted".into())))
        }
    }

    fn ok_response(body: &str, headers: &[(&str, &str)]) -> HttpResponse {
        let mut map: HashMap<String, String> =
            headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        map.entry("Content-Type".into()).or_insert_with(|| "text/html".into());
        HttpResponse { status: 200, headers: map, body: Bytes::from(body.to_string()), from_cache: false }
    }

    fn test_config() -> AppConfig {
        AppConfig { compress_threshold: 64, revalidate_timeout_ms: 200, ..Default::default() }
    }

    async fn fresh_cache(transport: Arc<StubTransport>, config: &AppConfig) -> (CachedFetch, KvStore) {
        let kv = KvStore::open_in_memory().await.unwrap();
        let cache = CachedFetch::open(transport, kv.clone(), config).await;
        (cache, kv)
    }

    #[tokio::test]
    async fn test_round_trip_served_from_cache() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("hello world", &[])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        let first = cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(&first.body[..], b"hello world");

        let second = cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.body, first.body);
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_max_age_zero_is_immediately_expired() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("v1", &[("Cache-Control", "max-age=0")])));
        stub.queue(Ok(ok_response("v2", &[("Cache-Control", "max-age=0")])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();
        let second = cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        assert!(!second.from_cache);
        assert_eq!(&second.body[..], b"v2");
        assert_eq!(stub.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_fallback_on_network_failure() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("kept body", &[("Cache-Control", "max-age=0")])));
        stub.queue(Err(Error::HttpError("connection refused".into())));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        // The entry is already expired, but the network is down.
        let fallback = cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();
        assert!(fallback.from_cache);
        assert_eq!(&fallback.body[..], b"kept body");
    }

    #[tokio::test]
    async fn test_no_fallback_propagates_network_error() {
        let stub = StubTransport::new();
        stub.queue(Err(Error::FetchTimeout("deadline".into())));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        let result = cache.fetch(HttpRequest::get("https://x/never-seen")).await;
        assert!(matches!(result, Err(Error::FetchTimeout(_))));
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("cached", &[])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;
        cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        let mut post = HttpRequest::get("https://x/y");
        post.method = "POST".into();
        stub.queue(Ok(ok_response("post result", &[])));
        let response = cache.fetch(post).await.unwrap();

        assert!(!response.from_cache);
        assert_eq!(&response.body[..], b"post result");
        assert_eq!(stub.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_content_never_replayed_as_full_body() {
        let stub = StubTransport::new();
        let mut partial = ok_response("fragment", &[("Content-Range", "bytes 0-7/4096")]);
        partial.status = 206;
        stub.queue(Ok(partial.clone()));
        stub.queue(Ok(partial));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        let first = cache.fetch(HttpRequest::get("https://x/range")).await.unwrap();
        assert_eq!(first.status, 206);

        let second = cache.fetch(HttpRequest::get("https://x/range")).await.unwrap();
        assert_eq!(second.status, 206);
        assert!(!second.from_cache);
        assert_eq!(stub.calls().len(), 2);
        assert_eq!(cache.stats().await.0, 0);
    }

    #[tokio::test]
    async fn test_non_cacheable_response_not_stored() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("blob", &[("Content-Type", "application/octet-stream")])));
        stub.queue(Ok(ok_response("blob", &[("Content-Type", "application/octet-stream")])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        cache.fetch(HttpRequest::get("https://x/bin")).await.unwrap();
        let second = cache.fetch(HttpRequest::get("https://x/bin")).await.unwrap();

        assert!(!second.from_cache);
        assert_eq!(stub.calls().len(), 2);
        assert_eq!(cache.stats().await.0, 0);
    }

    #[tokio::test]
    async fn test_large_body_compressed_and_served_intact() {
        let stub = StubTransport::new();
        let big = "<p>paragraph</p>".repeat(100);
        stub.queue(Ok(ok_response(&big, &[])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        cache.fetch(HttpRequest::get("https://x/big")).await.unwrap();

        {
            let store = cache.store.lock().await;
            let entry = store.get("https://x/big").unwrap();
            assert!(matches!(entry.body, StoredBody::Compressed { .. }));
            assert_eq!(entry.raw_size, big.len() as u64);
            assert!(entry.stored_size < entry.raw_size);
        }

        let served = cache.fetch(HttpRequest::get("https://x/big")).await.unwrap();
        assert!(served.from_cache);
        assert_eq!(&served.body[..], big.as_bytes());
    }

    #[tokio::test]
    async fn test_small_body_stored_inline() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("tiny", &[])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        cache.fetch(HttpRequest::get("https://x/small")).await.unwrap();

        let store = cache.store.lock().await;
        let entry = store.get("https://x/small").unwrap();
        assert!(matches!(entry.body, StoredBody::Inline(_)));
    }

    #[tokio::test]
    async fn test_revalidation_304_serves_cached() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("v1", &[("ETag", "\"abc\""), ("Cache-Control", "max-age=600")])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;
        cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        stub.queue(Ok(HttpResponse {
            status: 304,
            headers: HashMap::new(),
            body: Bytes::new(),
            from_cache: false,
        }));
        let second = cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        assert!(second.from_cache);
        assert_eq!(&second.body[..], b"v1");

        let calls = stub.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].method, "HEAD");
        assert_eq!(calls[1].headers.get("If-None-Match").map(String::as_str), Some("\"abc\""));
    }

    #[tokio::test]
    async fn test_revalidation_change_triggers_full_fetch() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("v1", &[("ETag", "\"v1\""), ("Cache-Control", "max-age=600")])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;
        cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        // HEAD says the resource moved on; a full GET follows.
        stub.queue(Ok(ok_response("", &[("ETag", "\"v2\"")])));
        stub.queue(Ok(ok_response("v2", &[("ETag", "\"v2\""), ("Cache-Control", "max-age=600")])));
        let second = cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        assert!(!second.from_cache);
        assert_eq!(&second.body[..], b"v2");
        assert_eq!(stub.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_revalidation_failure_serves_cached() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("v1", &[("ETag", "\"abc\""), ("Cache-Control", "max-age=600")])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;
        cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        stub.queue(Err(Error::HttpError("origin unreachable".into())));
        let second = cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        assert!(second.from_cache);
        assert_eq!(&second.body[..], b"v1");
    }

    #[tokio::test]
    async fn test_cache_survives_reopen() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("persisted", &[])));
        let kv = KvStore::open_in_memory().await.unwrap();
        let config = test_config();

        let cache = CachedFetch::open(Arc::clone(&stub) as Arc<dyn HttpTransport>, kv.clone(), &config).await;
        cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();
        drop(cache);

        let reopened = CachedFetch::open(Arc::clone(&stub) as Arc<dyn HttpTransport>, kv, &config).await;
        let served = reopened.fetch(HttpRequest::get("https://x/y")).await.unwrap();
        assert!(served.from_cache);
        assert_eq!(&served.body[..], b"persisted");
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_eviction_caps_respected() {
        let stub = StubTransport::new();
        for i in 0..5 {
            stub.queue(Ok(ok_response(&format!("body {i}"), &[])));
        }
        let config = AppConfig { cache_max_entries: 2, ..test_config() };
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &config).await;

        for i in 0..5 {
            cache.fetch(HttpRequest::get(format!("https://x/{i}"))).await.unwrap();
        }

        let (count, bytes) = cache.stats().await;
        assert!(count <= 2);
        assert!(bytes <= config.cache_max_bytes);
    }

    #[tokio::test]
    async fn test_equivalent_urls_share_entry() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("shared", &[])));
        let (cache, _kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;

        cache.fetch(HttpRequest::get("https://Example.COM/page#top")).await.unwrap();
        let second = cache.fetch(HttpRequest::get("https://example.com/page")).await.unwrap();

        assert!(second.from_cache);
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_empties_store_and_blob() {
        let stub = StubTransport::new();
        stub.queue(Ok(ok_response("gone soon", &[])));
        let (cache, kv) = fresh_cache(Arc::clone(&stub), &test_config()).await;
        cache.fetch(HttpRequest::get("https://x/y")).await.unwrap();

        cache.purge().await;

        assert_eq!(cache.stats().await.0, 0);
        assert_eq!(kv.get(HTTP_CACHE_KEY).await.unwrap(), None);
    }
}
