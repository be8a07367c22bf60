//! HTTP response cache for the overcoat browser chrome.
//!
//! This crate wraps the network-fetch primitive behind an injectable
//! transport trait and layers a persistent response cache on top:
//! cache hits are served instantly, fresh-but-validatable entries are
//! revalidated with a cheap conditional probe, large bodies are
//! gzip-compressed for storage, and the store is LRU-evicted under
//! dual entry-count and byte-size caps. A network failure with a
//! cached entry on hand - expired or not - serves the stale body
//! instead of propagating the error.

pub mod cached;
pub mod compress;
pub mod entry;
pub mod key;
pub mod policy;
pub mod transport;

pub use cached::CachedFetch;
pub use entry::{CacheEntry, CacheStore, StoredBody};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
