//! Cache entry model and the in-memory store with LRU eviction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compress;
use overcoat_core::Error;

/// How a body is held in the store. Exactly one representation exists
/// per entry; the enum makes the "body or compressedBody, never both"
/// rule unrepresentable rather than checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredBody {
    Inline(String),
    Compressed { algorithm: String, data: Vec<u8> },
}

/// One cached response, keyed by absolute request URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub body: StoredBody,
    /// Bytes this entry occupies in the store (compressed size when
    /// compressed).
    pub stored_size: u64,
    /// Original body size, kept for stats and compression ratios.
    pub raw_size: u64,
    pub headers: HashMap<String, String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Expiry instant, epoch milliseconds.
    pub expires_at: i64,
    /// Last served or stored instant, epoch milliseconds. Eviction order.
    pub last_accessed_at: i64,
}

impl CacheEntry {
    /// Whether the entry is past its TTL at `now` (epoch ms).
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Whether the origin gave us anything to revalidate with.
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    /// Materialize the body bytes, decompressing if stored compressed.
    pub fn body_bytes(&self) -> Result<Vec<u8>, Error> {
        match &self.body {
            StoredBody::Inline(text) => Ok(text.as_bytes().to_vec()),
            StoredBody::Compressed { algorithm, data } => {
                if algorithm != compress::GZIP {
                    return Err(Error::MalformedState(format!("unknown compression algorithm: {algorithm}")));
                }
                compress::decompress(data)
            }
        }
    }
}

/// Eviction caps, both enforced simultaneously.
#[derive(Debug, Clone, Copy)]
pub struct CacheCaps {
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

/// The full cache store: URL -> entry, persisted as one blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStore {
    pub entries: HashMap<String, CacheEntry>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of stored (post-compression) body sizes.
    pub fn total_stored_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.stored_size).sum()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Refresh an entry's access time, feeding the LRU order.
    pub fn touch(&mut self, key: &str, now: i64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_accessed_at = now;
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// Insert an entry, then evict least-recently-accessed entries
    /// until both caps hold again. Whole entries only - the newest
    /// insert can itself be evicted if it alone busts the byte cap.
    pub fn insert(&mut self, entry: CacheEntry, caps: CacheCaps) {
        self.entries.insert(entry.key.clone(), entry);
        self.evict(caps);
    }

    fn evict(&mut self, caps: CacheCaps) {
        while self.entries.len() > caps.max_entries || self.total_stored_bytes() > caps.max_total_bytes {
            let oldest = self
                .entries
                .values()
                .min_by_key(|e| e.last_accessed_at)
                .map(|e| e.key.clone());
            match oldest {
                Some(key) => {
                    tracing::debug!(key = %key, "evicting cache entry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
