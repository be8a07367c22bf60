//! The external profile channel.
//!
//! The host process owns a profile document of the shape
//! `{tabs, bookmarks, history, prefs}`; this core only contributes and
//! consumes the `tabs` field and must leave the sibling fields alone.
//! Saves are fire-and-forget - implementations swallow and log their
//! own failures. Loads are awaited by the caller under a bounded
//! timeout, so an unresponsive channel degrades to "store empty".

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;

/// Request/response seam to the external profile store.
#[async_trait]
pub trait ProfileTransport: Send + Sync {
    /// Send the tabs value to the profile store. Fire-and-forget.
    async fn save_tabs(&self, tabs: Value);

    /// Ask the profile store for its tabs value.
    ///
    /// `None` means the store is empty, unreachable, or holds no tabs.
    async fn load_tabs(&self) -> Option<Value>;
}

/// Profile store backed by a JSON document on disk.
///
/// Merges on save: only the `tabs` field is replaced, everything else
/// in the document is carried over untouched.
pub struct FileProfile {
    path: PathBuf,
}

impl FileProfile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_document(&self) -> Option<Value> {
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!("profile document at {} is malformed: {}", self.path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl ProfileTransport for FileProfile {
    async fn save_tabs(&self, tabs: Value) {
        let mut doc = self
            .read_document()
            .await
            .unwrap_or_else(|| json!({"bookmarks": [], "history": [], "prefs": {}}));

        if let Some(obj) = doc.as_object_mut() {
            obj.insert("tabs".to_string(), tabs);
        } else {
            doc = json!({"tabs": tabs, "bookmarks": [], "history": [], "prefs": {}});
        }

        let serialized = match serde_json::to_string(&doc) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("failed to serialize profile document: {}", e);
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&self.path, serialized).await {
            tracing::warn!("failed to write profile document to {}: {}", self.path.display(), e);
        }
    }

    async fn load_tabs(&self) -> Option<Value> {
        let doc = self.read_document().await?;
        doc.get("tabs").cloned()
    }
}

/// In-memory profile store for embedders and tests.
#[derive(Default)]
pub struct MemoryProfile {
    document: Arc<RwLock<Value>>,
}

impl MemoryProfile {
    pub fn new() -> Self {
        Self { document: Arc::new(RwLock::new(json!({}))) }
    }

    /// Seed the full profile document, tabs included.
    pub async fn seed(&self, document: Value) {
        let mut doc = self.document.write().await;
        *doc = document;
    }

    /// Snapshot of the full document, for assertions.
    pub async fn document(&self) -> Value {
        self.document.read().await.clone()
    }
}

#[async_trait]
impl ProfileTransport for MemoryProfile {
    async fn save_tabs(&self, tabs: Value) {
        let mut doc = self.document.write().await;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("tabs".to_string(), tabs);
        } else {
            *doc = json!({"tabs": tabs});
        }
    }

    async fn load_tabs(&self) -> Option<Value> {
        let doc = self.document.read().await;
        doc.get("tabs").cloned()
    }
}
