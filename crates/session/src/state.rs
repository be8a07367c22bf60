//! Tab and session state model.

use serde::{Deserialize, Serialize};

/// One open tab.
///
/// `input` holds an in-progress, not-yet-committed address-bar value.
/// It is kept apart from `url` so that typing never corrupts
/// navigation state, and is serialized only when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabRecord {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

impl TabRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self { url: url.into(), title: title.into(), input: None }
    }
}

/// Partial update applied to the active tab.
///
/// Fields left `None` are untouched. Committing a new `url` clears any
/// in-progress `input`: the draft was either submitted or abandoned.
#[derive(Debug, Clone, Default)]
pub struct TabUpdate {
    pub url: Option<String>,
    pub title: Option<String>,
    pub input: Option<String>,
}

/// The canonical session: open tabs in display order plus the active
/// index.
///
/// Invariant: `tabs` is never empty and `active < tabs.len()` whenever
/// the state is observable. An empty `tabs` vector is transient and
/// repaired before the state is stored or returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub tabs: Vec<TabRecord>,
    pub active: usize,
}

impl SessionState {
    /// The synthesized default: one tab for the given page.
    pub fn single(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self { tabs: vec![TabRecord::new(url, title)], active: 0 }
    }

    /// Whether the state satisfies its invariants as-is.
    pub fn is_valid(&self, max_tabs: usize) -> bool {
        !self.tabs.is_empty() && self.tabs.len() <= max_tabs && self.active < self.tabs.len()
    }

    /// Restore the invariants in place.
    ///
    /// Empty `tabs` becomes `[fallback]`, overlong `tabs` is truncated
    /// to `max_tabs`, and `active` is clamped into range.
    pub fn repair(&mut self, fallback: &TabRecord, max_tabs: usize) {
        if self.tabs.is_empty() {
            self.tabs.push(fallback.clone());
        }
        if self.tabs.len() > max_tabs {
            self.tabs.truncate(max_tabs);
        }
        if self.active >= self.tabs.len() {
            self.active = self.tabs.len() - 1;
        }
    }

    /// The active tab record.
    ///
    /// Safe on any repaired state; `None` only for the transient empty
    /// form.
    pub fn active_tab(&self) -> Option<&TabRecord> {
        self.tabs.get(self.active)
    }
}
