//! The session state synchronizer.
//!
//! A single service object owns the canonical `SessionState` and is
//! the sole writer of every store it mirrors into. Tab operations are
//! synchronous on the in-memory copy; durable propagation is debounced
//! and eventually consistent. A reader immediately after a write
//! always sees the fresh in-memory value.
//!
//! Restore priority: carrier, then key-value store, then profile
//! channel, then a synthesized single-tab default. Parse failures at
//! any tier are logged and treated as an empty store.

use std::sync::{Arc, Mutex};

use overcoat_core::store::{SESSION_STATE_KEY, Carrier, KvStore, ProfileTransport};
use overcoat_core::{AppConfig, envelope};

use crate::debounce::Debouncer;
use crate::loopbreak::{LoopDetector, Verdict};
use crate::state::{SessionState, TabRecord, TabUpdate};

/// Session state synchronizer. Construct once per process via
/// [`SessionSync::restore`].
pub struct SessionSync {
    state: Mutex<SessionState>,
    fallback: TabRecord,
    max_tabs: usize,
    carrier: Carrier,
    detector: Mutex<LoopDetector>,
    kv_flush: Debouncer<SessionState>,
    profile_flush: Debouncer<SessionState>,
}

impl SessionSync {
    /// Hydrate the session from the highest-priority store holding a
    /// usable snapshot and build the synchronizer around it.
    pub async fn restore(
        carrier: Carrier,
        kv: KvStore,
        profile: Arc<dyn ProfileTransport>,
        fallback: TabRecord,
        config: &AppConfig,
    ) -> Self {
        let mut state = hydrate(&carrier, &kv, profile.as_ref(), config)
            .await
            .unwrap_or_else(|| {
                tracing::debug!("no stored session found, synthesizing default");
                SessionState { tabs: vec![fallback.clone()], active: 0 }
            });
        state.repair(&fallback, config.max_tabs);

        // Reseed the carrier so the next same-context navigation finds
        // the freshly hydrated snapshot.
        if let Ok(json) = envelope::encode(&state) {
            carrier.store(&json);
        }

        let kv_target = kv.clone();
        let kv_flush = Debouncer::new(config.session_flush(), move |snapshot: SessionState| {
            let kv = kv_target.clone();
            async move {
                let json = match envelope::encode(&snapshot) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!("failed to encode session state: {}", e);
                        return;
                    }
                };
                if let Err(e) = kv.put(SESSION_STATE_KEY, &json).await {
                    tracing::warn!("session flush to key-value store failed: {}", e);
                }
            }
        });

        let profile_target = Arc::clone(&profile);
        let profile_flush = Debouncer::new(config.profile_flush(), move |snapshot: SessionState| {
            let profile = Arc::clone(&profile_target);
            async move {
                match serde_json::to_value(&snapshot) {
                    Ok(tabs) => profile.save_tabs(tabs).await,
                    Err(e) => tracing::warn!("failed to encode session state for profile: {}", e),
                }
            }
        });

        Self {
            state: Mutex::new(state),
            fallback,
            max_tabs: config.max_tabs,
            carrier,
            detector: Mutex::new(LoopDetector::new(config.loop_threshold, config.loop_window())),
            kv_flush,
            profile_flush,
        }
    }

    /// Current session state. Idempotent between writes.
    pub fn read(&self) -> SessionState {
        self.state.lock().expect("session lock poisoned").clone()
    }

    /// Replace the session state wholesale.
    ///
    /// Invariants are repaired before anything is stored. No-op while
    /// the loop breaker is suppressing propagation.
    pub fn write(&self, state: SessionState) {
        self.mutate(move |current| *current = state);
    }

    /// Append a tab and make it active.
    pub fn create_tab(&self, url: impl Into<String>, title: impl Into<String>) {
        let record = TabRecord::new(url, title);
        let max_tabs = self.max_tabs;
        self.mutate(move |state| {
            if state.tabs.len() >= max_tabs {
                tracing::warn!(max_tabs, "tab limit reached, refusing new tab");
                return;
            }
            state.tabs.push(record);
            state.active = state.tabs.len() - 1;
        });
    }

    /// Close the tab at `index`. Closing the last tab repairs the
    /// session to the fallback record.
    pub fn close_tab(&self, index: usize) {
        self.mutate(move |state| {
            if index >= state.tabs.len() {
                tracing::debug!(index, "close_tab index out of range, ignoring");
                return;
            }
            state.tabs.remove(index);
            if index < state.active {
                state.active -= 1;
            }
        });
    }

    /// Make the tab at `index` active.
    pub fn switch_tab(&self, index: usize) {
        self.mutate(move |state| {
            if index < state.tabs.len() {
                state.active = index;
            } else {
                tracing::debug!(index, "switch_tab index out of range, ignoring");
            }
        });
    }

    /// Move the tab at `from` to position `to`, keeping `active`
    /// pointed at the same logical tab.
    pub fn reorder_tab(&self, from: usize, to: usize) {
        self.mutate(move |state| {
            if from >= state.tabs.len() || to >= state.tabs.len() {
                tracing::debug!(from, to, "reorder_tab index out of range, ignoring");
                return;
            }
            let tab = state.tabs.remove(from);
            state.tabs.insert(to, tab);

            if state.active == from {
                state.active = to;
            } else if from < state.active && to >= state.active {
                state.active -= 1;
            } else if from > state.active && to <= state.active {
                state.active += 1;
            }
        });
    }

    /// Apply a partial update to the active tab.
    pub fn update_active_tab(&self, update: TabUpdate) {
        self.mutate(move |state| {
            let index = state.active;
            let Some(tab) = state.tabs.get_mut(index) else {
                return;
            };
            if let Some(url) = update.url {
                tab.url = url;
                // The draft was committed or abandoned with the navigation.
                tab.input = None;
            }
            if let Some(title) = update.title {
                tab.title = title;
            }
            if let Some(input) = update.input {
                tab.input = Some(input);
            }
        });
    }

    /// Record an externally observed navigation completion.
    ///
    /// Feeds the loop detector; engaging suppression cancels pending
    /// debounced flushes so a half-scheduled write cannot leak out.
    pub fn on_navigation(&self, loaded_url: &str) -> Verdict {
        let recorded = {
            let state = self.state.lock().expect("session lock poisoned");
            state.active_tab().map(|tab| tab.url.clone()).unwrap_or_default()
        };

        let verdict = self
            .detector
            .lock()
            .expect("detector lock poisoned")
            .observe(loaded_url, &recorded);

        if verdict == Verdict::Suppressed {
            self.kv_flush.cancel();
            self.profile_flush.cancel();
        }

        verdict
    }

    /// Whether the loop breaker is currently suppressing writes.
    pub fn is_suppressed(&self) -> bool {
        self.detector.lock().expect("detector lock poisoned").is_suppressed()
    }

    /// Flush pending durable writes immediately (shutdown path).
    pub async fn flush(&self) {
        self.kv_flush.flush_now().await;
        self.profile_flush.flush_now().await;
    }

    fn mutate(&self, f: impl FnOnce(&mut SessionState)) {
        if self.is_suppressed() {
            tracing::debug!("suppressed mode active, dropping session write");
            return;
        }

        let snapshot = {
            let mut state = self.state.lock().expect("session lock poisoned");
            f(&mut state);
            state.repair(&self.fallback, self.max_tabs);
            state.clone()
        };

        if let Ok(json) = envelope::encode(&snapshot) {
            self.carrier.store(&json);
        }
        self.kv_flush.submit(snapshot.clone());
        self.profile_flush.submit(snapshot);
    }
}

async fn hydrate(
    carrier: &Carrier,
    kv: &KvStore,
    profile: &dyn ProfileTransport,
    config: &AppConfig,
) -> Option<SessionState> {
    if let Some(json) = carrier.load() {
        match envelope::decode::<SessionState>(&json) {
            Ok(state) => {
                tracing::debug!("session restored from carrier");
                return Some(state);
            }
            Err(e) => tracing::debug!("carrier snapshot unusable: {}", e),
        }
    }

    match kv.get(SESSION_STATE_KEY).await {
        Ok(Some(json)) => match envelope::decode::<SessionState>(&json) {
            Ok(state) => {
                tracing::debug!("session restored from key-value store");
                return Some(state);
            }
            Err(e) => tracing::debug!("key-value snapshot unusable: {}", e),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!("key-value store unavailable during restore: {}", e),
    }

    match tokio::time::timeout(config.profile_load_timeout(), profile.load_tabs()).await {
        Ok(Some(tabs)) => match serde_json::from_value::<SessionState>(tabs) {
            Ok(state) => {
                tracing::debug!("session restored from profile channel");
                return Some(state);
            }
            Err(e) => tracing::debug!("profile snapshot unusable: {}", e),
        },
        Ok(None) => {}
        Err(_) => tracing::warn!("profile load timed out during restore"),
    }

    None
}
