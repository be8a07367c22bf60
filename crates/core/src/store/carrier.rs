//! The in-memory carrier slot.
//!
//! Survives same-context navigation but not a process restart; the
//! first store consulted at restore time and the one written
//! synchronously on every state change. The session synchronizer is
//! the sole writer - other components receive a cloned handle for
//! reads only.

use std::sync::{Arc, Mutex};

/// Prefix marking a slot value as ours. Anything else in the slot is
/// treated as empty rather than an error.
const MARKER: &str = "ovct";

/// Cloneable handle over the single in-memory string slot.
#[derive(Debug, Clone, Default)]
pub struct Carrier {
    slot: Arc<Mutex<Option<String>>>,
}

impl Carrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an envelope JSON string into the slot, marker-prefixed.
    pub fn store(&self, envelope_json: &str) {
        let mut slot = self.slot.lock().expect("carrier lock poisoned");
        *slot = Some(format!("{MARKER}:{envelope_json}"));
    }

    /// Read the envelope JSON back out of the slot.
    ///
    /// Returns `None` when the slot is empty or the marker does not
    /// match (a foreign writer clobbered it).
    pub fn load(&self) -> Option<String> {
        let slot = self.slot.lock().expect("carrier lock poisoned");
        let raw = slot.as_deref()?;
        let rest = raw.strip_prefix(MARKER)?;
        let json = rest.strip_prefix(':')?;
        Some(json.to_string())
    }

    /// Empty the slot.
    pub fn clear(&self) {
        let mut slot = self.slot.lock().expect("carrier lock poisoned");
        *slot = None;
    }
}
