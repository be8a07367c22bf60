//! Session state synchronization for the overcoat browser chrome.
//!
//! This crate owns the canonical list of open tabs and the active
//! index, mirrors it across the in-memory carrier, the durable
//! key-value store, and the external profile channel, and breaks the
//! runaway write-reload-write feedback loop that plagues state kept in
//! navigation-surviving storage.

pub mod debounce;
pub mod loopbreak;
pub mod state;
pub mod sync;

pub use debounce::Debouncer;
pub use loopbreak::{LoopDetector, Verdict};
pub use state::{SessionState, TabRecord, TabUpdate};
pub use sync::SessionSync;
