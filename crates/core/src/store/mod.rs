//! The three stores session state is mirrored into.
//!
//! In priority order at restore time:
//! 1. [`Carrier`] - in-memory slot surviving same-context navigation
//! 2. [`KvStore`] - durable SQLite key-value store
//! 3. [`ProfileTransport`] - the external profile channel
//!
//! All three hold opaque serialized blobs; the owning component decides
//! the payload shape and wraps it in the versioned envelope.

pub mod carrier;
pub mod kv;
pub mod profile;

pub use carrier::Carrier;
pub use kv::KvStore;
pub use profile::{FileProfile, MemoryProfile, ProfileTransport};

/// Key-value store key holding the serialized session state.
pub const SESSION_STATE_KEY: &str = "session/state";

/// Key-value store key holding the serialized HTTP cache blob.
pub const HTTP_CACHE_KEY: &str = "http/cache";
