//! Shared foundation for the overcoat session/cache core.
//!
//! This crate provides:
//! - Unified error types for store and network failures
//! - Layered configuration (defaults, TOML file, environment)
//! - The versioned envelope wrapped around every persisted snapshot
//! - The three stores the synchronizer mirrors into: the in-memory
//!   carrier, the SQLite key-value store, and the profile channel

pub mod config;
pub mod envelope;
pub mod error;
pub mod store;

pub use config::AppConfig;
pub use envelope::Envelope;
pub use error::Error;
pub use store::{Carrier, FileProfile, KvStore, MemoryProfile, ProfileTransport};
