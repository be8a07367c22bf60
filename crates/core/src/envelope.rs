//! Versioned envelope around persisted snapshots.
//!
//! Every blob written to the carrier, the key-value store, or the
//! profile channel is wrapped in `{version, payload}` so a future
//! schema change is detected and rejected instead of silently
//! misparsed. A rejected envelope is indistinguishable from an empty
//! store to callers, which fall through to the next tier.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::Error;

/// Envelope format version written by this build.
pub const FORMAT_VERSION: u32 = 1;

/// A versioned wrapper around a serialized payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: u32,
    pub payload: T,
}

/// Serialize a payload into an envelope JSON string at the current version.
pub fn encode<T: Serialize>(payload: &T) -> Result<String, Error> {
    let envelope = Envelope { version: FORMAT_VERSION, payload };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse an envelope JSON string and extract its payload.
///
/// # Errors
///
/// Returns `Error::MalformedState` when the JSON does not parse, the
/// payload has the wrong shape, or the version is newer than this
/// build supports.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, Error> {
    let envelope: Envelope<T> = serde_json::from_str(raw)?;
    if envelope.version > FORMAT_VERSION {
        return Err(Error::MalformedState(format!(
            "envelope version {} is newer than supported version {}",
            envelope.version, FORMAT_VERSION
        )));
    }
    Ok(envelope.payload)
}
