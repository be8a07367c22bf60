//! Unified error types for the session/cache core.
//!
//! Storage and cache-maintenance failures are self-healing by design:
//! callers catch them locally, log, and fall through to the next store
//! or a synthesized default. The only error that legitimately reaches
//! an embedder is a network failure with no cached fallback.

/// Unified error type shared across the overcoat crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A durable store could not be opened, read, or written.
    ///
    /// Treated as "store empty" by every consumer; never surfaced.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A persisted blob failed to parse or violates state invariants.
    ///
    /// Repaired to a synthesized default; never surfaced.
    #[error("malformed state: {0}")]
    MalformedState(String),

    /// A request URL could not be parsed into a cache key.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The network request failed (connect, read, or protocol error).
    #[error("http error: {0}")]
    HttpError(String),

    /// The network request or revalidation probe timed out.
    #[error("fetch timeout: {0}")]
    FetchTimeout(String),
}

impl Error {
    /// Whether the cache should fall back to a stale entry for this error.
    ///
    /// Timeouts are treated identically to network failures.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::HttpError(_) | Error::FetchTimeout(_))
    }
}

impl From<tokio_rusqlite::Error> for Error {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            other => Error::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<tokio_rusqlite::rusqlite::Error> for Error {
    fn from(err: tokio_rusqlite::rusqlite::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedState(err.to_string())
    }
}
