//! Stored-body compression.
//!
//! Bodies above the configured threshold are gzip-compressed before
//! they go into the cache blob. This is purely a storage optimization:
//! callers always receive the original bytes, and decompression only
//! happens when a cached body is actually about to be served.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use overcoat_core::Error;

/// Algorithm tag recorded next to compressed bodies.
pub const GZIP: &str = "gzip";

/// Gzip-compress a body for storage.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::MalformedState(format!("gzip encode failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| Error::MalformedState(format!("gzip encode failed: {e}")))
}

/// Recover the original body from its stored compressed form.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::MalformedState(format!("gzip decode failed: {e}")))?;
    Ok(out)
}
