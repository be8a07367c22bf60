//! Cache key derivation.
//!
//! Entries are content-addressed by the absolute request URL. Two
//! spellings of the same resource must map to the same key, so the
//! host is lowercased and the fragment dropped (fragments never reach
//! the origin). Query strings are kept verbatim - reordering them
//! would change the resource on plenty of real servers.

use overcoat_core::Error;

/// Normalize an absolute request URL into the cache key.
///
/// # Errors
///
/// Returns `Error::InvalidUrl` for relative input, unparseable input,
/// or a non-http(s) scheme. Callers treat that as "not cacheable" and
/// pass the request through untouched.
pub fn cache_key(raw: &str) -> Result<String, Error> {
    let mut parsed = url::Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidUrl(format!("scheme not cacheable: {scheme}"))),
    }

    parsed.set_fragment(None);

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            parsed
                .set_host(Some(&lowered))
                .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        }
    }

    Ok(parsed.into())
}
