//! Query fingerprints used as cache keys.

use sha2::{Digest, Sha256};

use crate::intelligence::normalize;

/// Compute the cache key for a query and its shaping parameters.
///
/// The query and genre are normalized here, so raw inputs that differ only in
/// case or whitespace share a fingerprint.
pub fn fingerprint(query: &str, limit: u32, genre: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(query).as_bytes());
    hasher.update(b"\n");
    hasher.update(limit.to_string().as_bytes());
    hasher.update(b"\n");
    if let Some(genre) = genre.map(normalize).filter(|g| !g.is_empty()) {
        hasher.update(genre.as_bytes());
    }
    hex::encode(hasher.finalize())
}
