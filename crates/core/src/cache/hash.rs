//! Request identity and hashed storage keys.

use std::fmt;

use sha2::{Digest, Sha256};
use url::Url;

/// Normalized absolute URL identifying a cached GET response.
///
/// Normalization lower-cases the host (done by `url` for http/https) and drops
/// the fragment. The query string is kept as-is, without reordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed-width storage key for this request.
    pub fn hash(&self) -> String {
        compute_cache_key(&self.0)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the SHA-256 storage key for a normalized URL.
pub fn compute_cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"GET\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
