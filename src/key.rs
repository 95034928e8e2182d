//! Key Module
//!
//! Cache keys and the deterministic mapping from a key to its file path
//! under the cache directory.

use std::fmt;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

// == Cache Key ==
/// A validated, non-empty cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validates `key` and wraps it.
    ///
    /// Returns `CacheError::InvalidKey` for an empty key.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::InvalidKey("Key cannot be empty".to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // == Relative Path ==
    /// Maps the key to `<2 hex>/<64 hex>`, the SHA-256 digest of its bytes.
    ///
    /// The output only ever contains `[0-9a-f]` and one separator, whatever
    /// characters the key holds.
    pub fn relative_path(&self) -> PathBuf {
        let digest = hex_digest(&self.0);
        let mut path = PathBuf::from(&digest[..2]);
        path.push(&digest);
        path
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
