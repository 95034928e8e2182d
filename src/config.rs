//! Configuration Module
//!
//! Handles cache configuration, loaded from environment variables for the
//! shared instance.

use std::env;
use std::path::PathBuf;

/// Reverse-domain namespace under the platform cache root.
pub const CACHE_NAMESPACE: &str = "cn.wandougongzhu.jwcache";

/// Default maximum number of entries in the memory tier
pub const DEFAULT_COUNT_LIMIT: usize = 1000;

/// Default maximum summed cost (encoded bytes) in the memory tier
pub const DEFAULT_COST_LIMIT: usize = 64 * 1024 * 1024; // 64 MB

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory under which named instances get their own subdirectory
    pub root: PathBuf,
    /// Maximum number of entries the memory tier can hold
    pub count_limit: usize,
    /// Maximum summed cost of memory entries, 0 = unlimited
    pub cost_limit: usize,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `JWCACHE_ROOT` - Cache root directory (default: platform cache dir + namespace)
    /// - `JWCACHE_COUNT_LIMIT` - Maximum memory entries (default: 1000)
    /// - `JWCACHE_COST_LIMIT` - Maximum memory cost in bytes (default: 64 MB)
    pub fn from_env() -> Self {
        Self {
            root: env::var_os("JWCACHE_ROOT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_root),
            count_limit: env::var("JWCACHE_COUNT_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_COUNT_LIMIT),
            cost_limit: env::var("JWCACHE_COST_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_COST_LIMIT),
        }
    }

    /// Directory used by the instance called `name` when none is given.
    pub fn directory_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            count_limit: DEFAULT_COUNT_LIMIT,
            cost_limit: DEFAULT_COST_LIMIT,
        }
    }
}

/// Platform cache directory joined with the namespace, or the temp dir when
/// the platform has none.
pub fn default_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join(CACHE_NAMESPACE)
}
