//! JWCache - A two-tier object cache
//!
//! A bounded in-memory LRU tier in front of a persistent on-disk tier, one
//! file per key. Memory misses fall through to disk; disk operations of an
//! instance run in order on a dedicated worker thread.

#[cfg(feature = "blob")]
pub mod blob;
pub mod cache;
pub mod config;
pub mod disk;
pub mod error;
pub mod key;
pub mod memory;
pub mod registry;
pub mod stats;
pub mod tasks;

#[cfg(feature = "blob")]
pub use blob::BlobCache;
pub use cache::{Cache, Cacheable, SHARED_CACHE_NAME};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use key::CacheKey;
pub use stats::CacheStats;
