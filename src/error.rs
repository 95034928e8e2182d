//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Absence is never an error: lookups return `Ok(None)`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Instance name is empty or not usable as a directory name
    #[error("Invalid cache name: {0}")]
    InvalidName(String),

    /// Filesystem call failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Value could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another live instance already owns the directory
    #[error("Cache directory already in use: {}", .0.display())]
    DirectoryInUse(PathBuf),

    /// The disk worker has stopped
    #[error("Disk queue closed")]
    QueueClosed,

    /// Background runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[source] std::io::Error),
}

impl CacheError {
    /// Wraps an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = CacheError::io(
            "/tmp/jwcache/ab/abcd",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/jwcache/ab/abcd"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_serialization_error_from() {
        let source = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CacheError = source.into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
