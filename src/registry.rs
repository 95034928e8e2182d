//! Instance Registry
//!
//! Tracks which cache directories are owned by a live instance in this
//! process. Each directory may be owned by one instance at a time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{CacheError, Result};

static OPEN_DIRECTORIES: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

// == Directory Claim ==
/// Ownership of a cache directory, released on drop.
#[derive(Debug)]
pub struct DirectoryClaim {
    path: PathBuf,
}

impl DirectoryClaim {
    // == Claim ==
    /// Claims `path` for the calling instance.
    ///
    /// `path` should be canonical so two spellings of one directory collide.
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut open = OPEN_DIRECTORIES.lock();
        if !open.insert(path.to_path_buf()) {
            return Err(CacheError::DirectoryInUse(path.to_path_buf()));
        }
        debug!(path = %path.display(), "claimed cache directory");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for DirectoryClaim {
    fn drop(&mut self) {
        OPEN_DIRECTORIES.lock().remove(&self.path);
        debug!(path = %self.path.display(), "released cache directory");
    }
}

/// True if a live instance owns `path`.
#[cfg(test)]
fn is_claimed(path: &Path) -> bool {
    OPEN_DIRECTORIES.lock().contains(path)
}
