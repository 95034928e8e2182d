//! Disk Store Module
//!
//! One file per key under the instance directory, written with
//! write-then-rename so a failed write never truncates a previous file.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CacheError, Result};
use crate::key::CacheKey;

// == Disk Store ==
/// Filesystem side of the disk tier.
///
/// Performs no synchronization of its own; the disk queue is the only caller.
#[derive(Debug)]
pub struct DiskStore {
    /// Absolute, canonical instance directory
    directory: PathBuf,
}

impl DiskStore {
    // == Constructor ==
    /// Opens the store at `directory`, creating it if missing.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory).map_err(|e| CacheError::io(directory, e))?;
        let directory = fs::canonicalize(directory).map_err(|e| CacheError::io(directory, e))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Absolute path the key maps to, whether or not a file exists there.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key.relative_path())
    }

    // == Load ==
    /// Reads the bytes stored for the key. A missing file is `Ok(None)`.
    pub fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    // == Store ==
    /// Writes the bytes for the key atomically.
    ///
    /// Bytes land in a temp file next to the target, are synced, then renamed
    /// over it. On failure the temp file is removed and any previous file for
    /// the key is left untouched.
    pub fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let parent = path.parent().unwrap_or(self.directory.as_path());
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

        let temp_path = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        if let Err(e) = write_synced(&temp_path, bytes) {
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::io(temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::io(path, e));
        }

        debug!(path = %path.display(), bytes = bytes.len(), "stored file");
        Ok(())
    }

    // == Remove ==
    /// Deletes the file for the key. Returns false if there was none.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    // == Remove All ==
    /// Deletes every file and shard directory under the instance directory,
    /// keeping the directory itself. Returns the number of files deleted.
    pub fn remove_all(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::io(&self.directory, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.directory, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| CacheError::io(&path, e))?;

            if file_type.is_dir() {
                removed += count_files(&path)?;
                fs::remove_dir_all(&path).map_err(|e| CacheError::io(&path, e))?;
            } else {
                fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    // == Path If Exists ==
    /// The key's path, only when a file is present there.
    pub fn path_if_exists(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn count_files(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir).map_err(|e| CacheError::io(dir, e))? {
        let entry = entry.map_err(|e| CacheError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            count += count_files(&path)?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}
