//! Blob Extension
//!
//! Raw byte payloads (images, archives, other large blobs) stored without
//! the value codec and streamed straight from their file on disk. Built only
//! on the public [`Cache`] API.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::error::{CacheError, Result};

/// Raw-bytes access to a [`Cache`].
pub trait BlobCache {
    /// Stores `bytes` for `key` as-is. The write is queued like [`Cache::set`].
    fn set_blob(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Opens the payload for `key` for streaming, or `None` if there is none.
    fn open_blob(&self, key: &str) -> Result<Option<BufReader<File>>>;

    /// Reads the whole payload for `key`.
    fn blob(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

impl BlobCache for Cache {
    fn set_blob(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.set_raw(key, bytes)
    }

    fn open_blob(&self, key: &str) -> Result<Option<BufReader<File>>> {
        Ok(open_payload(self, key)?.map(|(_, reader)| reader))
    }

    fn blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some((path, reader)) = open_payload(self, key)? else {
            return Ok(None);
        };
        read_payload(&path, reader).map(Some)
    }
}

fn open_payload(cache: &Cache, key: &str) -> Result<Option<(PathBuf, BufReader<File>)>> {
    let Some(path) = cache.path_for(key)? else {
        return Ok(None);
    };
    match File::open(&path) {
        Ok(file) => Ok(Some((path, BufReader::new(file)))),
        // Removed between the lookup and the open
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

fn read_payload(path: &Path, mut reader: impl Read) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| CacheError::io(path, e))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use std::io;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> Cache {
        let config = CacheConfig {
            root: temp.path().to_path_buf(),
            ..CacheConfig::default()
        };
        Cache::with_config("blobs", None, config).unwrap()
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::Other, "device gone"))
        }
    }

    #[test]
    fn test_blob_round_trip_is_byte_exact() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        let png_header = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

        cache.set_blob("avatar.png", png_header.clone()).unwrap();

        assert_eq!(cache.blob("avatar.png").unwrap(), Some(png_header.clone()));
        let path = cache.path_for("avatar.png").unwrap().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), png_header);
    }

    #[test]
    fn test_open_blob_streams() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);
        let payload: Vec<u8> = (0..=255u8).cycle().take(256 * 1024).collect();

        cache.set_blob("large", payload.clone()).unwrap();

        let mut reader = cache.open_blob("large").unwrap().unwrap();
        let mut head = [0u8; 4];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(head, [0, 1, 2, 3]);

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest.len(), payload.len() - 4);
    }

    #[test]
    fn test_missing_blob() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);

        assert!(cache.open_blob("nope").unwrap().is_none());
        assert_eq!(cache.blob("nope").unwrap(), None);
    }

    #[test]
    fn test_removed_blob() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp);

        cache.set_blob("gone", vec![1, 2, 3]).unwrap();
        cache.remove("gone").unwrap();

        assert_eq!(cache.blob("gone").unwrap(), None);
    }

    #[test]
    fn test_read_failure_reports_file_path() {
        let path = Path::new("/var/cache/blobs/ab/abcdef");

        let result = read_payload(path, FailingReader);

        match result {
            Err(CacheError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected an Io error, got {:?}", other),
        }
    }
}
