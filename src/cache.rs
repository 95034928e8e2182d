//! Cache Module
//!
//! The two-tier cache. Reads try the memory tier first and fall through to
//! the disk tier, repopulating memory on a disk hit. Writes land in memory at
//! once and are queued for disk behind every earlier disk operation of the
//! same instance.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::disk::{DiskQueue, DiskStore};
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::memory::MemoryStore;
use crate::registry::DirectoryClaim;
use crate::stats::CacheStats;
use crate::tasks;

/// Name of the process-wide instance returned by [`Cache::shared`].
pub const SHARED_CACHE_NAME: &str = "shared";

/// Types that can be stored in the cache.
///
/// Values are encoded with `serde_json` for the disk tier and kept as-is in
/// the memory tier.
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}
impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

static SHARED: OnceCell<Cache> = OnceCell::new();

// == Tiers ==
/// State shared between callers and the disk worker.
struct Tiers {
    name: String,
    memory: Mutex<MemoryStore>,
    disk: DiskStore,
    stats: Mutex<CacheStats>,
    /// First disk write failure since the last flush
    deferred_error: Mutex<Option<CacheError>>,
}

impl Tiers {
    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        update(&mut *self.stats.lock());
    }

    fn memory_get<V: Cacheable>(&self, key: &CacheKey) -> Option<V> {
        let value = self.memory.lock().get::<V>(key.as_str());
        if value.is_some() {
            debug!("Memory hit for key '{}' in cache '{}'", key, self.name);
            self.record(CacheStats::record_memory_hit);
        }
        value
    }

    // Runs on the disk queue.
    fn load<V: Cacheable>(&self, key: &CacheKey) -> Option<V> {
        let bytes = match self.disk.load(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("Cache miss for key '{}' in cache '{}'", key, self.name);
                self.record(CacheStats::record_miss);
                return None;
            }
            Err(e) => {
                warn!("Disk read failed for key '{}' in cache '{}': {}", key, self.name, e);
                self.record(CacheStats::record_miss);
                return None;
            }
        };

        let value: V = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Corrupt data on disk for key '{}' in cache '{}': {}",
                    key, self.name, e
                );
                self.record(|stats| {
                    stats.record_corrupt_read();
                    stats.record_miss();
                });
                return None;
            }
        };

        let evicted = {
            let mut memory = self.memory.lock();
            if memory.can_repopulate(key.as_str()) {
                memory.set(key.as_str(), value.clone(), bytes.len())
            } else {
                0
            }
        };

        debug!("Disk hit for key '{}' in cache '{}'", key, self.name);
        self.record(|stats| {
            stats.record_disk_hit();
            stats.record_evictions(evicted);
        });
        Some(value)
    }

    // Runs on the disk queue.
    fn write(&self, key: &CacheKey, bytes: &[u8]) {
        let result = self.disk.store(key, bytes);
        self.memory.lock().finish_mutation(key.as_str());

        match result {
            Ok(()) => self.record(CacheStats::record_disk_write),
            Err(e) => {
                error!("Disk write failed for key '{}' in cache '{}': {}", key, self.name, e);
                self.record(CacheStats::record_write_failure);
                self.defer(e);
            }
        }
    }

    // Runs on the disk queue.
    fn delete(&self, key: &CacheKey) {
        let result = self.disk.remove(key);
        self.memory.lock().finish_mutation(key.as_str());

        if let Err(e) = result {
            error!("Disk removal failed for key '{}' in cache '{}': {}", key, self.name, e);
            self.defer(e);
        }
    }

    // Runs on the disk queue.
    fn clear(&self) {
        let result = self.disk.remove_all();
        self.memory.lock().finish_clear();

        match result {
            Ok(removed) => info!("Removed {} files from cache '{}'", removed, self.name),
            Err(e) => {
                error!("Clearing disk for cache '{}' failed: {}", self.name, e);
                self.defer(e);
            }
        }
    }

    fn defer(&self, error: CacheError) {
        let mut slot = self.deferred_error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }
}

// == Cache ==
/// A named two-tier cache instance.
///
/// Cloning is cheap and every clone refers to the same instance. When the
/// last clone is dropped, queued disk operations finish before the drop
/// returns and the directory is released.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

// Field order matters: the queue drains before the directory is released.
struct CacheInner {
    tiers: Arc<Tiers>,
    queue: DiskQueue,
    _claim: DirectoryClaim,
}

impl Cache {
    // == Shared Instance ==
    /// The process-wide cache, created on first call and kept for the life of
    /// the process.
    ///
    /// Concurrent first calls construct it once; every caller gets the same
    /// instance. If construction fails the error is returned and the next
    /// call tries again.
    pub fn shared() -> Result<&'static Cache> {
        SHARED.get_or_try_init(|| {
            Cache::with_config(SHARED_CACHE_NAME, None, CacheConfig::from_env())
        })
    }

    // == Constructors ==
    /// Creates an instance stored at `<cache root>/<name>`.
    pub fn new(name: &str) -> Result<Self> {
        Self::with_config(name, None, CacheConfig::from_env())
    }

    /// Creates an instance stored at `directory`, or at `<cache root>/<name>`
    /// when `None`. The directory is created if it does not exist.
    pub fn with_directory(name: &str, directory: Option<PathBuf>) -> Result<Self> {
        Self::with_config(name, directory, CacheConfig::from_env())
    }

    /// Creates an instance with explicit memory limits and cache root.
    ///
    /// # Errors
    /// - `InvalidName` for an empty name, or a name that is not a single
    ///   directory component when the directory is derived from it
    /// - `Io` if the directory cannot be created
    /// - `DirectoryInUse` if a live instance already owns the directory
    pub fn with_config(
        name: &str,
        directory: Option<PathBuf>,
        config: CacheConfig,
    ) -> Result<Self> {
        let directory = match directory {
            Some(directory) => {
                validate_name(name, false)?;
                directory
            }
            None => {
                validate_name(name, true)?;
                config.directory_for(name)
            }
        };

        let disk = DiskStore::open(&directory)?;
        let claim = DirectoryClaim::acquire(disk.directory())?;
        let queue = DiskQueue::spawn(name)?;

        info!(
            "Opened cache '{}' at {} (count_limit={}, cost_limit={})",
            name,
            disk.directory().display(),
            config.count_limit,
            config.cost_limit
        );

        let tiers = Tiers {
            name: name.to_string(),
            memory: Mutex::new(MemoryStore::new(config.count_limit, config.cost_limit)),
            disk,
            stats: Mutex::new(CacheStats::new()),
            deferred_error: Mutex::new(None),
        };

        Ok(Self {
            inner: Arc::new(CacheInner {
                tiers: Arc::new(tiers),
                queue,
                _claim: claim,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.tiers.name
    }

    /// Absolute directory holding this instance's files.
    pub fn directory(&self) -> &Path {
        self.inner.tiers.disk.directory()
    }

    // == Get ==
    /// Synchronously gets the value for `key`.
    ///
    /// A memory hit returns at once. Otherwise the disk tier is read on the
    /// disk queue while the caller waits, and a disk hit is put back into
    /// memory. Missing, unreadable and undecodable files all yield `None`.
    pub fn get<V: Cacheable>(&self, key: &str) -> Result<Option<V>> {
        let key = CacheKey::new(key)?;
        if let Some(value) = self.inner.tiers.memory_get::<V>(&key) {
            return Ok(Some(value));
        }

        let tiers = Arc::clone(&self.inner.tiers);
        self.inner.queue.handle().run(move || tiers.load::<V>(&key))
    }

    // == Get Async ==
    /// Looks up `key` on the background runtime and hands the result to
    /// `callback` there.
    ///
    /// The callback never runs before this returns and never on the calling
    /// thread. A disk fallback is ordered with every disk operation queued
    /// before it, so a preceding `set` of the same key is always observed.
    pub fn get_async<V, F>(&self, key: &str, callback: F) -> Result<()>
    where
        V: Cacheable,
        F: FnOnce(Option<V>) + Send + 'static,
    {
        let key = CacheKey::new(key)?;
        let cache = self.clone();

        tasks::spawn(async move {
            let value = match cache.lookup_async::<V>(key).await {
                Ok(value) => value,
                Err(e) => {
                    warn!("Async lookup in cache '{}' failed: {}", cache.name(), e);
                    None
                }
            };
            callback(value);
        })?;
        Ok(())
    }

    // == Fetch ==
    /// Async/await form of [`Cache::get`] for callers already in a runtime.
    pub async fn fetch<V: Cacheable>(&self, key: &str) -> Result<Option<V>> {
        let key = CacheKey::new(key)?;
        self.lookup_async(key).await
    }

    async fn lookup_async<V: Cacheable>(&self, key: CacheKey) -> Result<Option<V>> {
        if let Some(value) = self.inner.tiers.memory_get::<V>(&key) {
            return Ok(Some(value));
        }

        let tiers = Arc::clone(&self.inner.tiers);
        self.inner
            .queue
            .handle()
            .run_async(move || tiers.load::<V>(&key))
            .await
    }

    // == Exists ==
    /// True if either tier holds `key`. Nothing is decoded or repopulated.
    pub fn exists(&self, key: &str) -> Result<bool> {
        let key = CacheKey::new(key)?;
        if self.inner.tiers.memory.lock().contains(key.as_str()) {
            return Ok(true);
        }
        Ok(self.path_if_exists(key)?.is_some())
    }

    // == Set ==
    /// Stores `value` for `key`.
    ///
    /// The value is encoded on the calling thread and written to memory
    /// before this returns. The disk write is queued, not awaited; use
    /// [`Cache::flush`] to wait for it and see whether it failed.
    pub fn set<V: Cacheable>(&self, key: &str, value: V) -> Result<()> {
        let key = CacheKey::new(key)?;
        let bytes = serde_json::to_vec(&value)?;
        let cost = bytes.len();

        self.mutate(
            &key,
            |memory| memory.set(key.as_str(), value, cost),
            move |tiers, key| tiers.write(key, &bytes),
        )
    }

    // == Set Raw ==
    /// Stores `bytes` on disk verbatim, bypassing the codec, and drops any
    /// memory entry for `key`.
    ///
    /// Intended for large payloads read back through [`Cache::path_for`].
    pub fn set_raw(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let key = CacheKey::new(key)?;

        self.mutate(
            &key,
            |memory| {
                memory.remove(key.as_str());
                0
            },
            move |tiers, key| tiers.write(key, &bytes),
        )
    }

    // == Remove ==
    /// Removes `key` from memory now and from disk in queue order.
    ///
    /// Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> Result<()> {
        let key = CacheKey::new(key)?;

        self.mutate(
            &key,
            |memory| {
                memory.remove(key.as_str());
                0
            },
            |tiers, key| tiers.delete(key),
        )
    }

    // == Remove All ==
    /// Clears memory now and every file on disk in queue order.
    pub fn remove_all(&self) -> Result<()> {
        let tiers = Arc::clone(&self.inner.tiers);

        let mut memory = self.inner.tiers.memory.lock();
        let dropped = memory.remove_all();
        memory.begin_clear();
        if let Err(e) = self.inner.queue.handle().submit(move || tiers.clear()) {
            memory.finish_clear();
            return Err(e);
        }
        drop(memory);

        info!(
            "Cleared {} memory entries from cache '{}'",
            dropped,
            self.name()
        );
        Ok(())
    }

    /// Applies a memory change and queues its disk counterpart under one
    /// lock, so memory order and disk queue order agree.
    fn mutate<M, J>(&self, key: &CacheKey, in_memory: M, on_disk: J) -> Result<()>
    where
        M: FnOnce(&mut MemoryStore) -> usize,
        J: FnOnce(&Tiers, &CacheKey) + Send + 'static,
    {
        let tiers = Arc::clone(&self.inner.tiers);
        let job_key = key.clone();

        let mut memory = self.inner.tiers.memory.lock();
        let evicted = in_memory(&mut *memory);
        memory.begin_mutation(key.as_str());
        if let Err(e) = self
            .inner
            .queue
            .handle()
            .submit(move || on_disk(&*tiers, &job_key))
        {
            memory.finish_mutation(key.as_str());
            return Err(e);
        }
        drop(memory);

        if evicted > 0 {
            self.inner.tiers.record(|stats| stats.record_evictions(evicted));
        }
        Ok(())
    }

    // == Path For ==
    /// Path of the file holding `key`, or `None` when there is no file, even
    /// if the memory tier holds the key.
    pub fn path_for(&self, key: &str) -> Result<Option<PathBuf>> {
        let key = CacheKey::new(key)?;
        self.path_if_exists(key)
    }

    fn path_if_exists(&self, key: CacheKey) -> Result<Option<PathBuf>> {
        let tiers = Arc::clone(&self.inner.tiers);
        self.inner
            .queue
            .handle()
            .run(move || tiers.disk.path_if_exists(&key))
    }

    // == Flush ==
    /// Waits until every disk operation queued before this call has run.
    ///
    /// Returns the first disk failure since the previous flush, if any.
    pub fn flush(&self) -> Result<()> {
        self.inner.queue.handle().run(|| ())?;
        self.take_deferred_error()
    }

    /// Async form of [`Cache::flush`].
    pub async fn flush_async(&self) -> Result<()> {
        self.inner.queue.handle().run_async(|| ()).await?;
        self.take_deferred_error()
    }

    fn take_deferred_error(&self) -> Result<()> {
        match self.inner.tiers.deferred_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.tiers.memory.lock().len();
        let mut stats = self.inner.tiers.stats.lock().clone();
        stats.set_memory_entries(entries);
        stats
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name())
            .field("directory", &self.directory())
            .finish()
    }
}

fn validate_name(name: &str, as_directory: bool) -> Result<()> {
    if name.is_empty() {
        return Err(CacheError::InvalidName(
            "Cache name cannot be empty".to_string(),
        ));
    }
    if name.contains('\0') {
        return Err(CacheError::InvalidName(
            "Cache name cannot contain NUL bytes".to_string(),
        ));
    }
    if as_directory {
        let mut components = Path::new(name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(CacheError::InvalidName(format!(
                "'{}' is not a single directory name",
                name
            )));
        }
    }
    Ok(())
}
