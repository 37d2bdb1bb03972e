//! Size-bounded, directory-backed cache for rasters and elevation grids.
//!
//! Each entry is one file named after the SHA-256 digest of its [`CacheKey`].
//! Writes go to a temporary file in the cache directory and are renamed into
//! place, so a concurrent reader sees either no entry or the complete value.
//!
//! When the total size exceeds the configured ceiling, least recently used
//! entries are deleted until the cache is at 90% of the ceiling. Recency is
//! tracked in memory and mirrored to file modification times, so the order
//! survives reopening the same directory.

use crate::{Dataset, DemError, GeoBoundingBox, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Fraction of the ceiling the cache shrinks to once eviction starts.
const EVICTION_TARGET_FRACTION: f64 = 0.9;

/// Extension of committed cache entries.
const ENTRY_EXTENSION: &str = "bin";

/// Extension of in-progress writes.
const TEMP_EXTENSION: &str = "tmp";

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".tilecache";

/// Default ceiling: 1 GiB.
pub const DEFAULT_CACHE_SIZE_BYTES: u64 = 1024 * 1024 * 1024;

/// Tile cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the cache files.
    pub dir: PathBuf,
    /// Maximum total size of all entries in bytes.
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            max_size_bytes: DEFAULT_CACHE_SIZE_BYTES,
        }
    }
}

/// Deterministic cache key.
///
/// Encodes every input that affects the cached value: entry kind, dataset,
/// all four bounding-box edges (shortest round-trip decimal form) and, for
/// elevation grids, the hex resolution and sampling mesh size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for raw raster bytes of a dataset over a bounding box.
    pub fn raster(dataset: Dataset, bbox: &GeoBoundingBox) -> Self {
        Self(format!(
            "raster|{}|{}|{}|{}|{}",
            dataset.as_str(),
            bbox.south(),
            bbox.north(),
            bbox.west(),
            bbox.east()
        ))
    }

    /// Key for an elevation grid sampled at a hex resolution on a
    /// `mesh_size × mesh_size` mesh.
    pub fn grid(dataset: Dataset, bbox: &GeoBoundingBox, resolution: u8, mesh_size: usize) -> Self {
        Self(format!(
            "grid|{}|{}|{}|{}|{}|r{}|m{}",
            dataset.as_str(),
            bbox.south(),
            bbox.north(),
            bbox.west(),
            bbox.east(),
            resolution,
            mesh_size
        ))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem for this key: hex SHA-256 of the key string.
    fn file_stem(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut stem = String::with_capacity(64);
        for byte in digest {
            let _ = write!(stem, "{:02x}", byte);
        }
        stem
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries written.
    pub writes: u64,
    /// Entries deleted by the size policy.
    pub evictions: u64,
    /// Entries currently stored.
    pub entries: usize,
    /// Bytes currently stored.
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    size: u64,
    last_access: SystemTime,
}

/// In-memory view of the files on disk.
#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<String, IndexEntry>,
    total_bytes: u64,
}

impl CacheIndex {
    fn insert(&mut self, stem: String, entry: IndexEntry) {
        if let Some(old) = self.entries.insert(stem, entry) {
            self.total_bytes = self.total_bytes.saturating_sub(old.size);
        }
        self.total_bytes += entry.size;
    }

    fn remove(&mut self, stem: &str) -> Option<IndexEntry> {
        let removed = self.entries.remove(stem)?;
        self.total_bytes = self.total_bytes.saturating_sub(removed.size);
        Some(removed)
    }
}

/// Directory-backed key/value store with a byte-size ceiling.
///
/// Open once per process and share through `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct TileCache {
    dir: PathBuf,
    max_size_bytes: u64,
    index: RwLock<CacheIndex>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
    temp_counter: AtomicU64,
}

impl TileCache {
    /// Open (or create) a cache directory.
    ///
    /// Existing entries are indexed, leftovers from interrupted writes are
    /// removed, and the ceiling is enforced before returning.
    pub fn open(config: CacheConfig) -> Result<Self> {
        if config.max_size_bytes == 0 {
            return Err(DemError::Validation(
                "cache max_size_bytes must be greater than zero".to_string(),
            ));
        }
        fs::create_dir_all(&config.dir)?;

        let cache = Self {
            dir: config.dir,
            max_size_bytes: config.max_size_bytes,
            index: RwLock::new(CacheIndex::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            temp_counter: AtomicU64::new(0),
        };
        cache.scan_dir()?;

        {
            let mut index = cache.index.write().map_err(|_| DemError::CacheLockPoisoned)?;
            info!(
                cache_dir = %cache.dir.display(),
                entries = index.entries.len(),
                size_bytes = index.total_bytes,
                max_size_bytes = cache.max_size_bytes,
                "Opened tile cache"
            );
            cache.evict_locked(&mut index, None);
        }

        Ok(cache)
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Configured ceiling in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Look up an entry.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let stem = key.file_stem();
        let present = {
            let index = self.index.read().map_err(|_| DemError::CacheLockPoisoned)?;
            index.entries.contains_key(&stem)
        };
        if !present {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache miss");
            return Ok(None);
        }

        let path = self.entry_path(&stem);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted behind our back (another process or an eviction race)
                let mut index = self.index.write().map_err(|_| DemError::CacheLockPoisoned)?;
                index.remove(&stem);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache entry vanished from disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        {
            let mut index = self.index.write().map_err(|_| DemError::CacheLockPoisoned)?;
            if let Some(entry) = index.entries.get_mut(&stem) {
                entry.last_access = now;
            }
        }
        touch(&path, now);

        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, bytes = data.len(), "Cache hit");
        Ok(Some(data))
    }

    /// Store an entry, replacing any previous value for the key.
    ///
    /// Eviction runs afterwards if the ceiling is exceeded; the entry just
    /// written is never chosen as a victim.
    pub fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        let stem = key.file_stem();
        let path = self.entry_path(&stem);
        let temp_path = self.dir.join(format!(
            "{}.{}.{}.{}",
            stem,
            std::process::id(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed),
            TEMP_EXTENSION
        ));

        if let Err(e) = write_file(&temp_path, value) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        let mut index = self.index.write().map_err(|_| DemError::CacheLockPoisoned)?;
        index.insert(
            stem.clone(),
            IndexEntry {
                size: value.len() as u64,
                last_access: SystemTime::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, bytes = value.len(), "Cache write");

        self.evict_locked(&mut index, Some(&stem));
        Ok(())
    }

    /// Delete an entry. Returns whether it existed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let stem = key.file_stem();
        let mut index = self.index.write().map_err(|_| DemError::CacheLockPoisoned)?;
        let existed = index.remove(&stem).is_some();
        match fs::remove_file(self.entry_path(&stem)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if existed {
            debug!(key = %key, "Cache entry removed");
        }
        Ok(existed)
    }

    /// Check whether an entry is indexed, without touching its recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.index
            .read()
            .map(|index| index.entries.contains_key(&key.file_stem()))
            .unwrap_or(false)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.index.read().map(|index| index.entries.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes stored.
    pub fn size_bytes(&self) -> u64 {
        self.index.read().map(|index| index.total_bytes).unwrap_or(0)
    }

    /// Usage counters.
    pub fn stats(&self) -> CacheStats {
        let (entries, size_bytes) = self
            .index
            .read()
            .map(|index| (index.entries.len(), index.total_bytes))
            .unwrap_or((0, 0));
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries,
            size_bytes,
        }
    }

    /// Enforce the ceiling one last time and report final statistics.
    ///
    /// Every write is already durable when `put` returns; call this on
    /// shutdown.
    pub fn close(&self) -> Result<CacheStats> {
        {
            let mut index = self.index.write().map_err(|_| DemError::CacheLockPoisoned)?;
            self.evict_locked(&mut index, None);
        }
        let stats = self.stats();
        info!(
            cache_dir = %self.dir.display(),
            hits = stats.hits,
            misses = stats.misses,
            writes = stats.writes,
            evictions = stats.evictions,
            entries = stats.entries,
            size_bytes = stats.size_bytes,
            "Closed tile cache"
        );
        Ok(stats)
    }

    fn entry_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, ENTRY_EXTENSION))
    }

    /// Build the index from the files in the cache directory.
    fn scan_dir(&self) -> Result<()> {
        let mut index = self.index.write().map_err(|_| DemError::CacheLockPoisoned)?;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };

            if ext == TEMP_EXTENSION {
                debug!(path = %path.display(), "Removing interrupted cache write");
                let _ = fs::remove_file(&path);
                continue;
            }
            if ext != ENTRY_EXTENSION {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let last_access = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            index.insert(
                stem.to_string(),
                IndexEntry {
                    size: metadata.len(),
                    last_access,
                },
            );
        }

        Ok(())
    }

    /// Delete least recently used entries until under the eviction target.
    fn evict_locked(&self, index: &mut CacheIndex, protect: Option<&str>) {
        if index.total_bytes <= self.max_size_bytes {
            return;
        }

        let target = (self.max_size_bytes as f64 * EVICTION_TARGET_FRACTION) as u64;
        let mut candidates: Vec<(String, SystemTime)> = index
            .entries
            .iter()
            .filter(|(stem, _)| Some(stem.as_str()) != protect)
            .map(|(stem, entry)| (stem.clone(), entry.last_access))
            .collect();
        candidates.sort_by_key(|(_, last_access)| *last_access);

        let size_before = index.total_bytes;
        let mut evicted = 0u64;
        for (stem, _) in candidates {
            if index.total_bytes <= target {
                break;
            }
            match fs::remove_file(self.entry_path(&stem)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(stem = %stem, error = %e, "Failed to delete cache entry during eviction");
                    continue;
                }
            }
            index.remove(&stem);
            evicted += 1;
        }

        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        info!(
            evicted,
            size_before,
            size_after = index.total_bytes,
            max_size_bytes = self.max_size_bytes,
            "Tile cache eviction"
        );
    }
}

fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Mirror recency to the file's mtime; failures only cost cross-run accuracy.
fn touch(path: &Path, when: SystemTime) {
    let result = fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(when));
    if let Err(e) = result {
        debug!(path = %path.display(), error = %e, "Could not refresh cache entry mtime");
    }
}
