//! Corpus acquisition: turn a locator into a local root directory.
//!
//! ```text
//! locator
//!   ├─ existing local directory ──────────────> used in place
//!   └─ anything else
//!        ├─ cache hit, younger than max_age ──> cached copy
//!        └─ miss or stale ──> Materializer ──> <cache dir>/<sha256(locator)>
//!                                                └─ evict LRU entries over max_size
//! ```
//!
//! The size budget covers every entry directory under the cache dir,
//! including copies left by earlier processes. Those are ordered by
//! modification time behind the entries this process has used.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lru::LruCache;
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use walkdir::WalkDir;

use crate::config::CacheConfig;
use crate::error::Error;

/// Produces a local copy of a corpus.
pub trait Materializer: Send + Sync {
    /// Populate `dest`, which does not exist yet, with the corpus `locator` names.
    ///
    /// # Errors
    ///
    /// Returns `Error::AcquisitionFailed` if the corpus cannot be produced.
    fn materialize(&self, locator: &str, dest: &Path) -> Result<(), Error>;
}

/// Clones a git repository with libgit2.
///
/// Built without network transports, so only local repository paths and
/// `file://` URLs can be cloned.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitMaterializer;

impl Materializer for GitMaterializer {
    fn materialize(&self, locator: &str, dest: &Path) -> Result<(), Error> {
        git2::build::RepoBuilder::new().clone(locator, dest).map_err(|e| {
            return Error::AcquisitionFailed {
                locator: locator.to_string(),
                reason: e.message().to_string(),
            };
        })?;
        return Ok(());
    }
}

/// One materialized locator.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// When the copy was produced.
    materialized_at: SystemTime,
    /// Directory holding the copy.
    path: PathBuf,
    /// Bytes on disk, measured after materialization.
    size_bytes: u64,
}

/// One cached copy as reported by [`CorpusCache::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedCorpus {
    /// Directory name: hex SHA-256 of the locator.
    pub key: String,
    /// Last modification, seconds since the Unix epoch.
    pub modified: u64,
    /// Bytes on disk.
    pub size_bytes: u64,
}

/// Snapshot of the cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    /// Cache directory.
    pub dir: PathBuf,
    /// Entries, newest first.
    pub entries: Vec<CachedCorpus>,
    /// Number of entries.
    pub entry_count: usize,
    /// Size budget.
    pub max_size_bytes: u64,
    /// Sum of every entry's size.
    pub total_size_bytes: u64,
}

/// Cache of materialized corpora keyed by locator.
///
/// Safe to share between threads. A single lock is held while
/// materializing, so concurrent callers for the same locator produce one
/// copy and the later callers get the cached path.
pub struct CorpusCache<M = GitMaterializer> {
    /// Directory holding one subdirectory per entry.
    dir: PathBuf,
    /// Entries in recency order, keyed by locator digest.
    entries: Mutex<LruCache<String, CacheEntry>>,
    /// Entries older than this are re-materialized.
    max_age: Duration,
    /// Total size above which least-recently-used entries are evicted.
    max_size_bytes: u64,
    /// Produces copies on a miss.
    materializer: M,
}

impl CorpusCache<GitMaterializer> {
    /// Cache that clones git repositories.
    pub fn git(config: &CacheConfig) -> Self {
        return Self::new(config, GitMaterializer);
    }
}

impl<M: Materializer> CorpusCache<M> {
    /// Remove the copy for `locator`, or every copy when `locator` is `None`.
    /// Returns how many entry directories were deleted.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if an entry directory cannot be removed, or
    /// `Error::AcquisitionFailed` if the cache lock is poisoned.
    pub fn clear(&self, locator: Option<&str>) -> Result<usize, Error> {
        let mut entries = self.lock(locator.unwrap_or("<cache>"))?;
        let keys: Vec<String> = match locator {
            Some(locator) => vec![cache_key(locator)],
            None => {
                let mut keys: Vec<String> = disk_entries(&self.dir).into_iter().map(|(key, _)| return key).collect();
                keys.extend(entries.iter().map(|(key, _)| return key.clone()));
                keys.sort();
                keys.dedup();
                keys
            },
        };

        let mut removed: usize = 0;
        for key in keys {
            entries.pop(&key);
            let path = self.dir.join(&key);
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
                removed = removed.saturating_add(1);
            }
        }
        log::info!("cleared {removed} cache entries from {}", self.dir.display());
        return Ok(removed);
    }

    /// Entries on disk with their sizes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Error::AcquisitionFailed` if the cache lock is poisoned.
    pub fn info(&self) -> Result<CacheInfo, Error> {
        let _entries = self.lock("<cache>")?;
        let mut listed: Vec<CachedCorpus> = disk_entries(&self.dir)
            .into_iter()
            .map(|(key, entry)| {
                return CachedCorpus {
                    key,
                    modified: entry
                        .materialized_at
                        .duration_since(UNIX_EPOCH)
                        .map_or(0, |since| return since.as_secs()),
                    size_bytes: entry.size_bytes,
                };
            })
            .collect();
        listed.reverse();

        return Ok(CacheInfo {
            dir: self.dir.clone(),
            entry_count: listed.len(),
            max_size_bytes: self.max_size_bytes,
            total_size_bytes: listed.iter().map(|e| return e.size_bytes).sum(),
            entries: listed,
        });
    }

    /// Number of entries currently tracked.
    ///
    /// # Errors
    ///
    /// Returns `Error::AcquisitionFailed` if the cache lock is poisoned.
    pub fn len(&self) -> Result<usize, Error> {
        return Ok(self.lock("<cache>")?.len());
    }

    /// Build a cache over `config.dir` using `materializer` for misses.
    pub fn new(config: &CacheConfig, materializer: M) -> Self {
        return Self {
            dir: config.dir.clone(),
            entries: Mutex::new(LruCache::unbounded()),
            max_age: config.max_age,
            max_size_bytes: config.max_size_bytes,
            materializer,
        };
    }

    /// Resolve `locator` to a local root.
    ///
    /// # Errors
    ///
    /// Returns `Error::AcquisitionFailed` if the cache directory cannot be
    /// prepared or the materializer fails.
    pub fn resolve(&self, locator: &str) -> Result<PathBuf, Error> {
        let local = Path::new(locator);
        if local.is_dir() {
            return Ok(local.to_path_buf());
        }

        let key = cache_key(locator);
        let mut entries = self.lock(locator)?;

        if let Some(path) = self.fresh_entry(&mut entries, &key) {
            log::debug!("cache hit for {locator}: {}", path.display());
            return Ok(path);
        }

        let dest = self.dir.join(&key);
        let failed = |reason: String| {
            return Error::AcquisitionFailed {
                locator: locator.to_string(),
                reason,
            };
        };

        entries.pop(&key);
        if dest.exists() {
            std::fs::remove_dir_all(&dest).map_err(|e| return failed(e.to_string()))?;
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| return failed(e.to_string()))?;

        log::info!("materializing {locator} into {}", dest.display());
        if let Err(e) = self.materializer.materialize(locator, &dest) {
            if dest.exists() && let Err(cleanup) = std::fs::remove_dir_all(&dest) {
                log::warn!("could not remove partial copy {}: {cleanup}", dest.display());
            }
            return Err(e);
        }

        entries.put(
            key.clone(),
            CacheEntry {
                materialized_at: SystemTime::now(),
                path: dest.clone(),
                size_bytes: dir_size(&dest),
            },
        );
        self.evict_over_budget(&mut entries, &key);

        return Ok(dest);
    }

    /// Drop least-recently-used entries until the total size fits the
    /// budget. The entry under `newest` is never evicted.
    fn evict_over_budget(&self, entries: &mut LruCache<String, CacheEntry>, newest: &str) {
        self.sync_with_disk(entries);
        let mut total: u64 = entries.iter().map(|(_, e)| return e.size_bytes).sum();

        while total > self.max_size_bytes {
            if entries.peek_lru().is_none_or(|(k, _)| return k == newest) {
                break;
            }
            let Some((key, entry)) = entries.pop_lru() else { break };
            total = total.saturating_sub(entry.size_bytes);
            match std::fs::remove_dir_all(&entry.path) {
                Ok(()) => log::info!("evicted cache entry {key} ({} bytes)", entry.size_bytes),
                Err(e) => log::warn!("could not evict {}: {e}", entry.path.display()),
            }
        }
    }

    /// Path for `key` if a copy exists and is younger than `max_age`.
    ///
    /// A copy left on disk by an earlier process is adopted using its
    /// modification time as its age.
    fn fresh_entry(&self, entries: &mut LruCache<String, CacheEntry>, key: &str) -> Option<PathBuf> {
        if let Some(entry) = entries.get(key) {
            if self.is_fresh(entry.materialized_at) && entry.path.is_dir() {
                return Some(entry.path.clone());
            }
            return None;
        }

        let path = self.dir.join(key);
        let modified = std::fs::metadata(&path)
            .ok()
            .filter(std::fs::Metadata::is_dir)
            .and_then(|m| return m.modified().ok())?;
        if !self.is_fresh(modified) {
            return None;
        }
        entries.put(
            key.to_string(),
            CacheEntry {
                materialized_at: modified,
                path: path.clone(),
                size_bytes: dir_size(&path),
            },
        );
        return Some(path);
    }

    /// Whether something produced at `at` is still within `max_age`.
    /// A timestamp in the future counts as fresh.
    fn is_fresh(&self, at: SystemTime) -> bool {
        return match at.elapsed() {
            Ok(age) => age < self.max_age,
            Err(_) => true,
        };
    }

    /// Take the entry lock.
    ///
    /// # Errors
    ///
    /// Returns `Error::AcquisitionFailed` if another thread panicked while holding it.
    fn lock(&self, locator: &str) -> Result<std::sync::MutexGuard<'_, LruCache<String, CacheEntry>>, Error> {
        return self.entries.lock().map_err(|_| {
            return Error::AcquisitionFailed {
                locator: locator.to_string(),
                reason: "cache lock poisoned".to_string(),
            };
        });
    }

    /// Track entry directories this process has not seen, oldest last, and
    /// forget tracked entries whose directory is gone.
    fn sync_with_disk(&self, entries: &mut LruCache<String, CacheEntry>) {
        let vanished: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| return !entry.path.is_dir())
            .map(|(key, _)| return key.clone())
            .collect();
        for key in vanished {
            entries.pop(&key);
        }

        for (key, entry) in disk_entries(&self.dir).into_iter().rev() {
            if entries.contains(&key) {
                continue;
            }
            log::debug!("tracking cache entry {key} from an earlier run ({} bytes)", entry.size_bytes);
            entries.put(key.clone(), entry);
            entries.demote(&key);
        }
    }
}

/// Cache directory name for a locator: hex SHA-256 of its text.
pub fn cache_key(locator: &str) -> String {
    let digest = Sha256::digest(locator.as_bytes());
    return digest.iter().map(|b| return format!("{b:02x}")).collect();
}

/// Total size of regular files under `path`.
fn dir_size(path: &Path) -> u64 {
    return WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file())
        .filter_map(|e| return e.metadata().ok())
        .map(|m| return m.len())
        .sum();
}

/// Entry directories under `dir`, oldest modification first.
///
/// Only directories named like a cache key are entries; anything else in
/// the cache dir is left alone.
fn disk_entries(dir: &Path) -> Vec<(String, CacheEntry)> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut found: Vec<(String, CacheEntry)> = read
        .filter_map(Result::ok)
        .filter_map(|dirent| {
            let key = dirent.file_name().into_string().ok()?;
            if !is_cache_key(&key) {
                return None;
            }
            let meta = dirent.metadata().ok().filter(std::fs::Metadata::is_dir)?;
            let path = dirent.path();
            let size_bytes = dir_size(&path);
            let entry = CacheEntry {
                materialized_at: meta.modified().unwrap_or(UNIX_EPOCH),
                path,
                size_bytes,
            };
            return Some((key, entry));
        })
        .collect();
    found.sort_by(|(ka, a), (kb, b)| return a.materialized_at.cmp(&b.materialized_at).then_with(|| return ka.cmp(kb)));
    return found;
}

/// Whether `name` has the shape of [`cache_key`] output.
fn is_cache_key(name: &str) -> bool {
    return name.len() == 64 && name.bytes().all(|b| return b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
}
