use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::Error;

/// Name of the per-corpus config file.
pub const CONFIG_FILE: &str = ".codescout.toml";

/// Default unit selection glob.
const DEFAULT_FILE_GLOB: &str = "*.py";

/// Default cache entry lifetime in hours.
const DEFAULT_MAX_AGE_HOURS: u64 = 24;

/// Default cache size budget in megabytes.
const DEFAULT_MAX_SIZE_MB: u64 = 5000;

/// Cache budget for materialized corpora.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding one subdirectory per cached locator.
    pub dir: PathBuf,
    /// Entries older than this are re-materialized.
    pub max_age: Duration,
    /// Total size above which least-recently-used entries are evicted.
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        return Self {
            dir: std::env::temp_dir().join("codescout-cache"),
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_HOURS.saturating_mul(3600)),
            max_size_bytes: DEFAULT_MAX_SIZE_MB.saturating_mul(1024 * 1024),
        };
    }
}

/// Project configuration loaded from `.codescout.toml`.
/// Include/exclude patterns are path prefixes applied to unit paths relative
/// to the corpus root; `file_glob` selects units by file name.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache budget for non-local locators.
    pub cache: CacheConfig,
    /// Path prefixes that are never scanned.
    exclude: Vec<String>,
    /// File-name glob as written in the config.
    file_glob: String,
    /// Compiled `file_glob`.
    file_matcher: GlobSet,
    /// Path prefixes to scan; empty scans everything.
    include: Vec<String>,
    /// Parser worker count; 0 means available parallelism.
    workers: usize,
}

/// Raw TOML structure for `.codescout.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct CodescoutTomlConfig {
    /// `[cache]` table.
    #[serde(default)]
    cache: RawCacheConfig,
    /// Excluded path prefixes.
    #[serde(default)]
    exclude: Vec<String>,
    /// Unit file-name glob.
    file_glob: Option<String>,
    /// Included path prefixes.
    #[serde(default)]
    include: Vec<String>,
    /// Parser worker count.
    #[serde(default)]
    workers: usize,
}

/// Raw `[cache]` table.
#[derive(Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCacheConfig {
    /// Cache directory.
    dir: Option<PathBuf>,
    /// Entry lifetime in hours.
    max_age_hours: Option<u64>,
    /// Size budget in megabytes.
    max_size_mb: Option<u64>,
}

impl Config {
    /// Compile a file-name glob into a matcher.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the glob does not compile.
    pub fn compile_file_glob(pattern: &str) -> Result<GlobSet, Error> {
        let invalid = |e: globset::Error| {
            return Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.kind().to_string(),
            };
        };
        let glob = Glob::new(pattern).map_err(invalid)?;
        return GlobSetBuilder::new().add(glob).build().map_err(invalid);
    }

    /// Glob selecting source units by file name.
    pub fn file_glob(&self) -> &str {
        return &self.file_glob;
    }

    /// Load config from `.codescout.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// `Error::TomlDe` if the TOML is malformed, or `Error::ConfigInvalid`
    /// if `file_glob` does not compile.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::scan_everything_by_default()),
            Err(e) => return Err(Error::Io(e)),
        };

        let raw: CodescoutTomlConfig = toml::from_str(&content)?;
        let file_glob = raw.file_glob.unwrap_or_else(|| return DEFAULT_FILE_GLOB.to_string());
        let file_matcher = Self::compile_file_glob(&file_glob).map_err(|e| {
            return Error::ConfigInvalid {
                path: path.clone(),
                reason: format!("file_glob: {e}"),
            };
        })?;

        let defaults = CacheConfig::default();
        let cache = CacheConfig {
            dir: raw.cache.dir.unwrap_or(defaults.dir),
            max_age: raw
                .cache
                .max_age_hours
                .map_or(defaults.max_age, |h| return Duration::from_secs(h.saturating_mul(3600))),
            max_size_bytes: raw
                .cache
                .max_size_mb
                .map_or(defaults.max_size_bytes, |mb| return mb.saturating_mul(1024 * 1024)),
        };

        log::debug!("loaded {}", path.display());
        return Ok(Self {
            cache,
            exclude: raw.exclude,
            file_glob,
            file_matcher,
            include: raw.include,
            workers: raw.workers,
        });
    }

    /// Whether a file name matches the unit glob.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        return self.file_matcher.is_match(file_name);
    }

    /// Default config: every `*.py` file, no filters, default cache budget.
    pub fn scan_everything_by_default() -> Self {
        return Self {
            cache: CacheConfig::default(),
            exclude: Vec::new(),
            file_glob: DEFAULT_FILE_GLOB.to_string(),
            file_matcher: Self::compile_file_glob(DEFAULT_FILE_GLOB).unwrap_or_else(|_| return GlobSet::empty()),
            include: Vec::new(),
            workers: 0,
        };
    }

    /// Check whether a unit path (relative to the corpus root) should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }

    /// Replace the unit glob, e.g. from a request's `pattern` parameter.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the glob does not compile.
    pub fn with_file_glob(mut self, pattern: &str) -> Result<Self, Error> {
        self.file_matcher = Self::compile_file_glob(pattern)?;
        self.file_glob = pattern.to_string();
        return Ok(self);
    }

    /// Parser worker count, resolving 0 to available parallelism.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        return std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    }
}
