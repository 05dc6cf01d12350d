//! A scanning session: one corpus root, its config, and the index built over it.

use std::path::{Path, PathBuf};

use crate::blame::{self, BlameInfo};
use crate::config::Config;
use crate::error::Error;
use crate::graph::DependencyGraph;
use crate::impact::{self, ImpactReport};
use crate::index::SymbolIndex;
use crate::scanner::{self, ScanReport};
use crate::search::{self, TextMatch};
use crate::types::Occurrence;

/// Owns the index for one root. Independent sessions never share state.
///
/// Query methods scan the root first if no scan has run yet.
#[derive(Debug)]
pub struct Session {
    /// Settings loaded from the root's `.codescout.toml`.
    config: Config,
    /// Occurrences from every scan of this session, appended in order.
    index: SymbolIndex,
    /// Corpus root.
    root: PathBuf,
    /// Set once any scan has completed, even one that indexed nothing.
    scanned: bool,
}

impl Session {
    /// Impact of changing `symbol`.
    ///
    /// # Errors
    ///
    /// Returns scan errors if the index had to be built first.
    pub fn analyze_impact(&mut self, symbol: &str) -> Result<ImpactReport, Error> {
        self.ensure_scanned()?;
        return Ok(impact::analyze(&self.index, symbol));
    }

    /// Attribute one committed line of `unit` (relative to the root).
    ///
    /// # Errors
    ///
    /// Returns `Error::BlameFailed` if attribution is impossible.
    pub fn blame(&self, unit: &Path, line: u32) -> Result<BlameInfo, Error> {
        return blame::blame(&self.root, unit, line);
    }

    /// Dependency graph for the current index snapshot.
    ///
    /// # Errors
    ///
    /// Returns scan errors if the index had to be built first.
    pub fn build_dependency_graph(&mut self) -> Result<DependencyGraph, Error> {
        self.ensure_scanned()?;
        return Ok(DependencyGraph::build(&self.index));
    }

    /// Settings in effect for this session.
    pub const fn config(&self) -> &Config {
        return &self.config;
    }

    /// Every recorded occurrence of `symbol`, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns scan errors if the index had to be built first.
    pub fn find_symbol(&mut self, symbol: &str) -> Result<Vec<Occurrence>, Error> {
        self.ensure_scanned()?;
        return Ok(self.index.lookup(symbol).to_vec());
    }

    /// The session's index.
    pub const fn index(&self) -> &SymbolIndex {
        return &self.index;
    }

    /// Open a session on `root`, reading its `.codescout.toml` if present.
    ///
    /// # Errors
    ///
    /// Returns config loading errors.
    pub fn open(root: &Path) -> Result<Self, Error> {
        let config = Config::load(root)?;
        return Ok(Self::with_config(root, config));
    }

    /// Corpus root.
    pub fn root(&self) -> &Path {
        return &self.root;
    }

    /// Scan the root and append to the index. `file_glob` overrides the
    /// configured unit glob for this scan only.
    ///
    /// Scanning twice without building a new session records every unit twice.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` for a bad glob, or `Error::Io` if the
    /// root is not a directory.
    pub fn scan(&mut self, file_glob: Option<&str>) -> Result<ScanReport, Error> {
        let report = match file_glob {
            Some(glob) => {
                let config = self.config.clone().with_file_glob(glob)?;
                scanner::scan_into(&self.root, &config, &mut self.index)?
            },
            None => scanner::scan_into(&self.root, &self.config, &mut self.index)?,
        };
        self.scanned = true;
        return Ok(report);
    }

    /// Whether a scan has completed in this session.
    pub const fn scanned(&self) -> bool {
        return self.scanned;
    }

    /// Regex line search under the root. `file_glob` defaults to the
    /// configured unit glob.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if either pattern fails to compile.
    pub fn search(&self, pattern: &str, file_glob: Option<&str>) -> Result<Vec<TextMatch>, Error> {
        let glob = file_glob.unwrap_or_else(|| return self.config.file_glob());
        return search::search(&self.root, pattern, glob);
    }

    /// Open a session on `root` with explicit settings.
    pub fn with_config(root: &Path, config: Config) -> Self {
        return Self {
            config,
            index: SymbolIndex::new(),
            root: root.to_path_buf(),
            scanned: false,
        };
    }

    /// Scan once if no scan has run yet.
    fn ensure_scanned(&mut self) -> Result<(), Error> {
        if !self.scanned {
            self.scan(None)?;
        }
        return Ok(());
    }
}
