//! Corpus walking and parallel unit parsing.
//!
//! Units are parsed on a fixed pool of scoped worker threads fed through a
//! `crossbeam-channel` job queue. Each worker owns its own tree-sitter parser
//! and sends back one result per unit; the calling thread is the only writer
//! to the index and merges results in unit-path order, so the arrival order
//! of occurrences (and therefore every symbol's defining unit) does not
//! depend on thread scheduling.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::Error;
use crate::grammar;
use crate::index::SymbolIndex;
use crate::recorder;
use crate::types::{Diagnostic, UnitOccurrences};
use crate::visitor;

/// Outcome of one scan pass over a corpus root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Units that were skipped, with the reason.
    pub diagnostics: Vec<Diagnostic>,
    /// Units that contributed occurrences.
    pub units_indexed: usize,
    /// Units selected by the config.
    pub units_selected: usize,
}

/// One selected unit: identifier relative to the root, and its disk path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFile {
    /// Absolute or root-joined path to read from.
    pub path: PathBuf,
    /// Root-relative path with `/` separators.
    pub unit_id: String,
}

/// Select every unit under `root` the config admits, sorted by unit id.
///
/// Hidden directories (`.git`, `.venv`, ...) are not descended into. Files
/// the glob selects but no grammar covers are skipped.
pub fn collect_units(root: &Path, config: &Config) -> Vec<UnitFile> {
    let mut units: Vec<UnitFile> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| return e.depth() == 0 || !is_hidden_dir(e))
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file())
        .filter(|e| return e.file_name().to_str().is_some_and(|n| return config.matches_file_name(n)))
        .filter_map(|e| return select_unit(root, config, e.path()))
        .collect();

    units.sort_by(|a, b| return a.unit_id.cmp(&b.unit_id));
    return units;
}

/// Scan `root` into a fresh index.
///
/// # Errors
///
/// Propagates errors from [`scan_into`].
pub fn scan(root: &Path, config: &Config) -> Result<(SymbolIndex, ScanReport), Error> {
    let mut index = SymbolIndex::new();
    let report = scan_into(root, config, &mut index)?;
    return Ok((index, report));
}

/// Scan `root` and append every unit's occurrences to `index`.
///
/// A unit that cannot be read or parsed contributes nothing and becomes a
/// diagnostic; the scan itself carries on.
///
/// # Errors
///
/// Returns `Error::Io` if `root` is not a readable directory.
pub fn scan_into(root: &Path, config: &Config, index: &mut SymbolIndex) -> Result<ScanReport, Error> {
    if !std::fs::metadata(root)?.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            format!("{} is not a directory", root.display()),
        )));
    }

    let units = collect_units(root, config);
    let workers = config.worker_count().clamp(1, units.len().max(1));
    log::debug!("scanning {} units under {} with {workers} workers", units.len(), root.display());

    let results = parse_on_pool(&units, workers);

    let mut report = ScanReport {
        units_selected: units.len(),
        ..ScanReport::default()
    };
    for (unit, result) in units.iter().zip(results) {
        match result {
            Ok(occurrences) => {
                index.merge(occurrences);
                report.units_indexed = report.units_indexed.saturating_add(1);
            },
            Err(e) => {
                log::warn!("skipping {}: {e}", unit.unit_id);
                report.diagnostics.push(Diagnostic {
                    reason: e.to_string(),
                    unit_id: unit.unit_id.clone(),
                });
            },
        }
    }

    log::info!(
        "indexed {} of {} units ({} symbols, {} occurrences)",
        report.units_indexed,
        report.units_selected,
        index.len(),
        index.occurrence_count()
    );
    return Ok(report);
}

/// Classify one unit's source text.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the source does not parse cleanly.
pub fn scan_source(unit_id: &str, source: &str) -> Result<UnitOccurrences, Error> {
    let tree = visitor::parse_unit(Path::new(unit_id), source)?;
    let events = visitor::collect_events(&tree, source);
    return Ok(recorder::record(unit_id, source, events));
}

/// True for directories whose name starts with `.`.
pub(crate) fn is_hidden_dir(entry: &DirEntry) -> bool {
    return entry.file_type().is_dir() && entry.file_name().to_str().is_some_and(|n| return n.starts_with('.'));
}

/// Root-relative `/`-separated path used as a unit identifier.
pub(crate) fn relative_unit_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    return relative
        .components()
        .map(|c| return c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
}

/// Run every unit through [`scan_unit_file`] on `workers` threads.
/// Results come back in the same order as `units`.
fn parse_on_pool(units: &[UnitFile], workers: usize) -> Vec<Result<UnitOccurrences, Error>> {
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &UnitFile)>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, Result<UnitOccurrences, Error>)>();

    for job in units.iter().enumerate() {
        if job_tx.send(job).is_err() {
            break;
        }
    }
    drop(job_tx);

    std::thread::scope(|s| {
        for _ in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            s.spawn(move || {
                for (position, unit) in jobs {
                    if results.send((position, scan_unit_file(unit))).is_err() {
                        return;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let ordered: BTreeMap<usize, Result<UnitOccurrences, Error>> = result_rx.into_iter().collect();
    return ordered.into_values().collect();
}

/// Read and classify one unit from disk.
///
/// # Errors
///
/// Returns `Error::UnreadableUnit` for I/O or UTF-8 failures, or
/// `Error::ParseFailed` from [`scan_source`].
fn scan_unit_file(unit: &UnitFile) -> Result<UnitOccurrences, Error> {
    let bytes = std::fs::read(&unit.path).map_err(|e| {
        return Error::UnreadableUnit {
            file: PathBuf::from(&unit.unit_id),
            reason: e.to_string(),
        };
    })?;
    let source = String::from_utf8(bytes).map_err(|e| {
        return Error::UnreadableUnit {
            file: PathBuf::from(&unit.unit_id),
            reason: e.to_string(),
        };
    })?;
    return scan_source(&unit.unit_id, &source);
}

/// Build a [`UnitFile`] for `path` if the include/exclude filters and the
/// grammar table admit it.
fn select_unit(root: &Path, config: &Config, path: &Path) -> Option<UnitFile> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let unit_id = relative_unit_id(root, path);

    if !config.should_scan(&unit_id) {
        return None;
    }
    if let Err(e) = grammar::language_for_path(relative) {
        log::debug!("not indexing {unit_id}: {e}");
        return None;
    }

    return Some(UnitFile {
        path: path.to_path_buf(),
        unit_id,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OccurrenceKind;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn broken_unit_is_skipped_with_one_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "def foo():\n    return bar()\n");
        write(dir.path(), "b.py", "def bar():\n    return 1\n");
        write(dir.path(), "broken.py", "def broken(:\n    pass\n");

        let (index, report) = scan(dir.path(), &Config::scan_everything_by_default()).unwrap();

        assert_eq!(report.units_selected, 3);
        assert_eq!(report.units_indexed, 2);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].unit_id, "broken.py");
        assert!(index.lookup("broken").is_empty());
        assert_eq!(index.lookup("foo").len(), 1);
        assert_eq!(index.lookup("bar").len(), 2);
    }

    #[test]
    fn merge_order_follows_unit_paths_for_any_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["d.py", "b.py", "c.py", "a.py", "pkg/e.py"] {
            write(dir.path(), name, "def shared():\n    pass\n");
        }

        for workers in [1, 2, 8] {
            let dir_path = dir.path();
            std::fs::write(dir_path.join(".codescout.toml"), format!("workers = {workers}\n")).unwrap();
            let config = Config::load(dir_path).unwrap();
            let (index, _) = scan(dir_path, &config).unwrap();

            let units: Vec<&str> = index.lookup("shared").iter().map(|o| return o.unit_id()).collect();
            assert_eq!(units, vec!["a.py", "b.py", "c.py", "d.py", "pkg/e.py"]);
        }
    }

    #[test]
    fn filters_and_hidden_dirs_limit_selection() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.py", "x = 1\n");
        write(dir.path(), "src/vendor/dep.py", "y = 1\n");
        write(dir.path(), "docs/conf.py", "z = 1\n");
        write(dir.path(), ".venv/lib/site.py", "w = 1\n");
        write(dir.path(), "src/notes.txt", "not python\n");
        std::fs::write(
            dir.path().join(".codescout.toml"),
            "include = [\"src/\"]\nexclude = [\"src/vendor/\"]\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        let ids: Vec<String> = collect_units(dir.path(), &config).into_iter().map(|u| return u.unit_id).collect();
        assert_eq!(ids, vec!["src/app.py".to_string()]);
    }

    #[test]
    fn glob_matching_non_python_files_indexes_only_python() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "mod.py", "x = 1\n");
        write(dir.path(), "readme.md", "# title\n");

        let config = Config::scan_everything_by_default().with_file_glob("*").unwrap();
        let (_, report) = scan(dir.path(), &config).unwrap();
        assert_eq!(report.units_selected, 1);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn non_utf8_unit_is_a_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("latin.py"), b"name = '\xe9'\n").unwrap();
        write(dir.path(), "ok.py", "name = 'e'\n");

        let (index, report) = scan(dir.path(), &Config::scan_everything_by_default()).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].unit_id, "latin.py");
        assert_eq!(index.lookup("name").len(), 1);
    }

    #[test]
    fn rescanning_appends() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "def run():\n    pass\n");
        let config = Config::scan_everything_by_default();

        let mut index = SymbolIndex::new();
        scan_into(dir.path(), &config, &mut index).unwrap();
        scan_into(dir.path(), &config, &mut index).unwrap();
        assert_eq!(index.lookup("run").len(), 2);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(scan(&missing, &Config::scan_everything_by_default()).is_err());
    }

    #[test]
    fn scan_source_classifies() {
        let unit = scan_source("m.py", "import os\nos.path.join(a)\n").unwrap();
        let seen: Vec<(&str, OccurrenceKind)> = unit.iter().map(|(s, o)| return (s, o.kind())).collect();
        assert_eq!(
            seen,
            vec![
                ("os", OccurrenceKind::Import),
                ("join", OccurrenceKind::Call),
                ("os", OccurrenceKind::Reference),
                ("a", OccurrenceKind::Reference),
            ]
        );
    }
}
