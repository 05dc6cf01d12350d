//! CLI commands for codescout: scan, find, impact, graph, search, blame,
//! cache, serve.
//!
//! Every command resolves its `--root` locator through the corpus cache,
//! opens a session on the resulting directory, and prints JSON to stdout.
//! Logs and diagnostics go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;
use serde_json::json;

use crate::acquire::CorpusCache;
use crate::config::Config;
use crate::diagnostics;
use crate::error::Error;
use crate::server::Server;
use crate::session::Session;

/// Exit code when a scan finished but skipped at least one unit.
const EXIT_SKIPPED_UNITS: u8 = 1;

/// Attribute one committed line.
///
/// # Errors
///
/// Returns acquisition or blame errors.
pub fn blame(locator: &str, file: &Path, line: u32) -> Result<ExitCode, Error> {
    let session = open_session(locator)?;
    print_json(&session.blame(file, line)?)?;
    return Ok(ExitCode::SUCCESS);
}

/// Remove cached corpus copies and print how many went.
///
/// # Errors
///
/// Returns config errors or `Error::Io` if a copy cannot be removed.
pub fn cache_clear(locator: Option<&str>) -> Result<ExitCode, Error> {
    let removed = local_cache()?.clear(locator)?;
    print_json(&json!({ "removed": removed }))?;
    return Ok(ExitCode::SUCCESS);
}

/// Print the cached corpus copies.
///
/// # Errors
///
/// Returns config errors.
pub fn cache_info() -> Result<ExitCode, Error> {
    print_json(&local_cache()?.info()?)?;
    return Ok(ExitCode::SUCCESS);
}

/// Print every occurrence of `symbol`.
///
/// # Errors
///
/// Returns acquisition, config, or scan errors.
pub fn find(locator: &str, symbol: &str) -> Result<ExitCode, Error> {
    let mut session = open_session(locator)?;
    let code = scan_reporting_skips(&mut session, None)?;
    print_json(&session.find_symbol(symbol)?)?;
    return Ok(code);
}

/// Print the dependency graph of the whole corpus.
///
/// # Errors
///
/// Returns acquisition, config, or scan errors.
pub fn graph(locator: &str) -> Result<ExitCode, Error> {
    let mut session = open_session(locator)?;
    let code = scan_reporting_skips(&mut session, None)?;
    print_json(&session.build_dependency_graph()?)?;
    return Ok(code);
}

/// Print the impact report for `symbol`.
///
/// # Errors
///
/// Returns acquisition, config, or scan errors.
pub fn impact(locator: &str, symbol: &str) -> Result<ExitCode, Error> {
    let mut session = open_session(locator)?;
    let code = scan_reporting_skips(&mut session, None)?;
    print_json(&session.analyze_impact(symbol)?)?;
    return Ok(code);
}

/// Scan the corpus and print the full index with its scan report.
///
/// # Errors
///
/// Returns acquisition, config, or scan errors.
pub fn scan(locator: &str, file_glob: Option<&str>) -> Result<ExitCode, Error> {
    let mut session = open_session(locator)?;
    let report = session.scan(file_glob)?;
    diagnostics::print_scan_diagnostics(&report.diagnostics);

    print_json(&json!({
        "diagnostics": report.diagnostics,
        "symbols": session.index(),
        "units_indexed": report.units_indexed,
        "units_selected": report.units_selected,
    }))?;

    if report.diagnostics.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    return Ok(ExitCode::from(EXIT_SKIPPED_UNITS));
}

/// Print every line matching `pattern`.
///
/// # Errors
///
/// Returns acquisition errors or `Error::InvalidPattern`.
pub fn search(locator: &str, pattern: &str, file_glob: Option<&str>) -> Result<ExitCode, Error> {
    let session = open_session(locator)?;
    print_json(&session.search(pattern, file_glob)?)?;
    return Ok(ExitCode::SUCCESS);
}

/// Answer line-delimited JSON requests on stdin until it closes.
///
/// # Errors
///
/// Returns config errors or I/O errors on stdin/stdout.
pub fn serve() -> Result<ExitCode, Error> {
    let mut server = Server::new(local_cache()?);
    log::info!("serving on stdin/stdout");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    server.serve(stdin.lock(), stdout.lock())?;
    return Ok(ExitCode::SUCCESS);
}

/// Corpus cache configured from the working directory's `.codescout.toml`,
/// since a remote corpus (and its own config) is not local until resolved.
///
/// # Errors
///
/// Returns config errors.
fn local_cache() -> Result<CorpusCache, Error> {
    let local = Config::load(Path::new("."))?;
    return Ok(CorpusCache::git(&local.cache));
}

/// Resolve `locator` and open a session on it.
///
/// # Errors
///
/// Returns acquisition or config errors.
fn open_session(locator: &str) -> Result<Session, Error> {
    let root: PathBuf = local_cache()?.resolve(locator)?;
    log::debug!("{locator} resolved to {}", root.display());
    return Session::open(&root);
}

/// Pretty-print a value as JSON on stdout.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Error> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    return Ok(());
}

/// Scan before a query so skipped units surface on stderr and in the exit code.
///
/// # Errors
///
/// Returns scan errors.
fn scan_reporting_skips(session: &mut Session, file_glob: Option<&str>) -> Result<ExitCode, Error> {
    let report = session.scan(file_glob)?;
    diagnostics::print_scan_diagnostics(&report.diagnostics);
    if report.diagnostics.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    return Ok(ExitCode::from(EXIT_SKIPPED_UNITS));
}
