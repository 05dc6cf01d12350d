//! Regex line search over the files of a corpus root.

use std::path::Path;

use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Error;
use crate::scanner;

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMatch {
    /// One-based line number.
    pub line: u32,
    /// Trimmed line text.
    pub text: String,
    /// File path relative to the root, `/`-separated.
    pub unit: String,
}

/// Find every line under `root` matching `text_pattern`, in files whose name
/// matches `file_glob`.
///
/// Files are visited in sorted path order and lines in file order. Hidden
/// directories are skipped, as are files that cannot be read as UTF-8.
///
/// # Errors
///
/// Returns `Error::InvalidPattern` if either pattern fails to compile.
pub fn search(root: &Path, text_pattern: &str, file_glob: &str) -> Result<Vec<TextMatch>, Error> {
    let regex = Regex::new(text_pattern).map_err(|e| {
        return Error::InvalidPattern {
            pattern: text_pattern.to_string(),
            reason: e.to_string(),
        };
    })?;
    let files = Config::compile_file_glob(file_glob)?;

    let mut matches = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| return e.depth() == 0 || !scanner::is_hidden_dir(e))
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file());

    for entry in walker {
        let Some(name) = entry.file_name().to_str() else { continue };
        if !files.is_match(name) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            log::debug!("search: skipping unreadable {}", entry.path().display());
            continue;
        };
        let unit = scanner::relative_unit_id(root, entry.path());
        collect_matching_lines(&content, &unit, &regex, &mut matches);
    }

    log::debug!("search `{text_pattern}` in `{file_glob}`: {} matches", matches.len());
    return Ok(matches);
}

/// Push every line of `content` that `regex` matches.
fn collect_matching_lines(content: &str, unit: &str, regex: &Regex, matches: &mut Vec<TextMatch>) {
    for (number, line) in (1_u32..).zip(content.lines()) {
        if regex.is_match(line) {
            matches.push(TextMatch {
                line: number,
                text: line.trim().to_string(),
                unit: unit.to_string(),
            });
        }
    }
}
