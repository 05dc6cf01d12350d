use std::fmt::Write as _;

use crate::config::CONFIG_FILE;
use crate::error::Error;
use crate::types::Diagnostic;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    print_markdown(&render_error(e));
}

/// Print the units a scan skipped, if any, as a markdown list on stderr.
pub fn print_scan_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    print_markdown(&render_scan_diagnostics(diagnostics));
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// something to do about it, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::AcquisitionFailed { locator, reason } => render_acquisition_failed(locator, reason),
        Error::BlameFailed { line, reason, unit } => format!(
            "\
# Error: Blame Failed

Could not attribute `{}:{line}`: {reason}

## Fix

Blame reads committed history. Check that the root is inside a git work
tree, the file is committed, and the line exists in the committed version.
",
            unit.display()
        ),
        Error::ConfigInvalid { path, reason } => format!(
            "\
# Error: Invalid Config

`{}`: {reason}
",
            path.display()
        ),
        Error::InvalidPattern { pattern, reason } => format!(
            "\
# Error: Invalid Pattern

`{pattern}` does not compile: {reason}
"
        ),
        Error::InvalidRequest { reason } => format!(
            "\
# Error: Invalid Request

{reason}
"
        ),
        Error::UnsupportedLanguage { ext } => render_unsupported_language(ext),
        _ => render_generic(e),
    };
}

/// Render the skipped units of a scan.
pub fn render_scan_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("# Skipped {} unit(s)\n\n", diagnostics.len());
    for d in diagnostics {
        let _ = writeln!(out, "- `{}`: {}", d.unit_id, d.reason);
    }
    out.push_str("\nSkipped units contribute no occurrences; the rest of the scan is complete.\n");
    return out;
}

/// Markdown for variants that carry only a wrapped error or a reason.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::Io(inner) => format!(
            "\
# Error: I/O

{inner}
"
        ),
        Error::Json(inner) => format!(
            "\
# Error: JSON

{inner}
"
        ),
        Error::ParseFailed { file, reason } => format!(
            "\
# Error: Parse Failed

Could not parse `{}`: {reason}
",
            file.display()
        ),
        Error::TomlDe(inner) => format!(
            "\
# Error: Invalid TOML

{inner}

## Fix

Correct the syntax in `{CONFIG_FILE}`, or delete it to use the defaults.
"
        ),
        Error::UnreadableUnit { file, reason } => format!(
            "\
# Error: Unreadable Unit

`{}`: {reason}
",
            file.display()
        ),
        // Handled in render_error; kept for an exhaustive fallback.
        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

/// Markdown for a locator that could not be turned into a local root.
fn render_acquisition_failed(locator: &str, reason: &str) -> String {
    return format!(
        "\
# Error: Acquisition Failed

Could not materialize `{locator}`: {reason}

## Fix

Pass an existing local directory, a local git repository path, or a
`file://` URL. Remote transports and credentials are not supported.
"
    );
}

/// Emit markdown to stderr with `#` headings in bold.
fn print_markdown(md: &str) {
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Markdown for a file no grammar covers.
fn render_unsupported_language(ext: &str) -> String {
    return format!(
        "\
# Error: Unsupported Language

No tree-sitter grammar for `.{ext}` files.

## Supported extensions

- `.py`, `.pyi`: Python
"
    );
}
