/// Crate-level error types for codescout diagnostics.
use std::path::PathBuf;

/// All errors in codescout carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the file, locator, or reason for failure.
///
/// Absent symbols are never errors: lookups and impact reports return empty results.
#[allow(clippy::error_impl_error, reason = "crate-level error type re-exported from lib")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The corpus locator could not be materialized into a local root.
    #[error("acquisition failed: {locator}: {reason}")]
    AcquisitionFailed {
        /// Locator that was requested (path, `file://` URL, repository URL).
        locator: String,
        /// Description of the failure.
        reason: String,
    },

    /// Version-control attribution for a line could not be produced.
    #[error("blame failed: {}:{line}: {reason}", unit.display())]
    BlameFailed {
        /// One-based line that was requested.
        line: u32,
        /// Description of the failure.
        reason: String,
        /// Unit path, relative to the corpus root.
        unit: PathBuf,
    },

    /// Config file parsed as TOML but holds a value codescout cannot use.
    #[error("invalid config: {}: {reason}", path.display())]
    ConfigInvalid {
        /// Path to the offending config file.
        path: PathBuf,
        /// Description of the invalid value.
        reason: String,
    },

    /// A text pattern or file glob failed to compile.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// Pattern as supplied by the caller.
        pattern: String,
        /// Compiler error message.
        reason: String,
    },

    /// A server request was malformed or named an unknown method.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Description of what is wrong with the request.
        reason: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// Tree-sitter could not produce an error-free tree for a source unit.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// Unit that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// A source unit exists but its bytes could not be read as UTF-8 text.
    #[error("unreadable unit: {}: {reason}", file.display())]
    UnreadableUnit {
        /// Unit that could not be read.
        file: PathBuf,
        /// Description of the read failure.
        reason: String,
    },

    /// No tree-sitter grammar registered for this file extension.
    #[error("no grammar for extension: .{ext}")]
    UnsupportedLanguage {
        /// File extension without the leading dot.
        ext: String,
    },
}
