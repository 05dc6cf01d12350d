//! Line-delimited JSON request/response loop.
//!
//! One request per input line, one response per output line:
//!
//! ```text
//! → {"id": 1, "method": "find_symbol", "params": {"root_directory": ".", "symbol_name": "run"}}
//! ← {"id": 1, "result": [...]}
//! ← {"id": 2, "error": {"message": "..."}}
//! ```
//!
//! Corpus methods name their corpus through `root_directory`, which goes
//! through corpus acquisition. Only the most recent corpus keeps a session;
//! naming a different one drops the previous index. `list_tools` describes
//! every method and its parameters.

use std::io::{BufRead, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::acquire::{CorpusCache, GitMaterializer, Materializer};
use crate::error::Error;
use crate::session::Session;

/// One request line.
#[derive(Debug, Deserialize)]
pub struct Request {
    /// Echoed back unchanged; `null` if absent.
    #[serde(default)]
    pub id: Value,
    /// Operation name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

/// One response line: exactly one of `result` or `error` is present.
#[derive(Debug, Serialize)]
pub struct Response {
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// Id of the request being answered.
    pub id: Value,
    /// Method output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Error payload of a failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable failure.
    pub message: String,
}

// ── Parameters ─────────────────────────────────────────────────────────

/// `git_blame`.
#[derive(Deserialize)]
struct BlameParams {
    /// Unit path relative to the root.
    file_path: String,
    /// One-based line.
    line_number: u32,
    /// Corpus locator.
    root_directory: String,
}

/// `grep_search`.
#[derive(Deserialize)]
struct GrepParams {
    /// File-name glob; defaults to the session's unit glob.
    file_pattern: Option<String>,
    /// Regex matched against each line.
    pattern: String,
    /// Corpus locator.
    root_directory: String,
}

/// `clear_cache`.
#[derive(Deserialize)]
struct ClearParams {
    /// Locator whose copy to remove; every copy when absent.
    root_directory: Option<String>,
}

/// Methods that only need a root.
#[derive(Deserialize)]
struct RootParams {
    /// Corpus locator.
    root_directory: String,
}

/// `scan_directory`.
#[derive(Deserialize)]
struct ScanParams {
    /// Unit glob override.
    pattern: Option<String>,
    /// Corpus locator.
    root_directory: String,
}

/// `find_symbol` and `analyze_impact`.
#[derive(Deserialize)]
struct SymbolParams {
    /// Corpus locator.
    root_directory: String,
    /// Exact identifier.
    symbol_name: String,
}

// ── Server ─────────────────────────────────────────────────────────────

/// Request dispatcher holding the session for the most recent corpus.
pub struct Server<M = GitMaterializer> {
    /// Resolves locators to local roots.
    cache: CorpusCache<M>,
    /// Locator and session of the corpus last named.
    current: Option<(String, Session)>,
}

impl<M: Materializer> Server<M> {
    /// Locator of the session currently held, if any.
    pub fn current_locator(&self) -> Option<&str> {
        return self.current.as_ref().map(|(locator, _)| return locator.as_str());
    }

    /// Answer one request.
    pub fn handle_request(&mut self, request: Request) -> Response {
        log::debug!("request {} {}", request.id, request.method);
        return match self.dispatch(&request.method, request.params) {
            Ok(result) => Response {
                error: None,
                id: request.id,
                result: Some(result),
            },
            Err(e) => {
                log::warn!("{} failed: {e}", request.method);
                error_response(request.id, &e)
            },
        };
    }

    /// Answer one raw request line.
    pub fn handle_line(&mut self, line: &str) -> Response {
        return match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle_request(request),
            Err(e) => error_response(
                Value::Null,
                &Error::InvalidRequest {
                    reason: e.to_string(),
                },
            ),
        };
    }

    /// Serve requests from `input` until end of input, writing one response
    /// per non-blank line to `output`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading or writing fails, or `Error::Json` if a
    /// response cannot be encoded.
    pub fn serve<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<(), Error> {
        for line in input.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response = self.handle_line(trimmed);
            serde_json::to_writer(&mut output, &response)?;
            output.write_all(b"\n")?;
            output.flush()?;
        }
        log::info!("input closed");
        return Ok(());
    }

    /// Build a server resolving locators through `cache`.
    pub const fn new(cache: CorpusCache<M>) -> Self {
        return Self {
            cache,
            current: None,
        };
    }

    /// Route a method to its session operation.
    fn dispatch(&mut self, method: &str, params: Value) -> Result<Value, Error> {
        return match method {
            "analyze_impact" => {
                let p: SymbolParams = parse_params(params)?;
                let report = self.session(&p.root_directory)?.analyze_impact(&p.symbol_name)?;
                Ok(serde_json::to_value(report)?)
            },
            "build_dependency_graph" => {
                let p: RootParams = parse_params(params)?;
                let graph = self.session(&p.root_directory)?.build_dependency_graph()?;
                Ok(serde_json::to_value(graph)?)
            },
            "cache_info" => Ok(serde_json::to_value(self.cache.info()?)?),
            "clear_cache" => {
                let p: ClearParams = parse_params(params)?;
                let locator = p.root_directory.as_deref();
                if self
                    .current
                    .as_ref()
                    .is_some_and(|(held, _)| return locator.is_none_or(|l| return l == held))
                {
                    self.current = None;
                }
                let removed = self.cache.clear(locator)?;
                Ok(json!({ "removed": removed }))
            },
            "find_symbol" => {
                let p: SymbolParams = parse_params(params)?;
                let found = self.session(&p.root_directory)?.find_symbol(&p.symbol_name)?;
                Ok(serde_json::to_value(found)?)
            },
            "git_blame" => {
                let p: BlameParams = parse_params(params)?;
                let info = self.session(&p.root_directory)?.blame(Path::new(&p.file_path), p.line_number)?;
                Ok(serde_json::to_value(info)?)
            },
            "grep_search" => {
                let p: GrepParams = parse_params(params)?;
                let found = self.session(&p.root_directory)?.search(&p.pattern, p.file_pattern.as_deref())?;
                Ok(serde_json::to_value(found)?)
            },
            "list_tools" => Ok(tool_catalog()),
            "scan_directory" => {
                let p: ScanParams = parse_params(params)?;
                let session = self.session(&p.root_directory)?;
                let report = session.scan(p.pattern.as_deref())?;
                Ok(json!({
                    "diagnostics": report.diagnostics,
                    "symbols": session.index(),
                    "units_indexed": report.units_indexed,
                    "units_selected": report.units_selected,
                }))
            },
            other => Err(Error::InvalidRequest {
                reason: format!("unknown method `{other}`"),
            }),
        };
    }

    /// Session for `locator`. A different locator than the current one
    /// acquires its corpus and replaces the current session.
    fn session(&mut self, locator: &str) -> Result<&mut Session, Error> {
        if self.current_locator() != Some(locator) {
            let root = self.cache.resolve(locator)?;
            let session = Session::open(&root)?;
            log::info!("new session for {locator} at {}", root.display());
            if let Some((previous, _)) = self.current.replace((locator.to_string(), session)) {
                log::debug!("dropped session for {previous}");
            }
        }
        return self.current.as_mut().map(|(_, session)| return session).ok_or_else(|| {
            return Error::InvalidRequest {
                reason: format!("no session for `{locator}`"),
            };
        });
    }
}

/// Failure response for `id`.
fn error_response(id: Value, e: &Error) -> Response {
    return Response {
        error: Some(ErrorBody { message: e.to_string() }),
        id,
        result: None,
    };
}

/// Method names, descriptions, and JSON schemas of their parameters.
fn tool_catalog() -> Value {
    let root = json!({"type": "string", "description": "Local directory, git repository path, or file:// URL"});
    let symbol = json!({"type": "string", "description": "Exact identifier name"});
    return json!([
        {
            "name": "analyze_impact",
            "description": "Usage counts, affected units, and graph edges of a symbol",
            "input_schema": {
                "type": "object",
                "properties": {"root_directory": root, "symbol_name": symbol},
                "required": ["root_directory", "symbol_name"],
            },
        },
        {
            "name": "build_dependency_graph",
            "description": "Dependency graph of every defined symbol",
            "input_schema": {
                "type": "object",
                "properties": {"root_directory": root},
                "required": ["root_directory"],
            },
        },
        {
            "name": "cache_info",
            "description": "Cached corpus copies with their sizes and the size budget",
            "input_schema": {"type": "object", "properties": {}, "required": []},
        },
        {
            "name": "clear_cache",
            "description": "Remove one cached corpus copy, or all of them",
            "input_schema": {
                "type": "object",
                "properties": {"root_directory": root},
                "required": [],
            },
        },
        {
            "name": "find_symbol",
            "description": "Every occurrence of a symbol",
            "input_schema": {
                "type": "object",
                "properties": {"root_directory": root, "symbol_name": symbol},
                "required": ["root_directory", "symbol_name"],
            },
        },
        {
            "name": "git_blame",
            "description": "Author, commit, and time of the last change to a committed line",
            "input_schema": {
                "type": "object",
                "properties": {
                    "file_path": {"type": "string", "description": "Path relative to the root"},
                    "line_number": {"type": "integer", "minimum": 1},
                    "root_directory": root,
                },
                "required": ["file_path", "line_number", "root_directory"],
            },
        },
        {
            "name": "grep_search",
            "description": "Regex search over file lines",
            "input_schema": {
                "type": "object",
                "properties": {
                    "file_pattern": {"type": "string", "description": "File-name glob, default *.py"},
                    "pattern": {"type": "string", "description": "Regular expression"},
                    "root_directory": root,
                },
                "required": ["pattern", "root_directory"],
            },
        },
        {
            "name": "list_tools",
            "description": "This catalog",
            "input_schema": {"type": "object", "properties": {}, "required": []},
        },
        {
            "name": "scan_directory",
            "description": "Scan a corpus and return its symbol index",
            "input_schema": {
                "type": "object",
                "properties": {
                    "pattern": {"type": "string", "description": "File-name glob, default *.py"},
                    "root_directory": root,
                },
                "required": ["root_directory"],
            },
        },
    ]);
}

/// Decode method parameters. Absent params read as an empty object.
fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, Error> {
    let params = if params.is_null() { json!({}) } else { params };
    return serde_json::from_value(params).map_err(|e| {
        return Error::InvalidRequest {
            reason: format!("bad params: {e}"),
        };
    });
}
