//! Identifier occurrence index for Python codebases.
//!
//! ```text
//! source units ──> visitor ──> recorder ──> SymbolIndex (append-only merge)
//!                                               │
//!                                               ├──> DependencyGraph (on demand)
//!                                               └──> ImpactReport (per query)
//! ```
//!
//! A [`session::Session`] owns one root and its index. The CLI and the JSON
//! server both work through sessions.

pub mod acquire;
pub mod blame;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod grammar;
pub mod graph;
pub mod impact;
pub mod index;
pub mod recorder;
pub mod scanner;
pub mod search;
pub mod server;
pub mod session;
pub mod types;
pub mod visitor;

pub use crate::error::Error;
pub use crate::graph::{DependencyGraph, DependencyNode};
pub use crate::impact::{ImpactReport, UsageBreakdown};
pub use crate::index::SymbolIndex;
pub use crate::session::Session;
pub use crate::types::{Diagnostic, Occurrence, OccurrenceKind};
