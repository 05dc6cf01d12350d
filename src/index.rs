//! Append-only symbol index: identifier name → occurrences in arrival order.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{Occurrence, UnitOccurrences};

/// Every occurrence seen by a scanning session, keyed by exact identifier name.
///
/// Names are not scoped: a `config` defined in one unit and a `config`
/// referenced in an unrelated unit share one key. Merges only ever append;
/// to forget a unit, build a new index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SymbolIndex {
    /// Symbol name → occurrences in arrival order.
    symbols: BTreeMap<String, Vec<Occurrence>>,
}

impl SymbolIndex {
    /// True when nothing has been merged.
    pub fn is_empty(&self) -> bool {
        return self.symbols.is_empty();
    }

    /// Number of distinct symbol names.
    pub fn len(&self) -> usize {
        return self.symbols.len();
    }

    /// Occurrences recorded for `symbol`, or an empty slice if never seen.
    pub fn lookup(&self, symbol: &str) -> &[Occurrence] {
        return self.symbols.get(symbol).map(Vec::as_slice).unwrap_or_default();
    }

    /// Append one unit's occurrences, creating keys on first sight.
    /// Merging the same unit twice records it twice.
    pub fn merge(&mut self, unit: UnitOccurrences) {
        for (symbol, occurrence) in unit {
            self.symbols.entry(symbol).or_default().push(occurrence);
        }
    }

    /// An empty index.
    pub fn new() -> Self {
        return Self::default();
    }

    /// Total occurrences across all symbols.
    pub fn occurrence_count(&self) -> usize {
        return self.symbols.values().map(Vec::len).sum();
    }

    /// Iterate `(symbol, occurrences)` in name order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, &[Occurrence])> {
        return self
            .symbols
            .iter()
            .map(|(name, occs)| return (name.as_str(), occs.as_slice()));
    }
}
