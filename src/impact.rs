//! Impact summaries for a single symbol.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::graph::DependencyGraph;
use crate::index::SymbolIndex;
use crate::types::OccurrenceKind;

/// What touching `symbol` would affect, as seen by the current index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    /// Distinct units holding any occurrence of the symbol.
    pub affected_units: BTreeSet<String>,
    /// Graph dependencies; absent when the symbol has no definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeSet<String>>,
    /// Graph dependents; absent when the symbol has no definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependents: Option<BTreeSet<String>>,
    /// Number of affected units.
    pub file_count: usize,
    /// Queried symbol name.
    pub symbol: String,
    /// Occurrences of every kind.
    pub total_usages: usize,
    /// Occurrence counts split by kind.
    pub usage_breakdown: UsageBreakdown,
}

/// Occurrence counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageBreakdown {
    /// Call occurrences.
    pub calls: usize,
    /// Definition occurrences.
    pub definitions: usize,
    /// Import occurrences.
    pub imports: usize,
    /// Reference occurrences.
    pub references: usize,
}

impl UsageBreakdown {
    /// Count one occurrence of `kind`.
    fn add(&mut self, kind: OccurrenceKind) {
        let slot = match kind {
            OccurrenceKind::Call => &mut self.calls,
            OccurrenceKind::Definition => &mut self.definitions,
            OccurrenceKind::Import => &mut self.imports,
            OccurrenceKind::Reference => &mut self.references,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Analyze `symbol`, building a fresh graph from the index snapshot.
///
/// A symbol with no occurrences yields an all-zero report, never an error.
pub fn analyze(index: &SymbolIndex, symbol: &str) -> ImpactReport {
    let graph = DependencyGraph::build(index);
    return analyze_with_graph(index, &graph, symbol);
}

/// Analyze `symbol` against a graph the caller already built from `index`.
pub fn analyze_with_graph(index: &SymbolIndex, graph: &DependencyGraph, symbol: &str) -> ImpactReport {
    let occurrences = index.lookup(symbol);

    let mut usage_breakdown = UsageBreakdown::default();
    let mut affected_units = BTreeSet::new();
    for occurrence in occurrences {
        usage_breakdown.add(occurrence.kind());
        affected_units.insert(occurrence.unit_id().to_string());
    }

    let node = graph.get(symbol);
    return ImpactReport {
        file_count: affected_units.len(),
        affected_units,
        dependencies: node.map(|n| return n.dependencies.clone()),
        dependents: node.map(|n| return n.dependents.clone()),
        symbol: symbol.to_string(),
        total_usages: occurrences.len(),
        usage_breakdown,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Occurrence, UnitOccurrences};

    fn index_with(entries: &[(&str, &str, OccurrenceKind, &str)]) -> SymbolIndex {
        let mut index = SymbolIndex::new();
        for (unit_id, symbol, kind, context) in entries {
            let mut unit = UnitOccurrences::new(unit_id);
            unit.push(symbol, Occurrence::new(unit_id, 1, 0, *kind, context));
            index.merge(unit);
        }
        return index;
    }

    #[test]
    fn missing_symbol_gives_empty_report() {
        let index = index_with(&[("a.py", "present", OccurrenceKind::Definition, "def present():")]);
        let report = analyze(&index, "missing");

        assert_eq!(report.symbol, "missing");
        assert_eq!(report.total_usages, 0);
        assert_eq!(report.file_count, 0);
        assert!(report.affected_units.is_empty());
        assert_eq!(report.usage_breakdown, UsageBreakdown::default());
        assert!(report.dependencies.is_none());
        assert!(report.dependents.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("dependencies").is_none());
        assert_eq!(json["usage_breakdown"]["calls"], 0);
    }

    #[test]
    fn counts_kinds_and_distinct_units() {
        let index = index_with(&[
            ("lib.py", "parse", OccurrenceKind::Definition, "def parse(text):"),
            ("app.py", "parse", OccurrenceKind::Import, "from lib import parse"),
            ("app.py", "parse", OccurrenceKind::Call, "parse(raw)"),
            ("cli.py", "parse", OccurrenceKind::Call, "parse(argv)"),
            ("cli.py", "parse", OccurrenceKind::Reference, "handler = parse"),
        ]);
        let report = analyze(&index, "parse");

        assert_eq!(report.total_usages, 5);
        assert_eq!(report.file_count, 3);
        assert_eq!(
            report.affected_units,
            BTreeSet::from(["app.py".to_string(), "cli.py".to_string(), "lib.py".to_string()])
        );
        assert_eq!(
            report.usage_breakdown,
            UsageBreakdown { calls: 2, definitions: 1, imports: 1, references: 1 }
        );
        assert_eq!(report.dependencies, Some(BTreeSet::new()));
        assert_eq!(report.dependents, Some(BTreeSet::new()));
    }

    #[test]
    fn edges_come_from_graph() {
        let index = index_with(&[
            ("a.py", "foo", OccurrenceKind::Definition, "def foo(): return bar()"),
            ("a.py", "bar", OccurrenceKind::Call, "def foo(): return bar()"),
            ("b.py", "bar", OccurrenceKind::Definition, "def bar(): return 1"),
        ]);
        let graph = DependencyGraph::build(&index);

        let foo = analyze_with_graph(&index, &graph, "foo");
        assert_eq!(foo.dependencies, Some(BTreeSet::from(["bar".to_string()])));
        let bar = analyze_with_graph(&index, &graph, "bar");
        assert_eq!(bar.dependents, Some(BTreeSet::from(["foo".to_string()])));
        assert_eq!(bar.file_count, 2);
    }
}
