//! Symbol dependency graph derived from an index snapshot.
//!
//! ```text
//! SymbolIndex
//!     │
//!     ├──> Phase 1: one node per symbol with a definition
//!     │      └─ defining unit = unit of the first definition in arrival order
//!     │
//!     └──> Phase 2: edges
//!            ├─ local context = the symbol's occurrences in its defining unit
//!            ├─ every other defined name found inside a local context line
//!            │  becomes a dependency
//!            └─ each dependency edge is mirrored as a dependent edge
//! ```
//!
//! Matching is plain substring containment, not name resolution: a symbol
//! named `get` is "found" inside `get_user(...)`. Impact reports are defined
//! in terms of this heuristic, so the false positives are kept.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::index::SymbolIndex;
use crate::types::{Occurrence, OccurrenceKind};

/// Symbol → node, rebuilt from scratch for every snapshot.
///
/// A key exists exactly when the symbol has at least one definition, and
/// `b ∈ a.dependencies` exactly when `a ∈ b.dependents`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    /// Defined symbol name → node.
    nodes: BTreeMap<String, DependencyNode>,
}

/// One defined symbol and its inferred edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    /// Unit holding the symbol's first definition in arrival order.
    pub defining_unit: String,
    /// Defined symbols named inside this symbol's local context.
    pub dependencies: BTreeSet<String>,
    /// Defined symbols whose local context names this symbol.
    pub dependents: BTreeSet<String>,
    /// Symbol name.
    pub symbol: String,
}

impl DependencyGraph {
    /// Build the graph for an index snapshot. An empty index gives an empty graph.
    ///
    /// Cost is O(defined symbols × local occurrences) per defined symbol, so
    /// callers answering many queries should build once and reuse.
    pub fn build(index: &SymbolIndex) -> Self {
        let mut nodes = create_defined_nodes(index);
        let defined: Vec<String> = nodes.keys().cloned().collect();

        let mut edges: Vec<(String, String)> = Vec::new();
        for node in nodes.values() {
            for occurrence in local_context(index, &node.symbol, &node.defining_unit) {
                collect_contained_names(&node.symbol, occurrence, &defined, &mut edges);
            }
        }

        for (from, to) in edges {
            if let Some(node) = nodes.get_mut(&from) {
                node.dependencies.insert(to.clone());
            }
            if let Some(node) = nodes.get_mut(&to) {
                node.dependents.insert(from);
            }
        }

        let graph = Self { nodes };
        log::debug!(
            "built dependency graph: {} nodes, {} edges",
            graph.len(),
            graph.edge_count()
        );
        return graph;
    }

    /// Number of dependency edges (each also counted once as a dependent edge).
    pub fn edge_count(&self) -> usize {
        return self.nodes.values().map(|n| return n.dependencies.len()).sum();
    }

    /// Node for `symbol`, if it has a definition.
    pub fn get(&self, symbol: &str) -> Option<&DependencyNode> {
        return self.nodes.get(symbol);
    }

    /// True when no symbol has a definition.
    pub fn is_empty(&self) -> bool {
        return self.nodes.is_empty();
    }

    /// Number of defined symbols.
    pub fn len(&self) -> usize {
        return self.nodes.len();
    }

    /// Iterate nodes in symbol order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        return self.nodes.values();
    }
}

/// For each other defined name contained in the occurrence's context line,
/// record a `symbol → other` edge.
fn collect_contained_names(
    symbol: &str,
    occurrence: &Occurrence,
    defined: &[String],
    edges: &mut Vec<(String, String)>,
) {
    let context = occurrence.context_line();
    for other in defined {
        if other != symbol && context.contains(other.as_str()) {
            edges.push((symbol.to_string(), other.clone()));
        }
    }
}

/// Phase 1: a node for every symbol with a definition, pinned to the unit of
/// its first definition.
fn create_defined_nodes(index: &SymbolIndex) -> BTreeMap<String, DependencyNode> {
    let mut nodes = BTreeMap::new();
    for (symbol, occurrences) in index.symbols() {
        let first_definition = occurrences
            .iter()
            .find(|o| return o.kind() == OccurrenceKind::Definition);
        let Some(definition) = first_definition else {
            continue;
        };
        nodes.insert(
            symbol.to_string(),
            DependencyNode {
                defining_unit: definition.unit_id().to_string(),
                dependencies: BTreeSet::new(),
                dependents: BTreeSet::new(),
                symbol: symbol.to_string(),
            },
        );
    }
    return nodes;
}

/// The symbol's occurrences inside its defining unit: imports, calls and
/// references there, plus its own definition line (the signature, and the
/// whole body for one-line definitions).
fn local_context<'a>(
    index: &'a SymbolIndex,
    symbol: &str,
    defining_unit: &'a str,
) -> impl Iterator<Item = &'a Occurrence> {
    return index
        .lookup(symbol)
        .iter()
        .filter(move |o| return o.unit_id() == defining_unit);
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::recorder;
    use crate::types::UnitOccurrences;
    use crate::visitor;

    fn unit(unit_id: &str, source: &str) -> UnitOccurrences {
        let tree = visitor::parse_unit(Path::new(unit_id), source).unwrap();
        return recorder::record(unit_id, source, visitor::collect_events(&tree, source));
    }

    fn index_of(units: &[(&str, &str)]) -> SymbolIndex {
        let mut index = SymbolIndex::new();
        for (unit_id, source) in units {
            index.merge(unit(unit_id, source));
        }
        return index;
    }

    fn assert_symmetric(graph: &DependencyGraph) {
        for node in graph.nodes() {
            for dep in &node.dependencies {
                assert!(graph.get(dep).unwrap().dependents.contains(&node.symbol));
            }
            for dependent in &node.dependents {
                assert!(graph.get(dependent).unwrap().dependencies.contains(&node.symbol));
            }
        }
    }

    #[test]
    fn caller_depends_on_callee_defined_elsewhere() {
        let index = index_of(&[("a", "def foo(): return bar()\n"), ("b", "def bar(): return 1\n")]);

        let foo = index.lookup("foo");
        assert_eq!(foo.len(), 1);
        assert_eq!((foo[0].kind(), foo[0].unit_id(), foo[0].line()), (OccurrenceKind::Definition, "a", 1));
        let bar_kinds: Vec<(OccurrenceKind, &str)> =
            index.lookup("bar").iter().map(|o| return (o.kind(), o.unit_id())).collect();
        assert_eq!(bar_kinds, vec![(OccurrenceKind::Call, "a"), (OccurrenceKind::Definition, "b")]);

        let graph = DependencyGraph::build(&index);
        let foo_node = graph.get("foo").unwrap();
        assert_eq!(foo_node.dependencies, BTreeSet::from(["bar".to_string()]));
        let bar_node = graph.get("bar").unwrap();
        assert_eq!(bar_node.defining_unit, "b");
        assert_eq!(bar_node.dependents, BTreeSet::from(["foo".to_string()]));
        assert!(bar_node.dependencies.is_empty());
    }

    #[test]
    fn reference_only_symbols_are_never_keys() {
        let index = index_of(&[("a.py", "def run():\n    return x + 1\n")]);
        let graph = DependencyGraph::build(&index);

        assert!(graph.get("x").is_none());
        assert!(graph.get("run").unwrap().dependencies.is_empty());
        for node in graph.nodes() {
            let defined = index
                .lookup(&node.symbol)
                .iter()
                .any(|o| return o.kind() == OccurrenceKind::Definition);
            assert!(defined);
        }
    }

    #[test]
    fn defining_unit_is_first_definition_in_arrival_order() {
        let index = index_of(&[
            ("z.py", "helper()\n"),
            ("b.py", "def helper():\n    pass\n"),
            ("a.py", "def helper():\n    pass\n"),
        ]);
        let graph = DependencyGraph::build(&index);
        assert_eq!(graph.get("helper").unwrap().defining_unit, "b.py");
    }

    #[test]
    fn usages_outside_defining_unit_add_no_edges() {
        let index = index_of(&[
            ("lib.py", "def load():\n    pass\n\ndef save():\n    pass\n"),
            ("app.py", "load(save)\n"),
        ]);
        let graph = DependencyGraph::build(&index);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn local_usages_link_every_defined_name_on_the_line() {
        let source = "\
class Store:
    pass

def load():
    pass

def save():
    pass

save(load(), Store())
";
        let index = index_of(&[("lib.py", source)]);
        let graph = DependencyGraph::build(&index);

        assert_eq!(
            graph.get("save").unwrap().dependencies,
            BTreeSet::from(["Store".to_string(), "load".to_string()])
        );
        assert_eq!(
            graph.get("load").unwrap().dependencies,
            BTreeSet::from(["Store".to_string(), "save".to_string()])
        );
        assert_symmetric(&graph);
    }

    #[test]
    fn substring_matches_are_kept() {
        let source = "\
def get():
    pass

def get_user():
    pass

get_user()
";
        let index = index_of(&[("svc.py", source)]);
        let graph = DependencyGraph::build(&index);

        assert!(graph.get("get_user").unwrap().dependencies.contains("get"));
        assert!(graph.get("get").unwrap().dependents.contains("get_user"));
        assert!(graph.get("get").unwrap().dependencies.is_empty());
        assert_symmetric(&graph);
    }

    #[test]
    fn empty_index_gives_empty_graph() {
        let graph = DependencyGraph::build(&SymbolIndex::new());
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }
}
