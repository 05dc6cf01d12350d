//! Python syntax walk: classifies every identifier mention in a unit as a
//! definition, import, call, or reference.
//!
//! Only identifiers that Python itself treats as name reads or writes become
//! references. Parameter names, keyword-argument names, attribute names after a
//! dot, `global`/`nonlocal` lists, `except ... as` names and direct `del`
//! targets are bindings of a different sort and never emit anything. The
//! same holds for names declared in `def f[T]` / `class C[T]` type parameter
//! lists and for names captured or used as keyword keys by `case` patterns.

use std::path::Path;

use tree_sitter::{Node, Parser, Point, Tree};

use crate::error::Error;
use crate::grammar;
use crate::types::OccurrenceKind;

/// A classified identifier mention with its exact position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierEvent {
    /// Zero-based byte column of the token.
    pub column: u32,
    /// Role of the mention.
    pub kind: OccurrenceKind,
    /// One-based line of the token.
    pub line: u32,
    /// Identifier as written; dotted for `import a.b`.
    pub name: String,
}

/// Walk a parsed unit and return its identifier events in pre-order
/// traversal order.
pub fn collect_events(tree: &Tree, source: &str) -> Vec<IdentifierEvent> {
    let mut events = Vec::new();
    visit_node(tree.root_node(), source, &mut events);
    return events;
}

/// Parse one unit with the Python grammar.
///
/// Tree-sitter recovers from bad input instead of failing, so any error or
/// missing node in the tree counts as a parse failure for the whole unit.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the grammar cannot be loaded, parsing is
/// aborted, or the tree holds a syntax error.
pub fn parse_unit(file: &Path, source: &str) -> Result<Tree, Error> {
    let mut parser = Parser::new();
    parser.set_language(&grammar::python()).map_err(|e| {
        return Error::ParseFailed {
            file: file.to_path_buf(),
            reason: e.to_string(),
        };
    })?;

    let tree = parser.parse(source, None).ok_or_else(|| {
        return Error::ParseFailed {
            file: file.to_path_buf(),
            reason: "tree-sitter returned None".to_string(),
        };
    })?;

    if let Some(point) = first_syntax_error(tree.root_node()) {
        return Err(Error::ParseFailed {
            file: file.to_path_buf(),
            reason: format!(
                "syntax error at line {}, column {}",
                point.row.saturating_add(1),
                point.column
            ),
        });
    }

    return Ok(tree);
}

// ── Dispatch ───────────────────────────────────────────────────────────

/// Classify one node, then descend the way Python's own AST would.
fn visit_node(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    match node.kind() {
        "function_definition" | "class_definition" => visit_definition(node, source, events),
        "import_statement" | "future_import_statement" => emit_imported_names(node, source, events),
        "import_from_statement" => {
            if has_module_clause(node) {
                emit_imported_names(node, source, events);
            }
        },
        "call" => visit_call(node, source, events),
        "case_clause" => visit_case_clause(node, source, events),
        "attribute" => visit_field(node, "object", source, events),
        "keyword_argument" => visit_field(node, "value", source, events),
        "parameters" | "lambda_parameters" => visit_parameters(node, source, events),
        "except_clause" | "except_group_clause" => visit_except_clause(node, source, events),
        "delete_statement" => visit_delete(node, source, events),
        "global_statement" | "nonlocal_statement" => {},
        "identifier" => {
            if let Some(name) = node_text(node, source) {
                emit(node, name, OccurrenceKind::Reference, events);
            }
        },
        _ => visit_children(node, source, events),
    }
}

/// Visit every child in source order.
fn visit_children(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_node(child, source, events);
    }
}

/// Visit a single named field if present.
fn visit_field(node: Node<'_>, field: &str, source: &str, events: &mut Vec<IdentifierEvent>) {
    if let Some(child) = node.child_by_field_name(field) {
        visit_node(child, source, events);
    }
}

// ── Definitions and calls ──────────────────────────────────────────────

/// `def` / `class`: one definition at the name token, then everything else
/// except the name.
fn visit_definition(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let name_node = node.child_by_field_name("name");
    if let Some(name_node) = name_node
        && let Some(name) = node_text(name_node, source)
    {
        emit(name_node, name, OccurrenceKind::Definition, events);
    }

    let name_id = name_node.map(|n| return n.id());
    let type_params_id = node.child_by_field_name("type_parameters").map(|n| return n.id());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if Some(child.id()) == name_id {
            continue;
        }
        if Some(child.id()) == type_params_id {
            visit_type_parameters(child, source, events);
            continue;
        }
        visit_node(child, source, events);
    }
}

/// `[T, U: Bound, *Ts, **P]`: declared names are skipped, bounds are visited.
fn visit_type_parameters(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let mut cursor = node.walk();
    for param in node.named_children(&mut cursor) {
        let mut inner = param.walk();
        for part in param.named_children(&mut inner) {
            match part.kind() {
                "identifier" | "splat_type" => {},
                "constrained_type" => {
                    let mut bound = part.walk();
                    for constraint in part.named_children(&mut bound).skip(1) {
                        visit_node(constraint, source, events);
                    }
                },
                _ => visit_node(part, source, events),
            }
        }
    }
}

/// Call expressions: a call event for `f()` or the trailing attribute of
/// `obj.method()`. The callee identifier is never also a reference; the
/// receiver of a member call is.
fn visit_call(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let function = node.child_by_field_name("function");

    if let Some(function) = function {
        match function.kind() {
            "identifier" => {
                if let Some(name) = node_text(function, source) {
                    emit(function, name, OccurrenceKind::Call, events);
                }
            },
            "attribute" => {
                if let Some(attr) = function.child_by_field_name("attribute")
                    && let Some(name) = node_text(attr, source)
                {
                    emit(attr, name, OccurrenceKind::Call, events);
                }
                visit_field(function, "object", source, events);
            },
            _ => visit_node(function, source, events),
        }
    }

    let function_id = function.map(|f| return f.id());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if Some(child.id()) == function_id {
            continue;
        }
        visit_node(child, source, events);
    }
}

// ── Imports ────────────────────────────────────────────────────────────

/// One import event per `name` field; aliases are ignored in favour of the
/// original dotted name. Wildcards have no `name` field and emit nothing.
fn emit_imported_names(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        let target = if child.kind() == "aliased_import" {
            child.child_by_field_name("name")
        } else {
            Some(child)
        };
        let Some(target) = target else {
            continue;
        };
        if let Some(name) = dotted_name_text(target, source) {
            emit(target, name, OccurrenceKind::Import, events);
        }
    }
}

/// `from m import x` and `from .m import x` have a module clause;
/// `from . import x` does not.
fn has_module_clause(node: Node<'_>) -> bool {
    let Some(module) = node.child_by_field_name("module_name") else {
        return false;
    };
    if module.kind() != "relative_import" {
        return true;
    }
    let mut cursor = module.walk();
    return module
        .named_children(&mut cursor)
        .any(|c| return c.kind() == "dotted_name");
}

// ── Match statements ───────────────────────────────────────────────────

/// `case <pattern> if <guard>: <body>`: the pattern binds, the rest reads.
fn visit_case_clause(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "case_pattern" {
            visit_pattern(child, source, events);
        } else {
            visit_node(child, source, events);
        }
    }
}

/// Inside a pattern only value lookups (`Color.RED`) and class names
/// (`Point(...)`) read a name. Captures, `as` targets, splats and keyword
/// keys bind.
fn visit_pattern(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    match node.kind() {
        "dotted_name" => {
            if node.named_child_count() > 1 {
                emit_pattern_head(node, source, events);
            }
        },
        "class_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "dotted_name" {
                    emit_pattern_head(child, source, events);
                } else {
                    visit_pattern(child, source, events);
                }
            }
        },
        "keyword_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor).skip(1) {
                visit_pattern(child, source, events);
            }
        },
        "identifier" | "splat_pattern" => {},
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                visit_pattern(child, source, events);
            }
        },
    }
}

/// Reference to the first name of a dotted pattern name.
fn emit_pattern_head(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    if let Some(head) = node.named_child(0)
        && let Some(name) = node_text(head, source)
    {
        emit(head, name, OccurrenceKind::Reference, events);
    }
}

// ── Non-name identifiers ───────────────────────────────────────────────

/// Parameter lists: names are skipped, annotations and default values are
/// ordinary expressions.
fn visit_parameters(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "default_parameter" => visit_field(child, "value", source, events),
            "typed_parameter" => visit_field(child, "type", source, events),
            "typed_default_parameter" => {
                visit_field(child, "type", source, events);
                visit_field(child, "value", source, events);
            },
            _ => {},
        }
    }
}

/// `except E as e:`: the exception expression is visited, the bound name is not.
fn visit_except_clause(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let mut skip_alias = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "as" | "," => {
                skip_alias = true;
                continue;
            },
            "identifier" if skip_alias => {
                skip_alias = false;
                continue;
            },
            "as_pattern" => {
                let mut inner = child.walk();
                if let Some(value) = child.named_children(&mut inner).next() {
                    visit_node(value, source, events);
                }
                skip_alias = false;
                continue;
            },
            _ => {},
        }
        skip_alias = false;
        visit_node(child, source, events);
    }
}

/// `del x, y[0]`: bare targets are deletions, not reads or writes.
fn visit_delete(node: Node<'_>, source: &str, events: &mut Vec<IdentifierEvent>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => {},
            "expression_list" | "tuple" | "list" => {
                let mut inner = child.walk();
                for item in child.named_children(&mut inner) {
                    if item.kind() != "identifier" {
                        visit_node(item, source, events);
                    }
                }
            },
            _ => visit_node(child, source, events),
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────

/// Text of a dotted name with insignificant whitespace removed (`a . b` → `a.b`).
fn dotted_name_text(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "dotted_name" {
        return node_text(node, source);
    }
    let mut cursor = node.walk();
    let parts: Vec<String> = node
        .named_children(&mut cursor)
        .filter_map(|part| return node_text(part, source))
        .collect();
    if parts.is_empty() {
        return None;
    }
    return Some(parts.join("."));
}

/// Push an event at the node's start. Nodes whose position does not fit the
/// occurrence model are dropped.
fn emit(node: Node<'_>, name: String, kind: OccurrenceKind, events: &mut Vec<IdentifierEvent>) {
    let start = node.start_position();
    let Ok(column) = u32::try_from(start.column) else {
        return;
    };
    let Some(line) = u32::try_from(start.row).ok().and_then(|row| return row.checked_add(1)) else {
        return;
    };
    events.push(IdentifierEvent { column, kind, line, name });
}

/// Depth-first search for the first error or missing node.
fn first_syntax_error(node: Node<'_>) -> Option<Point> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node.start_position());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(point) = first_syntax_error(child) {
            return Some(point);
        }
    }
    return Some(node.start_position());
}

/// Non-empty UTF-8 text of a node.
fn node_text(node: Node<'_>, source: &str) -> Option<String> {
    let text = node.utf8_text(source.as_bytes()).ok()?;
    if text.is_empty() {
        return None;
    }
    return Some(text.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(source: &str) -> Vec<(String, OccurrenceKind, u32, u32)> {
        let tree = parse_unit(Path::new("t.py"), source).unwrap();
        return collect_events(&tree, source)
            .into_iter()
            .map(|e| return (e.name, e.kind, e.line, e.column))
            .collect();
    }

    fn names_of(source: &str, kind: OccurrenceKind) -> Vec<String> {
        return events(source)
            .into_iter()
            .filter(|(_, k, _, _)| return *k == kind)
            .map(|(name, _, _, _)| return name)
            .collect();
    }

    #[test]
    fn definition_is_at_name_token() {
        let found = events("def foo(): return bar()\n");
        assert_eq!(found[0], ("foo".to_string(), OccurrenceKind::Definition, 1, 4));
        assert_eq!(found[1], ("bar".to_string(), OccurrenceKind::Call, 1, 18));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn classes_and_async_and_decorated_defs_are_definitions() {
        let source = "class Base:\n    pass\n\n@wrap\nasync def fetch():\n    pass\n";
        assert_eq!(names_of(source, OccurrenceKind::Definition), vec!["Base", "fetch"]);
        assert_eq!(names_of(source, OccurrenceKind::Reference), vec!["wrap"]);
    }

    #[test]
    fn member_call_records_attribute_and_receiver() {
        let source = "obj.method(arg)\n";
        assert_eq!(names_of(source, OccurrenceKind::Call), vec!["method"]);
        assert_eq!(names_of(source, OccurrenceKind::Reference), vec!["obj", "arg"]);
    }

    #[test]
    fn callee_is_not_also_a_reference() {
        let source = "result = compute(x)\n";
        assert_eq!(names_of(source, OccurrenceKind::Call), vec!["compute"]);
        assert_eq!(names_of(source, OccurrenceKind::Reference), vec!["result", "x"]);
    }

    #[test]
    fn indirect_call_targets_emit_no_call() {
        let source = "handlers[0]()\nmake()()\n";
        assert_eq!(names_of(source, OccurrenceKind::Call), vec!["make"]);
        assert_eq!(names_of(source, OccurrenceKind::Reference), vec!["handlers"]);
    }

    #[test]
    fn imports_use_original_dotted_names() {
        let source = "import os.path as p, sys\nfrom collections import OrderedDict as OD, deque\n";
        assert_eq!(
            names_of(source, OccurrenceKind::Import),
            vec!["os.path", "sys", "OrderedDict", "deque"]
        );
        assert!(names_of(source, OccurrenceKind::Reference).is_empty());
    }

    #[test]
    fn relative_import_without_module_emits_nothing() {
        assert!(events("from . import sibling\n").is_empty());
        assert_eq!(names_of("from .pkg import helper\n", OccurrenceKind::Import), vec!["helper"]);
    }

    #[test]
    fn wildcard_import_emits_nothing() {
        assert!(events("from os import *\n").is_empty());
    }

    #[test]
    fn parameters_are_not_references_but_defaults_and_annotations_are() {
        let source = "def f(a, b: Config = DEFAULT, *args, **kwargs) -> Result:\n    return a\n";
        assert_eq!(
            names_of(source, OccurrenceKind::Reference),
            vec!["Config", "DEFAULT", "Result", "a"]
        );
    }

    #[test]
    fn keyword_names_and_attributes_are_skipped() {
        let source = "build(name=value)\nx = self.config.path\n";
        assert_eq!(names_of(source, OccurrenceKind::Reference), vec!["value", "x", "self"]);
    }

    #[test]
    fn global_del_and_except_alias_are_skipped() {
        let source = "\
def f():
    global counter
    del cache
    try:
        pass
    except ValueError as err:
        pass
";
        assert_eq!(names_of(source, OccurrenceKind::Reference), vec!["ValueError"]);
    }

    #[test]
    fn with_alias_is_a_write() {
        let source = "with open(path) as handle:\n    pass\n";
        assert_eq!(names_of(source, OccurrenceKind::Reference), vec!["path", "handle"]);
    }

    #[test]
    fn type_parameter_declarations_are_skipped() {
        let source = "def f[T](x: T) -> T:\n    return x\n";
        assert_eq!(names_of(source, OccurrenceKind::Reference), vec!["T", "T", "x"]);

        let bounded = "class Box[K: Hashable](Base):\n    pass\n";
        assert_eq!(names_of(bounded, OccurrenceKind::Reference), vec!["Hashable", "Base"]);
        assert_eq!(names_of(bounded, OccurrenceKind::Definition), vec!["Box"]);
    }

    #[test]
    fn match_captures_and_keyword_keys_are_skipped() {
        let source = "\
match command:
    case [x, y, *rest]:
        pass
    case Point(x=0, y=limit) as p if p.ok:
        pass
    case Color.RED | other:
        pass
";
        assert_eq!(
            names_of(source, OccurrenceKind::Reference),
            vec!["command", "Point", "p", "Color"]
        );
    }

    #[test]
    fn syntax_error_fails_the_unit() {
        let err = parse_unit(Path::new("bad.py"), "def broken(:\n    pass\n").unwrap_err();
        assert!(matches!(err, Error::ParseFailed { .. }));
    }
}
