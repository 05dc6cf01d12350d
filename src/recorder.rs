//! Turns identifier events into immutable occurrences with context lines.

use crate::types::{Occurrence, UnitOccurrences};
use crate::visitor::IdentifierEvent;

/// Record every event of one unit as an occurrence.
///
/// The source is split into lines once; each occurrence's context is the
/// full trimmed line holding its token, which is also what dependency
/// inference matches against. An event past the end of the source gets an
/// empty context.
pub fn record(unit_id: &str, source: &str, events: Vec<IdentifierEvent>) -> UnitOccurrences {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut recorded = UnitOccurrences::new(unit_id);

    for event in events {
        let context = line_at(&lines, event.line);
        let occurrence = Occurrence::new(unit_id, event.line, event.column, event.kind, context);
        recorded.push(&event.name, occurrence);
    }

    return recorded;
}

/// One-based line lookup.
fn line_at<'a>(lines: &[&'a str], line: u32) -> &'a str {
    let idx = usize::try_from(line).unwrap_or(0).saturating_sub(1);
    return lines.get(idx).copied().unwrap_or("");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OccurrenceKind;

    fn event(name: &str, kind: OccurrenceKind, line: u32, column: u32) -> IdentifierEvent {
        return IdentifierEvent {
            column,
            kind,
            line,
            name: name.to_string(),
        };
    }

    #[test]
    fn context_is_full_trimmed_line() {
        let source = "def outer():\n    return helper(1)\r\n";
        let recorded = record(
            "pkg/mod.py",
            source,
            vec![event("helper", OccurrenceKind::Call, 2, 11)],
        );

        let (symbol, occ) = recorded.iter().next().unwrap();
        assert_eq!(symbol, "helper");
        assert_eq!(occ.context_line(), "return helper(1)");
        assert_eq!(occ.unit_id(), "pkg/mod.py");
        assert_eq!((occ.line(), occ.column()), (2, 11));
    }

    #[test]
    fn preserves_event_order() {
        let recorded = record(
            "a.py",
            "x = y\n",
            vec![
                event("x", OccurrenceKind::Reference, 1, 0),
                event("y", OccurrenceKind::Reference, 1, 4),
            ],
        );
        let symbols: Vec<&str> = recorded.iter().map(|(s, _)| return s).collect();
        assert_eq!(symbols, vec!["x", "y"]);
    }

    #[test]
    fn line_past_end_has_empty_context() {
        let recorded = record("a.py", "x\n", vec![event("ghost", OccurrenceKind::Reference, 9, 0)]);
        let (_, occ) = recorded.iter().next().unwrap();
        assert_eq!(occ.context_line(), "");
    }
}
