/// Core domain types for codescout occurrences and scan diagnostics.
use serde::{Deserialize, Serialize};

/// A unit that was skipped during a scan, with the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Why the unit contributed no occurrences.
    pub reason: String,
    /// Unit identifier (path relative to the corpus root).
    pub unit_id: String,
}

/// One classified syntactic mention of an identifier.
///
/// Immutable once recorded: fields are only readable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Zero-based byte column of the token.
    column: u32,
    /// Trimmed full source line holding the token.
    context_line: String,
    /// Role of the mention.
    kind: OccurrenceKind,
    /// One-based line of the token.
    line: u32,
    /// Unit the mention was found in.
    unit_id: String,
}

impl Occurrence {
    /// Zero-based byte column of the token.
    pub const fn column(&self) -> u32 {
        return self.column;
    }

    /// Trimmed full source line holding the token.
    pub fn context_line(&self) -> &str {
        return &self.context_line;
    }

    /// Role of the mention.
    pub const fn kind(&self) -> OccurrenceKind {
        return self.kind;
    }

    /// One-based line of the token.
    pub const fn line(&self) -> u32 {
        return self.line;
    }

    /// Build an occurrence. `context_line` is trimmed here so every
    /// constructor path yields the same display form.
    pub fn new(unit_id: &str, line: u32, column: u32, kind: OccurrenceKind, context_line: &str) -> Self {
        return Self {
            column,
            context_line: context_line.trim().to_string(),
            kind,
            line,
            unit_id: unit_id.to_string(),
        };
    }

    /// Unit the mention was found in.
    pub fn unit_id(&self) -> &str {
        return &self.unit_id;
    }
}

/// Role of an identifier mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceKind {
    /// Call target: bare callee name or trailing attribute of a member call.
    Call,
    /// Name of a `def` or `class`.
    Definition,
    /// Name brought in by an `import` or non-empty `from ... import`.
    Import,
    /// Any other read or write of a bare identifier.
    Reference,
}

/// Every occurrence recorded for one unit, in syntactic traversal order,
/// each paired with the symbol name it mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOccurrences {
    /// `(symbol, occurrence)` pairs in traversal order.
    occurrences: Vec<(String, Occurrence)>,
    /// Unit these occurrences came from.
    unit_id: String,
}

impl UnitOccurrences {
    /// True when the unit produced no occurrences.
    pub fn is_empty(&self) -> bool {
        return self.occurrences.is_empty();
    }

    /// Iterate `(symbol, occurrence)` pairs in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Occurrence)> {
        return self.occurrences.iter().map(|(symbol, occ)| return (symbol.as_str(), occ));
    }

    /// Number of occurrences recorded for the unit.
    pub fn len(&self) -> usize {
        return self.occurrences.len();
    }

    /// Start an empty occurrence list for a unit.
    pub fn new(unit_id: &str) -> Self {
        return Self {
            occurrences: Vec::new(),
            unit_id: unit_id.to_string(),
        };
    }

    /// Append one occurrence under `symbol`.
    pub fn push(&mut self, symbol: &str, occurrence: Occurrence) {
        self.occurrences.push((symbol.to_string(), occurrence));
    }

    /// Unit these occurrences came from.
    pub fn unit_id(&self) -> &str {
        return &self.unit_id;
    }
}

impl IntoIterator for UnitOccurrences {
    type IntoIter = std::vec::IntoIter<(String, Occurrence)>;
    type Item = (String, Occurrence);

    fn into_iter(self) -> Self::IntoIter {
        return self.occurrences.into_iter();
    }
}
