//! Stable diagnostic codes with category prefixes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Collaborator data inconsistencies (bad annotations, unknown arcs),
    /// prefixed with `I`.
    Input,
    /// Constraint conflicts and overrides, prefixed with `C`.
    Constraint,
    /// Graph construction and levelisation, prefixed with `G`.
    Graph,
    /// Delay calculation, prefixed with `D`.
    Delay,
    /// Search and reporting, prefixed with `T`.
    Timing,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Input => 'I',
            Category::Constraint => 'C',
            Category::Graph => 'G',
            Category::Delay => 'D',
            Category::Timing => 'T',
        }
    }
}

/// A stable diagnostic code: category prefix plus numeric id.
///
/// The numeric id is the suppression key: external layers suppress
/// diagnostics by number, so ids never change meaning across releases.
/// Displayed as the prefix followed by a zero-padded 3-digit number,
/// e.g. `G101`, `T042`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The stable numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Input.prefix(), 'I');
        assert_eq!(Category::Constraint.prefix(), 'C');
        assert_eq!(Category::Graph.prefix(), 'G');
        assert_eq!(Category::Delay.prefix(), 'D');
        assert_eq!(Category::Timing.prefix(), 'T');
    }

    #[test]
    fn display_format() {
        assert_eq!(
            format!("{}", DiagnosticCode::new(Category::Graph, 101)),
            "G101"
        );
        assert_eq!(
            format!("{}", DiagnosticCode::new(Category::Timing, 7)),
            "T007"
        );
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Category::Delay, 12);
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
