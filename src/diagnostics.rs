//! Position-aware diagnostics shared by the parser and both translators
//!
//! Locations follow the usual parser conventions: lines are 1-based,
//! columns are 0-based and count characters, not bytes.

use serde::Serialize;
use std::fmt;

/// A point in the formula text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open range of formula text (`end` points just past the last character)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl Location {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Smallest location covering both `self` and `other`
    pub fn to(self, other: Location) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Error classes a translation can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Malformed formula text
    Syntax,
    /// Function name not in the supported set
    UnknownFunction,
    /// Operator token not in the supported set
    UnknownOperator,
    /// Argument count outside the function's bounds
    Arity,
    UnknownIdentifier,
    UnknownProperty,
    /// More than one statement in the formula text
    MultipleTopLevelExpressions,
    /// Valid expression syntax that has no canonical equivalent
    UnsupportedSyntax,
    Internal,
}

impl DiagnosticKind {
    /// True for both flavours of "not a supported operator"
    pub fn is_unknown_operator(self) -> bool {
        matches!(self, Self::UnknownFunction | Self::UnknownOperator)
    }
}

/// A single problem found while translating a formula
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// `None` means the diagnostic applies to the whole input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn syntax(message: impl Into<String>, location: Location) -> Self {
        Self::new(DiagnosticKind::Syntax, message).at(location)
    }

    pub fn unknown_function(name: &str, location: Location) -> Self {
        Self::new(
            DiagnosticKind::UnknownFunction,
            format!("Unknown Function: {}", name),
        )
        .at(location)
    }

    pub fn unknown_operator(op: &str, location: Location) -> Self {
        Self::new(
            DiagnosticKind::UnknownOperator,
            format!("Unknown Operator: {}", op),
        )
        .at(location)
    }

    pub fn unknown_identifier(name: &str, location: Location) -> Self {
        Self::new(
            DiagnosticKind::UnknownIdentifier,
            format!("Unknown Identifier: {}", name),
        )
        .at(location)
    }

    pub fn unknown_property(name: &str, location: Location) -> Self {
        Self::new(
            DiagnosticKind::UnknownProperty,
            format!("Unknown Property: {}", name),
        )
        .at(location)
    }

    pub fn unsupported_syntax(location: Location) -> Self {
        Self::new(DiagnosticKind::UnsupportedSyntax, "Unknown Syntax").at(location)
    }

    pub fn multiple_top_level(location: Location) -> Self {
        Self::new(
            DiagnosticKind::MultipleTopLevelExpressions,
            "only one top-level expression, nesting is allowed",
        )
        .at(location)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} (at {})", self.message, loc.start),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Accumulates diagnostics across sibling subtrees
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn contains_kind(&self, kind: DiagnosticKind) -> bool {
        self.items.iter().any(|d| d.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_to_covers_both() {
        let a = Location::new(Position::new(1, 4), Position::new(1, 6));
        let b = Location::new(Position::new(1, 0), Position::new(1, 2));
        let merged = a.to(b);
        assert_eq!(merged.start, Position::new(1, 0));
        assert_eq!(merged.end, Position::new(1, 6));
    }

    #[test]
    fn test_diagnostic_serializes_without_location() {
        let diag = Diagnostic::new(DiagnosticKind::Syntax, "Empty expression");
        let json = serde_json::to_string(&diag).unwrap();
        assert_eq!(json, r#"{"kind":"syntax","message":"Empty expression"}"#);
    }

    #[test]
    fn test_diagnostic_serializes_location() {
        let loc = Location::new(Position::new(1, 0), Position::new(1, 3));
        let json = serde_json::to_value(Diagnostic::unknown_function("FOO", loc)).unwrap();
        assert_eq!(json["kind"], "unknown_function");
        assert_eq!(json["message"], "Unknown Function: FOO");
        assert_eq!(json["location"]["start"]["line"], 1);
        assert_eq!(json["location"]["end"]["column"], 3);
    }

    #[test]
    fn test_unknown_operator_class() {
        assert!(DiagnosticKind::UnknownFunction.is_unknown_operator());
        assert!(DiagnosticKind::UnknownOperator.is_unknown_operator());
        assert!(!DiagnosticKind::Arity.is_unknown_operator());
    }

    #[test]
    fn test_display_includes_start() {
        let loc = Location::new(Position::new(2, 5), Position::new(2, 9));
        let diag = Diagnostic::unknown_identifier("foo", loc);
        assert_eq!(diag.to_string(), "Unknown Identifier: foo (at 2:5)");
    }
}
