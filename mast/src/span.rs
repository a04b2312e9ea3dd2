//! Source locations for textual expressions

use pest::error::{Error, InputLocation, LineColLocation};
use pest::RuleType;

/// Byte range plus the 1-based line and column where it starts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn from_pest_span(span: pest::Span) -> Self {
        let (line, col) = span.start_pos().line_col();
        Self {
            start: span.start(),
            end: span.end(),
            line,
            col,
        }
    }

    /// Location a grammar error points at. A position error yields an empty range.
    pub fn from_pest_error<R: RuleType>(error: &Error<R>) -> Self {
        let (line, col) = match error.line_col {
            LineColLocation::Pos(position) | LineColLocation::Span(position, _) => position,
        };
        let (start, end) = match &error.location {
            InputLocation::Pos(offset) => (*offset, *offset),
            InputLocation::Span((start, end)) => (*start, *end),
        };
        Self {
            start,
            end,
            line,
            col,
        }
    }
}
