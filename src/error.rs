use thiserror::Error;

use crate::types::Path;
use crate::util::{line_spans, source_line};

/// Everything that can go wrong turning text into a value.
///
/// Positions are 1-based lines and 0-based columns. Parsing is never
/// resumed after an error; the whole input must be discarded.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Could not parse {snippet:?} ({line}:{col})")]
    Unrecognised { snippet: String, line: usize, col: usize },

    #[error("Unterminated string literal ({line}:{col})")]
    UnterminatedString { line: usize, col: usize },

    #[error("Expected {expected}, got '{found}' ({line}:{col})")]
    Unexpected { expected: String, found: String, line: usize, col: usize },

    #[error("Ran out of tokens")]
    OutOfTokens,

    #[error("Unsupported {what} ({line}:{col})")]
    Unsupported { what: String, line: usize, col: usize },

    #[error("Table keys must be integers or strings, got {found} ({line}:{col})")]
    InvalidKey { found: String, line: usize, col: usize },

    #[error("Duplicate key {key} ({line}:{col})")]
    DuplicateKey { key: String, line: usize, col: usize },

    #[error("Invalid numeric literal '{text}' ({line}:{col})")]
    InvalidNumber { text: String, line: usize, col: usize },

    #[error("Tables nested deeper than {limit} levels ({line}:{col})")]
    RecursionLimit { limit: usize, line: usize, col: usize },
}

impl ParseError {
    pub fn code(&self) -> u16 {
        match self {
            ParseError::Unrecognised { .. } => 100,
            ParseError::UnterminatedString { .. } => 101,
            ParseError::Unexpected { .. } => 150,
            ParseError::OutOfTokens => 151,
            ParseError::RecursionLimit { .. } => 152,
            ParseError::InvalidNumber { .. } => 153,
            ParseError::Unsupported { .. } => 160,
            ParseError::InvalidKey { .. } => 161,
            ParseError::DuplicateKey { .. } => 162,
        }
    }

    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            ParseError::Unrecognised { line, col, .. }
            | ParseError::UnterminatedString { line, col }
            | ParseError::Unexpected { line, col, .. }
            | ParseError::Unsupported { line, col, .. }
            | ParseError::InvalidKey { line, col, .. }
            | ParseError::DuplicateKey { line, col, .. }
            | ParseError::InvalidNumber { line, col, .. }
            | ParseError::RecursionLimit { line, col, .. } => Some((*line, *col)),
            ParseError::OutOfTokens => None,
        }
    }

    /// Format the error for a human, quoting the offending source line
    /// with a caret under the reported column.
    pub fn render(&self, input: &str) -> String {
        match self.position() {
            Some((lno, col)) => {
                let lines = line_spans(input);
                let gutter = format!("{:<3}| ", lno);
                let ptr_line = format!("{}^", " ".repeat(gutter.len() + col));
                let code_line = format!("{}{}", gutter, source_line(input, &lines, lno));
                format!("[E{}] {}\n{}\n{}\n", self.code(), self, code_line, ptr_line)
            },
            None => {
                format!("[E{}] {}\n", self.code(), self)
            },
        }
    }
}

/// Raised when a value no longer fits the layout it is rendered with.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("no value at {path}")]
    MissingKey { path: Path },

    #[error("expected a table at {path}, found {found}")]
    ExpectedTable { path: Path, found: &'static str },

    #[error("expected a single value at {path}, found a {found}")]
    ExpectedLeaf { path: Path, found: &'static str },

    #[error("{count} entries of {path} have no place in the layout")]
    UnrenderedEntries { path: Path, count: usize },

    #[error("cannot write non-finite number at {path}")]
    NonFinite { path: Path },

    #[error("layout is inconsistent: {0}")]
    Layout(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExtricateError {
    #[error("{path} is used both as a value and as a container")]
    ShapeConflict { path: Path },

    #[error("position {index} of {path} skips past the end of the sequence")]
    IndexGap { path: Path, index: usize },
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_points_at_column() {
        let input = "{\n  a = ?\n}";
        let err = ParseError::Unrecognised { snippet: "?".into(), line: 2, col: 6 };
        let rendered = err.render(input);
        assert_eq!(
            rendered,
            "[E100] Could not parse \"?\" (2:6)\n2  |   a = ?\n           ^\n"
        );
    }

    #[test]
    fn caret_follows_wide_line_numbers() {
        let input = format!("{}{{ @", "\n".repeat(999));
        let err = ParseError::Unrecognised { snippet: "@".into(), line: 1000, col: 2 };
        assert_eq!(
            err.render(&input),
            "[E100] Could not parse \"@\" (1000:2)\n1000| { @\n        ^\n"
        );
    }

    #[test]
    fn render_without_position() {
        assert_eq!(ParseError::OutOfTokens.render("{"), "[E151] Ran out of tokens\n");
    }
}
