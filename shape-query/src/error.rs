//! Positioned syntax errors with pointer rendering.

use std::fmt::Write as _;

/// A syntax error in recipe or document text.
///
/// Line and column are 1-indexed. [`render`](Self::render) prints the
/// offending line with a caret under the column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {column}: {message}")]
pub struct SyntaxError {
    /// 1-indexed line
    pub line: usize,
    /// 1-indexed column
    pub column: usize,
    /// What went wrong
    pub message: String,
    /// The text of the offending line
    pub source_line: String,
}

impl SyntaxError {
    /// Create an error at `line`/`column` of `source_line`.
    pub fn new(
        line: usize,
        column: usize,
        message: impl Into<String>,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            line,
            column,
            message: message.into(),
            source_line: source_line.into(),
        }
    }

    /// Locate `line`/`column` in a whole text and keep the matching line.
    pub fn in_text(text: &str, line: usize, column: usize, message: impl Into<String>) -> Self {
        let source_line = text.lines().nth(line.saturating_sub(1)).unwrap_or_default();
        Self::new(line, column, message, source_line)
    }

    /// Render the error with a pointer to the offending character:
    ///
    /// ```text
    /// error: expected '>', found end of pattern
    ///  --> 3:16
    ///   |
    /// 3 |   extends: List<
    ///   |                ^
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let number = self.line.to_string();
        let gutter = " ".repeat(number.len());
        // tabs keep their width so the caret stays aligned
        let padding: String = self
            .source_line
            .chars()
            .take(self.column.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();

        let mut out = String::new();
        let _ = writeln!(out, "error: {}", self.message);
        let _ = writeln!(out, "{gutter}--> {}:{}", self.line, self.column);
        let _ = writeln!(out, "{gutter} |");
        let _ = writeln!(out, "{number} | {}", self.source_line);
        let _ = write!(out, "{gutter} | {padding}^");
        out
    }
}
