//! Patterns used inside statements.
//!
//! - [`StringPattern`]: a member name or one name segment: `*`, a word with
//!   embedded `*` wildcards, or an anchored `/regex/`
//! - [`NamePattern`]: a glob over the `.`-separated segments of a qualified
//!   name, where `**` spans any number of segments
//! - [`TypePattern`]: a type instance pattern: a `%variable` reference, `*`,
//!   `**`, or a name glob with optional type arguments and array dimensions
//!
//! All of them parse from strings via [`FromStr`](std::str::FromStr) and
//! report failures as [`PatternError`] with a 1-indexed column.

pub(crate) mod parser;

use crate::error::SyntaxError;
use crate::glob::{Glob, GlobItem};
use parser::Parser;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Syntax error inside one pattern string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("column {column}: {message}")]
pub struct PatternError {
    /// 1-indexed column of the offending character
    pub column: usize,
    /// What went wrong
    pub message: String,
}

impl PatternError {
    /// Create a pattern error at `column`.
    pub fn new(column: usize, message: impl Into<String>) -> Self {
        Self {
            column,
            message: message.into(),
        }
    }

    /// Place the error on `line` of a larger source text whose pattern
    /// started at `offset` (0-indexed) on that line.
    #[must_use]
    pub fn into_syntax(self, line: usize, offset: usize, source_line: &str) -> SyntaxError {
        SyntaxError::new(line, offset + self.column, self.message, source_line)
    }
}

/// Matches one name.
#[derive(Debug, Clone)]
pub enum StringPattern {
    /// `*`
    Any,
    /// Literal text
    Exact(String),
    /// A word with `*` wildcards, e.g. `get*`
    Wildcard {
        /// The word as written
        source: String,
        /// Compiled, anchored form
        regex: Regex,
    },
    /// `/regex/`, anchored at both ends
    Regex {
        /// The expression between the slashes
        source: String,
        /// Compiled, anchored form
        regex: Regex,
    },
}

impl StringPattern {
    /// Build a pattern from a word: `*` is any, embedded `*` is a wildcard,
    /// anything else is exact.
    pub(crate) fn wildcard(word: &str) -> Result<Self, String> {
        if word == "*" {
            return Ok(Self::Any);
        }
        if !word.contains('*') {
            return Ok(Self::Exact(word.to_string()));
        }
        let body = word
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^(?:{body})$")).map_err(|e| e.to_string())?;
        Ok(Self::Wildcard {
            source: word.to_string(),
            regex,
        })
    }

    /// Compile an anchored regular expression.
    pub(crate) fn regex(source: &str) -> Result<Self, String> {
        let regex = Regex::new(&format!("^(?:{source})$"))
            .map_err(|e| format!("invalid regular expression: {e}"))?;
        Ok(Self::Regex {
            source: source.to_string(),
            regex,
        })
    }

    /// Whether `name` matches.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(text) => text == name,
            Self::Wildcard { regex, .. } | Self::Regex { regex, .. } => regex.is_match(name),
        }
    }
}

impl PartialEq for StringPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, Self::Any) => true,
            (Self::Exact(a), Self::Exact(b))
            | (Self::Wildcard { source: a, .. }, Self::Wildcard { source: b, .. })
            | (Self::Regex { source: a, .. }, Self::Regex { source: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for StringPattern {}

impl FromStr for StringPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s);
        let pattern = parser.string_pattern()?;
        parser.end()?;
        Ok(pattern)
    }
}

impl fmt::Display for StringPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(text) | Self::Wildcard { source: text, .. } => write!(f, "{text}"),
            Self::Regex { source, .. } => write!(f, "/{}/", source.replace('/', "\\/")),
        }
    }
}

/// One segment of a [`NamePattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSegment {
    /// Exactly one segment
    Segment(StringPattern),
    /// `**`: zero or more segments
    All,
}

impl GlobItem for NameSegment {
    fn matches_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for NameSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment(pattern) => write!(f, "{pattern}"),
            Self::All => write!(f, "**"),
        }
    }
}

/// Glob over the segments of a qualified name, e.g. `java.**.*List`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern(Glob<NameSegment>);

impl NamePattern {
    /// Compile the segments into a glob.
    #[must_use]
    pub fn new(segments: Vec<NameSegment>) -> Self {
        Self(Glob::new(segments))
    }

    /// The pattern that matches every name.
    #[must_use]
    pub fn any() -> Self {
        Self::new(vec![NameSegment::All])
    }

    /// Segments in order.
    #[must_use]
    pub fn segments(&self) -> &[NameSegment] {
        self.0.items()
    }

    /// Whether the qualified `name` matches.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let segments: Vec<&str> = name.split('.').collect();
        self.0
            .test(&segments, |item, segment| match item {
                NameSegment::All => crate::TestResult::Passed,
                NameSegment::Segment(pattern) => pattern.matches(segment).into(),
            })
            .is_passed()
    }
}

impl FromStr for NamePattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s);
        let pattern = parser.name_pattern()?;
        parser.end()?;
        Ok(pattern)
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Pattern over a type instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypePattern {
    /// `%name`: the type bound to a variable
    Variable(String),
    /// `*`: any single type
    Any,
    /// `**`: any number of types inside a list, any type elsewhere
    All,
    /// A name glob with optional type arguments and array dimensions
    Named {
        /// Pattern over the qualified name
        name: NamePattern,
        /// Type argument patterns; `None` accepts any arguments
        arguments: Option<Glob<TypePattern>>,
        /// Required array dimensions
        dimensions: usize,
    },
}

impl TypePattern {
    /// Parse a comma separated list, e.g. a parameter list.
    ///
    /// # Errors
    ///
    /// Returns a `PatternError` pointing at the first offending character.
    pub fn parse_list(s: &str) -> Result<Vec<TypePattern>, PatternError> {
        let mut parser = Parser::new(s);
        let list = parser.type_list()?;
        parser.end()?;
        Ok(list)
    }

    /// Append every variable this pattern references to `out`, skipping
    /// names already present.
    pub fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Self::Variable(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Self::Any | Self::All => {}
            Self::Named { arguments, .. } => {
                for argument in arguments.iter().flat_map(Glob::items) {
                    argument.collect_variables(out);
                }
            }
        }
    }
}

impl GlobItem for TypePattern {
    fn matches_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl FromStr for TypePattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s);
        let pattern = parser.type_pattern()?;
        parser.end()?;
        Ok(pattern)
    }
}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "%{name}"),
            Self::Any => write!(f, "*"),
            Self::All => write!(f, "**"),
            Self::Named {
                name,
                arguments,
                dimensions,
            } => {
                write!(f, "{name}")?;
                if let Some(arguments) = arguments {
                    write!(f, "<{}>", arguments.join(", "))?;
                }
                for _ in 0..*dimensions {
                    write!(f, "[]")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_pattern_kinds() {
        let any: StringPattern = "*".parse().unwrap();
        assert!(any.matches("anything"));

        let exact: StringPattern = "toString".parse().unwrap();
        assert!(exact.matches("toString"));
        assert!(!exact.matches("toStrings"));

        let wildcard: StringPattern = "get*".parse().unwrap();
        assert!(wildcard.matches("get"));
        assert!(wildcard.matches("getName"));
        assert!(!wildcard.matches("isName"));

        let regex: StringPattern = "/(get|is)[A-Z].*/".parse().unwrap();
        assert!(regex.matches("isEmpty"));
        assert!(!regex.matches("xisEmpty"));
        assert_eq!(regex.to_string(), "/(get|is)[A-Z].*/");
    }

    #[test]
    fn test_wildcard_escapes_regex_metacharacters() {
        let pattern: StringPattern = "a$*".parse().unwrap();
        assert!(pattern.matches("a$b"));
        assert!(!pattern.matches("ab"));
    }

    #[test]
    fn test_name_pattern_segments() {
        let pattern: NamePattern = "java.**.List".parse().unwrap();
        assert!(pattern.matches("java.List"));
        assert!(pattern.matches("java.util.List"));
        assert!(pattern.matches("java.util.concurrent.List"));
        assert!(!pattern.matches("javax.util.List"));

        let single: NamePattern = "*.AA".parse().unwrap();
        assert!(single.matches("pkg.AA"));
        assert!(!single.matches("AA"));
        assert!(!single.matches("a.b.AA"));

        assert!(NamePattern::any().matches("Top"));
    }

    #[test]
    fn test_collect_variables_in_order() {
        let pattern: TypePattern = "java.util.Map<%k, java.util.List<%v>, %k>".parse().unwrap();
        let mut variables = vec!["v".to_string()];
        pattern.collect_variables(&mut variables);
        assert_eq!(variables, vec!["v".to_string(), "k".to_string()]);
    }

    #[test]
    fn test_parse_list() {
        let list = TypePattern::parse_list("int, %x, **").unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1], TypePattern::Variable("x".to_string()));
        let err = TypePattern::parse_list("int,, x").unwrap_err();
        assert_eq!(err.column, 5);
    }

    #[test]
    fn test_into_syntax_shifts_column() {
        let err = "List<".parse::<TypePattern>().unwrap_err();
        let syntax = err.into_syntax(3, 10, "  extends: List<");
        assert_eq!(syntax.line, 3);
        assert_eq!(syntax.column, 16);
    }
}
