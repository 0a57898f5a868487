//! Hand-written parser for the pattern string syntax.
//!
//! ```text
//! type-pattern := '%' ident
//!               | name-glob ( '<' type-list '>' )? ( '[' ']' )*
//! type-list    := ( type-pattern ( ',' type-pattern )* )?
//! name-glob    := segment ( '.' segment )*
//! segment      := '**' | '/' regex '/' | word
//! word         := ( letter | digit | '_' | '$' | '*' )+
//! ```
//!
//! A lone `*` is any single type and a lone `**` is any number of types.

use super::{NamePattern, NameSegment, PatternError, StringPattern, TypePattern};
use crate::glob::Glob;
use crate::model::TypeRef;

pub(crate) struct Parser {
    chars: Vec<char>,
    pos: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl Parser {
    pub(crate) fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> PatternError {
        PatternError::new(self.pos + 1, message)
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(c) => format!("'{c}'"),
            None => "end of pattern".to_string(),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), PatternError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{expected}', found {}",
                self.describe_current()
            )))
        }
    }

    /// Fail unless only whitespace is left.
    pub(crate) fn end(&mut self) -> Result<(), PatternError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected {}", self.describe_current())))
        }
    }

    fn identifier(&mut self) -> Result<String, PatternError> {
        let start = self.pos;
        while self.peek().is_some_and(is_word_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!(
                "expected an identifier, found {}",
                self.describe_current()
            )));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn regex(&mut self) -> Result<StringPattern, PatternError> {
        let start = self.pos;
        self.expect('/')?;
        let mut source = String::new();
        loop {
            match self.peek() {
                None => {
                    self.pos = start;
                    return Err(self.error("unterminated regular expression"));
                }
                Some('/') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') if self.peek_at(1) == Some('/') => {
                    source.push('/');
                    self.pos += 2;
                }
                Some(c) => {
                    source.push(c);
                    self.pos += 1;
                }
            }
        }
        StringPattern::regex(&source).map_err(|message| PatternError::new(start + 1, message))
    }

    /// A member name or one name segment.
    pub(crate) fn string_pattern(&mut self) -> Result<StringPattern, PatternError> {
        self.skip_whitespace();
        if self.peek() == Some('/') {
            return self.regex();
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| is_word_char(c) || c == '*') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!(
                "expected a name, found {}",
                self.describe_current()
            )));
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        StringPattern::wildcard(&word).map_err(|message| PatternError::new(start + 1, message))
    }

    fn name_segment(&mut self) -> Result<NameSegment, PatternError> {
        if self.peek() == Some('*')
            && self.peek_at(1) == Some('*')
            && !self.peek_at(2).is_some_and(|c| is_word_char(c) || c == '*')
        {
            self.pos += 2;
            return Ok(NameSegment::All);
        }
        Ok(NameSegment::Segment(self.string_pattern()?))
    }

    pub(crate) fn name_pattern(&mut self) -> Result<NamePattern, PatternError> {
        self.skip_whitespace();
        let mut segments = vec![self.name_segment()?];
        while self.eat('.') {
            segments.push(self.name_segment()?);
        }
        Ok(NamePattern::new(segments))
    }

    pub(crate) fn type_pattern(&mut self) -> Result<TypePattern, PatternError> {
        self.skip_whitespace();
        if self.eat('%') {
            return Ok(TypePattern::Variable(self.identifier()?));
        }

        let name = self.name_pattern()?;
        let arguments = if self.eat('<') {
            let list = self.type_list()?;
            self.skip_whitespace();
            self.expect('>')?;
            Some(Glob::new(list))
        } else {
            None
        };
        let mut dimensions = 0;
        while self.eat('[') {
            self.expect(']')?;
            dimensions += 1;
        }

        if arguments.is_none() && dimensions == 0 {
            match name.segments() {
                [NameSegment::Segment(StringPattern::Any)] => return Ok(TypePattern::Any),
                [NameSegment::All] => return Ok(TypePattern::All),
                _ => {}
            }
        }
        Ok(TypePattern::Named {
            name,
            arguments,
            dimensions,
        })
    }

    /// Comma separated type patterns; empty when the list is closed right away.
    pub(crate) fn type_list(&mut self) -> Result<Vec<TypePattern>, PatternError> {
        self.skip_whitespace();
        let mut list = Vec::new();
        if matches!(self.peek(), None | Some('>' | ')')) {
            return Ok(list);
        }
        list.push(self.type_pattern()?);
        loop {
            self.skip_whitespace();
            if !self.eat(',') {
                break;
            }
            list.push(self.type_pattern()?);
        }
        Ok(list)
    }

    /// A concrete type reference: no wildcards or variables.
    pub(crate) fn type_ref(&mut self) -> Result<TypeRef, PatternError> {
        self.skip_whitespace();
        let mut name = self.identifier()?;
        while self.eat('.') {
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        let mut type_ref = TypeRef::named(name);
        if self.eat('<') {
            loop {
                type_ref.arguments.push(self.type_ref()?);
                self.skip_whitespace();
                if !self.eat(',') {
                    break;
                }
            }
            self.expect('>')?;
        }
        while self.eat('[') {
            self.expect(']')?;
            type_ref.dimensions += 1;
        }
        Ok(type_ref)
    }
}
