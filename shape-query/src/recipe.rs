//! Recipes: validated statement trees.

use crate::error::SyntaxError;
use crate::pattern::PatternError;
use crate::statement::{DeclarationKind, Statement};
use std::collections::HashSet;

/// Errors raised while building a recipe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecipeError {
    /// A pattern string failed to parse
    #[error("invalid {what} pattern at {source}")]
    Pattern {
        /// Which constraint the pattern belongs to
        what: &'static str,
        /// Parse failure
        source: PatternError,
    },

    /// A constraint that the declaration kind does not have
    #[error("{kind} statements cannot constrain the {constraint}")]
    Misplaced {
        /// The constraint
        constraint: &'static str,
        /// The statement's kind
        kind: DeclarationKind,
    },

    /// Two statements define the same variable
    #[error("variable %{0} is defined more than once")]
    VariableRedefined(String),

    /// A named match that no statement defines
    #[error("named match %{0} is not defined by any statement")]
    UnknownNamedMatch(String),

    /// Malformed recipe text
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

/// A structural query: a forest of statements in which every variable is
/// defined at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "crate::statement::document::RecipeDocument")
)]
pub struct Recipe {
    statements: Vec<Statement>,
}

impl Recipe {
    /// Validate and wrap top-level statements.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::VariableRedefined` if two statements anywhere in
    /// the tree define the same variable.
    pub fn new(statements: Vec<Statement>) -> Result<Self, RecipeError> {
        let mut defined = HashSet::new();
        let mut pending: Vec<&Statement> = statements.iter().collect();
        while let Some(statement) = pending.pop() {
            if let Some(variable) = statement.defined_variable() {
                if !defined.insert(variable) {
                    return Err(RecipeError::VariableRedefined(variable.to_string()));
                }
            }
            pending.extend(statement.children());
        }
        Ok(Self { statements })
    }

    /// Top-level statements in order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Every statement, parents before children, in depth-first order.
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        let mut stack: Vec<&Statement> = self.statements.iter().rev().collect();
        std::iter::from_fn(move || {
            let statement = stack.pop()?;
            stack.extend(statement.children().iter().rev());
            Some(statement)
        })
    }

    /// Whether some statement defines `variable`.
    #[must_use]
    pub fn defines(&self, variable: &str) -> bool {
        self.iter()
            .any(|statement| statement.defined_variable() == Some(variable))
    }
}
