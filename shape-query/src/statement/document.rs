//! Serde documents for statements and recipes.
//!
//! Every pattern is written in its string syntax. Relations accept a
//! `directly ` prefix, annotations and modifiers a `!` prefix.

use super::{DeclarationKind, Statement, StatementBuilder};
use crate::recipe::{Recipe, RecipeError};
use serde::Deserialize;

fn default_name() -> String {
    "*".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StatementDocument {
    kind: DeclarationKind,
    #[serde(default = "default_name")]
    name: String,
    #[serde(default)]
    define: Option<String>,
    #[serde(default, rename = "return")]
    returned: bool,
    #[serde(default)]
    negated: bool,
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    implements: Vec<String>,
    #[serde(default)]
    annotations: Vec<String>,
    #[serde(default)]
    modifiers: Vec<String>,
    #[serde(default)]
    uses: Vec<String>,
    #[serde(default, alias = "usedby")]
    used_by: Vec<String>,
    #[serde(default)]
    inherited: Option<bool>,
    #[serde(default)]
    parameters: Option<String>,
    #[serde(default)]
    returns: Option<String>,
    #[serde(default)]
    throws: Option<String>,
    #[serde(default, rename = "type")]
    field_type: Option<String>,
    #[serde(default)]
    children: Vec<StatementDocument>,
}

fn directly(pattern: &str) -> (bool, &str) {
    match pattern.strip_prefix("directly ") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, pattern),
    }
}

impl StatementDocument {
    fn into_builder(self) -> StatementBuilder {
        let mut builder = StatementBuilder::new(self.kind, &self.name);
        if let Some(variable) = &self.define {
            builder = builder.define(variable);
        }
        if self.returned {
            builder = builder.returned();
        }
        if self.negated {
            builder = builder.negated();
        }

        if let Some(extends) = &self.extends {
            builder = match directly(extends) {
                (true, pattern) => builder.directly_extends(pattern),
                (false, pattern) => builder.extends(pattern),
            };
        }
        for implements in &self.implements {
            builder = match directly(implements) {
                (true, pattern) => builder.directly_implements(pattern),
                (false, pattern) => builder.implements(pattern),
            };
        }
        for annotation in &self.annotations {
            builder = match annotation.strip_prefix('!') {
                Some(pattern) => builder.without_annotation(pattern),
                None => builder.annotation(annotation),
            };
        }
        for modifier in &self.modifiers {
            builder = match modifier.strip_prefix('!') {
                Some(keyword) => builder.without_modifier(keyword),
                None => builder.modifier(modifier),
            };
        }
        for uses in &self.uses {
            builder = match directly(uses) {
                (true, pattern) => builder.directly_uses(pattern),
                (false, pattern) => builder.uses(pattern),
            };
        }
        for used_by in &self.used_by {
            builder = match directly(used_by) {
                (true, pattern) => builder.directly_used_by(pattern),
                (false, pattern) => builder.used_by(pattern),
            };
        }
        if let Some(inherited) = self.inherited {
            builder = builder.inherited(inherited);
        }

        if let Some(parameters) = &self.parameters {
            builder = builder.parameters(parameters);
        }
        if let Some(returns) = &self.returns {
            builder = builder.returns(returns);
        }
        if let Some(throws) = &self.throws {
            builder = builder.throws(throws);
        }
        if let Some(field_type) = &self.field_type {
            builder = builder.field_type(field_type);
        }

        for child in self.children {
            builder = builder.child(child.into_builder());
        }
        builder
    }
}

impl TryFrom<StatementDocument> for Statement {
    type Error = RecipeError;

    fn try_from(doc: StatementDocument) -> Result<Self, Self::Error> {
        doc.into_builder().build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RecipeDocument {
    statements: Vec<Statement>,
}

impl TryFrom<RecipeDocument> for Recipe {
    type Error = RecipeError;

    fn try_from(doc: RecipeDocument) -> Result<Self, Self::Error> {
        Recipe::new(doc.statements)
    }
}
