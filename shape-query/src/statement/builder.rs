//! Fluent construction of statements.
//!
//! Every constraint is given in the pattern string syntax. The first string
//! that fails to parse, or a constraint that does not fit the declaration
//! kind, is kept and reported by [`StatementBuilder::build`].

use super::{Declaration, DeclarationKind, Negatable, Relation, Statement};
use crate::glob::Glob;
use crate::model::Modifier;
use crate::pattern::{NamePattern, PatternError, StringPattern, TypePattern};
use crate::recipe::RecipeError;

/// Builder for [`Statement`].
///
/// ```
/// use shape_query::StatementBuilder;
///
/// let statement = StatementBuilder::class("*")
///     .define("x")
///     .directly_extends("java.lang.Object")
///     .build()
///     .unwrap();
/// assert_eq!(statement.defined_variable(), Some("x"));
/// ```
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    statement: Statement,
    error: Option<RecipeError>,
}

impl StatementBuilder {
    fn with_kind(kind: DeclarationKind, name: &str) -> Self {
        let mut error = None;
        let declaration = if kind.is_type() {
            Declaration::Type {
                name: record(&mut error, "name", name.parse()).unwrap_or_else(NamePattern::any),
                extends: None,
                implements: Vec::new(),
            }
        } else {
            let name = record(&mut error, "name", name.parse()).unwrap_or(StringPattern::Any);
            if kind == DeclarationKind::Method {
                Declaration::Method {
                    name,
                    parameters: None,
                    return_type: None,
                    throws: None,
                }
            } else {
                Declaration::Field {
                    name,
                    field_type: None,
                }
            }
        };
        Self {
            statement: Statement {
                kind,
                declaration,
                annotations: Vec::new(),
                modifiers: Vec::new(),
                uses: Vec::new(),
                used_by: Vec::new(),
                inherited: None,
                defines: None,
                is_return: false,
                negated: false,
                children: Vec::new(),
            },
            error,
        }
    }

    /// Start a statement of `kind` whose name matches `name`.
    #[must_use]
    pub fn new(kind: DeclarationKind, name: &str) -> Self {
        Self::with_kind(kind, name)
    }

    /// `type name`: any type declaration.
    #[must_use]
    pub fn any_type(name: &str) -> Self {
        Self::with_kind(DeclarationKind::Type, name)
    }

    /// `class name`
    #[must_use]
    pub fn class(name: &str) -> Self {
        Self::with_kind(DeclarationKind::Class, name)
    }

    /// `interface name`
    #[must_use]
    pub fn interface(name: &str) -> Self {
        Self::with_kind(DeclarationKind::Interface, name)
    }

    /// `enum name`
    #[must_use]
    pub fn enumeration(name: &str) -> Self {
        Self::with_kind(DeclarationKind::Enum, name)
    }

    /// `@interface name`
    #[must_use]
    pub fn annotation_type(name: &str) -> Self {
        Self::with_kind(DeclarationKind::Annotation, name)
    }

    /// `method name`
    #[must_use]
    pub fn method(name: &str) -> Self {
        Self::with_kind(DeclarationKind::Method, name)
    }

    /// `field name`
    #[must_use]
    pub fn field(name: &str) -> Self {
        Self::with_kind(DeclarationKind::Field, name)
    }

    /// Bind matches of this statement to `%variable`.
    #[must_use]
    pub fn define(mut self, variable: &str) -> Self {
        self.statement.defines = Some(variable.trim_start_matches('%').to_string());
        self
    }

    /// Mark the statement as a return node (`^`).
    #[must_use]
    pub fn returned(mut self) -> Self {
        self.statement.is_return = true;
        self
    }

    /// Invert the statement's constraints (`!`).
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.statement.negated = true;
        self
    }

    fn type_pattern(&mut self, what: &'static str, text: &str) -> Option<TypePattern> {
        record(&mut self.error, what, text.parse())
    }

    fn type_list(&mut self, what: &'static str, text: &str) -> Option<Vec<TypePattern>> {
        record(&mut self.error, what, TypePattern::parse_list(text))
    }

    fn misplaced(&mut self, constraint: &'static str) {
        if self.error.is_none() {
            self.error = Some(RecipeError::Misplaced {
                constraint,
                kind: self.statement.kind,
            });
        }
    }

    fn set_extends(mut self, text: &str, directly: bool) -> Self {
        let Some(pattern) = self.type_pattern("extends", text) else {
            return self;
        };
        if let Declaration::Type { extends, .. } = &mut self.statement.declaration {
            *extends = Some(Relation { pattern, directly });
        } else {
            self.misplaced("extends");
        }
        self
    }

    fn add_implements(mut self, text: &str, directly: bool) -> Self {
        let Some(pattern) = self.type_pattern("implements", text) else {
            return self;
        };
        if let Declaration::Type { implements, .. } = &mut self.statement.declaration {
            implements.push(Relation { pattern, directly });
        } else {
            self.misplaced("implements");
        }
        self
    }

    /// The superclass chain contains a type matching `pattern`.
    #[must_use]
    pub fn extends(self, pattern: &str) -> Self {
        self.set_extends(pattern, false)
    }

    /// The declared superclass matches `pattern`.
    #[must_use]
    pub fn directly_extends(self, pattern: &str) -> Self {
        self.set_extends(pattern, true)
    }

    /// Some interface, declared or inherited, matches `pattern`.
    #[must_use]
    pub fn implements(self, pattern: &str) -> Self {
        self.add_implements(pattern, false)
    }

    /// A declared interface matches `pattern`.
    #[must_use]
    pub fn directly_implements(self, pattern: &str) -> Self {
        self.add_implements(pattern, true)
    }

    /// Parameter list glob, e.g. `"int, **"`. An empty string requires no
    /// parameters.
    #[must_use]
    pub fn parameters(mut self, list: &str) -> Self {
        let Some(list) = self.type_list("parameters", list) else {
            return self;
        };
        if let Declaration::Method { parameters, .. } = &mut self.statement.declaration {
            *parameters = Some(Glob::new(list));
        } else {
            self.misplaced("parameters");
        }
        self
    }

    /// Return type pattern.
    #[must_use]
    pub fn returns(mut self, pattern: &str) -> Self {
        let Some(pattern) = self.type_pattern("return type", pattern) else {
            return self;
        };
        if let Declaration::Method { return_type, .. } = &mut self.statement.declaration {
            *return_type = Some(pattern);
        } else {
            self.misplaced("return type");
        }
        self
    }

    /// Thrown type patterns, each of which must match some thrown type. An
    /// empty string requires that nothing is thrown.
    #[must_use]
    pub fn throws(mut self, list: &str) -> Self {
        let Some(list) = self.type_list("throws", list) else {
            return self;
        };
        if let Declaration::Method { throws, .. } = &mut self.statement.declaration {
            *throws = Some(list);
        } else {
            self.misplaced("throws");
        }
        self
    }

    /// Field type pattern.
    #[must_use]
    pub fn field_type(mut self, pattern: &str) -> Self {
        let Some(pattern) = self.type_pattern("field type", pattern) else {
            return self;
        };
        if let Declaration::Field { field_type, .. } = &mut self.statement.declaration {
            *field_type = Some(pattern);
        } else {
            self.misplaced("field type");
        }
        self
    }

    fn add_annotation(mut self, text: &str, negated: bool) -> Self {
        let text = text.trim().trim_start_matches('@');
        if let Some(value) = self.type_pattern("annotation", text) {
            self.statement.annotations.push(Negatable { value, negated });
        }
        self
    }

    /// Some annotation matches `pattern`.
    #[must_use]
    pub fn annotation(self, pattern: &str) -> Self {
        self.add_annotation(pattern, false)
    }

    /// No annotation matches `pattern`.
    #[must_use]
    pub fn without_annotation(self, pattern: &str) -> Self {
        self.add_annotation(pattern, true)
    }

    fn add_modifier(mut self, keyword: &str, negated: bool) -> Self {
        if let Some(value) = record(&mut self.error, "modifier", keyword.parse::<Modifier>()) {
            self.statement.modifiers.push(Negatable { value, negated });
        }
        self
    }

    /// The element carries `modifier`.
    #[must_use]
    pub fn modifier(self, modifier: &str) -> Self {
        self.add_modifier(modifier, false)
    }

    /// The element does not carry `modifier`.
    #[must_use]
    pub fn without_modifier(self, modifier: &str) -> Self {
        self.add_modifier(modifier, true)
    }

    fn add_usage(mut self, text: &str, directly: bool, inverse: bool) -> Self {
        let what = if inverse { "usedby" } else { "uses" };
        if let Some(pattern) = self.type_pattern(what, text) {
            let relation = Relation { pattern, directly };
            if inverse {
                self.statement.used_by.push(relation);
            } else {
                self.statement.uses.push(relation);
            }
        }
        self
    }

    /// The element uses, directly or transitively, something matching `pattern`.
    #[must_use]
    pub fn uses(self, pattern: &str) -> Self {
        self.add_usage(pattern, false, false)
    }

    /// The element directly uses something matching `pattern`.
    #[must_use]
    pub fn directly_uses(self, pattern: &str) -> Self {
        self.add_usage(pattern, true, false)
    }

    /// Something matching `pattern` uses the element, directly or transitively.
    #[must_use]
    pub fn used_by(self, pattern: &str) -> Self {
        self.add_usage(pattern, false, true)
    }

    /// Something matching `pattern` directly uses the element.
    #[must_use]
    pub fn directly_used_by(self, pattern: &str) -> Self {
        self.add_usage(pattern, true, true)
    }

    /// Require the member to be inherited (`true`) or declared (`false`).
    #[must_use]
    pub fn inherited(mut self, inherited: bool) -> Self {
        self.statement.inherited = Some(inherited);
        self
    }

    /// Nest a statement that some member of the element must satisfy.
    #[must_use]
    pub fn child(mut self, child: StatementBuilder) -> Self {
        match child.build() {
            Ok(statement) => self.statement.children.push(statement),
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
            }
        }
        self
    }

    /// Nest an already built statement.
    #[must_use]
    pub fn child_statement(mut self, child: Statement) -> Self {
        self.statement.children.push(child);
        self
    }

    /// Finish the statement.
    ///
    /// # Errors
    ///
    /// Returns the first recorded error: a pattern that failed to parse or a
    /// constraint that does not apply to the declaration kind.
    pub fn build(self) -> Result<Statement, RecipeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.statement),
        }
    }
}

/// Keep the first error, hand back the value otherwise.
fn record<T>(
    slot: &mut Option<RecipeError>,
    what: &'static str,
    result: Result<T, PatternError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(source) => {
            if slot.is_none() {
                *slot = Some(RecipeError::Pattern { what, source });
            }
            None
        }
    }
}
