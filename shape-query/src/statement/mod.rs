//! Recipe statements.
//!
//! A [`Statement`] is one clause of a recipe: a declaration kind, the
//! constraints an element of that kind has to satisfy, the variable the clause
//! may define, and the nested statements an element's members must satisfy.
//! Statements are built with [`StatementBuilder`] or, with the `serde`
//! feature, deserialized from documents.

mod builder;
#[cfg(feature = "serde")]
pub(crate) mod document;

pub use builder::StatementBuilder;

use crate::matcher::Matcher;
use crate::model::{Modifier, TypeKind};
use crate::pattern::{NamePattern, StringPattern, TypePattern};
use crate::glob::Glob;
use std::fmt;

/// Which declarations a statement applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub enum DeclarationKind {
    /// Any type declaration
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    Type,
    /// `class`
    #[cfg_attr(feature = "serde", serde(rename = "class"))]
    Class,
    /// `interface`
    #[cfg_attr(feature = "serde", serde(rename = "interface"))]
    Interface,
    /// `enum`
    #[cfg_attr(feature = "serde", serde(rename = "enum"))]
    Enum,
    /// `@interface`
    #[cfg_attr(feature = "serde", serde(rename = "@interface"))]
    Annotation,
    /// Method or constructor
    #[cfg_attr(feature = "serde", serde(rename = "method"))]
    Method,
    /// Field
    #[cfg_attr(feature = "serde", serde(rename = "field"))]
    Field,
}

impl DeclarationKind {
    /// Whether the kind is one of the type kinds.
    #[must_use]
    pub fn is_type(self) -> bool {
        !matches!(self, Self::Method | Self::Field)
    }

    /// Whether an element of `kind` is accepted. `Type` accepts every kind.
    #[must_use]
    pub fn accepts(self, kind: TypeKind) -> bool {
        match self {
            Self::Type => true,
            Self::Class => kind == TypeKind::Class,
            Self::Interface => kind == TypeKind::Interface,
            Self::Enum => kind == TypeKind::Enum,
            Self::Annotation => kind == TypeKind::Annotation,
            Self::Method | Self::Field => false,
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Self::Type => "type",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Annotation => "@interface",
            Self::Method => "method",
            Self::Field => "field",
        };
        f.write_str(keyword)
    }
}

/// A constraint that may be negated ("has no ... matching").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negatable<T> {
    /// The constraint
    pub value: T,
    /// Whether the constraint must not hold
    pub negated: bool,
}

impl<T: fmt::Display> fmt::Display for Negatable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        write!(f, "{}", self.value)
    }
}

/// A relation to other types or elements, e.g. `extends` or `uses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Pattern the related type has to match
    pub pattern: TypePattern,
    /// Only the direct relation counts, not its transitive closure
    pub directly: bool,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.directly {
            write!(f, "directly ")?;
        }
        write!(f, "{}", self.pattern)
    }
}

/// Kind specific part of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// Type statements
    Type {
        /// Pattern over the qualified name
        name: NamePattern,
        /// Superclass constraint
        extends: Option<Relation>,
        /// Interface constraints, all of which must hold
        implements: Vec<Relation>,
    },
    /// Method statements
    Method {
        /// Pattern over the simple name
        name: StringPattern,
        /// Parameter list glob; `None` accepts any parameters
        parameters: Option<Glob<TypePattern>>,
        /// Return type constraint
        return_type: Option<TypePattern>,
        /// Thrown types; an empty list requires that nothing is thrown
        throws: Option<Vec<TypePattern>>,
    },
    /// Field statements
    Field {
        /// Pattern over the simple name
        name: StringPattern,
        /// Field type constraint
        field_type: Option<TypePattern>,
    },
}

/// One clause of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "document::StatementDocument"))]
pub struct Statement {
    pub(crate) kind: DeclarationKind,
    pub(crate) declaration: Declaration,
    pub(crate) annotations: Vec<Negatable<TypePattern>>,
    pub(crate) modifiers: Vec<Negatable<Modifier>>,
    pub(crate) uses: Vec<Relation>,
    pub(crate) used_by: Vec<Relation>,
    pub(crate) inherited: Option<bool>,
    pub(crate) defines: Option<String>,
    pub(crate) is_return: bool,
    pub(crate) negated: bool,
    pub(crate) children: Vec<Statement>,
}

impl Statement {
    /// The declaration kind.
    #[must_use]
    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    /// Kind specific constraints.
    #[must_use]
    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    /// The variable this statement binds, if any.
    #[must_use]
    pub fn defined_variable(&self) -> Option<&str> {
        self.defines.as_deref()
    }

    /// Every variable referenced anywhere in the statement's own constraints,
    /// in order of first occurrence. Nested statements are not included.
    #[must_use]
    pub fn referenced_variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        match &self.declaration {
            Declaration::Type {
                extends,
                implements,
                ..
            } => {
                for relation in extends.iter().chain(implements) {
                    relation.pattern.collect_variables(&mut out);
                }
            }
            Declaration::Method {
                parameters,
                return_type,
                throws,
                ..
            } => {
                for parameter in parameters.iter().flat_map(Glob::items) {
                    parameter.collect_variables(&mut out);
                }
                for pattern in return_type.iter().chain(throws.iter().flatten()) {
                    pattern.collect_variables(&mut out);
                }
            }
            Declaration::Field { field_type, .. } => {
                for pattern in field_type {
                    pattern.collect_variables(&mut out);
                }
            }
        }
        for annotation in &self.annotations {
            annotation.value.collect_variables(&mut out);
        }
        for relation in self.uses.iter().chain(&self.used_by) {
            relation.pattern.collect_variables(&mut out);
        }
        out
    }

    /// Whether the statement's matches are part of the recipe's output.
    #[must_use]
    pub fn is_return(&self) -> bool {
        self.is_return
    }

    /// Whether the constraints are inverted. The declaration kind is not.
    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Nested statements.
    #[must_use]
    pub fn children(&self) -> &[Statement] {
        &self.children
    }

    /// Compile the statement into a matcher.
    ///
    /// Compilation is pure: every call yields an equivalent matcher.
    #[must_use]
    pub fn compile(&self) -> Matcher {
        Matcher::from_statement(self)
    }
}

impl fmt::Display for Statement {
    /// Single line summary in recipe notation, without nested statements.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        for annotation in &self.annotations {
            write!(f, "{annotation} ")?;
        }
        for modifier in &self.modifiers {
            write!(f, "{modifier} ")?;
        }
        write!(f, "{} ", self.kind)?;
        if self.is_return {
            write!(f, "^")?;
        }
        if let Some(variable) = &self.defines {
            write!(f, "%{variable}=")?;
        }
        match &self.declaration {
            Declaration::Type {
                name,
                extends,
                implements,
            } => {
                write!(f, "{name}")?;
                if let Some(extends) = extends {
                    write!(f, " extends {extends}")?;
                }
                for implements in implements {
                    write!(f, " implements {implements}")?;
                }
            }
            Declaration::Method {
                name,
                parameters,
                return_type,
                throws,
            } => {
                if let Some(return_type) = return_type {
                    write!(f, "{return_type} ")?;
                }
                write!(f, "{name}")?;
                if let Some(parameters) = parameters {
                    write!(f, "({})", parameters.join(", "))?;
                }
                if let Some(throws) = throws {
                    let list: Vec<String> = throws.iter().map(ToString::to_string).collect();
                    write!(f, " throws ({})", list.join(", "))?;
                }
            }
            Declaration::Field { name, field_type } => {
                if let Some(field_type) = field_type {
                    write!(f, "{field_type} ")?;
                }
                write!(f, "{name}")?;
            }
        }
        for uses in &self.uses {
            write!(f, " uses {uses}")?;
        }
        for used_by in &self.used_by {
            write!(f, " usedby {used_by}")?;
        }
        if let Some(inherited) = self.inherited {
            write!(f, " {}", if inherited { "inherited" } else { "declared" })?;
        }
        Ok(())
    }
}
