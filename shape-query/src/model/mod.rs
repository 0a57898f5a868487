//! Element model adapter.
//!
//! The engine never inspects a host language's syntax trees. Everything it
//! needs to know about an element comes through [`ElementModel`], which hands
//! out a closed [`ElementShape`] per element plus the enclosing, usage and
//! type-resolution relations.

mod memory;

pub use memory::{MemoryElement, MemoryModel, ModelError};

use crate::pattern::{PatternError, parser::Parser};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// Reference to a type as written in a declaration, e.g. `java.util.List<a.B>[]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Qualified name, segments separated by `.`
    pub name: String,
    /// Type arguments in order
    pub arguments: Vec<TypeRef>,
    /// Number of array dimensions
    pub dimensions: usize,
}

impl TypeRef {
    /// A plain reference without type arguments or array dimensions.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            dimensions: 0,
        }
    }

    /// Add a type argument.
    #[must_use]
    pub fn with_argument(mut self, argument: TypeRef) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Set the number of array dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// The last name segment.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl FromStr for TypeRef {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s);
        let type_ref = parser.type_ref()?;
        parser.end()?;
        Ok(type_ref)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.arguments.is_empty() {
            let arguments: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", arguments.join(", "))?;
        }
        for _ in 0..self.dimensions {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// Declaration modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Abstract,
    Default,
    Static,
    Final,
    Transient,
    Volatile,
    Synchronized,
    Native,
    Strictfp,
}

impl Modifier {
    /// The keyword as written in source.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
            Self::Abstract => "abstract",
            Self::Default => "default",
            Self::Static => "static",
            Self::Final => "final",
            Self::Transient => "transient",
            Self::Volatile => "volatile",
            Self::Synchronized => "synchronized",
            Self::Native => "native",
            Self::Strictfp => "strictfp",
        }
    }
}

impl FromStr for Modifier {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "public" => Self::Public,
            "protected" => Self::Protected,
            "private" => Self::Private,
            "abstract" => Self::Abstract,
            "default" => Self::Default,
            "static" => Self::Static,
            "final" => Self::Final,
            "transient" => Self::Transient,
            "volatile" => Self::Volatile,
            "synchronized" => Self::Synchronized,
            "native" => Self::Native,
            "strictfp" => Self::Strictfp,
            other => {
                return Err(PatternError::new(1, format!("unknown modifier '{other}'")));
            }
        })
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Kind of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `class`
    Class,
    /// `interface`
    Interface,
    /// `enum`
    Enum,
    /// `@interface`
    Annotation,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Interface => write!(f, "interface"),
            Self::Enum => write!(f, "enum"),
            Self::Annotation => write!(f, "@interface"),
        }
    }
}

/// Shape of a type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeShape {
    /// Declaration kind
    pub kind: TypeKind,
    /// Qualified name
    pub name: String,
    /// Declared modifiers
    pub modifiers: Vec<Modifier>,
    /// Annotation types
    pub annotations: Vec<TypeRef>,
    /// Declared superclass
    pub superclass: Option<TypeRef>,
    /// Directly implemented (or, for interfaces, extended) interfaces
    pub interfaces: Vec<TypeRef>,
}

impl TypeShape {
    /// A type with no modifiers, annotations or supertypes.
    pub fn new(kind: TypeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            modifiers: Vec::new(),
            annotations: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
        }
    }

    /// Set the superclass.
    #[must_use]
    pub fn extends(mut self, superclass: impl Into<TypeRef>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Add an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: impl Into<TypeRef>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Add a modifier.
    #[must_use]
    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Add an annotation.
    #[must_use]
    pub fn annotation(mut self, annotation: impl Into<TypeRef>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// The type as a reference.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::named(self.name.clone())
    }
}

/// Shape of a method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MethodShape {
    pub name: String,
    pub modifiers: Vec<Modifier>,
    pub annotations: Vec<TypeRef>,
    pub return_type: TypeRef,
    pub parameters: Vec<TypeRef>,
    pub throws: Vec<TypeRef>,
}

impl MethodShape {
    /// A `void` method without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: Vec::new(),
            annotations: Vec::new(),
            return_type: TypeRef::named("void"),
            parameters: Vec::new(),
            throws: Vec::new(),
        }
    }

    /// Set the return type.
    #[must_use]
    pub fn returns(mut self, return_type: impl Into<TypeRef>) -> Self {
        self.return_type = return_type.into();
        self
    }

    /// Add a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: impl Into<TypeRef>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    /// Add a thrown type.
    #[must_use]
    pub fn throws(mut self, thrown: impl Into<TypeRef>) -> Self {
        self.throws.push(thrown.into());
        self
    }

    /// Add a modifier.
    #[must_use]
    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Add an annotation.
    #[must_use]
    pub fn annotation(mut self, annotation: impl Into<TypeRef>) -> Self {
        self.annotations.push(annotation.into());
        self
    }
}

/// Shape of a field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct FieldShape {
    pub name: String,
    pub modifiers: Vec<Modifier>,
    pub annotations: Vec<TypeRef>,
    pub field_type: TypeRef,
}

impl FieldShape {
    /// A field of the given type.
    pub fn new(name: impl Into<String>, field_type: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            modifiers: Vec::new(),
            annotations: Vec::new(),
            field_type: field_type.into(),
        }
    }

    /// Add a modifier.
    #[must_use]
    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Add an annotation.
    #[must_use]
    pub fn annotation(mut self, annotation: impl Into<TypeRef>) -> Self {
        self.annotations.push(annotation.into());
        self
    }
}

/// Closed set of element shapes the engine dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementShape {
    /// Class, interface, enum or annotation type
    Type(TypeShape),
    /// Method or constructor
    Method(MethodShape),
    /// Field or enum constant
    Field(FieldShape),
    /// Anything the adapter cannot classify; never matches a statement
    Other,
}

impl ElementShape {
    /// Modifiers of a declaration, empty for `Other`.
    #[must_use]
    pub fn modifiers(&self) -> &[Modifier] {
        match self {
            Self::Type(t) => &t.modifiers,
            Self::Method(m) => &m.modifiers,
            Self::Field(f) => &f.modifiers,
            Self::Other => &[],
        }
    }

    /// Annotations of a declaration, empty for `Other`.
    #[must_use]
    pub fn annotations(&self) -> &[TypeRef] {
        match self {
            Self::Type(t) => &t.annotations,
            Self::Method(m) => &m.annotations,
            Self::Field(f) => &f.annotations,
            Self::Other => &[],
        }
    }

    /// Whether the element can contain other declarations.
    #[must_use]
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type(_))
    }
}

/// Host model adapter.
///
/// Element handles are cheap to clone and compared by identity.
pub trait ElementModel {
    /// Opaque element handle.
    type Element: Clone + Eq + Hash + fmt::Debug;

    /// Classify an element.
    fn shape(&self, element: &Self::Element) -> ElementShape;

    /// The directly enclosing element, `None` for top-level types.
    fn enclosing(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Elements the element directly uses.
    fn uses(&self, element: &Self::Element) -> Vec<Self::Element>;

    /// Elements that directly use the element.
    fn used_by(&self, element: &Self::Element) -> Vec<Self::Element>;

    /// Whether a member is inherited rather than declared.
    fn is_inherited(&self, element: &Self::Element) -> bool;

    /// Find the element a type reference names.
    fn resolve(&self, type_ref: &TypeRef) -> Option<Self::Element>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_parse_and_display() {
        let parsed: TypeRef = "java.util.Map<java.lang.String, a.B[]>[][]".parse().unwrap();
        assert_eq!(parsed.name, "java.util.Map");
        assert_eq!(parsed.dimensions, 2);
        assert_eq!(parsed.arguments[1], TypeRef::named("a.B").with_dimensions(1));
        assert_eq!(parsed.simple_name(), "Map");
        assert_eq!(
            parsed.to_string(),
            "java.util.Map<java.lang.String, a.B[]>[][]"
        );
    }

    #[test]
    fn test_type_ref_rejects_wildcards() {
        let err = "java.*.List".parse::<TypeRef>().unwrap_err();
        assert_eq!(err.column, 6);
    }

    #[test]
    fn test_modifier_keywords() {
        assert_eq!("static".parse::<Modifier>().unwrap(), Modifier::Static);
        assert_eq!(Modifier::Synchronized.to_string(), "synchronized");
        assert!("sealed".parse::<Modifier>().is_err());
    }

    #[test]
    fn test_shape_accessors() {
        let shape = ElementShape::Field(
            FieldShape::new("count", "int")
                .modifier(Modifier::Private)
                .annotation("javax.inject.Inject"),
        );
        assert_eq!(shape.modifiers(), &[Modifier::Private]);
        assert_eq!(shape.annotations()[0].simple_name(), "Inject");
        assert!(!shape.is_type());
        assert!(ElementShape::Other.annotations().is_empty());
    }
}
