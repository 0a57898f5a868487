//! Compiled statement matchers.
//!
//! A [`Matcher`] is the test a plan node runs against one element. The variant
//! is chosen once, when the statement is compiled, from its declaration kind;
//! the element's [`ElementShape`] is then matched against that variant only.
//! Variable references are handed to a [`Scope`], which knows how the node's
//! variables are bound.

use crate::TestResult;
use crate::glob::Glob;
use crate::model::{ElementModel, ElementShape, FieldShape, MethodShape, Modifier, TypeRef, TypeShape};
use crate::pattern::{NamePattern, StringPattern, TypePattern};
use crate::statement::{Declaration, DeclarationKind, Negatable, Relation, Statement};
use std::collections::{HashSet, VecDeque};

/// Resolves variable references for one plan node.
pub trait Scope<E> {
    /// Verdict for `%variable` standing for `target`. `target` is `None` when
    /// the referenced type could not be resolved to an element.
    fn reference(&mut self, variable: &str, target: Option<&E>) -> TestResult;
}

/// Constraints every declaration kind supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonConstraints {
    annotations: Vec<Negatable<TypePattern>>,
    modifiers: Vec<Negatable<Modifier>>,
    uses: Vec<Relation>,
    used_by: Vec<Relation>,
    inherited: Option<bool>,
}

/// Matcher for type declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMatcher {
    kind: DeclarationKind,
    name: NamePattern,
    extends: Option<Relation>,
    implements: Vec<Relation>,
}

/// Matcher for method declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMatcher {
    name: StringPattern,
    parameters: Option<Glob<TypePattern>>,
    return_type: Option<TypePattern>,
    throws: Option<Vec<TypePattern>>,
}

/// Matcher for field declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatcher {
    name: StringPattern,
    field_type: Option<TypePattern>,
}

/// Declaration-kind specific part of a matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationMatcher {
    /// Type declarations
    Type(TypeMatcher),
    /// Method declarations
    Method(MethodMatcher),
    /// Field declarations
    Field(FieldMatcher),
}

/// The compiled form of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    declaration: DeclarationMatcher,
    common: CommonConstraints,
    negated: bool,
}

impl Matcher {
    pub(crate) fn from_statement(statement: &Statement) -> Self {
        let declaration = match statement.declaration() {
            Declaration::Type {
                name,
                extends,
                implements,
            } => DeclarationMatcher::Type(TypeMatcher {
                kind: statement.kind(),
                name: name.clone(),
                extends: extends.clone(),
                implements: implements.clone(),
            }),
            Declaration::Method {
                name,
                parameters,
                return_type,
                throws,
            } => DeclarationMatcher::Method(MethodMatcher {
                name: name.clone(),
                parameters: parameters.clone(),
                return_type: return_type.clone(),
                throws: throws.clone(),
            }),
            Declaration::Field { name, field_type } => DeclarationMatcher::Field(FieldMatcher {
                name: name.clone(),
                field_type: field_type.clone(),
            }),
        };
        Self {
            declaration,
            common: CommonConstraints {
                annotations: statement.annotations.clone(),
                modifiers: statement.modifiers.clone(),
                uses: statement.uses.clone(),
                used_by: statement.used_by.clone(),
                inherited: statement.inherited,
            },
            negated: statement.is_negated(),
        }
    }

    /// The declaration-kind specific part.
    #[must_use]
    pub fn declaration(&self) -> &DeclarationMatcher {
        &self.declaration
    }

    /// Whether elements of this shape can match at all.
    #[must_use]
    pub fn accepts_shape(&self, shape: &ElementShape) -> bool {
        match (&self.declaration, shape) {
            (DeclarationMatcher::Type(m), ElementShape::Type(t)) => m.kind.accepts(t.kind),
            (DeclarationMatcher::Method(_), ElementShape::Method(_))
            | (DeclarationMatcher::Field(_), ElementShape::Field(_)) => true,
            _ => false,
        }
    }

    /// Test `element`.
    ///
    /// The declaration kind must match; the constraints are then combined with
    /// a conjunction and inverted if the statement is negated.
    pub fn test<M, S>(&self, model: &M, element: &M::Element, scope: &mut S) -> TestResult
    where
        M: ElementModel,
        S: Scope<M::Element>,
    {
        let shape = model.shape(element);
        if !self.accepts_shape(&shape) {
            return TestResult::NotPassed;
        }

        let mut tester = Tester { model, scope };
        let constraints = match (&self.declaration, &shape) {
            (DeclarationMatcher::Type(m), ElementShape::Type(t)) => tester.type_declaration(m, t),
            (DeclarationMatcher::Method(m), ElementShape::Method(s)) => tester.method(m, s),
            (DeclarationMatcher::Field(m), ElementShape::Field(s)) => tester.field(m, s),
            _ => TestResult::NotPassed,
        }
        .and_then(|| tester.common(&self.common, element, &shape));

        if self.negated {
            constraints.negate()
        } else {
            constraints
        }
    }
}

struct Tester<'a, M, S> {
    model: &'a M,
    scope: &'a mut S,
}

impl<M, S> Tester<'_, M, S>
where
    M: ElementModel,
    S: Scope<M::Element>,
{
    fn type_ref(&mut self, pattern: &TypePattern, type_ref: &TypeRef) -> TestResult {
        match pattern {
            TypePattern::Variable(variable) => {
                let target = self.model.resolve(type_ref);
                self.scope.reference(variable, target.as_ref())
            }
            TypePattern::Any | TypePattern::All => TestResult::Passed,
            TypePattern::Named {
                name,
                arguments,
                dimensions,
            } => {
                if *dimensions != type_ref.dimensions || !name.matches(&type_ref.name) {
                    return TestResult::NotPassed;
                }
                match arguments {
                    None => TestResult::Passed,
                    Some(glob) => glob.test(&type_ref.arguments, |p, a| self.type_ref(p, a)),
                }
            }
        }
    }

    fn any_type_ref(&mut self, pattern: &TypePattern, candidates: &[TypeRef]) -> TestResult {
        let mut result = TestResult::NotPassed;
        for candidate in candidates {
            result = result.or(self.type_ref(pattern, candidate));
            if result.is_passed() {
                break;
            }
        }
        result
    }

    /// Test a related element, e.g. one reached through `uses`.
    fn element(&mut self, pattern: &TypePattern, target: &M::Element) -> TestResult {
        match pattern {
            TypePattern::Variable(variable) => return self.scope.reference(variable, Some(target)),
            TypePattern::Any | TypePattern::All => return TestResult::Passed,
            TypePattern::Named { .. } => {}
        }
        match self.model.shape(target) {
            ElementShape::Type(shape) => self.type_ref(pattern, &shape.type_ref()),
            _ => TestResult::NotPassed,
        }
    }

    fn type_shape_of(&self, type_ref: &TypeRef) -> Option<TypeShape> {
        let element = self.model.resolve(type_ref)?;
        match self.model.shape(&element) {
            ElementShape::Type(shape) => Some(shape),
            _ => None,
        }
    }

    fn superclasses(&self, shape: &TypeShape) -> Vec<TypeRef> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = shape.superclass.clone();
        while let Some(superclass) = current {
            if !seen.insert(superclass.name.clone()) {
                break;
            }
            current = self
                .type_shape_of(&superclass)
                .and_then(|shape| shape.superclass);
            chain.push(superclass);
        }
        chain
    }

    fn interfaces(&self, shape: &TypeShape) -> Vec<TypeRef> {
        let mut queue: VecDeque<TypeRef> = shape.interfaces.iter().cloned().collect();
        for superclass in self.superclasses(shape) {
            if let Some(superclass) = self.type_shape_of(&superclass) {
                queue.extend(superclass.interfaces);
            }
        }

        let mut seen = HashSet::new();
        let mut all = Vec::new();
        while let Some(interface) = queue.pop_front() {
            if !seen.insert(interface.name.clone()) {
                continue;
            }
            if let Some(resolved) = self.type_shape_of(&interface) {
                queue.extend(resolved.interfaces);
            }
            all.push(interface);
        }
        all
    }

    fn type_declaration(&mut self, matcher: &TypeMatcher, shape: &TypeShape) -> TestResult {
        if !matcher.name.matches(&shape.name) {
            return TestResult::NotPassed;
        }

        let mut result = TestResult::Passed;
        if let Some(extends) = &matcher.extends {
            let candidates: Vec<TypeRef> = if extends.directly {
                shape.superclass.iter().cloned().collect()
            } else {
                self.superclasses(shape)
            };
            result = result.and(self.any_type_ref(&extends.pattern, &candidates));
        }
        if result.is_not_passed() || matcher.implements.is_empty() {
            return result;
        }

        let all_interfaces = if matcher.implements.iter().all(|r| r.directly) {
            Vec::new()
        } else {
            self.interfaces(shape)
        };
        for implements in &matcher.implements {
            let candidates = if implements.directly {
                &shape.interfaces
            } else {
                &all_interfaces
            };
            result = result.and(self.any_type_ref(&implements.pattern, candidates));
            if result.is_not_passed() {
                break;
            }
        }
        result
    }

    fn method(&mut self, matcher: &MethodMatcher, shape: &MethodShape) -> TestResult {
        if !matcher.name.matches(&shape.name) {
            return TestResult::NotPassed;
        }
        let mut result = TestResult::Passed;
        if let Some(parameters) = &matcher.parameters {
            result = result.and(parameters.test(&shape.parameters, |p, a| self.type_ref(p, a)));
        }
        if let Some(return_type) = &matcher.return_type {
            result = result.and_then(|| self.type_ref(return_type, &shape.return_type));
        }
        if let Some(throws) = &matcher.throws {
            if throws.is_empty() {
                result = result.and(shape.throws.is_empty().into());
            } else {
                for pattern in throws {
                    result = result.and_then(|| self.any_type_ref(pattern, &shape.throws));
                }
            }
        }
        result
    }

    fn field(&mut self, matcher: &FieldMatcher, shape: &FieldShape) -> TestResult {
        if !matcher.name.matches(&shape.name) {
            return TestResult::NotPassed;
        }
        match &matcher.field_type {
            Some(pattern) => self.type_ref(pattern, &shape.field_type),
            None => TestResult::Passed,
        }
    }

    fn related(&self, element: &M::Element, directly: bool, inverse: bool) -> Vec<M::Element> {
        let step = |e: &M::Element| {
            if inverse {
                self.model.used_by(e)
            } else {
                self.model.uses(e)
            }
        };
        if directly {
            return step(element);
        }

        let mut seen = HashSet::new();
        let _ = seen.insert(element.clone());
        let mut queue: VecDeque<M::Element> = step(element).into();
        let mut all = Vec::new();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            queue.extend(step(&next));
            all.push(next);
        }
        all
    }

    fn common(
        &mut self,
        common: &CommonConstraints,
        element: &M::Element,
        shape: &ElementShape,
    ) -> TestResult {
        for modifier in &common.modifiers {
            if shape.modifiers().contains(&modifier.value) == modifier.negated {
                return TestResult::NotPassed;
            }
        }
        if let Some(inherited) = common.inherited {
            if self.model.is_inherited(element) != inherited {
                return TestResult::NotPassed;
            }
        }

        let mut result = TestResult::Passed;
        for annotation in &common.annotations {
            let found = self.any_type_ref(&annotation.value, shape.annotations());
            result = result.and(if annotation.negated { found.negate() } else { found });
            if result.is_not_passed() {
                return result;
            }
        }

        for (relations, inverse) in [(&common.uses, false), (&common.used_by, true)] {
            for relation in relations {
                let mut found = TestResult::NotPassed;
                for target in self.related(element, relation.directly, inverse) {
                    found = found.or(self.element(&relation.pattern, &target));
                    if found.is_passed() {
                        break;
                    }
                }
                result = result.and(found);
                if result.is_not_passed() {
                    return result;
                }
            }
        }
        result
    }
}
