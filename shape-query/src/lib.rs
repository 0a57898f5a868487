//! Structural queries over code element hierarchies.
//!
//! A [`Recipe`] describes code shapes: type, method and field statements with
//! name globs, relation constraints (`extends`, `implements`, `uses`,
//! `usedby`), nesting and variables (`%x`) that tie statements together. A
//! recipe is compiled once into a [`Plan`]; the plan then follows a walk over
//! any [`ElementModel`] and yields a three-valued [`TestResult`] per element.
//!
//! - Patterns: [`StringPattern`], [`NamePattern`] and [`TypePattern`] on top of
//!   the [`Glob`] automaton
//! - Statements: [`StatementBuilder`], [`Statement`], compiled to a
//!   [`Matcher`]
//! - Execution: [`Plan::compile`], [`Plan::begin`] and [`Progress`]
//! - An in-memory model, [`MemoryModel`], for tests and JSON documents
//!
//! # Example
//!
//! ```
//! use shape_query::{
//!     ElementShape, MemoryElement, MemoryModel, Plan, Recipe, StatementBuilder, TestResult,
//!     TypeKind, TypeShape,
//! };
//!
//! let class = |name: &str| ElementShape::Type(TypeShape::new(TypeKind::Class, name));
//! let model = MemoryModel::from_roots(vec![
//!     MemoryElement::new("com.acme.Service", class("com.acme.Service")),
//!     MemoryElement::new("org.other.Tool", class("org.other.Tool")),
//! ])
//! .unwrap();
//!
//! let recipe = Recipe::new(vec![
//!     StatementBuilder::class("com.acme.*").returned().build().unwrap(),
//! ])
//! .unwrap();
//! let plan = Plan::compile(&recipe).unwrap();
//!
//! let verdicts = model.evaluate(&plan);
//! assert_eq!(verdicts["com.acme.Service"], TestResult::Passed);
//! assert_eq!(verdicts["org.other.Tool"], TestResult::NotPassed);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

mod error;
mod glob;
mod matcher;
mod model;
mod pattern;
mod plan;
mod recipe;
mod result;
mod statement;

pub use error::SyntaxError;
pub use glob::{Glob, GlobItem};
pub use matcher::{
    CommonConstraints, DeclarationMatcher, FieldMatcher, Matcher, MethodMatcher, Scope,
    TypeMatcher,
};
pub use model::{
    ElementModel, ElementShape, FieldShape, MemoryElement, MemoryModel, MethodShape, ModelError,
    Modifier, TypeKind, TypeRef, TypeShape,
};
pub use pattern::{NamePattern, NameSegment, PatternError, StringPattern, TypePattern};
pub use plan::{
    Binding, MatchContext, Plan, PlanError, PlanNode, PlanResult, Progress, WalkInstruction,
};
pub use recipe::{Recipe, RecipeError};
pub use result::TestResult;
pub use statement::{Declaration, DeclarationKind, Negatable, Relation, Statement, StatementBuilder};
