//! Compiled recipes.
//!
//! Compiling a [`Recipe`] builds a [`DependencyGraph`] with one node per
//! statement, unwinds its variable cycles and fixes a topological order. The
//! resulting [`Plan`] is immutable and can drive any number of walks, each
//! tracked by its own [`Progress`].
//!
//! Per node the plan precomputes:
//! - the representative of its parent's split group
//! - the representatives of its child groups, each of which must be matched
//!   by at least one walked child
//! - for every referenced variable, the defining node it is checked against

mod builder;
mod context;
mod progress;

pub use context::{Binding, MatchContext};
pub use progress::{Progress, WalkInstruction};

use crate::matcher::Matcher;
use crate::model::ElementModel;
use crate::recipe::{Recipe, RecipeError};
use crate::statement::Statement;
use builder::GraphBuilder;
use shape_graph::{DependencyGraph, GraphError, NodeId, UnwindReport};
use std::fmt;
use tracing::{debug, warn};

/// Errors raised while compiling a recipe.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The recipe itself is invalid
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    /// The dependency graph could not be ordered
    #[error("dependency graph: {0}")]
    Graph(#[from] GraphError),
}

/// Result type for plan compilation.
pub type PlanResult<T> = Result<T, PlanError>;

/// Payload of one dependency graph node.
#[derive(Debug, Clone)]
pub struct PlanNode {
    label: String,
    matcher: Matcher,
    defines: Option<String>,
    references: Vec<String>,
    reported: bool,
}

impl PlanNode {
    fn new(statement: &Statement, named: &[&str]) -> Self {
        let defines = statement.defined_variable().map(str::to_string);
        let reported = statement.is_return()
            || defines
                .as_deref()
                .is_some_and(|variable| named.contains(&variable));
        Self {
            label: statement.to_string(),
            matcher: statement.compile(),
            defines,
            references: statement.referenced_variables(),
            reported,
        }
    }

    /// The statement in recipe notation.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The compiled matcher.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Variable defined by the statement.
    #[must_use]
    pub fn defines(&self) -> Option<&str> {
        self.defines.as_deref()
    }

    /// Variables referenced by the statement.
    #[must_use]
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Whether matches of this node are part of the output.
    #[must_use]
    pub fn is_reported(&self) -> bool {
        self.reported
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone)]
struct NodeLayout {
    parent: Option<NodeId>,
    child_groups: Vec<NodeId>,
    // variable -> defining node feeding this node, None when unconstrained
    definers: Vec<(String, Option<NodeId>)>,
}

/// An executable, immutable recipe.
#[derive(Debug, Clone)]
pub struct Plan {
    graph: DependencyGraph<PlanNode>,
    order: Vec<NodeId>,
    layouts: Vec<NodeLayout>,
    reported: Vec<NodeId>,
    unwind: UnwindReport,
}

impl Plan {
    /// Compile a recipe reporting its return statements.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Graph` if the dependency graph cannot be made
    /// acyclic.
    pub fn compile(recipe: &Recipe) -> PlanResult<Self> {
        Self::compile_named(recipe, &[])
    }

    /// Compile a recipe that also reports the definers of `named` variables.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::UnknownNamedMatch` for a name no statement
    /// defines, and `PlanError::Graph` if the dependency graph cannot be made
    /// acyclic.
    pub fn compile_named(recipe: &Recipe, named: &[&str]) -> PlanResult<Self> {
        if let Some(unknown) = named.iter().find(|name| !recipe.defines(name)) {
            return Err(RecipeError::UnknownNamedMatch((*unknown).to_string()).into());
        }

        let mut graph = GraphBuilder::new(named).build(recipe)?;
        // every cycle member defines a variable, so cutting by name keeps the
        // plan independent of statement order
        let unwind = graph.unwind_by_key(|node| node.defines().map(str::to_owned))?;
        let order = graph.topological_sort()?;

        let mut layouts = Vec::with_capacity(graph.node_count());
        for id in graph.node_ids() {
            layouts.push(Self::layout(&graph, id)?);
        }

        let mut reported = Vec::new();
        for group in graph.groups() {
            let representative = group.representative();
            if graph.node(representative)?.is_reported() {
                reported.push(representative);
            }
        }

        if reported.is_empty() {
            warn!("recipe reports nothing; mark a statement with ^ or name a match");
        }
        debug!(
            nodes = graph.node_count(),
            groups = graph.groups().len(),
            split = unwind.cycle_splits + unwind.self_loops,
            reported = reported.len(),
            "compiled plan"
        );

        Ok(Self {
            graph,
            order,
            layouts,
            reported,
            unwind,
        })
    }

    fn layout(graph: &DependencyGraph<PlanNode>, id: NodeId) -> PlanResult<NodeLayout> {
        let representative = |node: NodeId| -> PlanResult<NodeId> {
            let group = graph.group_of(node)?;
            Ok(graph
                .group(group)
                .map_or(node, shape_graph::SplitGroup::representative))
        };

        let parent = graph.parent(id)?.map(representative).transpose()?;

        let mut child_groups = Vec::new();
        for &child in graph.children(id)? {
            let rep = representative(child)?;
            if !child_groups.contains(&rep) {
                child_groups.push(rep);
            }
        }

        let node = graph.node(id)?;
        let mut definers = Vec::with_capacity(node.references.len());
        for variable in &node.references {
            let mut feeding = Vec::new();
            for &source in graph.incoming(id)? {
                if graph.node(source)?.defines() == Some(variable.as_str()) {
                    feeding.push(source);
                }
            }
            if feeding.len() > 1 {
                warn!(
                    node = %id,
                    %variable,
                    definers = feeding.len(),
                    "several definers feed one reference; using the first"
                );
            }
            definers.push((variable.clone(), feeding.first().copied()));
        }

        Ok(NodeLayout {
            parent,
            child_groups,
            definers,
        })
    }

    /// Start a walk over `model`.
    #[must_use]
    pub fn begin<'a, M: ElementModel>(&'a self, model: &'a M) -> Progress<'a, M> {
        Progress::new(self, model)
    }

    /// The unwound dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph<PlanNode> {
        &self.graph
    }

    /// Nodes in dependency order: definers before referencers.
    #[must_use]
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Representatives of the groups whose matches are reported.
    #[must_use]
    pub fn reported(&self) -> &[NodeId] {
        &self.reported
    }

    /// What unwinding changed.
    #[must_use]
    pub fn unwind_report(&self) -> &UnwindReport {
        &self.unwind
    }

    /// Number of nodes after unwinding.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    // Layouts and nodes are built for every arena slot.
    fn layout_of(&self, id: NodeId) -> &NodeLayout {
        &self.layouts[id.index()]
    }

    fn node(&self, id: NodeId) -> Option<&PlanNode> {
        self.graph.node(id).ok()
    }
}
