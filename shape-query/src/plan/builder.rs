//! Dependency graph construction.
//!
//! Every statement becomes one node, nested statements become containment
//! children, and each variable gets an edge from the node defining it to every
//! node referencing it.

use super::{PlanError, PlanNode};
use crate::recipe::{Recipe, RecipeError};
use crate::statement::Statement;
use shape_graph::{DependencyGraph, NodeId};
use std::collections::HashMap;
use tracing::{debug, trace};

pub(crate) struct GraphBuilder<'n> {
    graph: DependencyGraph<PlanNode>,
    named: &'n [&'n str],
    definers: HashMap<String, NodeId>,
    // (variable, referencing node) in traversal order
    references: Vec<(String, NodeId)>,
}

impl<'n> GraphBuilder<'n> {
    pub(crate) fn new(named: &'n [&'n str]) -> Self {
        Self {
            graph: DependencyGraph::new(),
            named,
            definers: HashMap::new(),
            references: Vec::new(),
        }
    }

    /// Depth-first over the recipe, then wire definers to referencers.
    pub(crate) fn build(mut self, recipe: &Recipe) -> Result<DependencyGraph<PlanNode>, PlanError> {
        for statement in recipe.statements() {
            self.visit(statement, None)?;
        }

        for (variable, referencer) in &self.references {
            match self.definers.get(variable) {
                Some(&definer) => self.graph.add_edge(definer, *referencer)?,
                None => {
                    debug!(%variable, node = %referencer, "variable has no definer and matches everything");
                }
            }
        }

        trace!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "built dependency graph"
        );
        Ok(self.graph)
    }

    fn visit(&mut self, statement: &Statement, parent: Option<NodeId>) -> Result<(), PlanError> {
        let node = PlanNode::new(statement, self.named);
        let id = match parent {
            Some(parent) => self.graph.add_child(parent, node)?,
            None => self.graph.add_node(node),
        };

        if let Some(variable) = statement.defined_variable() {
            if self.definers.insert(variable.to_string(), id).is_some() {
                return Err(RecipeError::VariableRedefined(variable.to_string()).into());
            }
        }
        for variable in statement.referenced_variables() {
            self.references.push((variable, id));
        }

        for child in statement.children() {
            self.visit(child, Some(id))?;
        }
        Ok(())
    }
}
