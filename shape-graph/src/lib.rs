//! Arena-backed dependency multigraph for structural query plans.
//!
//! This crate provides the graph that a compiled recipe is executed from:
//! - Nodes live in an arena and are addressed by [`NodeId`]
//! - A containment tree (parent/children index lists) mirrors statement nesting
//! - A directed multigraph links the node defining a variable to every node
//!   referencing it
//! - Every node belongs to a [`SplitGroup`], the set of copies descended from
//!   one original node once cycles are unwound
//! - Cycle search, deterministic topological ordering (Kahn's algorithm) and
//!   the cycle [unwinder](DependencyGraph::unwind)
//! - Optional serde support
//!
//! # Example
//!
//! ```
//! use shape_graph::DependencyGraph;
//!
//! let mut graph = DependencyGraph::<&str>::new();
//! let definer = graph.add_node("class %x=*");
//! let user = graph.add_node("type ^* extends %x");
//! graph.add_edge(definer, user).unwrap();
//!
//! let order = graph.topological_sort().unwrap();
//! assert_eq!(order, vec![definer, user]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

mod unwind;

pub use unwind::UnwindReport;

use std::collections::{HashSet, VecDeque};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Node identifier in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Split group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupId(usize);

impl GroupId {
    /// Position of the group in the group table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Group({})", self.0)
    }
}

/// Error types for graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Cycle detected where an acyclic graph was required
    #[error("Cycle detected in graph: {0}")]
    CycleDetected(String),

    /// Node not found
    #[error("Node {0} not found in graph")]
    NodeNotFound(NodeId),
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

pub(crate) fn format_path(path: &[NodeId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// The set of node copies that originated from one original node.
///
/// A group starts out unsplit with a single member. Once the unwinder copies
/// any member the whole group is marked split and every member, old and new,
/// belongs to it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplitGroup {
    origin: NodeId,
    members: Vec<NodeId>,
    representative: NodeId,
    split: bool,
}

impl SplitGroup {
    /// The node the group was created for. Its arena slot is never removed.
    #[must_use]
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// All copies, in creation order.
    #[must_use]
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// The copy carrying the fully unrolled dependencies of the original node.
    ///
    /// This is the inherit-incoming copy of a cycle split and the `end` copy of
    /// a self-loop split. For an unsplit group it is the origin.
    #[must_use]
    pub fn representative(&self) -> NodeId {
        self.representative
    }

    /// Whether any member has been copied.
    #[must_use]
    pub fn is_split(&self) -> bool {
        self.split
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false: a group has at least its origin.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Slot<N> {
    data: N,
    group: GroupId,
    // Dependency edges, duplicates allowed (multigraph)
    outgoing: Vec<NodeId>,
    incoming: Vec<NodeId>,
    // Containment tree
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Dependency multigraph with a containment tree and split groups.
///
/// An edge `a -> b` means `b` references a variable that `a` defines, so `a`
/// has to be resolved before `b`. Edges are kept on both endpoints
/// (`outgoing`/`incoming`), duplicates and self-loops are allowed until the
/// graph is [unwound](DependencyGraph::unwind).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DependencyGraph<N> {
    slots: Vec<Slot<N>>,
    groups: Vec<SplitGroup>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DependencyGraph<N> {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Add a top-level node in its own unsplit group and return its ID.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId(self.slots.len());
        let group = GroupId(self.groups.len());
        self.groups.push(SplitGroup {
            origin: id,
            members: vec![id],
            representative: id,
            split: false,
        });
        self.slots.push(Slot {
            data,
            group,
            outgoing: Vec::new(),
            incoming: Vec::new(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Add a node nested under `parent` in the containment tree.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the parent doesn't exist.
    pub fn add_child(&mut self, parent: NodeId, data: N) -> GraphResult<NodeId> {
        let _ = self.slot(parent)?;
        let id = self.add_node(data);
        self.slots[id.0].parent = Some(parent);
        self.slots[parent.0].children.push(id);
        Ok(id)
    }

    /// Add a directed dependency edge from `from` to `to`.
    ///
    /// Unlike an acyclic graph this never rejects an edge: duplicates and
    /// self-loops are recorded as given.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if either node doesn't exist.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> GraphResult<()> {
        let _ = self.slot(from)?;
        let _ = self.slot(to)?;
        self.slots[from.0].outgoing.push(to);
        self.slots[to.0].incoming.push(from);
        Ok(())
    }

    /// Remove one occurrence of the edge `from -> to`.
    ///
    /// Returns whether an edge was removed.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        if from.0 >= self.slots.len() || to.0 >= self.slots.len() {
            return false;
        }
        let Some(out_pos) = self.slots[from.0].outgoing.iter().position(|&n| n == to) else {
            return false;
        };
        let _ = self.slots[from.0].outgoing.remove(out_pos);
        if let Some(in_pos) = self.slots[to.0].incoming.iter().position(|&n| n == from) {
            let _ = self.slots[to.0].incoming.remove(in_pos);
        }
        true
    }

    fn slot(&self, id: NodeId) -> GraphResult<&Slot<N>> {
        self.slots.get(id.0).ok_or(GraphError::NodeNotFound(id))
    }

    /// Get a reference to a node's data.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn node(&self, id: NodeId) -> GraphResult<&N> {
        self.slot(id).map(|slot| &slot.data)
    }

    /// All node IDs in arena order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.slots.len()).map(NodeId)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of edges, counting duplicates.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.outgoing.len()).sum()
    }

    /// Nodes this node has an edge to (its referencers).
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn outgoing(&self, id: NodeId) -> GraphResult<&[NodeId]> {
        self.slot(id).map(|slot| slot.outgoing.as_slice())
    }

    /// Nodes with an edge to this node (its definers).
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn incoming(&self, id: NodeId) -> GraphResult<&[NodeId]> {
        self.slot(id).map(|slot| slot.incoming.as_slice())
    }

    /// Containment parent of a node.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn parent(&self, id: NodeId) -> GraphResult<Option<NodeId>> {
        self.slot(id).map(|slot| slot.parent)
    }

    /// Containment children of a node, copies included.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn children(&self, id: NodeId) -> GraphResult<&[NodeId]> {
        self.slot(id).map(|slot| slot.children.as_slice())
    }

    /// Nodes without a containment parent, in arena order.
    #[must_use]
    pub fn roots(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|id| self.slots[id.0].parent.is_none())
            .collect()
    }

    /// Split group a node belongs to.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn group_of(&self, id: NodeId) -> GraphResult<GroupId> {
        self.slot(id).map(|slot| slot.group)
    }

    /// Look up a split group.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&SplitGroup> {
        self.groups.get(id.0)
    }

    /// All split groups, one per original node.
    #[must_use]
    pub fn groups(&self) -> &[SplitGroup] {
        &self.groups
    }

    /// Find cycles with a depth-first search over the dependency edges.
    ///
    /// Each cycle is reported once, as the path from the node the back edge
    /// points to up to the node the back edge leaves. A self-loop is a cycle of
    /// length 1. Search order follows arena order, so the result is
    /// deterministic.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<NodeId>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for node_id in self.node_ids() {
            if !visited.contains(&node_id) {
                self.find_cycles_dfs(
                    node_id,
                    &mut visited,
                    &mut rec_stack,
                    &mut path,
                    &mut cycles,
                );
            }
        }

        cycles
    }

    fn find_cycles_dfs(
        &self,
        node_id: NodeId,
        visited: &mut HashSet<NodeId>,
        rec_stack: &mut HashSet<NodeId>,
        path: &mut Vec<NodeId>,
        cycles: &mut Vec<Vec<NodeId>>,
    ) {
        let _ = visited.insert(node_id);
        let _ = rec_stack.insert(node_id);
        path.push(node_id);

        let mut seen_targets = HashSet::new();
        for &neighbor in &self.slots[node_id.0].outgoing {
            // parallel edges describe the same cycle
            if !seen_targets.insert(neighbor) {
                continue;
            }
            if !visited.contains(&neighbor) {
                self.find_cycles_dfs(neighbor, visited, rec_stack, path, cycles);
            } else if rec_stack.contains(&neighbor) {
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    cycles.push(path[cycle_start..].to_vec());
                }
            }
        }

        let _ = path.pop();
        let _ = rec_stack.remove(&node_id);
    }

    /// Whether the dependency edges form no cycle.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        self.find_cycles().is_empty()
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Returns nodes in dependency order (definers before referencers), with
    /// ties broken by arena order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::CycleDetected` if the graph contains a cycle.
    pub fn topological_sort(&self) -> GraphResult<Vec<NodeId>> {
        let mut in_degree: Vec<usize> = self.slots.iter().map(|s| s.incoming.len()).collect();

        let mut queue: VecDeque<NodeId> = self
            .node_ids()
            .filter(|id| in_degree[id.0] == 0)
            .collect();

        let mut result = Vec::with_capacity(self.slots.len());

        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            let mut ready = Vec::new();
            for &neighbor in &self.slots[node_id.0].outgoing {
                in_degree[neighbor.0] -= 1;
                if in_degree[neighbor.0] == 0 {
                    ready.push(neighbor);
                }
            }
            ready.sort();
            queue.extend(ready);
        }

        if result.len() == self.slots.len() {
            Ok(result)
        } else {
            let stuck: Vec<NodeId> = self
                .node_ids()
                .filter(|id| in_degree[id.0] > 0)
                .collect();
            Err(GraphError::CycleDetected(format!(
                "unordered nodes: {}",
                stuck
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }
}

impl<N: Clone> DependencyGraph<N> {
    /// Create a copy of `id` in the same split group.
    ///
    /// The copy gets the node's data, its containment parent (and is listed
    /// among the parent's children right after the original) and the same
    /// children list. It has no dependency edges; callers attach the edges the
    /// copy is meant to have. The group is marked split.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn copy_node(&mut self, id: NodeId) -> GraphResult<NodeId> {
        let source = self.slot(id)?;
        let copy = Slot {
            data: source.data.clone(),
            group: source.group,
            outgoing: Vec::new(),
            incoming: Vec::new(),
            parent: source.parent,
            children: source.children.clone(),
        };
        let group = copy.group;
        let parent = copy.parent;

        let copy_id = NodeId(self.slots.len());
        self.slots.push(copy);

        if let Some(parent) = parent {
            let siblings = &mut self.slots[parent.0].children;
            let at = siblings
                .iter()
                .rposition(|&n| self.groups[group.0].members.contains(&n))
                .map_or(siblings.len(), |p| p + 1);
            siblings.insert(at, copy_id);
        }

        let entry = &mut self.groups[group.0];
        entry.members.push(copy_id);
        entry.split = true;

        Ok(copy_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_empty_graph() {
        let graph = DependencyGraph::<String>::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.is_acyclic());
    }

    #[test]
    fn test_add_nodes_creates_groups() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");

        assert_eq!(graph.node_count(), 2);
        assert_eq!(*graph.node(a).unwrap(), "a");
        assert_eq!(graph.groups().len(), 2);
        let group = graph.group(graph.group_of(b).unwrap()).unwrap();
        assert_eq!(group.origin(), b);
        assert_eq!(group.members(), &[b]);
        assert!(!group.is_split());
    }

    #[test]
    fn test_containment() {
        let mut graph = DependencyGraph::<&str>::new();
        let class = graph.add_node("class");
        let method = graph.add_child(class, "method").unwrap();
        let field = graph.add_child(class, "field").unwrap();

        assert_eq!(graph.parent(method).unwrap(), Some(class));
        assert_eq!(graph.children(class).unwrap(), &[method, field]);
        assert_eq!(graph.roots(), vec![class]);
        assert!(graph.add_child(NodeId(42), "orphan").is_err());
    }

    #[test]
    fn test_multigraph_edges() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");

        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, b).unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.incoming(b).unwrap(), &[a, a]);

        assert!(graph.remove_edge(a, b));
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.remove_edge(a, b));
        assert!(!graph.remove_edge(a, b));
        assert!(graph.add_edge(a, NodeId(9)).is_err());
    }

    #[test]
    fn test_find_cycles() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();
        assert!(graph.find_cycles().is_empty());

        graph.add_edge(c, a).unwrap();
        assert_eq!(graph.find_cycles(), vec![vec![a, b, c]]);
    }

    #[test]
    fn test_self_loop_is_cycle_of_length_one() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        graph.add_edge(a, a).unwrap();

        assert_eq!(graph.find_cycles(), vec![vec![a]]);
        assert!(graph.topological_sort().is_err());
    }

    #[test]
    fn test_topological_sort() {
        let mut graph = DependencyGraph::<&str>::new();
        let d = graph.add_node("d");
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");

        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.add_edge(b, d).unwrap();
        graph.add_edge(c, d).unwrap();

        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec![a, b, c, d]);
    }

    #[test]
    fn test_topological_sort_reports_cycle() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();

        let result = graph.topological_sort();
        assert!(matches!(result, Err(GraphError::CycleDetected(_))));
    }

    #[test]
    fn test_copy_node_joins_group() {
        let mut graph = DependencyGraph::<&str>::new();
        let class = graph.add_node("class");
        let method = graph.add_child(class, "method").unwrap();
        let field = graph.add_child(class, "field").unwrap();
        let nested = graph.add_child(method, "nested").unwrap();

        let copy = graph.copy_node(method).unwrap();

        assert_eq!(*graph.node(copy).unwrap(), "method");
        assert_eq!(graph.parent(copy).unwrap(), Some(class));
        assert_eq!(graph.children(copy).unwrap(), &[nested]);
        assert_eq!(graph.children(class).unwrap(), &[method, copy, field]);
        assert!(graph.outgoing(copy).unwrap().is_empty());

        let group = graph.group(graph.group_of(copy).unwrap()).unwrap();
        assert_eq!(group.members(), &[method, copy]);
        assert_eq!(group.representative(), method);
        assert!(group.is_split());
    }

    #[test]
    fn test_format_path() {
        assert_eq!(format_path(&[NodeId(1), NodeId(3)]), "Node(1) -> Node(3)");
        assert_eq!(format_path(&[]), "");
    }
}
