//! Cycle unwinding.
//!
//! Turns a dependency graph that may contain cycles into one that can be run
//! in a single topological order, by splitting nodes into copies that belong to
//! the same [`SplitGroup`](crate::SplitGroup):
//!
//! 1. A self-loop `n -> n` becomes the chain `start -> middle -> end`.
//! 2. Any other cycle is cut at a member whose group is still unsplit. The cut
//!    node keeps the edges coming in from the cycle (inherit-incoming) and a
//!    new copy takes over every outgoing edge (inherit-outgoing). Copies of
//!    the members after the cut then unroll the cycle once more, so that the
//!    original of every member is fed by a chain passing through all the
//!    others. Edges from outside the cycle feed every copy.
//! 3. A cycle made only of split nodes is cut without unrolling.
//! 4. Once no cycle is left, a node with several edges into one split group is
//!    cloned so that each clone feeds exactly one member of that group. The
//!    edge closing an unrolled cycle is exempt: it is the second reading of
//!    the same definer, not a second definer.
//!
//! For `a -> b -> c -> a` cut at `a` this gives
//!
//! ```text
//! a' -> b' -> c -> a
//!             c -> a'' -> b
//! ```
//!
//! groups of sizes 3, 2 and 1, with `a`, `b` and `c` still representing their
//! groups.

use crate::{DependencyGraph, GraphResult, NodeId, format_path};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Summary of the rewrites performed by [`DependencyGraph::unwind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnwindReport {
    /// Self-loops replaced by a three node chain.
    pub self_loops: usize,
    /// Cycles cut, with or without unrolling.
    pub cycle_splits: usize,
    /// Copies created while unrolling cut cycles, outgoing copies included.
    pub unrolled_copies: usize,
    /// Clones created to restore out-cardinality.
    pub cardinality_clones: usize,
}

impl UnwindReport {
    /// Whether the graph was left untouched.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.self_loops == 0
            && self.cycle_splits == 0
            && self.unrolled_copies == 0
            && self.cardinality_clones == 0
    }
}

impl<N: Clone> DependencyGraph<N> {
    /// Rewrite the graph until it has no cycle left, cutting cycles in arena
    /// order.
    ///
    /// See [`unwind_by_key`](Self::unwind_by_key).
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` only if the arena is inconsistent.
    pub fn unwind(&mut self) -> GraphResult<UnwindReport> {
        self.unwind_by_key(|_| ())
    }

    /// Rewrite the graph until it has no cycle left.
    ///
    /// An acyclic graph is returned unchanged. Afterwards every original node
    /// is represented by its split group; [`SplitGroup::representative`]
    /// names the copy that carries the fully unrolled dependencies.
    ///
    /// Each cycle is cut at the member with the smallest `key`, preferring
    /// unsplit members and breaking ties by arena order. A key that does not
    /// depend on insertion order makes the unwound shape independent of the
    /// order the nodes were added in.
    ///
    /// [`SplitGroup::representative`]: crate::SplitGroup::representative
    ///
    /// Unrolling consumes an unsplit group each time, and a cut without
    /// unrolling turns the cut node into a sink and hands its outgoing edges
    /// to a copy with strictly fewer incoming edges, so the loop terminates.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` only if the arena is inconsistent.
    pub fn unwind_by_key<K: Ord>(&mut self, key: impl Fn(&N) -> K) -> GraphResult<UnwindReport> {
        let mut report = UnwindReport::default();
        let mut closing = HashSet::new();

        loop {
            let cycles = self.find_cycles();
            if cycles.is_empty() {
                break;
            }

            if let Some(self_loop) = cycles.iter().find(|cycle| cycle.len() == 1) {
                self.split_self_loop(self_loop[0])?;
                report.self_loops += 1;
                continue;
            }

            let Some(cycle) = self.cut_first(&cycles, &key) else {
                break;
            };
            if self.is_split(cycle[0]) {
                let _ = self.split_in_cycle(&cycle)?;
            } else {
                report.unrolled_copies += self.unroll_cycle(&cycle, &mut closing)?;
            }
            report.cycle_splits += 1;
        }

        report.cardinality_clones = self.restore_out_cardinality(&closing)?;

        if !report.is_unchanged() {
            debug!(
                self_loops = report.self_loops,
                cycle_splits = report.cycle_splits,
                unrolled_copies = report.unrolled_copies,
                cardinality_clones = report.cardinality_clones,
                nodes = self.node_count(),
                "unwound dependency graph"
            );
        }
        Ok(report)
    }

    fn is_split(&self, id: NodeId) -> bool {
        self.groups[self.slots[id.0].group.0].split
    }

    /// The cycle holding the best cut node, rotated to start at it.
    fn cut_first<K: Ord>(
        &self,
        cycles: &[Vec<NodeId>],
        key: &impl Fn(&N) -> K,
    ) -> Option<Vec<NodeId>> {
        let (cycle, at) = cycles
            .iter()
            .flat_map(|cycle| (0..cycle.len()).map(move |at| (cycle, at)))
            .min_by_key(|&(cycle, at)| {
                let id = cycle[at];
                (self.is_split(id), key(&self.slots[id.0].data), id)
            })?;

        let mut rotated = cycle[at..].to_vec();
        rotated.extend_from_slice(&cycle[..at]);
        Some(rotated)
    }

    fn edges_between(&self, from: NodeId, to: NodeId) -> usize {
        self.slots[from.0]
            .outgoing
            .iter()
            .filter(|&&target| target == to)
            .count()
    }

    fn add_edges(&mut self, from: NodeId, to: NodeId, count: usize) -> GraphResult<()> {
        for _ in 0..count {
            self.add_edge(from, to)?;
        }
        Ok(())
    }

    /// Move every `from -> to` edge so that it leaves `new_from` and enters
    /// `new_to`.
    fn move_edges(
        &mut self,
        (from, to): (NodeId, NodeId),
        (new_from, new_to): (NodeId, NodeId),
    ) -> GraphResult<()> {
        let mut moved = 0;
        while self.remove_edge(from, to) {
            moved += 1;
        }
        self.add_edges(new_from, new_to, moved)
    }

    /// `n -> n` becomes `start -> middle -> n`, with `n` acting as `end`.
    fn split_self_loop(&mut self, id: NodeId) -> GraphResult<()> {
        while self.remove_edge(id, id) {}

        let definers = self.slots[id.0].incoming.clone();
        let start = self.copy_node(id)?;
        let middle = self.copy_node(id)?;
        for &definer in &definers {
            self.add_edge(definer, start)?;
            self.add_edge(definer, middle)?;
        }
        self.add_edge(start, middle)?;
        self.add_edge(middle, id)?;

        debug!(node = %id, %start, %middle, "splitting self-loop into start -> middle -> end");
        Ok(())
    }

    /// Break `cycle` at its first node: the node keeps the incoming role, a
    /// copy takes the outgoing role. Returns the copy.
    fn split_in_cycle(&mut self, cycle: &[NodeId]) -> GraphResult<NodeId> {
        let id = cycle[0];
        let members: HashSet<NodeId> = cycle.iter().copied().collect();
        let outgoing_copy = self.copy_node(id)?;

        let incoming = self.slots[id.0].incoming.clone();
        for &source in incoming.iter().filter(|source| !members.contains(*source)) {
            self.add_edge(source, outgoing_copy)?;
        }

        let outgoing = std::mem::take(&mut self.slots[id.0].outgoing);
        for &target in &outgoing {
            if let Some(pos) = self.slots[target.0].incoming.iter().position(|&n| n == id) {
                let _ = self.slots[target.0].incoming.remove(pos);
            }
            self.add_edge(outgoing_copy, target)?;
        }

        debug!(
            node = %id,
            copy = %outgoing_copy,
            cycle = %format_path(cycle),
            "splitting node to break cycle"
        );
        Ok(outgoing_copy)
    }

    /// Cut `cycle` at its first node and unroll it once more, so that the
    /// original of every member reads a chain through all the others.
    /// Returns the number of copies created. The edge closing the second
    /// pass is added to `closing`.
    fn unroll_cycle(
        &mut self,
        cycle: &[NodeId],
        closing: &mut HashSet<(NodeId, NodeId)>,
    ) -> GraphResult<usize> {
        let len = cycle.len();
        let members: HashSet<NodeId> = cycle.iter().copied().collect();
        let feeds: Vec<Vec<NodeId>> = cycle
            .iter()
            .map(|id| {
                self.slots[id.0]
                    .incoming
                    .iter()
                    .copied()
                    .filter(|source| !members.contains(source))
                    .collect()
            })
            .collect();
        let weights: Vec<usize> = (0..len)
            .map(|at| self.edges_between(cycle[at], cycle[(at + 1) % len]))
            .collect();

        let outgoing_copy = self.split_in_cycle(cycle)?;
        if len < 3 {
            // the member after the cut already reads the whole cycle
            return Ok(1);
        }

        // first pass: copies of the inner members lead to the last member,
        // which still feeds the cut node
        let mut previous = outgoing_copy;
        for at in 1..len - 1 {
            let copy = self.copy_node(cycle[at])?;
            for &source in &feeds[at] {
                self.add_edge(source, copy)?;
            }
            if at == 1 {
                self.move_edges((previous, cycle[1]), (previous, copy))?;
            } else {
                self.add_edges(previous, copy, weights[at - 1])?;
            }
            previous = copy;
        }
        let last = cycle[len - 1];
        self.move_edges((cycle[len - 2], last), (previous, last))?;

        // second pass: the last member feeds the inner originals through
        // another copy of the cut node
        let head = self.copy_node(cycle[0])?;
        for &source in &feeds[0] {
            self.add_edge(source, head)?;
        }
        self.add_edges(last, head, weights[len - 1])?;
        self.add_edges(head, cycle[1], weights[0])?;
        let _ = closing.insert((last, head));

        debug!(
            cycle = %format_path(cycle),
            %head,
            copies = len,
            "unrolling cycle through every member"
        );
        Ok(len)
    }

    /// Clone nodes that feed the same split group more than once, until every
    /// node has at most one edge into any group. Edges in `closing` do not
    /// count.
    fn restore_out_cardinality(
        &mut self,
        closing: &HashSet<(NodeId, NodeId)>,
    ) -> GraphResult<usize> {
        let mut clones = 0;

        loop {
            let mut changed = false;

            for index in 0..self.slots.len() {
                let id = NodeId(index);
                let Some(duplicate) = self.duplicate_target(id, closing) else {
                    continue;
                };

                let clone = self.copy_node(id)?;
                let definers = self.slots[id.0].incoming.clone();
                for &definer in &definers {
                    self.add_edge(definer, clone)?;
                }
                let _ = self.remove_edge(id, duplicate);
                self.add_edge(clone, duplicate)?;

                trace!(node = %id, %clone, target = %duplicate, "cloned node to restore out-cardinality");
                clones += 1;
                changed = true;
            }

            if !changed {
                break;
            }
        }

        Ok(clones)
    }

    /// Second outgoing edge of `id` that lands in a group already fed by it.
    fn duplicate_target(&self, id: NodeId, closing: &HashSet<(NodeId, NodeId)>) -> Option<NodeId> {
        let mut fed = HashMap::new();
        for &target in &self.slots[id.0].outgoing {
            if closing.contains(&(id, target)) {
                continue;
            }
            let group = self.slots[target.0].group;
            if fed.insert(group, target).is_some() {
                return Some(target);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::{DependencyGraph, NodeId};
    use tracing_test::traced_test;

    fn group_size(graph: &DependencyGraph<&str>, id: NodeId) -> usize {
        graph.group(graph.group_of(id).unwrap()).unwrap().len()
    }

    #[test]
    fn test_acyclic_graph_is_unchanged() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.add_edge(b, c).unwrap();

        let before = graph.clone();
        let report = graph.unwind().unwrap();

        assert!(report.is_unchanged());
        assert_eq!(graph.node_count(), before.node_count());
        assert_eq!(graph.edge_count(), before.edge_count());
        assert_eq!(graph.groups(), before.groups());
    }

    #[traced_test]
    #[test]
    fn test_self_loop_becomes_chain() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        graph.add_edge(a, a).unwrap();

        let report = graph.unwind().unwrap();
        assert_eq!(report.self_loops, 1);
        assert!(graph.is_acyclic());

        let group = graph.group(graph.group_of(a).unwrap()).unwrap();
        assert_eq!(group.len(), 3);
        assert_eq!(group.representative(), a);

        let start = group.members()[1];
        let middle = group.members()[2];
        assert_eq!(graph.outgoing(start).unwrap(), &[middle]);
        assert_eq!(graph.outgoing(middle).unwrap(), &[a]);
        assert!(graph.outgoing(a).unwrap().is_empty());
        assert!(logs_contain("splitting self-loop"));
    }

    #[test]
    fn test_self_loop_keeps_other_edges() {
        let mut graph = DependencyGraph::<&str>::new();
        let definer = graph.add_node("definer");
        let looped = graph.add_node("looped");
        let user = graph.add_node("user");
        graph.add_edge(definer, looped).unwrap();
        graph.add_edge(looped, looped).unwrap();
        graph.add_edge(looped, user).unwrap();

        let _ = graph.unwind().unwrap();
        assert!(graph.is_acyclic());

        // the referencer still reads from the end of the chain
        assert_eq!(graph.incoming(user).unwrap(), &[looped]);
        // every copy of the looped node still sees its other definer, through
        // one clone of the definer each
        let definer_group = graph.group(graph.group_of(definer).unwrap()).unwrap();
        assert_eq!(definer_group.len(), 3);
        for &copy in graph
            .group(graph.group_of(looped).unwrap())
            .unwrap()
            .members()
        {
            let incoming = graph.incoming(copy).unwrap();
            assert_eq!(
                incoming
                    .iter()
                    .filter(|&&n| graph.group_of(n).unwrap() == graph.group_of(definer).unwrap())
                    .count(),
                1
            );
        }
    }

    #[traced_test]
    #[test]
    fn test_three_cycle_is_split_once() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();
        graph.add_edge(c, a).unwrap();

        let report = graph.unwind().unwrap();
        assert_eq!(report.cycle_splits, 1);
        assert_eq!(report.unrolled_copies, 3);
        assert_eq!(report.cardinality_clones, 0);
        assert!(graph.is_acyclic());
        assert_eq!(
            (group_size(&graph, a), group_size(&graph, b), group_size(&graph, c)),
            (3, 2, 1)
        );

        // a' -> b' -> c -> a, then c -> a'' -> b
        let a_members = graph.group(graph.group_of(a).unwrap()).unwrap().members().to_vec();
        let b_members = graph.group(graph.group_of(b).unwrap()).unwrap().members().to_vec();
        let (a_out, a_head, b_copy) = (a_members[1], a_members[2], b_members[1]);
        assert!(graph.outgoing(a).unwrap().is_empty());
        assert_eq!(graph.incoming(a).unwrap(), &[c]);
        assert_eq!(graph.outgoing(a_out).unwrap(), &[b_copy]);
        assert_eq!(graph.outgoing(b_copy).unwrap(), &[c]);
        assert_eq!(graph.outgoing(c).unwrap(), &[a, a_head]);
        assert_eq!(graph.outgoing(a_head).unwrap(), &[b]);
        assert!(graph.outgoing(b).unwrap().is_empty());
        assert!(logs_contain("splitting node to break cycle"));
        assert!(logs_contain("unrolling cycle through every member"));
    }

    // Walk the first definer back from `id` and collect the nodes seen.
    fn origins_upstream(graph: &DependencyGraph<&'static str>, id: NodeId) -> Vec<&'static str> {
        let mut seen = vec![*graph.node(id).unwrap()];
        let mut current = id;
        while let Some(&definer) = graph.incoming(current).unwrap().first() {
            seen.push(*graph.node(definer).unwrap());
            current = definer;
        }
        seen
    }

    #[test]
    fn test_every_original_reads_the_whole_cycle() {
        let mut graph = DependencyGraph::<&str>::new();
        let ids: Vec<NodeId> = ["a", "b", "c", "d"].iter().map(|&n| graph.add_node(n)).collect();
        for at in 0..ids.len() {
            graph.add_edge(ids[at], ids[(at + 1) % ids.len()]).unwrap();
        }

        let _ = graph.unwind().unwrap();
        assert!(graph.is_acyclic());
        for &id in &ids {
            let mut upstream = origins_upstream(&graph, id);
            upstream.sort_unstable();
            upstream.dedup();
            assert_eq!(upstream, vec!["a", "b", "c", "d"], "{id}");
        }
    }

    #[test]
    fn test_key_picks_the_cut_node() {
        let build = |names: [&'static str; 2]| {
            let mut graph = DependencyGraph::<&str>::new();
            let first = graph.add_node(names[0]);
            let second = graph.add_node(names[1]);
            graph.add_edge(first, second).unwrap();
            graph.add_edge(second, first).unwrap();
            let _ = graph.unwind_by_key(|name| *name).unwrap();
            graph
        };

        for graph in [build(["x", "y"]), build(["y", "x"])] {
            let sizes: Vec<(&str, usize)> = graph
                .groups()
                .iter()
                .map(|group| (*graph.node(group.origin()).unwrap(), group.len()))
                .collect();
            assert!(sizes.contains(&("x", 2)), "{sizes:?}");
            assert!(sizes.contains(&("y", 1)), "{sizes:?}");
        }
    }

    #[test]
    fn test_outside_definer_is_cloned_per_copy() {
        let mut graph = DependencyGraph::<&str>::new();
        let outside = graph.add_node("outside");
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.add_edge(outside, a).unwrap();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();

        let report = graph.unwind().unwrap();
        assert_eq!(report.cycle_splits, 1);
        assert_eq!(report.cardinality_clones, 1);
        assert!(graph.is_acyclic());

        let outside_group = graph.group(graph.group_of(outside).unwrap()).unwrap();
        assert_eq!(outside_group.len(), 2);
        for &copy in outside_group.members() {
            assert_eq!(graph.outgoing(copy).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_overlapping_cycles() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.add_edge(c, a).unwrap();

        let _ = graph.unwind().unwrap();
        assert!(graph.is_acyclic());
        assert!(graph.topological_sort().is_ok());
        for group in graph.groups() {
            assert!(!group.is_empty());
        }
    }

    #[test]
    fn test_unwind_twice_stays_acyclic() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();
        graph.add_edge(b, b).unwrap();

        let _ = graph.unwind().unwrap();
        let nodes = graph.node_count();
        let report = graph.unwind().unwrap();

        assert!(report.is_unchanged());
        assert_eq!(graph.node_count(), nodes);
        assert!(graph.is_acyclic());
    }

    #[test]
    fn test_cycle_of_split_nodes_is_still_broken() {
        let mut graph = DependencyGraph::<&str>::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();
        graph.add_edge(a, a).unwrap();
        graph.add_edge(b, b).unwrap();

        let report = graph.unwind().unwrap();
        assert_eq!(report.self_loops, 2);
        // the chain copies close new cycles through the cut node's outgoing copy
        assert!(report.cycle_splits >= 1);
        assert_eq!(report.unrolled_copies, 0);
        assert!(graph.is_acyclic());
        assert!(graph.topological_sort().is_ok());
    }
}
