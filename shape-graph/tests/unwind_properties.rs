//! Properties of the cycle unwinder checked over every directed graph on
//! three nodes (self-loops included).

use shape_graph::{DependencyGraph, NodeId};
use std::collections::HashSet;

const NODES: usize = 3;

/// Build the graph whose edge `i -> j` is present when bit `i * NODES + j` of
/// `mask` is set.
fn graph_from_mask(mask: u32) -> (DependencyGraph<usize>, Vec<NodeId>) {
    let mut graph = DependencyGraph::new();
    let ids: Vec<NodeId> = (0..NODES).map(|i| graph.add_node(i)).collect();
    for from in 0..NODES {
        for to in 0..NODES {
            if mask & (1 << (from * NODES + to)) != 0 {
                graph.add_edge(ids[from], ids[to]).unwrap();
            }
        }
    }
    (graph, ids)
}

fn all_masks() -> impl Iterator<Item = u32> {
    0..(1u32 << (NODES * NODES))
}

#[test]
fn test_every_graph_unwinds_to_an_acyclic_graph() {
    for mask in all_masks() {
        let (mut graph, _) = graph_from_mask(mask);
        let report = graph.unwind().unwrap();

        assert!(graph.is_acyclic(), "mask {mask:#b} left a cycle: {report:?}");
        assert_eq!(graph.topological_sort().unwrap().len(), graph.node_count());
    }
}

#[test]
fn test_acyclic_graphs_are_not_split() {
    for mask in all_masks() {
        let (mut graph, _) = graph_from_mask(mask);
        if !graph.is_acyclic() {
            continue;
        }
        let edges = graph.edge_count();

        let report = graph.unwind().unwrap();
        assert!(report.is_unchanged(), "mask {mask:#b}");
        assert_eq!(graph.node_count(), NODES);
        assert_eq!(graph.edge_count(), edges);
        assert!(graph.groups().iter().all(|g| !g.is_split()));
    }
}

#[test]
fn test_second_unwind_changes_nothing() {
    for mask in all_masks() {
        let (mut graph, _) = graph_from_mask(mask);
        let _ = graph.unwind().unwrap();
        let nodes = graph.node_count();

        let again = graph.unwind().unwrap();
        assert!(again.is_unchanged(), "mask {mask:#b}");
        assert_eq!(graph.node_count(), nodes);
    }
}

#[test]
fn test_groups_partition_the_nodes() {
    for mask in all_masks() {
        let (mut graph, ids) = graph_from_mask(mask);
        let _ = graph.unwind().unwrap();

        assert_eq!(graph.groups().len(), NODES);
        let mut seen = HashSet::new();
        for (group, &origin) in graph.groups().iter().zip(&ids) {
            assert_eq!(group.origin(), origin);
            assert_eq!(group.representative(), origin);
            for &member in group.members() {
                assert!(seen.insert(member), "mask {mask:#b}: {member} in two groups");
                assert_eq!(*graph.node(member).unwrap(), *graph.node(origin).unwrap());
            }
        }
        assert_eq!(seen.len(), graph.node_count());
    }
}

#[test]
fn test_no_node_reads_a_group_twice() {
    for mask in all_masks() {
        let (mut graph, _) = graph_from_mask(mask);
        let _ = graph.unwind().unwrap();

        for id in graph.node_ids() {
            let mut read = HashSet::new();
            for &source in graph.incoming(id).unwrap() {
                let group = graph.group_of(source).unwrap();
                assert!(read.insert(group), "mask {mask:#b}: {id} reads {group} twice");
            }
        }
    }
}

#[test]
fn test_insertion_order_does_not_change_the_shape() {
    let shapes: [&[(usize, usize)]; 5] = [
        &[(0, 1), (1, 2), (2, 0)],
        &[(0, 1), (1, 0), (2, 0)],
        &[(0, 1), (1, 0), (1, 2)],
        &[(0, 1), (1, 0)],
        &[(0, 0), (0, 1), (2, 0)],
    ];
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    for edges in shapes {
        let mut seen = HashSet::new();
        for order in &orders {
            let mut graph = DependencyGraph::new();
            let mut ids = [None; NODES];
            for &label in order {
                ids[label] = Some(graph.add_node(label));
            }
            let ids: Vec<NodeId> = ids.into_iter().flatten().collect();
            for &(from, to) in edges {
                graph.add_edge(ids[from], ids[to]).unwrap();
            }

            let _ = graph.unwind_by_key(|label| *label).unwrap();
            assert!(graph.is_acyclic());
            let mut sizes: Vec<(usize, usize)> = graph
                .groups()
                .iter()
                .map(|group| (*graph.node(group.origin()).unwrap(), group.len()))
                .collect();
            sizes.sort_unstable();
            let _ = seen.insert(sizes);
        }
        assert_eq!(seen.len(), 1, "{edges:?}: {seen:?}");
    }
}

#[test]
fn test_single_self_loop_becomes_a_chain() {
    let mut graph = DependencyGraph::new();
    let node = graph.add_node("loop");
    graph.add_edge(node, node).unwrap();

    let _ = graph.unwind().unwrap();

    let group = graph.group(graph.group_of(node).unwrap()).unwrap();
    assert_eq!(group.len(), 3);
    for &member in group.members() {
        let internal = graph
            .outgoing(member)
            .unwrap()
            .iter()
            .filter(|target| group.members().contains(*target))
            .count();
        assert!(internal <= 1);
    }
    assert_eq!(graph.edge_count(), 2);
}

#[test]
fn test_three_cycle_unrolls_to_three_two_one() {
    let mut graph = DependencyGraph::new();
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    let c = graph.add_node("c");
    graph.add_edge(a, b).unwrap();
    graph.add_edge(b, c).unwrap();
    graph.add_edge(c, a).unwrap();

    let report = graph.unwind().unwrap();
    assert_eq!(report.cycle_splits, 1);

    let sizes: Vec<usize> = [a, b, c]
        .iter()
        .map(|&id| graph.group(graph.group_of(id).unwrap()).unwrap().len())
        .collect();
    assert_eq!(sizes, vec![3, 2, 1]);
    assert!(graph.is_acyclic());
}
