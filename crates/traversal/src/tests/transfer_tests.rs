use super::*;

use proptest::prelude::*;
use shared::{error::ErrorCode, protocol::Directed};
use storage::{LinesGraph, MemoryGraph};

use crate::topo::topo_sort;

fn ring() -> (MemoryGraph, Vec<NodeRef>) {
    let graph = MemoryGraph::new("ring");
    let nodes: Vec<NodeRef> = ["a", "b", "c"].iter().map(|label| graph.add_node(label)).collect();
    graph.add_edge(&nodes[0], &nodes[1]).expect("a->b");
    graph.add_edge(&nodes[1], &nodes[2]).expect("b->c");
    graph.add_edge(&nodes[2], &nodes[0]).expect("c->a");
    (graph, nodes)
}

#[test]
fn break_cycles_copies_a_ring_as_a_chain() {
    let (source, nodes) = ring();
    let dest = MemoryGraph::new("copy");

    let created = break_cycles(&nodes[0], &source, &dest).expect("break");
    let labels: Vec<String> = created.iter().map(|node| node.label()).collect();
    assert_eq!(labels, vec!["a", "b", "c"]);
    assert_eq!(dest.edge_count(), 2);
    assert!(dest.outgoing(&created[2]).expect("out c").is_empty());
    topo_sort(&dest).expect("copy is acyclic");
}

#[test]
fn reachable_keeps_back_edges() {
    let (source, nodes) = ring();
    let stray = source.add_node("stray");
    source.add_edge(&stray, &nodes[0]).expect("stray->a");
    let dest = MemoryGraph::new("copy");

    let created = reachable(&nodes[1], &source, &dest).expect("reachable");
    assert_eq!(created.len(), 3);
    assert_eq!(dest.edge_count(), 3);
    assert!(dest.find_by_label("stray").is_empty());
}

#[test]
fn transfer_copies_the_induced_subgraph_once() {
    let (source, nodes) = ring();
    let dest = MemoryGraph::new("copy");

    let picked = vec![nodes[0].clone(), nodes[1].clone(), nodes[0].clone()];
    let created = transfer(&picked, &source, &dest).expect("transfer");
    assert_eq!(created.len(), 2);
    assert_eq!(dest.edge_count(), 1);
}

#[test]
fn destination_must_accept_edges() {
    let (source, nodes) = ring();
    let dest = LinesGraph::new("lines", Vec::new());
    let err = break_cycles(&nodes[0], &source, &dest).expect_err("no edge create");
    assert_eq!(err.code(), ErrorCode::MissingCapability);
}

proptest! {
    #[test]
    fn broken_copies_are_acyclic_trees(
        size in 1usize..10,
        edges in proptest::collection::vec((0usize..10, 0usize..10), 0..30),
    ) {
        let source = MemoryGraph::new("generated");
        let nodes: Vec<NodeRef> = (0..size).map(|i| source.add_node(&format!("n{i}"))).collect();
        for (from, to) in edges {
            if from < size && to < size {
                source.add_edge(&nodes[from], &nodes[to]).expect("edge");
            }
        }
        let dest = MemoryGraph::new("copy");
        let created = break_cycles(&nodes[0], &source, &dest).expect("break");

        let reached = paths_reached(&source, &nodes[0]);
        prop_assert_eq!(created.len(), reached);
        prop_assert_eq!(dest.node_count(), reached);
        prop_assert_eq!(dest.edge_count(), reached - 1);
        prop_assert!(topo_sort(&dest).is_ok());
    }
}

fn paths_reached(graph: &MemoryGraph, start: &NodeRef) -> usize {
    let mut seen = HashSet::from([start.fingerprint()]);
    let mut pending = vec![start.clone()];
    while let Some(node) = pending.pop() {
        for child in graph.outgoing(&node).expect("outgoing") {
            if seen.insert(child.fingerprint()) {
                pending.push(child);
            }
        }
    }
    seen.len()
}
