use super::*;

use shared::error::ErrorCode;
use storage::{LinesGraph, MemoryGraph};

fn labels(nodes: &[NodeRef]) -> Vec<String> {
    nodes.iter().map(|node| node.label()).collect()
}

fn position(sorted: &[NodeRef], label: &str) -> usize {
    sorted
        .iter()
        .position(|node| node.label() == label)
        .expect("label present")
}

#[test]
fn chain_sorts_in_edge_order() {
    let graph = MemoryGraph::new("chain");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    let c = graph.add_node("c");
    graph.add_edge(&a, &b).expect("a->b");
    graph.add_edge(&b, &c).expect("b->c");

    let sorted = topo_sort(&graph).expect("sort");
    assert_eq!(labels(&sorted), vec!["a", "b", "c"]);
}

#[test]
fn every_edge_points_forward() {
    let graph = MemoryGraph::new("diamond");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    let c = graph.add_node("c");
    let d = graph.add_node("d");
    let e = graph.add_node("e");
    for (from, to) in [(&a, &b), (&a, &c), (&b, &d), (&c, &d), (&e, &d)] {
        graph.add_edge(from, to).expect("edge");
    }

    let sorted = topo_sort(&graph).expect("sort");
    assert_eq!(sorted.len(), 5);
    for (from, to) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("e", "d")] {
        assert!(position(&sorted, from) < position(&sorted, to), "{from} before {to}");
    }
}

#[test]
fn two_cycle_is_rejected() {
    let graph = MemoryGraph::new("pair");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    graph.add_edge(&a, &b).expect("a->b");
    graph.add_edge(&b, &a).expect("b->a");

    let err = topo_sort(&graph).expect_err("cycle");
    assert_eq!(err.code(), ErrorCode::CycleDetected);
}

#[test]
fn cycle_behind_a_root_is_rejected() {
    let graph = MemoryGraph::new("tail");
    let root = graph.add_node("root");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    graph.add_edge(&root, &a).expect("root->a");
    graph.add_edge(&a, &b).expect("a->b");
    graph.add_edge(&b, &a).expect("b->a");

    let err = topo_sort(&graph).expect_err("cycle");
    assert_eq!(err.code(), ErrorCode::CycleDetected);
}

#[test]
fn empty_graph_sorts_to_nothing() {
    let graph = MemoryGraph::new("empty");
    assert!(topo_sort(&graph).expect("sort").is_empty());
}

#[test]
fn lines_sort_top_to_bottom() {
    let graph = LinesGraph::parse("todo", "one\ntwo\nthree");
    let sorted = topo_sort(&graph).expect("sort");
    assert_eq!(labels(&sorted), vec!["one", "two", "three"]);
}
