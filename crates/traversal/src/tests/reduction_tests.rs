use super::*;

use shared::{error::ErrorCode, protocol::Directed};
use storage::{LinesGraph, MemoryGraph};

fn out_labels(graph: &MemoryGraph, node: &NodeRef) -> Vec<String> {
    graph
        .outgoing(node)
        .expect("outgoing")
        .iter()
        .map(|node| node.label())
        .collect()
}

#[test]
fn shortcut_over_one_hop_is_removed() {
    let graph = MemoryGraph::new("g");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    let c = graph.add_node("c");
    graph.add_edge(&a, &b).expect("a->b");
    graph.add_edge(&b, &c).expect("b->c");
    graph.add_edge(&a, &c).expect("a->c");

    assert_eq!(transitive_reduction(&graph).expect("reduce"), 1);
    assert_eq!(out_labels(&graph, &a), vec!["b"]);
    assert_eq!(out_labels(&graph, &b), vec!["c"]);
}

#[test]
fn longer_shortcuts_survive() {
    let graph = MemoryGraph::new("g");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    let c = graph.add_node("c");
    let d = graph.add_node("d");
    graph.add_edge(&a, &b).expect("a->b");
    graph.add_edge(&b, &c).expect("b->c");
    graph.add_edge(&c, &d).expect("c->d");
    graph.add_edge(&a, &d).expect("a->d");

    assert_eq!(transitive_reduction(&graph).expect("reduce"), 0);
    assert_eq!(graph.edge_count(), 4);
}

#[test]
fn self_loops_do_not_make_edges_redundant() {
    let graph = MemoryGraph::new("g");
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    graph.add_edge(&a, &a).expect("a->a");
    graph.add_edge(&a, &b).expect("a->b");
    graph.add_edge(&b, &b).expect("b->b");

    assert_eq!(transitive_reduction(&graph).expect("reduce"), 0);
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn graphs_without_edge_delete_are_rejected() {
    let graph = LinesGraph::parse("lines", "a\nb");
    let err = transitive_reduction(&graph).expect_err("no edge delete");
    assert_eq!(err.code(), ErrorCode::MissingCapability);
}
