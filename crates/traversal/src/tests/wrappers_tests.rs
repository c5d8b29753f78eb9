use super::*;

use shared::{
    error::ErrorCode,
    protocol::{tunnel, NodeCreate, Tunnel},
};
use storage::MemoryGraph;

fn labels(nodes: &[NodeRef]) -> Vec<String> {
    nodes.iter().map(|node| node.label()).collect()
}

fn pair() -> (Arc<MemoryGraph>, NodeRef, NodeRef) {
    let graph = Arc::new(MemoryGraph::new("pair"));
    let a = graph.add_node("keep-a");
    let b = graph.add_node("drop-b");
    graph.add_edge(&a, &b).expect("a->b");
    (graph, a, b)
}

#[test]
fn inverted_swaps_edge_directions() {
    let (graph, a, b) = pair();
    let inverted = Inverted::new(graph.clone());

    assert_eq!(labels(&inverted.outgoing(&b).expect("out b")), vec!["keep-a"]);
    assert!(inverted.outgoing(&a).expect("out a").is_empty());
    assert_eq!(inverted.name(), "inverted(pair)");
}

#[test]
fn inverted_edits_land_reversed() {
    let (graph, a, b) = pair();
    let inverted = Inverted::new(graph.clone());

    inverted.edge_create(&a, &b).expect("create");
    assert_eq!(labels(&graph.incoming(&a).expect("in a")), vec!["drop-b"]);
    inverted.edge_delete(&a, &b).expect("delete");
    assert!(graph.incoming(&a).expect("in a").is_empty());
}

#[test]
fn inverted_only_offers_what_the_inner_graph_has() {
    let (graph, _, _) = pair();
    let inverted = Inverted::new(graph);
    assert!(inverted.as_node_all().is_some());
    assert!(inverted.as_node_create().is_none());

    let lines: GraphRef = Arc::new(storage::LinesGraph::new("lines", Vec::new()));
    assert!(Inverted::new(lines).as_edge_create().is_none());
}

#[test]
fn filter_hides_non_matching_nodes() {
    let (graph, a, _) = pair();
    let filtered = Filtered::new(graph.clone(), "^keep").expect("filter");

    assert_eq!(labels(&filtered.node_all().expect("all")), vec!["keep-a"]);
    assert!(filtered.outgoing(&a).expect("out a").is_empty());

    filtered.set_pattern("b#").expect("pattern");
    assert_eq!(labels(&filtered.node_all().expect("all")), vec!["drop-b"]);
    assert_eq!(filtered.pattern(), "b#");
}

#[test]
fn bad_patterns_are_invalid_input() {
    let (graph, _, _) = pair();
    let err = Filtered::new(graph.clone(), "(").err().expect("bad regex");
    assert_eq!(err.code(), ErrorCode::InvalidInput);

    let filtered = Filtered::new(graph, ".*").expect("filter");
    let err = filtered.set_pattern("[").expect_err("bad regex");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
    assert_eq!(filtered.pattern(), ".*");
}

#[test]
fn edits_tunnel_below_stacked_decorators() {
    let (graph, _, _) = pair();
    let filtered: GraphRef = Arc::new(Filtered::new(graph.clone(), "^keep").expect("filter"));
    let top: GraphRef = Arc::new(Inverted::new(filtered));

    let outcome = tunnel::<MemoryGraph, _>(&top, |memory| {
        memory.node_create("keep-c")?;
        Ok(graph.clone() as GraphRef)
    })
    .expect("tunnel");
    let Tunnel::Found(replacement) = outcome else {
        panic!("memory graph not reached");
    };
    assert!(Arc::ptr_eq(&replacement, &top));
    let visible = replacement.as_node_all().expect("node all").node_all().expect("all");
    assert_eq!(labels(&visible), vec!["keep-a", "keep-c"]);
}

#[test]
fn inverted_dimension_only_wraps() {
    let dimension = InvertedDimension;
    let err = dimension.new_graph().expect_err("no fresh graphs");
    assert_eq!(err.code(), ErrorCode::InvalidInput);

    let (graph, _, b) = pair();
    let wrapped = dimension
        .as_wrapper()
        .expect("wrapper")
        .wrap(graph)
        .expect("wrap");
    let directed = wrapped.as_directed().expect("directed");
    assert_eq!(labels(&directed.outgoing(&b).expect("out b")), vec!["keep-a"]);
}
