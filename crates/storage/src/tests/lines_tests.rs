use super::*;

use shared::{conformance::check_graph, error::ErrorCode};

fn texts(graph: &LinesGraph) -> Vec<String> {
    graph.lines()
}

#[test]
fn lines_link_to_their_successor() {
    let graph = LinesGraph::parse("todo", "milk\neggs\nbread\n");
    let home = graph.home_nodes().expect("home");
    assert_eq!(home.len(), 3);

    let next = graph.outgoing(&home[0]).expect("next");
    assert_eq!(next[0].label(), "eggs");
    assert!(graph.incoming(&home[0]).expect("prev").is_empty());
    assert!(graph.outgoing(&home[2]).expect("after last").is_empty());
    check_graph(&graph).expect("conformant");
}

#[test]
fn swap_and_rename_edit_in_place() {
    let graph = LinesGraph::parse("todo", "a\nb\nc");
    let home = graph.home_nodes().expect("home");
    graph.node_swap(&home[0], &home[2]).expect("swap");
    assert_eq!(texts(&graph), vec!["c", "b", "a"]);

    // The old handle for line 0 now points at a different text.
    let err = graph.node_rename(&home[0], "z").expect_err("stale");
    assert_eq!(err.code(), ErrorCode::NotFound);

    let fresh = graph.home_nodes().expect("home");
    graph.node_rename(&fresh[1], "B").expect("rename");
    assert_eq!(texts(&graph), vec!["c", "B", "a"]);
}

#[test]
fn reader_writes_one_line_per_node() {
    let graph = LinesGraph::parse("todo", "a\nb");
    graph.node_create("c").expect("append");
    let mut text = String::new();
    graph
        .get_reader()
        .expect("reader")
        .read_to_string(&mut text)
        .expect("read");
    assert_eq!(text, "a\nb\nc\n");
}

#[test]
fn dimension_opens_text_streams() {
    let dimension = LinesDimension::new();
    let mut input = Cursor::new(b"one\ntwo".to_vec());
    let graph = dimension.open(&mut input).expect("open");
    assert_eq!(graph.home_nodes().expect("home").len(), 2);
    assert!(graph.as_node_swap().is_some());
}
