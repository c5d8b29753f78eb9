use super::*;

use std::{
    any::Any,
    sync::atomic::{AtomicUsize, Ordering},
};

use shared::{
    error::ErrorCode,
    protocol::{Closer, TextNode},
};
use storage::{LinesGraph, MemoryGraph};
use traversal::Inverted;

use crate::history::HistoryGraph;

fn memory(name: &str, labels: &[&str]) -> Arc<MemoryGraph> {
    let graph = MemoryGraph::new(name);
    for label in labels {
        graph.add_node(label);
    }
    Arc::new(graph)
}

fn navigator() -> Arc<Navigator> {
    Navigator::new(Arc::new(NavigatorGraph::new()), Arc::new(Catalog::new()), 8)
        .expect("navigator")
}

fn labels(frame: &Frame) -> Vec<String> {
    frame.items().iter().map(|node| node.label()).collect()
}

#[derive(Default)]
struct Closing {
    closed: AtomicUsize,
}

impl Graph for Closing {
    fn name(&self) -> String {
        "closing".into()
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(vec![TextNode::node("only")])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_closer(&self) -> Option<&dyn Closer> {
        Some(self)
    }
}

impl Closer for Closing {
    fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Blank;

impl Graph for Blank {
    fn name(&self) -> String {
        "blank".into()
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(vec![TextNode::node("")])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn base_frame_is_never_popped() {
    let nav = navigator();
    let base = nav.peek();
    assert_eq!(nav.pop(), base);
    assert_eq!(nav.depth(), 1);
    assert!(nav.history().is_empty());
}

#[test]
fn pop_restores_the_previous_frame_and_records_history() {
    let nav = navigator();
    let base = nav.peek();
    let pushed = nav.push(memory("m", &["a", "b"])).expect("push");
    assert_eq!(nav.depth(), 2);
    assert_eq!(labels(&nav.frame(pushed).expect("frame")), vec!["a", "b"]);

    assert_eq!(nav.pop(), base);
    assert_eq!(nav.history(), vec![vec![base, pushed]]);
    // still reachable through history
    assert!(nav.frame(pushed).is_some());
}

#[test]
fn history_limit_frees_forgotten_frames() {
    let nav = Navigator::new(Arc::new(NavigatorGraph::new()), Arc::new(Catalog::new()), 1)
        .expect("navigator");
    let first = nav.push(memory("first", &["a"])).expect("push");
    nav.pop();
    let second = nav.push(memory("second", &["b"])).expect("push");
    nav.pop();

    assert_eq!(nav.history().len(), 1);
    assert!(nav.frame(first).is_none());
    assert_eq!(
        nav.frame(second).map(|frame| frame.graph().name()),
        Some("second".to_string())
    );
}

#[test]
fn pop_writes_back_and_closes() {
    let nav = navigator();
    let writes = Arc::new(AtomicUsize::new(0));
    let counter = writes.clone();
    let closing = Arc::new(Closing::default());
    nav.push_with_write_back(
        closing.clone(),
        Arc::new(move |graph: &dyn Graph| -> Result<()> {
            assert_eq!(graph.name(), "closing");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    )
    .expect("push");

    nav.pop();
    assert_eq!(writes.load(Ordering::SeqCst), 1);
    assert_eq!(closing.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn graphs_still_on_the_stack_are_not_closed() {
    let nav = navigator();
    let closing = Arc::new(Closing::default());
    nav.push(closing.clone()).expect("push");
    nav.push(closing.clone()).expect("push again");
    nav.pop();
    assert_eq!(closing.closed.load(Ordering::SeqCst), 0);
    nav.pop();
    assert_eq!(closing.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn nonconforming_graphs_are_refused() {
    let nav = navigator();
    let err = nav.push(Arc::new(Blank)).expect_err("empty fingerprint");
    assert_eq!(err.code(), ErrorCode::NilInput);
    assert_eq!(nav.depth(), 1);
}

#[test]
fn base_frame_replacement_needs_the_navigator() {
    let plain =
        Navigator::new(memory("root", &["a"]), Arc::new(Catalog::new()), 8).expect("navigator");
    let err = plain.replace(memory("other", &["b"])).expect_err("refused");
    assert_eq!(err.code(), ErrorCode::InvalidInput);

    let nav = navigator();
    let replaced = nav.replace(memory("other", &["b"])).expect("replace");
    assert_eq!(nav.peek(), replaced);
    assert_eq!(nav.depth(), 1);
    assert_eq!(nav.history().len(), 1);
}

#[test]
fn edits_tunnel_through_decorators() {
    let nav = navigator();
    let inner = memory("m", &["a"]);
    nav.push(Arc::new(Inverted::new(inner.clone()))).expect("push");
    let top = nav.peek();

    let target = inner.clone();
    let outcome = nav
        .edit_current::<MemoryGraph, _>(move |graph| {
            graph.add_node("late");
            Ok(target as GraphRef)
        })
        .expect("edit");
    assert_eq!(outcome, Tunnel::Found(top));
    let frame = nav.frame(top).expect("frame");
    assert_eq!(labels(&frame), vec!["a", "late"]);
}

#[test]
fn edits_without_a_matching_graph_are_dead_ends() {
    let nav = navigator();
    nav.push(Arc::new(Inverted::new(memory("m", &["a"])))).expect("push");
    let depth = nav.depth();
    let outcome = nav
        .edit_current::<LinesGraph, _>(|_| Err(GraphError::Internal("not reached".into())))
        .expect("edit");
    assert_eq!(outcome, Tunnel::DeadEnd);
    assert_eq!(nav.depth(), depth);
}

#[test]
fn selection_survives_refreshes() {
    let nav = navigator();
    let graph = memory("m", &["a", "b", "c"]);
    nav.push(graph.clone()).expect("push");
    nav.with_top(|frame| {
        frame.move_cursor(1);
        frame.toggle_selected();
        frame.move_cursor(5);
        frame.toggle_selected();
    });
    let picked: Vec<String> = nav.targets().iter().map(|node| node.label()).collect();
    assert_eq!(picked, vec!["b", "c"]);

    nav.with_top(Frame::invert_selection);
    let picked: Vec<String> = nav.targets().iter().map(|node| node.label()).collect();
    assert_eq!(picked, vec!["a"]);

    graph.add_node("d");
    nav.refresh().expect("refresh");
    let picked: Vec<String> = nav.targets().iter().map(|node| node.label()).collect();
    assert_eq!(picked, vec!["a"]);

    nav.with_top(Frame::deselect_all);
    assert_eq!(nav.cursor_node().map(|node| node.label()), Some("c".to_string()));
    assert_eq!(nav.targets().len(), 1);
}

#[test]
fn cursor_is_clamped() {
    let nav = navigator();
    nav.push(memory("m", &["a", "b"])).expect("push");
    nav.with_top(|frame| frame.move_cursor(-3));
    assert_eq!(nav.cursor_node().map(|node| node.label()), Some("a".to_string()));
    nav.with_top(|frame| frame.set_cursor(usize::MAX));
    assert_eq!(nav.cursor_node().map(|node| node.label()), Some("b".to_string()));
    nav.set_items(Vec::new());
    assert!(nav.cursor_node().is_none());
}

#[test]
fn history_graph_lists_past_shapes() {
    let nav = navigator();
    nav.push(memory("m", &["a"])).expect("push");
    nav.pop();

    let history = HistoryGraph::capture(&nav);
    // one popped shape plus the live stack
    assert_eq!(history.len(), 2);
    let home = history.home_nodes().expect("home");
    assert_eq!(home.len(), 2);

    let directed = history.as_directed().expect("directed");
    let next = directed.outgoing(&home[0]).expect("outgoing");
    assert_eq!(next.len(), 1);
    assert!(next[0].fingerprint().ends_with(":m"));
    assert_eq!(
        directed.incoming(&next[0]).expect("incoming")[0].fingerprint(),
        home[0].fingerprint()
    );
    assert!(directed.outgoing(&home[1]).expect("outgoing").is_empty());
}

#[test]
fn open_graphs_skip_the_navigator_and_duplicates() {
    let nav = navigator();
    let graph = memory("m", &["a"]);
    nav.adopt(graph.clone());
    nav.push(graph).expect("push");
    let open: Vec<String> = nav.open_graphs().iter().map(|graph| graph.name()).collect();
    assert_eq!(open, vec!["m"]);
}

#[test]
fn closed_graphs_are_no_longer_listed() {
    let nav = navigator();
    let closing = Arc::new(Closing::default());
    nav.adopt(closing.clone());
    nav.adopt(memory("kept", &["a"]));
    nav.push(closing.clone()).expect("push");
    nav.pop();

    assert_eq!(closing.closed.load(Ordering::SeqCst), 1);
    let open: Vec<String> = nav.open_graphs().iter().map(|graph| graph.name()).collect();
    assert_eq!(open, vec!["kept"]);
}

#[test]
fn pop_frame_only_pops_the_expected_top() {
    let nav = navigator();
    let first = nav.push(memory("first", &["a"])).expect("push");
    let second = nav.push(memory("second", &["b"])).expect("push");

    assert!(!nav.pop_frame(first));
    assert_eq!(nav.peek(), second);
    assert!(nav.pop_frame(second));
    assert_eq!(nav.peek(), first);
}
