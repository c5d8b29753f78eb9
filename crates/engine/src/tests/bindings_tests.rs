use super::*;

use proptest::prelude::*;
use shared::{conformance::check_graph, error::ErrorCode};

fn chord(text: &str) -> Chord {
    Chord::parse(text).expect("chord")
}

fn sample() -> BindingIndex {
    let chords = BTreeMap::from([
        ("A".to_string(), "g,g".to_string()),
        ("B".to_string(), "g,d".to_string()),
    ]);
    BindingIndex::from_map(["A", "B", "C"], &chords).expect("index")
}

fn commands(found: &[BindingNode]) -> Vec<String> {
    found.iter().filter_map(|node| node.command.clone()).collect()
}

fn find(index: &BindingIndex, matches: impl Fn(&BindingNode) -> bool) -> NodeRef {
    index
        .node_all()
        .expect("all")
        .into_iter()
        .find(|node| {
            downcast_node::<BindingNode>(node)
                .map(|binding| matches(binding))
                .unwrap_or(false)
        })
        .expect("binding present")
}

fn prefix(index: &BindingIndex, text: &str) -> NodeRef {
    let wanted = chord(text);
    find(index, |node| !node.is_leaf() && node.chord == wanted)
}

fn leaf(index: &BindingIndex, name: &str) -> NodeRef {
    find(index, |node| node.command.as_deref() == Some(name))
}

#[test]
fn filter_and_dispatch_follow_shared_prefixes() {
    let index = sample();
    assert_eq!(commands(&index.filter(&chord("g"))), vec!["A", "B"]);
    assert_eq!(commands(&index.filter(&chord("g,g"))), vec!["A"]);
    assert!(index.filter(&chord("x")).is_empty());

    assert_eq!(index.dispatch(&chord("g")), Dispatch::Pending(2));
    assert_eq!(index.dispatch(&chord("g,g")), Dispatch::Run("A".into()));
    assert_eq!(index.dispatch(&chord("x")), Dispatch::Unbound);
    assert_eq!(index.dispatch(&Chord::default()), Dispatch::Unbound);
}

#[test]
fn shared_prefix_nodes_are_reused() {
    let index = sample();
    // leaves A B C, prefixes g, g,g and g,d
    assert_eq!(index.node_count(), 6);
    let g = prefix(&index, "g");
    assert_eq!(index.outgoing(&g).expect("below g").len(), 2);
    check_graph(&index).expect("conformant");
}

#[test]
fn persisted_form_round_trips() {
    let index = sample();
    let mut text = String::new();
    index
        .get_reader()
        .expect("reader")
        .read_to_string(&mut text)
        .expect("read");
    let written: BTreeMap<String, String> = serde_json::from_str(&text).expect("json");
    assert_eq!(written, index.to_map());
    assert!(!written.contains_key("C"));

    let reloaded = BindingIndex::new(["A", "B", "C"]);
    assert_eq!(reloaded.load(&mut text.as_bytes()).expect("load"), 2);
    assert_eq!(reloaded.to_map(), index.to_map());
}

#[test]
fn unknown_commands_are_skipped_on_load() {
    let index = BindingIndex::new(["A"]);
    let json = r#"{ "A": "x", "Nope": "y" }"#;
    assert_eq!(index.load(&mut json.as_bytes()).expect("load"), 1);
    assert_eq!(index.chord_of("A"), Some(chord("x")));

    let err = index.load(&mut "not json".as_bytes()).expect_err("bad json");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}

#[test]
fn a_chord_binds_one_command() {
    let index = sample();
    let err = index.bind("C", &chord("g,g")).expect_err("taken");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
    let err = index.bind("Z", &chord("z")).expect_err("unknown");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[test]
fn rebinding_drops_the_old_path() {
    let index = sample();
    index.bind("A", &chord("z")).expect("rebind");

    assert_eq!(index.chord_of("A"), Some(chord("z")));
    assert_eq!(index.dispatch(&chord("g")), Dispatch::Run("B".into()));
    // g,g is gone, z is new
    assert_eq!(index.node_count(), 6);

    index.bind("B", &Chord::default()).expect("unbind");
    assert_eq!(index.to_map().len(), 1);
    assert_eq!(index.node_count(), 4);
}

#[test]
fn home_nodes_are_the_command_leaves() {
    let index = sample();
    let labels: Vec<String> = index
        .home_nodes()
        .expect("home")
        .iter()
        .map(|node| node.label())
        .collect();
    assert_eq!(labels, vec!["A [g,g]", "B [g,d]", "C"]);
}

#[test]
fn linking_below_a_prefix_prepends_its_chord() {
    let index = sample();
    let x = index.node_create("x").expect("x");
    let g = prefix(&index, "g");

    index.edge_create(&x, &g).expect("x -> g");
    assert_eq!(index.chord_of("A"), Some(chord("x,g,g")));
    assert_eq!(index.chord_of("B"), Some(chord("x,g,d")));
    assert_eq!(index.dispatch(&chord("x,g,g")), Dispatch::Run("A".into()));
    assert_eq!(index.dispatch(&chord("g")), Dispatch::Unbound);

    let c = leaf(&index, "C");
    index.edge_create(&x, &c).expect("x -> C");
    assert_eq!(index.chord_of("C"), Some(chord("x")));
    assert_eq!(index.dispatch(&chord("x")), Dispatch::Pending(3));
}

#[test]
fn links_that_close_a_cycle_are_refused() {
    let index = sample();
    let x = index.node_create("x").expect("x");
    index.edge_create(&x, &prefix(&index, "g")).expect("x -> g");

    let gg = prefix(&index, "x,g,g");
    let err = index.edge_create(&gg, &x).expect_err("cycle");
    assert_eq!(err.code(), ErrorCode::CycleDetected);
    let err = index.edge_create(&x, &x).expect_err("self loop");
    assert_eq!(err.code(), ErrorCode::CycleDetected);
}

#[test]
fn edges_cannot_start_at_commands() {
    let index = sample();
    let err = index
        .edge_create(&leaf(&index, "A"), &leaf(&index, "C"))
        .expect_err("leaf source");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
    let err = index.node_create("bogus").expect_err("bad key");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}

#[test]
fn deleting_an_edge_unbinds_everything_below() {
    let index = sample();
    let g = prefix(&index, "g");
    let gg = prefix(&index, "g,g");

    index.edge_delete(&g, &gg).expect("delete");
    assert_eq!(index.chord_of("A"), Some(Chord::default()));
    assert_eq!(index.to_map().len(), 1);
    assert_eq!(index.node_count(), 5);
    assert_eq!(index.dispatch(&chord("g")), Dispatch::Run("B".into()));

    let err = index.edge_delete(&g, &gg).expect_err("already gone");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[test]
fn relinked_leaves_leave_their_old_prefix() {
    let index = sample();
    let x = index.node_create("x").expect("x");
    let a = leaf(&index, "A");

    index.edge_create(&x, &a).expect("x -> A");
    assert_eq!(index.chord_of("A"), Some(chord("x,g,g")));
    assert_eq!(index.incoming(&a).expect("parents").len(), 1);
    // g,g lost its only leaf
    assert_eq!(index.node_count(), 6);
    assert_eq!(index.dispatch(&chord("g")), Dispatch::Run("B".into()));

    index.edge_delete(&x, &a).expect("delete");
    assert_eq!(index.chord_of("A"), Some(Chord::default()));
    assert_eq!(index.dispatch(&chord("x,g,g")), Dispatch::Unbound);
    assert_eq!(index.dispatch(&chord("g,g")), Dispatch::Unbound);
    assert_eq!(index.to_map(), BTreeMap::from([("B".to_string(), "g,d".to_string())]));
    check_graph(&index).expect("conformant");
}

fn chord_text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 1..4)
        .prop_map(|keys| keys.join(","))
}

proptest! {
    #[test]
    fn bound_chords_are_found_and_unbinding_leaves_no_prefixes(
        chords in prop::collection::vec(chord_text(), 4)
    ) {
        let names = ["A", "B", "C", "D"];
        let index = BindingIndex::new(names);
        for (name, text) in names.iter().zip(&chords) {
            if let Err(err) = index.bind(name, &chord(text)) {
                // exact duplicates only
                prop_assert_eq!(err.code(), ErrorCode::InvalidInput);
            }
        }
        for name in names {
            if let Some(bound) = index.chord_of(name).filter(|bound| !bound.is_empty()) {
                prop_assert!(commands(&index.filter(&bound)).contains(&name.to_string()));
            }
        }

        for name in names {
            index.bind(name, &Chord::default()).expect("unbind");
        }
        prop_assert_eq!(index.node_count(), names.len());
        prop_assert!(index.to_map().is_empty());
    }
}
