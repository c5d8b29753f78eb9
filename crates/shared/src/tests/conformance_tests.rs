use super::*;

use std::{any::Any, collections::BTreeMap};

use proptest::prelude::*;

use crate::{
    error::ErrorCode,
    protocol::{Constrained, Directed, Neighbors, TextNode},
};

/// Adjacency-list graph for exercising the checks.
struct Table {
    edges: BTreeMap<String, Vec<String>>,
    constraints: Vec<Constraint>,
}

impl Table {
    fn new(edges: &[(&str, &str)], constraints: Vec<Constraint>) -> Self {
        let mut table: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (from, to) in edges {
            table.entry(from.to_string()).or_default().push(to.to_string());
            table.entry(to.to_string()).or_default();
        }
        Self {
            edges: table,
            constraints,
        }
    }
}

impl Graph for Table {
    fn name(&self) -> String {
        "table".into()
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(self.edges.keys().map(TextNode::node).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_directed(&self) -> Option<&dyn Directed> {
        Some(self)
    }

    fn as_neighbors(&self) -> Option<&dyn Neighbors> {
        Some(self)
    }

    fn as_constrained(&self) -> Option<&dyn Constrained> {
        Some(self)
    }
}

impl Directed for Table {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let key = node.fingerprint();
        Ok(self
            .edges
            .iter()
            .filter(|(_, targets)| targets.contains(&key))
            .map(|(from, _)| TextNode::node(from.clone()))
            .collect())
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        Ok(self
            .edges
            .get(&node.fingerprint())
            .map(|targets| targets.iter().map(TextNode::node).collect())
            .unwrap_or_default())
    }
}

impl Neighbors for Table {
    fn neighbors(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let mut all = self.outgoing(node)?;
        all.extend(self.incoming(node)?);
        Ok(all)
    }
}

impl Constrained for Table {
    fn constraints(&self) -> Vec<Constraint> {
        self.constraints.clone()
    }
}

#[test]
fn plain_graph_passes_conformance() {
    let table = Table::new(&[("a", "b"), ("b", "c")], vec![]);
    check_graph(&table).expect("conformant");
    check_symmetric_neighbors(&table).expect("symmetric");
}

#[test]
fn self_neighbor_is_rejected() {
    let table = Table::new(&[("a", "a")], vec![]);
    let err = check_symmetric_neighbors(&table).expect_err("self loop");
    assert!(err.to_string().contains("itself"));
}

#[test]
fn dag_constraint_catches_cycle() {
    let table = Table::new(&[("a", "b"), ("b", "a")], vec![Constraint::Dag]);
    let err = check_constraints(&table).expect_err("cycle");
    assert_eq!(err.code(), ErrorCode::CycleDetected);
}

#[test]
fn tree_constraint_catches_second_parent() {
    let table = Table::new(&[("a", "c"), ("b", "c")], vec![Constraint::Tree]);
    let err = check_constraints(&table).expect_err("two parents");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}

#[test]
fn strict_and_connected_constraints() {
    let table = Table::new(
        &[("a", "b"), ("a", "b")],
        vec![Constraint::Strict, Constraint::Connected],
    );
    assert!(check_constraints(&table).is_err());

    let split = Table::new(&[("a", "b"), ("c", "d")], vec![Constraint::Connected]);
    assert!(check_constraints(&split).is_err());

    let joined = Table::new(&[("a", "b"), ("c", "b")], vec![Constraint::Connected]);
    check_constraints(&joined).expect("connected");
}

proptest! {
    #[test]
    fn generated_graphs_have_stable_fingerprints_and_symmetric_neighbors(
        edges in proptest::collection::vec((0u8..8, 0u8..8), 0..24)
    ) {
        let named: Vec<(String, String)> = edges
            .into_iter()
            .filter(|(from, to)| from != to)
            .map(|(from, to)| (format!("n{from}"), format!("n{to}")))
            .collect();
        let borrowed: Vec<(&str, &str)> = named
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        let table = Table::new(&borrowed, vec![]);
        prop_assert!(check_graph(&table).is_ok());
        prop_assert!(check_symmetric_neighbors(&table).is_ok());
    }
}
