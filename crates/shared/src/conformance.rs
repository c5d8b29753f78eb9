//! Checks every adapter is expected to pass. Adapter crates run these from
//! their tests; the navigator also runs `check_graph` before pushing.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    error::{GraphError, Result},
    protocol::{require, stable_fingerprint, Capability, Constraint, Graph, NodeRef},
};

/// Home nodes must enumerate without error and every returned node must have
/// a stable, non-empty fingerprint.
pub fn check_graph(graph: &dyn Graph) -> Result<()> {
    let home = graph.home_nodes()?;
    check_nodes(&home)?;
    if let Some(all) = graph.as_node_all() {
        check_nodes(&all.node_all()?)?;
    }
    Ok(())
}

pub fn check_nodes(nodes: &[NodeRef]) -> Result<()> {
    for node in nodes {
        stable_fingerprint(node)?;
    }
    Ok(())
}

/// `a in neighbors(b)` iff `b in neighbors(a)`, and no node neighbors itself.
pub fn check_symmetric_neighbors(graph: &dyn Graph) -> Result<()> {
    let neighbors = require(graph.as_neighbors(), Capability::Neighbors, graph)?;
    for node in candidates(graph)? {
        let key = stable_fingerprint(&node)?;
        for other in neighbors.neighbors(&node)? {
            let other_key = stable_fingerprint(&other)?;
            if other_key == key {
                return Err(GraphError::InvalidInput(format!(
                    "node '{key}' lists itself as a neighbor"
                )));
            }
            let back = neighbors.neighbors(&other)?;
            if !back.iter().any(|candidate| candidate.fingerprint() == key) {
                return Err(GraphError::InvalidInput(format!(
                    "'{other_key}' is a neighbor of '{key}' but not the other way around"
                )));
            }
        }
    }
    Ok(())
}

/// Verifies the structural constraints a graph declares about itself.
pub fn check_constraints(graph: &dyn Graph) -> Result<()> {
    let Some(constrained) = graph.as_constrained() else {
        return Ok(());
    };
    let constraints = constrained.constraints();
    if constraints.is_empty() {
        return Ok(());
    }
    let directed = require(graph.as_directed(), Capability::Directed, graph)?;
    let nodes = candidates(graph)?;

    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut indegree: HashMap<String, usize> = HashMap::new();
    for node in &nodes {
        let key = stable_fingerprint(node)?;
        let outgoing = directed
            .outgoing(node)?
            .iter()
            .map(stable_fingerprint)
            .collect::<Result<Vec<_>>>()?;
        indegree.entry(key.clone()).or_default();
        for target in &outgoing {
            *indegree.entry(target.clone()).or_default() += 1;
        }
        adjacency.insert(key, outgoing);
    }

    for constraint in constraints {
        match constraint {
            Constraint::Strict => {
                for (key, targets) in &adjacency {
                    let unique: HashSet<&String> = targets.iter().collect();
                    if unique.len() != targets.len() {
                        return Err(GraphError::InvalidInput(format!(
                            "strict graph has parallel edges from '{key}'"
                        )));
                    }
                }
            }
            Constraint::Tree => {
                if let Some((key, _)) = indegree.iter().find(|(_, count)| **count > 1) {
                    return Err(GraphError::InvalidInput(format!(
                        "tree node '{key}' has more than one parent"
                    )));
                }
                check_acyclic(&adjacency)?;
            }
            Constraint::Dag => check_acyclic(&adjacency)?,
            Constraint::Connected => check_connected(&adjacency)?,
        }
    }
    Ok(())
}

fn candidates(graph: &dyn Graph) -> Result<Vec<NodeRef>> {
    match graph.as_node_all() {
        Some(all) => all.node_all(),
        None => graph.home_nodes(),
    }
}

fn check_acyclic(adjacency: &HashMap<String, Vec<String>>) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Open,
        Closed,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut keys: Vec<&String> = adjacency.keys().collect();
    keys.sort();
    for root in keys {
        if marks.contains_key(root.as_str()) {
            continue;
        }
        // (node, index of next child to visit)
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        marks.insert(root.as_str(), Mark::Open);
        while let Some(&(key, next)) = stack.last() {
            let children = adjacency.get(key).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(child) = children.get(next) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match marks.get(child.as_str()) {
                    Some(Mark::Open) => {
                        return Err(GraphError::CycleDetected(format!(
                            "edge '{key}' -> '{child}' closes a cycle"
                        )))
                    }
                    Some(Mark::Closed) => {}
                    None => {
                        marks.insert(child.as_str(), Mark::Open);
                        stack.push((child.as_str(), 0));
                    }
                }
            } else {
                marks.insert(key, Mark::Closed);
                stack.pop();
            }
        }
    }
    Ok(())
}

fn check_connected(adjacency: &HashMap<String, Vec<String>>) -> Result<()> {
    let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, targets) in adjacency {
        undirected.entry(from.as_str()).or_default();
        for to in targets {
            undirected.entry(from.as_str()).or_default().push(to.as_str());
            undirected.entry(to.as_str()).or_default().push(from.as_str());
        }
    }
    let Some(start) = undirected.keys().min().copied() else {
        return Ok(());
    };
    let mut seen: HashSet<&str> = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(key) = queue.pop_front() {
        for &next in undirected.get(key).into_iter().flatten() {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    if seen.len() != undirected.len() {
        return Err(GraphError::InvalidInput(format!(
            "graph is not connected: reached {} of {} nodes",
            seen.len(),
            undirected.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/conformance_tests.rs"]
mod tests;
