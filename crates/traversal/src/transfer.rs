//! Copying nodes from one graph into another. Destination nodes are created
//! from source labels; source fingerprints key the bookkeeping.

use std::collections::{HashMap, HashSet};

use shared::{
    error::{GraphError, Result},
    protocol::{
        require, stable_fingerprint, Capability, EdgeCreate, Graph, NodeCreate, NodeRef,
    },
};
use tracing::debug;

use crate::explore::{bfs, Flow};

fn writers(dest: &dyn Graph) -> Result<(&dyn NodeCreate, &dyn EdgeCreate)> {
    Ok((
        require(dest.as_node_create(), Capability::NodeCreate, dest)?,
        require(dest.as_edge_create(), Capability::EdgeCreate, dest)?,
    ))
}

/// Breadth-first copy rooted at `start` in which every fingerprint is
/// materialized once. Reaching an already copied node drops that edge, so
/// the copy is acyclic. Returns the created nodes in creation order.
pub fn break_cycles(
    start: &NodeRef,
    source: &dyn Graph,
    dest: &dyn Graph,
) -> Result<Vec<NodeRef>> {
    let (create, link) = writers(dest)?;
    let mut created: HashMap<String, NodeRef> = HashMap::new();
    let mut order = Vec::new();

    bfs(source, start, |path| {
        let Some((node, before)) = path.split_last() else {
            return Ok(Flow::Prune);
        };
        let key = stable_fingerprint(node)?;
        if created.contains_key(&key) {
            return Ok(Flow::Prune);
        }
        let copy = create.node_create(&node.label())?;
        if let Some(parent) = before.last() {
            let parent_key = stable_fingerprint(parent)?;
            let parent_copy = created.get(&parent_key).ok_or_else(|| {
                GraphError::NotFound(format!("copy of parent '{parent_key}'"))
            })?;
            link.edge_create(parent_copy, &copy)?;
        }
        created.insert(key, copy.clone());
        order.push(copy);
        Ok(Flow::Descend)
    })?;

    debug!(source = %source.name(), dest = %dest.name(), nodes = order.len(), "broke cycles");
    Ok(order)
}

/// Copies everything reachable from `start`, reconnecting every edge between
/// copied nodes. Two distinct source nodes sharing a fingerprint are copied
/// once, so such graphs are under-counted.
pub fn reachable(start: &NodeRef, source: &dyn Graph, dest: &dyn Graph) -> Result<Vec<NodeRef>> {
    let directed = require(source.as_directed(), Capability::Directed, source)?;
    let (create, link) = writers(dest)?;

    let mut seen: HashMap<String, NodeRef> = HashMap::new();
    let root = create.node_create(&start.label())?;
    seen.insert(stable_fingerprint(start)?, root.clone());
    let mut order = vec![root.clone()];

    // Explicit stack of (source node, its copy) to keep deep graphs off the
    // call stack.
    let mut pending = vec![(start.clone(), root)];
    while let Some((node, copy)) = pending.pop() {
        for child in directed.outgoing(&node)? {
            let key = stable_fingerprint(&child)?;
            if let Some(existing) = seen.get(&key) {
                link.edge_create(&copy, existing)?;
                continue;
            }
            let child_copy = create.node_create(&child.label())?;
            link.edge_create(&copy, &child_copy)?;
            seen.insert(key, child_copy.clone());
            order.push(child_copy.clone());
            pending.push((child, child_copy));
        }
    }

    debug!(
        source = %source.name(),
        dest = %dest.name(),
        nodes = order.len(),
        "transferred reachable subgraph"
    );
    Ok(order)
}

/// Copies `nodes` and the edges among them.
pub fn transfer(
    nodes: &[NodeRef],
    source: &dyn Graph,
    dest: &dyn Graph,
) -> Result<Vec<NodeRef>> {
    let directed = require(source.as_directed(), Capability::Directed, source)?;
    let (create, link) = writers(dest)?;

    let mut copies: HashMap<String, NodeRef> = HashMap::new();
    let mut order = Vec::new();
    for node in nodes {
        let key = stable_fingerprint(node)?;
        if copies.contains_key(&key) {
            continue;
        }
        let copy = create.node_create(&node.label())?;
        copies.insert(key, copy.clone());
        order.push(copy);
    }
    let mut linked = HashSet::new();
    for node in nodes {
        let key = node.fingerprint();
        if !linked.insert(key.clone()) {
            continue;
        }
        let Some(copy) = copies.get(&key) else {
            continue;
        };
        for child in directed.outgoing(node)? {
            if let Some(child_copy) = copies.get(&stable_fingerprint(&child)?) {
                link.edge_create(copy, child_copy)?;
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
#[path = "tests/transfer_tests.rs"]
mod tests;
