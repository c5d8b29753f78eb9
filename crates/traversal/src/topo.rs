use std::collections::HashMap;

use shared::{
    error::{GraphError, Result},
    protocol::{require, stable_fingerprint, Capability, Graph, NodeRef},
};
use tracing::debug;

struct Entry {
    node: NodeRef,
    key: String,
    incoming: Vec<String>,
    outgoing: Vec<String>,
}

/// Kahn's algorithm over every node of the graph.
///
/// Ready nodes are kept on a stack, so among nodes that become ready
/// together the one promoted last is emitted first. That order follows the
/// adapter's enumeration order and carries no meaning beyond satisfying the
/// edges.
pub fn topo_sort(graph: &dyn Graph) -> Result<Vec<NodeRef>> {
    let all = require(graph.as_node_all(), Capability::NodeAll, graph)?.node_all()?;
    let directed = require(graph.as_directed(), Capability::Directed, graph)?;

    let mut entries: Vec<Entry> = Vec::with_capacity(all.len());
    let mut lookup: HashMap<String, usize> = HashMap::with_capacity(all.len());
    for node in all {
        let key = stable_fingerprint(&node)?;
        if lookup.contains_key(&key) {
            return Err(GraphError::IdentityInstability(format!(
                "two nodes share the fingerprint '{key}'"
            )));
        }
        let incoming = directed
            .incoming(&node)?
            .iter()
            .map(stable_fingerprint)
            .collect::<Result<Vec<_>>>()?;
        let outgoing = directed
            .outgoing(&node)?
            .iter()
            .map(stable_fingerprint)
            .collect::<Result<Vec<_>>>()?;
        lookup.insert(key.clone(), entries.len());
        entries.push(Entry {
            node,
            key,
            incoming,
            outgoing,
        });
    }

    let mut ready: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.incoming.is_empty())
        .map(|(index, _)| index)
        .collect();
    if ready.is_empty() && !entries.is_empty() {
        return Err(GraphError::CycleDetected(
            "no node without incoming edges".into(),
        ));
    }

    let mut sorted = Vec::with_capacity(entries.len());
    while let Some(index) = ready.pop() {
        sorted.push(entries[index].node.clone());
        let key = entries[index].key.clone();
        while let Some(target) = entries[index].outgoing.pop() {
            let target_index = *lookup.get(&target).ok_or_else(|| {
                GraphError::NotFound(format!(
                    "'{target}' is reachable from '{key}' but missing from the node list"
                ))
            })?;
            let incoming = &mut entries[target_index].incoming;
            let position = incoming
                .iter()
                .position(|source| *source == key)
                .ok_or_else(|| {
                    GraphError::IdentityInstability(format!(
                        "edge '{key}' -> '{target}' is missing among the parents of '{target}'"
                    ))
                })?;
            incoming.remove(position);
            if incoming.is_empty() {
                ready.push(target_index);
            }
        }
    }

    if let Some(stuck) = entries.iter().find(|entry| !entry.incoming.is_empty()) {
        return Err(GraphError::CycleDetected(format!(
            "'{}' still has unresolved incoming edges",
            stuck.key
        )));
    }
    debug!(graph = %graph.name(), nodes = sorted.len(), "topologically sorted");
    Ok(sorted)
}

#[cfg(test)]
#[path = "tests/topo_tests.rs"]
mod tests;
