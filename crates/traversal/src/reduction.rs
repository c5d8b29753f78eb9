use std::collections::HashSet;

use shared::{
    error::Result,
    protocol::{require, stable_fingerprint, Capability, Graph, NodeRef},
};
use tracing::debug;

use crate::explore::{bfs, Flow};

/// Removes `a -> c` wherever `a -> b -> c` also exists. Only redundancy
/// through a single intermediate node is detected. Returns the number of
/// removed edges.
pub fn transitive_reduction(graph: &dyn Graph) -> Result<usize> {
    let all = require(graph.as_node_all(), Capability::NodeAll, graph)?.node_all()?;
    let delete = require(graph.as_edge_delete(), Capability::EdgeDelete, graph)?;

    let mut removed = 0;
    for node in all {
        let origin = stable_fingerprint(&node)?;
        let mut first_hop: HashSet<String> = HashSet::new();
        let mut redundant: Vec<NodeRef> = Vec::new();
        let mut redundant_keys: HashSet<String> = HashSet::new();

        bfs(graph, &node, |path| match path {
            [_] => Ok(Flow::Descend),
            [_, hop] => {
                first_hop.insert(stable_fingerprint(hop)?);
                Ok(Flow::Descend)
            }
            [_, middle, last] => {
                let middle_key = stable_fingerprint(middle)?;
                let key = stable_fingerprint(last)?;
                // Self loops would otherwise mark every direct edge redundant.
                if middle_key != origin
                    && middle_key != key
                    && first_hop.contains(&key)
                    && redundant_keys.insert(key)
                {
                    redundant.push(last.clone());
                }
                Ok(Flow::Prune)
            }
            _ => Ok(Flow::Prune),
        })?;

        for target in redundant {
            delete.edge_delete(&node, &target)?;
            removed += 1;
        }
    }
    debug!(graph = %graph.name(), removed, "transitive reduction");
    Ok(removed)
}

#[cfg(test)]
#[path = "tests/reduction_tests.rs"]
mod tests;
