use std::cmp::Ordering;

use shared::{
    error::Result,
    protocol::{require, stable_fingerprint, Capability, Graph, NodeRef},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Adapter ordering when the graph offers one, fingerprints otherwise.
    Fingerprint,
    /// Most connected first; ties by fingerprint.
    Degree,
}

pub fn sort_nodes(graph: &dyn Graph, nodes: &[NodeRef], key: SortKey) -> Result<Vec<NodeRef>> {
    let mut keyed = nodes
        .iter()
        .map(|node| Ok((stable_fingerprint(node)?, node.clone())))
        .collect::<Result<Vec<_>>>()?;

    match key {
        SortKey::Fingerprint => match graph.as_node_less() {
            Some(less) => keyed.sort_by(|(a_key, a), (b_key, b)| {
                if less.node_less(a, b) {
                    Ordering::Less
                } else if less.node_less(b, a) {
                    Ordering::Greater
                } else {
                    a_key.cmp(b_key)
                }
            }),
            None => keyed.sort_by(|(a, _), (b, _)| a.cmp(b)),
        },
        SortKey::Degree => {
            let directed = require(graph.as_directed(), Capability::Directed, graph)?;
            let mut degrees = Vec::with_capacity(keyed.len());
            for (fingerprint, node) in keyed {
                let degree = directed.incoming(&node)?.len() + directed.outgoing(&node)?.len();
                degrees.push((degree, fingerprint, node));
            }
            degrees.sort_by(|(a_degree, a_key, _), (b_degree, b_key, _)| {
                b_degree.cmp(a_degree).then_with(|| a_key.cmp(b_key))
            });
            return Ok(degrees.into_iter().map(|(_, _, node)| node).collect());
        }
    }
    Ok(keyed.into_iter().map(|(_, node)| node).collect())
}

#[cfg(test)]
#[path = "tests/sort_tests.rs"]
mod tests;
