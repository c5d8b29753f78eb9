use shared::{
    error::Result,
    protocol::{require, stable_fingerprint, Capability, Directed, Graph, NodeRef},
};

/// Visitor verdict for the path just visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Descend,
    /// Skip everything below this path; siblings are still visited.
    Prune,
}

/// Depth-first over outgoing edges. The visitor sees every path from `start`
/// (exclusive of the bare start path) and decides whether to expand it.
/// There is no cycle guard: visitors that care scan the path themselves.
pub fn dfs<F>(graph: &dyn Graph, start: &NodeRef, mut visit: F) -> Result<()>
where
    F: FnMut(&[NodeRef]) -> Result<Flow>,
{
    let directed = require(graph.as_directed(), Capability::Directed, graph)?;
    let mut path = vec![start.clone()];
    descend(directed, &mut path, &mut visit)
}

fn descend(
    directed: &dyn Directed,
    path: &mut Vec<NodeRef>,
    visit: &mut dyn FnMut(&[NodeRef]) -> Result<Flow>,
) -> Result<()> {
    let Some(last) = path.last().cloned() else {
        return Ok(());
    };
    for child in directed.outgoing(&last)? {
        path.push(child);
        let flow = visit(path);
        let outcome = match flow {
            Ok(Flow::Descend) => descend(directed, path, visit),
            Ok(Flow::Prune) => Ok(()),
            Err(err) => Err(err),
        };
        path.pop();
        outcome?;
    }
    Ok(())
}

/// Breadth-first over outgoing edges, level by level. Unlike [`dfs`] the
/// single-node path `[start]` is visited first.
pub fn bfs<F>(graph: &dyn Graph, start: &NodeRef, mut visit: F) -> Result<()>
where
    F: FnMut(&[NodeRef]) -> Result<Flow>,
{
    let directed = require(graph.as_directed(), Capability::Directed, graph)?;
    let first = vec![start.clone()];
    let mut frontier = Vec::new();
    if visit(&first)? == Flow::Descend {
        frontier.push(first);
    }
    while !frontier.is_empty() {
        let mut next_level = Vec::new();
        for path in frontier {
            let Some(last) = path.last() else {
                continue;
            };
            for child in directed.outgoing(last)? {
                let mut extended = path.clone();
                extended.push(child);
                if visit(&extended)? == Flow::Descend {
                    next_level.push(extended);
                }
            }
        }
        frontier = next_level;
    }
    Ok(())
}

/// Every simple path from `from` to `to`, both included. Paths revisiting a
/// node are cut at the revisit.
pub fn paths_between(
    graph: &dyn Graph,
    from: &NodeRef,
    to: &NodeRef,
) -> Result<Vec<Vec<NodeRef>>> {
    let target = stable_fingerprint(to)?;
    let mut found = Vec::new();
    dfs(graph, from, |path| {
        let Some((last, before)) = path.split_last() else {
            return Ok(Flow::Prune);
        };
        let key = stable_fingerprint(last)?;
        if before.iter().any(|node| node.fingerprint() == key) {
            return Ok(Flow::Prune);
        }
        if key == target {
            found.push(path.to_vec());
            return Ok(Flow::Prune);
        }
        Ok(Flow::Descend)
    })?;
    Ok(found)
}

#[cfg(test)]
#[path = "tests/explore_tests.rs"]
mod tests;
