//! Derived views of a frame: neighbour panels beside the cursor, the sparse
//! single-path listing and the tree layout.

use std::collections::{HashMap, HashSet};

use shared::{
    error::{GraphError, Result},
    protocol::{require, stable_fingerprint, Capability, Directed, Graph, NodeRef},
};

use crate::stack::{Frame, Modus};

/// Walks are cut off after this many steps in either direction.
pub const PATH_LIMIT: usize = 50;

#[derive(Debug, Default, Clone)]
pub struct Panels {
    pub incoming: Vec<NodeRef>,
    pub outgoing: Vec<NodeRef>,
}

/// Nodes shown beside `node`. Directed graphs give both sides, trees give
/// parent and children, undirected graphs list neighbours on the outgoing
/// side. Graphs with none of these give empty panels.
pub fn panels(graph: &dyn Graph, node: &NodeRef) -> Result<Panels> {
    if let Some(directed) = graph.as_directed() {
        return Ok(Panels {
            incoming: directed.incoming(node)?,
            outgoing: directed.outgoing(node)?,
        });
    }
    if let Some(tree) = graph.as_directed_tree() {
        return Ok(Panels {
            incoming: tree.parent(node)?.into_iter().collect(),
            outgoing: tree.children(node)?,
        });
    }
    if let Some(neighbors) = graph.as_neighbors() {
        return Ok(Panels {
            incoming: Vec::new(),
            outgoing: neighbors.neighbors(node)?,
        });
    }
    Ok(Panels::default())
}

/// The panels of `frame` around its cursor node, laid out by its modus.
pub fn side_panels(frame: &Frame) -> Result<Panels> {
    let Some(node) = frame.cursor_node() else {
        return Ok(Panels::default());
    };
    let graph = frame.graph().as_ref();
    match frame.modus() {
        Modus::List => panels(graph, &node),
        Modus::Sparse => {
            let view = sparse_view(graph, &node, frame.positions())?;
            Ok(Panels {
                incoming: view.incoming,
                outgoing: view.outgoing,
            })
        }
        Modus::Tree => {
            let view = tree_view(graph, &node)?;
            Ok(Panels {
                incoming: view.parent_siblings,
                outgoing: view.children,
            })
        }
    }
}

/// Follows one branch from `start`: `generate` lists the candidates after
/// the current node and `choose` picks one by index. Stops when there are
/// no candidates, a node repeats, or [`PATH_LIMIT`] steps were taken.
/// `start` itself is not part of the returned path.
pub fn choose_path<G, C>(start: &NodeRef, mut generate: G, mut choose: C) -> Result<Vec<NodeRef>>
where
    G: FnMut(&NodeRef) -> Result<Vec<NodeRef>>,
    C: FnMut(&NodeRef, &[NodeRef]) -> Result<usize>,
{
    let mut seen = HashSet::from([stable_fingerprint(start)?]);
    let mut path = Vec::new();
    let mut current = start.clone();
    while path.len() < PATH_LIMIT {
        let candidates = generate(&current)?;
        if candidates.is_empty() {
            break;
        }
        let index = choose(&current, &candidates)?;
        let next = candidates.get(index).cloned().ok_or_else(|| {
            GraphError::InvalidInput(format!(
                "choice {index} is out of range for {} candidates",
                candidates.len()
            ))
        })?;
        if !seen.insert(stable_fingerprint(&next)?) {
            break;
        }
        path.push(next.clone());
        current = next;
    }
    Ok(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Incoming,
    Outgoing,
}

/// Branch last chosen at each node, per side, keyed by fingerprint.
#[derive(Debug, Clone, Default)]
pub struct Positions {
    chosen: HashMap<(Side, String), usize>,
}

impl Positions {
    /// The remembered branch among `count` candidates. A memory that no
    /// longer fits falls back to the first branch.
    pub fn get(&self, side: Side, fingerprint: &str, count: usize) -> usize {
        match self.chosen.get(&(side, fingerprint.to_string())) {
            Some(index) if *index < count => *index,
            _ => 0,
        }
    }

    pub fn set(&mut self, side: Side, fingerprint: &str, index: usize) {
        self.chosen.insert((side, fingerprint.to_string()), index);
    }

    /// Moves to the branch after the remembered one, wrapping around.
    pub fn advance(&mut self, side: Side, fingerprint: &str, count: usize) -> usize {
        let next = match count {
            0 => 0,
            _ => (self.get(side, fingerprint, count) + 1) % count,
        };
        self.set(side, fingerprint, next);
        next
    }
}

fn neighbours(directed: &dyn Directed, side: Side, node: &NodeRef) -> Result<Vec<NodeRef>> {
    match side {
        Side::Incoming => directed.incoming(node),
        Side::Outgoing => directed.outgoing(node),
    }
}

#[derive(Debug, Clone)]
pub struct SparseView {
    pub items: Vec<NodeRef>,
    /// Position of the node the view was built around.
    pub cursor: usize,
    /// The other parent's chain when the node has exactly two parents.
    pub incoming: Vec<NodeRef>,
    /// The other child's chain when the node has exactly two children.
    pub outgoing: Vec<NodeRef>,
}

/// The remembered incoming chain above `node` (furthest ancestor first),
/// then `node`, then its remembered outgoing chain. Nodes with exactly two
/// branches on a side also get the branch not taken.
pub fn sparse_view(
    graph: &dyn Graph,
    node: &NodeRef,
    positions: &Positions,
) -> Result<SparseView> {
    let directed = require(graph.as_directed(), Capability::Directed, graph)?;
    let follow = |side: Side, start: &NodeRef, stop: &HashSet<String>| {
        choose_path(
            start,
            |current| {
                if stop.contains(&current.fingerprint()) {
                    return Ok(Vec::new());
                }
                neighbours(directed, side, current)
            },
            |current, from| Ok(positions.get(side, &current.fingerprint(), from.len())),
        )
    };

    let none = HashSet::new();
    let mut above = follow(Side::Incoming, node, &none)?;
    let below = follow(Side::Outgoing, node, &none)?;
    above.reverse();
    let cursor = above.len();
    let mut items = above;
    items.push(node.clone());
    items.extend(below);

    let main: HashSet<String> = items.iter().map(|item| item.fingerprint()).collect();
    let other = |side: Side| -> Result<Vec<NodeRef>> {
        let candidates = neighbours(directed, side, node)?;
        if candidates.len() != 2 {
            return Ok(Vec::new());
        }
        let taken = positions.get(side, &node.fingerprint(), 2);
        let start = candidates[(taken + 1) % 2].clone();
        let mut chain = vec![start.clone()];
        chain.extend(follow(side, &start, &main)?);
        Ok(chain)
    };
    let incoming = other(Side::Incoming)?;
    let outgoing = other(Side::Outgoing)?;

    Ok(SparseView {
        items,
        cursor,
        incoming,
        outgoing,
    })
}

#[derive(Debug, Clone)]
pub struct TreeView {
    /// Siblings of the parent, or the parent alone when it is a root.
    pub parent_siblings: Vec<NodeRef>,
    /// Position of the parent in `parent_siblings`.
    pub parent: Option<usize>,
    pub siblings: Vec<NodeRef>,
    pub cursor: usize,
    pub children: Vec<NodeRef>,
}

fn single_parent(directed: &dyn Directed, node: &NodeRef) -> Result<Option<NodeRef>> {
    let mut parents = directed.incoming(node)?;
    match parents.len() {
        0 | 1 => Ok(parents.pop()),
        _ => Err(GraphError::InvalidInput(format!(
            "'{}' has {} parents; not a tree",
            node.label(),
            parents.len()
        ))),
    }
}

/// Index of `node` among `nodes`, refusing lists where fingerprints collide.
fn position_of(nodes: &[NodeRef], node: &NodeRef) -> Result<Option<usize>> {
    let wanted = node.fingerprint();
    let mut seen = HashSet::new();
    let mut found = None;
    for (index, candidate) in nodes.iter().enumerate() {
        let fingerprint = candidate.fingerprint();
        if fingerprint == wanted {
            found = Some(index);
        }
        if !seen.insert(fingerprint) {
            return Err(GraphError::InvalidInput(format!(
                "'{}' appears twice among its siblings",
                candidate.label()
            )));
        }
    }
    Ok(found)
}

/// `node` among its siblings, with the parent's siblings on one side and
/// `node`'s children on the other.
pub fn tree_view(graph: &dyn Graph, node: &NodeRef) -> Result<TreeView> {
    let directed = require(graph.as_directed(), Capability::Directed, graph)?;
    let children = directed.outgoing(node)?;
    let Some(parent) = single_parent(directed, node)? else {
        return Ok(TreeView {
            parent_siblings: Vec::new(),
            parent: None,
            siblings: vec![node.clone()],
            cursor: 0,
            children,
        });
    };

    let siblings = directed.outgoing(&parent)?;
    let cursor = position_of(&siblings, node)?.ok_or_else(|| {
        GraphError::InvalidInput(format!(
            "'{}' is not among the children of its parent '{}'",
            node.label(),
            parent.label()
        ))
    })?;
    let parent_siblings = match single_parent(directed, &parent)? {
        Some(grandparent) => directed.outgoing(&grandparent)?,
        None => vec![parent.clone()],
    };
    let parent_index = position_of(&parent_siblings, &parent)?;

    Ok(TreeView {
        parent_siblings,
        parent: parent_index,
        siblings,
        cursor,
        children,
    })
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
