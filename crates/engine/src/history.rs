//! The navigator's history as a graph.
//!
//! Every recorded stack shape becomes a chain of nodes, base frame first.
//! The live stack is appended as the last entry.

use std::{any::Any, sync::Arc};

use shared::{
    error::Result,
    protocol::{downcast_node, Directed, Graph, Node, NodeAll, NodeRef},
};

use crate::stack::Navigator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryNode {
    pub entry: usize,
    pub depth: usize,
    pub graph: String,
}

impl Node for HistoryNode {
    fn fingerprint(&self) -> String {
        format!("{}.{}:{}", self.entry, self.depth, self.graph)
    }

    fn label(&self) -> String {
        format!("{}{}", "  ".repeat(self.depth), self.graph)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct HistoryGraph {
    entries: Vec<Vec<String>>,
}

impl HistoryGraph {
    pub fn capture(navigator: &Navigator) -> Self {
        let mut entries: Vec<Vec<String>> = navigator
            .history()
            .into_iter()
            .map(|shape| {
                shape
                    .into_iter()
                    .filter_map(|id| navigator.frame(id))
                    .map(|frame| frame.graph().name())
                    .collect()
            })
            .collect();
        entries.push(
            navigator
                .frames()
                .into_iter()
                .map(|(_, frame)| frame.graph().name())
                .collect(),
        );
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn at(&self, entry: usize, depth: usize) -> Option<NodeRef> {
        self.entries.get(entry)?.get(depth).map(|graph| {
            Arc::new(HistoryNode {
                entry,
                depth,
                graph: graph.clone(),
            }) as NodeRef
        })
    }
}

impl Graph for HistoryGraph {
    fn name(&self) -> String {
        "history".to_string()
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok((0..self.entries.len())
            .filter_map(|entry| self.at(entry, 0))
            .collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_directed(&self) -> Option<&dyn Directed> {
        Some(self)
    }
    fn as_node_all(&self) -> Option<&dyn NodeAll> {
        Some(self)
    }
}

impl Directed for HistoryGraph {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let node = downcast_node::<HistoryNode>(node)?;
        Ok(node
            .depth
            .checked_sub(1)
            .and_then(|depth| self.at(node.entry, depth))
            .into_iter()
            .collect())
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let node = downcast_node::<HistoryNode>(node)?;
        Ok(self.at(node.entry, node.depth + 1).into_iter().collect())
    }
}

impl NodeAll for HistoryGraph {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        Ok(self
            .entries
            .iter()
            .enumerate()
            .flat_map(|(entry, shape)| {
                (0..shape.len()).filter_map(move |depth| self.at(entry, depth))
            })
            .collect())
    }
}
