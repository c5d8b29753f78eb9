use std::{
    any::Any,
    io::{Cursor, Read},
    sync::Arc,
};

use parking_lot::RwLock;
use shared::{
    dimension::{Dimension, OpenReader},
    domain::IdCounter,
    error::{GraphError, Result},
    protocol::{
        downcast_node, Directed, GetReader, Graph, GraphRef, Node, NodeAll, NodeCreate,
        NodeDelete, NodeRead, NodeRef, NodeRename, NodeSwap,
    },
};

/// A line at a position. Identity includes the position, so equal lines
/// stay distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNode {
    index: usize,
    text: String,
}

impl LineNode {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Node for LineNode {
    fn fingerprint(&self) -> String {
        format!("{}:{}", self.index, self.text)
    }

    fn label(&self) -> String {
        self.text.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ordered text lines; each line points at the next one.
pub struct LinesGraph {
    name: String,
    lines: RwLock<Vec<String>>,
}

impl LinesGraph {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines: RwLock::new(lines),
        }
    }

    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, text.lines().map(str::to_string).collect())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.read().clone()
    }

    fn node_at(lines: &[String], index: usize) -> Option<NodeRef> {
        lines.get(index).map(|text| {
            Arc::new(LineNode {
                index,
                text: text.clone(),
            }) as NodeRef
        })
    }

    /// Rejects stale nodes whose line has since moved or changed.
    fn index_of(lines: &[String], node: &NodeRef) -> Result<usize> {
        let line = downcast_node::<LineNode>(node)?;
        match lines.get(line.index) {
            Some(text) if *text == line.text => Ok(line.index),
            _ => Err(GraphError::NotFound(format!(
                "line '{}' is no longer at position {}",
                line.text, line.index
            ))),
        }
    }
}

impl Graph for LinesGraph {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        self.node_all()
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
    fn as_node_create(&self) -> Option<&dyn NodeCreate> {
        Some(self)
    }
    fn as_node_delete(&self) -> Option<&dyn NodeDelete> {
        Some(self)
    }
    fn as_node_read(&self) -> Option<&dyn NodeRead> {
        Some(self)
    }
    fn as_node_rename(&self) -> Option<&dyn NodeRename> {
        Some(self)
    }
    fn as_node_swap(&self) -> Option<&dyn NodeSwap> {
        Some(self)
    }
    fn as_get_reader(&self) -> Option<&dyn GetReader> {
        Some(self)
    }
}

impl Directed for LinesGraph {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let lines = self.lines.read();
        let index = Self::index_of(&lines, node)?;
        Ok(index
            .checked_sub(1)
            .and_then(|previous| Self::node_at(&lines, previous))
            .into_iter()
            .collect())
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let lines = self.lines.read();
        let index = Self::index_of(&lines, node)?;
        Ok(Self::node_at(&lines, index + 1).into_iter().collect())
    }
}

impl NodeAll for LinesGraph {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        let lines = self.lines.read();
        Ok((0..lines.len())
            .filter_map(|index| Self::node_at(&lines, index))
            .collect())
    }
}

impl NodeCreate for LinesGraph {
    fn node_create(&self, label: &str) -> Result<NodeRef> {
        if label.contains('\n') {
            return Err(GraphError::InvalidInput("a line must not contain newlines".into()));
        }
        let mut lines = self.lines.write();
        lines.push(label.to_string());
        Self::node_at(&lines, lines.len() - 1)
            .ok_or_else(|| GraphError::Internal("appended line vanished".into()))
    }
}

impl NodeDelete for LinesGraph {
    fn node_delete(&self, node: &NodeRef) -> Result<()> {
        let mut lines = self.lines.write();
        let index = Self::index_of(&lines, node)?;
        lines.remove(index);
        Ok(())
    }
}

impl NodeRead for LinesGraph {
    fn node_read(&self, node: &NodeRef) -> Result<Box<dyn Read + Send>> {
        let lines = self.lines.read();
        let index = Self::index_of(&lines, node)?;
        Ok(Box::new(Cursor::new(lines[index].clone().into_bytes())))
    }
}

impl NodeRename for LinesGraph {
    fn node_rename(&self, node: &NodeRef, new_name: &str) -> Result<NodeRef> {
        if new_name.contains('\n') {
            return Err(GraphError::InvalidInput("a line must not contain newlines".into()));
        }
        let mut lines = self.lines.write();
        let index = Self::index_of(&lines, node)?;
        lines[index] = new_name.to_string();
        Self::node_at(&lines, index)
            .ok_or_else(|| GraphError::Internal("renamed line vanished".into()))
    }
}

impl NodeSwap for LinesGraph {
    fn node_swap(&self, a: &NodeRef, b: &NodeRef) -> Result<()> {
        let mut lines = self.lines.write();
        let a = Self::index_of(&lines, a)?;
        let b = Self::index_of(&lines, b)?;
        lines.swap(a, b);
        Ok(())
    }
}

impl GetReader for LinesGraph {
    fn get_reader(&self) -> Result<Box<dyn Read + Send>> {
        let mut text = self.lines.read().join("\n");
        text.push('\n');
        Ok(Box::new(Cursor::new(text.into_bytes())))
    }
}

#[derive(Default)]
pub struct LinesDimension {
    created: IdCounter,
}

impl LinesDimension {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dimension for LinesDimension {
    fn name(&self) -> String {
        "lines".to_string()
    }

    fn new_graph(&self) -> Result<GraphRef> {
        let n: i64 = self.created.next();
        Ok(Arc::new(LinesGraph::new(format!("lines {n}"), Vec::new())))
    }

    fn as_open_reader(&self) -> Option<&dyn OpenReader> {
        Some(self)
    }
}

impl OpenReader for LinesDimension {
    fn open(&self, reader: &mut dyn Read) -> Result<GraphRef> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let n: i64 = self.created.next();
        Ok(Arc::new(LinesGraph::parse(format!("lines {n}"), &text)))
    }
}

#[cfg(test)]
#[path = "tests/lines_tests.rs"]
mod tests;
