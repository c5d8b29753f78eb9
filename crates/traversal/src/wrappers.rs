//! Decorator graphs. Each keeps its inner graph in a swappable slot exposed
//! through `Meta`, so edits can tunnel beneath the decorator.

use std::{any::Any, sync::Arc};

use parking_lot::RwLock;
use regex::Regex;
use shared::{
    dimension::{Dimension, Wrapper},
    error::{GraphError, Result},
    protocol::{
        require, Capability, Directed, EdgeCreate, EdgeDelete, Graph, GraphRef, Meta, NodeAll,
        NodeRef,
    },
};

/// Swaps incoming and outgoing edges of the wrapped graph.
pub struct Inverted {
    inner: RwLock<GraphRef>,
}

impl Inverted {
    pub fn new(inner: GraphRef) -> Self {
        Self {
            inner: RwLock::new(inner),
        }
    }

    fn inner(&self) -> GraphRef {
        self.inner.read().clone()
    }
}

impl Graph for Inverted {
    fn name(&self) -> String {
        format!("inverted({})", self.inner().name())
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        self.inner().home_nodes()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_directed(&self) -> Option<&dyn Directed> {
        self.inner()
            .as_directed()
            .is_some()
            .then_some(self as &dyn Directed)
    }

    fn as_node_all(&self) -> Option<&dyn NodeAll> {
        self.inner()
            .as_node_all()
            .is_some()
            .then_some(self as &dyn NodeAll)
    }

    fn as_edge_create(&self) -> Option<&dyn EdgeCreate> {
        self.inner()
            .as_edge_create()
            .is_some()
            .then_some(self as &dyn EdgeCreate)
    }

    fn as_edge_delete(&self) -> Option<&dyn EdgeDelete> {
        self.inner()
            .as_edge_delete()
            .is_some()
            .then_some(self as &dyn EdgeDelete)
    }

    fn as_meta(&self) -> Option<&dyn Meta> {
        Some(self)
    }
}

impl Directed for Inverted {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let inner = self.inner();
        require(inner.as_directed(), Capability::Directed, inner.as_ref())?.outgoing(node)
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let inner = self.inner();
        require(inner.as_directed(), Capability::Directed, inner.as_ref())?.incoming(node)
    }
}

impl NodeAll for Inverted {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        let inner = self.inner();
        require(inner.as_node_all(), Capability::NodeAll, inner.as_ref())?.node_all()
    }
}

impl EdgeCreate for Inverted {
    fn edge_create(&self, from: &NodeRef, to: &NodeRef) -> Result<()> {
        let inner = self.inner();
        require(inner.as_edge_create(), Capability::EdgeCreate, inner.as_ref())?
            .edge_create(to, from)
    }
}

impl EdgeDelete for Inverted {
    fn edge_delete(&self, from: &NodeRef, to: &NodeRef) -> Result<()> {
        let inner = self.inner();
        require(inner.as_edge_delete(), Capability::EdgeDelete, inner.as_ref())?
            .edge_delete(to, from)
    }
}

impl Meta for Inverted {
    fn get(&self) -> GraphRef {
        self.inner()
    }

    fn set(&self, inner: GraphRef) {
        *self.inner.write() = inner;
    }
}

/// Hides nodes whose fingerprint does not match a regular expression.
/// Nodes with an empty fingerprint are always dropped.
pub struct Filtered {
    inner: RwLock<GraphRef>,
    pattern: RwLock<Regex>,
}

impl Filtered {
    pub fn new(inner: GraphRef, pattern: &str) -> Result<Self> {
        Ok(Self {
            inner: RwLock::new(inner),
            pattern: RwLock::new(compile(pattern)?),
        })
    }

    pub fn pattern(&self) -> String {
        self.pattern.read().as_str().to_string()
    }

    pub fn set_pattern(&self, pattern: &str) -> Result<()> {
        *self.pattern.write() = compile(pattern)?;
        Ok(())
    }

    fn inner(&self) -> GraphRef {
        self.inner.read().clone()
    }

    fn keep(&self, nodes: Vec<NodeRef>) -> Vec<NodeRef> {
        let pattern = self.pattern.read();
        nodes
            .into_iter()
            .filter(|node| {
                let fingerprint = node.fingerprint();
                !fingerprint.is_empty() && pattern.is_match(&fingerprint)
            })
            .collect()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|err| GraphError::InvalidInput(format!("bad filter pattern '{pattern}': {err}")))
}

impl Graph for Filtered {
    fn name(&self) -> String {
        format!("filter({}, /{}/)", self.inner().name(), self.pattern())
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(self.keep(self.inner().home_nodes()?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_directed(&self) -> Option<&dyn Directed> {
        self.inner()
            .as_directed()
            .is_some()
            .then_some(self as &dyn Directed)
    }

    fn as_node_all(&self) -> Option<&dyn NodeAll> {
        self.inner()
            .as_node_all()
            .is_some()
            .then_some(self as &dyn NodeAll)
    }

    fn as_meta(&self) -> Option<&dyn Meta> {
        Some(self)
    }
}

impl Directed for Filtered {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let inner = self.inner();
        let found = require(inner.as_directed(), Capability::Directed, inner.as_ref())?
            .incoming(node)?;
        Ok(self.keep(found))
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let inner = self.inner();
        let found = require(inner.as_directed(), Capability::Directed, inner.as_ref())?
            .outgoing(node)?;
        Ok(self.keep(found))
    }
}

impl NodeAll for Filtered {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        let inner = self.inner();
        let all = require(inner.as_node_all(), Capability::NodeAll, inner.as_ref())?.node_all()?;
        Ok(self.keep(all))
    }
}

impl Meta for Filtered {
    fn get(&self) -> GraphRef {
        self.inner()
    }

    fn set(&self, inner: GraphRef) {
        *self.inner.write() = inner;
    }
}

/// Wraps existing graphs in [`Inverted`].
pub struct InvertedDimension;

impl Dimension for InvertedDimension {
    fn name(&self) -> String {
        "inverted".to_string()
    }

    fn new_graph(&self) -> Result<GraphRef> {
        Err(GraphError::InvalidInput(
            "the inverted dimension only wraps existing graphs".into(),
        ))
    }

    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        Some(self)
    }
}

impl Wrapper for InvertedDimension {
    fn wrap(&self, graph: GraphRef) -> Result<GraphRef> {
        Ok(Arc::new(Inverted::new(graph)))
    }
}

#[cfg(test)]
#[path = "tests/wrappers_tests.rs"]
mod tests;
