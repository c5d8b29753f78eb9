//! Graph protocol: the base `Node`/`Graph` traits and the optional
//! capabilities a graph instance may expose.
//!
//! Capabilities are discovered per instance through the `as_*` accessors on
//! [`Graph`]. They default to `None`; an adapter opts in by returning
//! `Some(self)`. Algorithms call [`require`] so that an absent capability
//! surfaces as [`GraphError::MissingCapability`].

use std::{
    any::Any,
    fmt,
    io::{Read, Write},
    sync::{Arc, Weak},
};

use serde::{Deserialize, Serialize};

use crate::{
    dimension::DimensionRef,
    error::{GraphError, Result},
};

pub type NodeRef = Arc<dyn Node>;
pub type GraphRef = Arc<dyn Graph>;
pub type Labels = Vec<(String, String)>;

pub trait Node: Any + Send + Sync + fmt::Debug {
    /// Content-derived identity. Must return the same string on every call
    /// for the same logical node; all bookkeeping keys on it.
    fn fingerprint(&self) -> String;

    fn label(&self) -> String {
        self.fingerprint()
    }

    fn as_any(&self) -> &dyn Any;

    /// Nodes that stand for a whole graph can be entered.
    fn as_graph(&self) -> Option<GraphRef> {
        None
    }

    fn as_dimension(&self) -> Option<DimensionRef> {
        None
    }
}

pub trait Graph: Send + Sync {
    fn name(&self) -> String;
    fn home_nodes(&self) -> Result<Vec<NodeRef>>;
    fn as_any(&self) -> &dyn Any;

    fn as_directed(&self) -> Option<&dyn Directed> {
        None
    }
    fn as_neighbors(&self) -> Option<&dyn Neighbors> {
        None
    }
    fn as_directed_tree(&self) -> Option<&dyn DirectedTree> {
        None
    }
    fn as_node_all(&self) -> Option<&dyn NodeAll> {
        None
    }
    fn as_node_create(&self) -> Option<&dyn NodeCreate> {
        None
    }
    fn as_node_from_create(&self) -> Option<&dyn NodeFromCreate> {
        None
    }
    fn as_node_to_create(&self) -> Option<&dyn NodeToCreate> {
        None
    }
    fn as_node_update(&self) -> Option<&dyn NodeUpdate> {
        None
    }
    fn as_node_delete(&self) -> Option<&dyn NodeDelete> {
        None
    }
    fn as_edge_create(&self) -> Option<&dyn EdgeCreate> {
        None
    }
    fn as_edge_delete(&self) -> Option<&dyn EdgeDelete> {
        None
    }
    fn as_edge_move(&self) -> Option<&dyn EdgeMove> {
        None
    }
    fn as_edge_invert(&self) -> Option<&dyn EdgeInvert> {
        None
    }
    fn as_node_read(&self) -> Option<&dyn NodeRead> {
        None
    }
    fn as_node_write(&self) -> Option<&dyn NodeWrite> {
        None
    }
    fn as_node_rename(&self) -> Option<&dyn NodeRename> {
        None
    }
    fn as_node_swap(&self) -> Option<&dyn NodeSwap> {
        None
    }
    fn as_get_reader(&self) -> Option<&dyn GetReader> {
        None
    }
    fn as_typer(&self) -> Option<&dyn Typer> {
        None
    }
    fn as_typed_create(&self) -> Option<&dyn TypedCreate> {
        None
    }
    fn as_node_labels(&self) -> Option<&dyn NodeLabels> {
        None
    }
    fn as_node_label_add(&self) -> Option<&dyn NodeLabelAdd> {
        None
    }
    fn as_edge_labels(&self) -> Option<&dyn EdgeLabels> {
        None
    }
    fn as_node_equal(&self) -> Option<&dyn NodeEqual> {
        None
    }
    fn as_node_less(&self) -> Option<&dyn NodeLess> {
        None
    }
    fn as_constrained(&self) -> Option<&dyn Constrained> {
        None
    }
    fn as_meta(&self) -> Option<&dyn Meta> {
        None
    }
    fn as_executor(&self) -> Option<&dyn Executor> {
        None
    }
    fn as_closer(&self) -> Option<&dyn Closer> {
        None
    }
    fn as_lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }
}

impl fmt::Debug for dyn Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph").field("name", &self.name()).finish()
    }
}

pub trait Directed {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>>;
    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>>;
}

/// Undirected adjacency. Must be symmetric and never list a node as its own
/// neighbor.
pub trait Neighbors {
    fn neighbors(&self, node: &NodeRef) -> Result<Vec<NodeRef>>;
}

/// For adapters that guarantee at most one parent per node.
pub trait DirectedTree {
    fn parent(&self, node: &NodeRef) -> Result<Option<NodeRef>>;
    fn children(&self, node: &NodeRef) -> Result<Vec<NodeRef>>;
}

pub trait NodeAll {
    fn node_all(&self) -> Result<Vec<NodeRef>>;
}

pub trait NodeCreate {
    fn node_create(&self, label: &str) -> Result<NodeRef>;
}

/// Creates a node together with an edge `from -> new`.
pub trait NodeFromCreate {
    fn node_from_create(&self, from: &NodeRef, label: &str) -> Result<NodeRef>;
}

/// Creates a node together with an edge `new -> to`.
pub trait NodeToCreate {
    fn node_to_create(&self, to: &NodeRef, label: &str) -> Result<NodeRef>;
}

/// Re-reads a node so stale snapshots pick up the adapter's current state.
pub trait NodeUpdate {
    fn node_update(&self, node: &NodeRef) -> Result<NodeRef>;
}

pub trait NodeDelete {
    fn node_delete(&self, node: &NodeRef) -> Result<()>;
}

pub trait EdgeCreate {
    fn edge_create(&self, from: &NodeRef, to: &NodeRef) -> Result<()>;
}

pub trait EdgeDelete {
    fn edge_delete(&self, from: &NodeRef, to: &NodeRef) -> Result<()>;
}

/// Re-parents `moved`: the edge `from -> moved` becomes `to -> moved`.
pub trait EdgeMove {
    fn edge_move(&self, moved: &NodeRef, from: &NodeRef, to: &NodeRef) -> Result<()>;
}

pub trait EdgeInvert {
    fn edge_invert(&self, from: &NodeRef, to: &NodeRef) -> Result<()>;
}

pub trait NodeRead {
    fn node_read(&self, node: &NodeRef) -> Result<Box<dyn Read + Send>>;
}

pub trait NodeWrite {
    fn node_write(&self, node: &NodeRef) -> Result<Box<dyn NodeWriter>>;
}

/// Written bytes are only committed to the node on `close`.
pub trait NodeWriter: Write + Send {
    fn close(self: Box<Self>) -> Result<()>;
}

pub trait NodeRename {
    fn node_rename(&self, node: &NodeRef, new_name: &str) -> Result<NodeRef>;
}

pub trait NodeSwap {
    fn node_swap(&self, a: &NodeRef, b: &NodeRef) -> Result<()>;
}

/// Serializes the whole graph to a byte stream.
pub trait GetReader {
    fn get_reader(&self) -> Result<Box<dyn Read + Send>>;
}

pub trait Typer {
    fn node_type(&self, node: &NodeRef) -> Result<String>;
}

pub trait TypedCreate {
    fn types(&self) -> Result<Vec<String>>;
    fn typed_create(&self, type_name: &str, label: &str) -> Result<NodeRef>;
}

pub trait NodeLabels {
    fn node_labels(&self, node: &NodeRef) -> Result<Labels>;
}

pub trait NodeLabelAdd {
    fn node_label_add(&self, node: &NodeRef, key: &str, value: &str) -> Result<()>;
}

pub trait EdgeLabels {
    fn edge_labels(&self, from: &NodeRef, to: &NodeRef) -> Result<Labels>;
}

pub trait NodeEqual {
    fn node_equal(&self, a: &NodeRef, b: &NodeRef) -> bool;
}

pub trait NodeLess {
    fn node_less(&self, a: &NodeRef, b: &NodeRef) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Connected,
    Tree,
    Dag,
    Strict,
}

pub trait Constrained {
    fn constraints(&self) -> Vec<Constraint>;
}

/// Decorator access to the wrapped graph. `set` swaps the inner graph in
/// place, leaving the decorator chain above it intact.
pub trait Meta {
    fn get(&self) -> GraphRef;
    fn set(&self, inner: GraphRef);
}

pub trait Executor {
    fn execute(&self, node: &NodeRef) -> Result<()>;
}

pub trait Closer {
    fn close(&self) -> Result<()>;
}

/// State a navigator shares with graphs that ask for it.
pub trait Host: Send + Sync {
    fn dimensions(&self) -> Vec<DimensionRef>;
    fn open_graphs(&self) -> Vec<GraphRef>;
}

/// Graphs implementing this receive the owning navigator when pushed.
pub trait Lifecycle {
    fn attach(&self, host: Weak<dyn Host>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Directed,
    Neighbors,
    DirectedTree,
    NodeAll,
    NodeCreate,
    NodeFromCreate,
    NodeToCreate,
    NodeUpdate,
    NodeDelete,
    EdgeCreate,
    EdgeDelete,
    EdgeMove,
    EdgeInvert,
    NodeRead,
    NodeWrite,
    NodeRename,
    NodeSwap,
    GetReader,
    Typer,
    TypedCreate,
    NodeLabels,
    NodeLabelAdd,
    EdgeLabels,
    NodeEqual,
    NodeLess,
    Constrained,
    Meta,
    Executor,
    Closer,
    Lifecycle,
}

impl Capability {
    pub const ALL: [Capability; 30] = [
        Capability::Directed,
        Capability::Neighbors,
        Capability::DirectedTree,
        Capability::NodeAll,
        Capability::NodeCreate,
        Capability::NodeFromCreate,
        Capability::NodeToCreate,
        Capability::NodeUpdate,
        Capability::NodeDelete,
        Capability::EdgeCreate,
        Capability::EdgeDelete,
        Capability::EdgeMove,
        Capability::EdgeInvert,
        Capability::NodeRead,
        Capability::NodeWrite,
        Capability::NodeRename,
        Capability::NodeSwap,
        Capability::GetReader,
        Capability::Typer,
        Capability::TypedCreate,
        Capability::NodeLabels,
        Capability::NodeLabelAdd,
        Capability::EdgeLabels,
        Capability::NodeEqual,
        Capability::NodeLess,
        Capability::Constrained,
        Capability::Meta,
        Capability::Executor,
        Capability::Closer,
        Capability::Lifecycle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directed => "incoming/outgoing",
            Self::Neighbors => "neighbors",
            Self::DirectedTree => "parent/children",
            Self::NodeAll => "node all",
            Self::NodeCreate => "node create",
            Self::NodeFromCreate => "node from create",
            Self::NodeToCreate => "node to create",
            Self::NodeUpdate => "node update",
            Self::NodeDelete => "node delete",
            Self::EdgeCreate => "edge create",
            Self::EdgeDelete => "edge delete",
            Self::EdgeMove => "edge move",
            Self::EdgeInvert => "edge invert",
            Self::NodeRead => "node read",
            Self::NodeWrite => "node write",
            Self::NodeRename => "node rename",
            Self::NodeSwap => "node swap",
            Self::GetReader => "get reader",
            Self::Typer => "node type",
            Self::TypedCreate => "typed create",
            Self::NodeLabels => "node labels",
            Self::NodeLabelAdd => "node label add",
            Self::EdgeLabels => "edge labels",
            Self::NodeEqual => "node equal",
            Self::NodeLess => "node less",
            Self::Constrained => "constraints",
            Self::Meta => "meta get/set",
            Self::Executor => "execute",
            Self::Closer => "close",
            Self::Lifecycle => "lifecycle",
        }
    }

    pub fn supported_by(self, graph: &dyn Graph) -> bool {
        match self {
            Self::Directed => graph.as_directed().is_some(),
            Self::Neighbors => graph.as_neighbors().is_some(),
            Self::DirectedTree => graph.as_directed_tree().is_some(),
            Self::NodeAll => graph.as_node_all().is_some(),
            Self::NodeCreate => graph.as_node_create().is_some(),
            Self::NodeFromCreate => graph.as_node_from_create().is_some(),
            Self::NodeToCreate => graph.as_node_to_create().is_some(),
            Self::NodeUpdate => graph.as_node_update().is_some(),
            Self::NodeDelete => graph.as_node_delete().is_some(),
            Self::EdgeCreate => graph.as_edge_create().is_some(),
            Self::EdgeDelete => graph.as_edge_delete().is_some(),
            Self::EdgeMove => graph.as_edge_move().is_some(),
            Self::EdgeInvert => graph.as_edge_invert().is_some(),
            Self::NodeRead => graph.as_node_read().is_some(),
            Self::NodeWrite => graph.as_node_write().is_some(),
            Self::NodeRename => graph.as_node_rename().is_some(),
            Self::NodeSwap => graph.as_node_swap().is_some(),
            Self::GetReader => graph.as_get_reader().is_some(),
            Self::Typer => graph.as_typer().is_some(),
            Self::TypedCreate => graph.as_typed_create().is_some(),
            Self::NodeLabels => graph.as_node_labels().is_some(),
            Self::NodeLabelAdd => graph.as_node_label_add().is_some(),
            Self::EdgeLabels => graph.as_edge_labels().is_some(),
            Self::NodeEqual => graph.as_node_equal().is_some(),
            Self::NodeLess => graph.as_node_less().is_some(),
            Self::Constrained => graph.as_constrained().is_some(),
            Self::Meta => graph.as_meta().is_some(),
            Self::Executor => graph.as_executor().is_some(),
            Self::Closer => graph.as_closer().is_some(),
            Self::Lifecycle => graph.as_lifecycle().is_some(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn capabilities(graph: &dyn Graph) -> Vec<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|capability| capability.supported_by(graph))
        .collect()
}

/// Turns an absent capability into a typed error naming the graph.
pub fn require<'a, T: ?Sized>(
    capability: Option<&'a T>,
    which: Capability,
    graph: &dyn Graph,
) -> Result<&'a T> {
    capability.ok_or_else(|| GraphError::MissingCapability {
        capability: which,
        graph: graph.name(),
    })
}

/// Reads a node's fingerprint twice and fails if the two reads disagree or
/// the fingerprint is empty.
pub fn stable_fingerprint(node: &NodeRef) -> Result<String> {
    let first = node.fingerprint();
    if first.is_empty() {
        return Err(GraphError::NilInput(format!(
            "node {node:?} has an empty fingerprint"
        )));
    }
    let second = node.fingerprint();
    if first != second {
        return Err(GraphError::IdentityInstability(format!(
            "fingerprint changed from '{first}' to '{second}'"
        )));
    }
    Ok(first)
}

pub fn downcast_node<T: Node>(node: &NodeRef) -> Result<&T> {
    node.as_any()
        .downcast_ref::<T>()
        .ok_or_else(GraphError::type_mismatch::<T>)
}

pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    a.fingerprint() == b.fingerprint()
}

/// Node whose fingerprint is its text. Used for prompts, choices and
/// derived listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextNode(pub String);

impl TextNode {
    pub fn node(text: impl Into<String>) -> NodeRef {
        Arc::new(Self(text.into()))
    }
}

impl Node for TextNode {
    fn fingerprint(&self) -> String {
        self.0.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tunnel<T> {
    Found(T),
    /// Unwrapping ended without reaching a graph of the requested type.
    DeadEnd,
}

/// Applies `edit` to the first graph of type `T` in a decorator chain.
///
/// A direct type match is tried first. Otherwise the graph is unwrapped
/// through [`Meta::get`] and, once the edit succeeds below, the replacement
/// is stored back with [`Meta::set`] so the decorators above stay in place.
/// Returns the graph that should take `graph`'s position.
pub fn tunnel<T, F>(graph: &GraphRef, edit: F) -> Result<Tunnel<GraphRef>>
where
    T: Graph + 'static,
    F: FnOnce(&T) -> Result<GraphRef>,
{
    if let Some(found) = graph.as_any().downcast_ref::<T>() {
        return edit(found).map(Tunnel::Found);
    }
    let Some(meta) = graph.as_meta() else {
        return Ok(Tunnel::DeadEnd);
    };
    match tunnel(&meta.get(), edit)? {
        Tunnel::Found(replacement) => {
            meta.set(replacement);
            Ok(Tunnel::Found(graph.clone()))
        }
        Tunnel::DeadEnd => Ok(Tunnel::DeadEnd),
    }
}

/// Walks the decorator chain and returns the first graph of type `T`.
pub fn unwrap_to<T: Graph + 'static>(graph: &GraphRef) -> Option<GraphRef> {
    let mut current = graph.clone();
    loop {
        if current.as_any().is::<T>() {
            return Some(current);
        }
        let inner = current.as_meta()?.get();
        current = inner;
    }
}

/// `graph` itself, or the first graph below its decorators, that supports
/// `capability`.
pub fn find_capable(graph: &GraphRef, capability: Capability) -> Option<GraphRef> {
    let mut current = graph.clone();
    loop {
        if capability.supported_by(current.as_ref()) {
            return Some(current);
        }
        let inner = current.as_meta()?.get();
        current = inner;
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
