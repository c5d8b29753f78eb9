use std::{
    any::Any,
    collections::{BTreeMap, HashSet, VecDeque},
    io::{Cursor, Read, Write},
    sync::Arc,
};

use chrono::Utc;
use parking_lot::RwLock;
use shared::{
    dimension::{Dimension, NodeOpener, OpenReader},
    domain::{IdCounter, NodeId},
    error::{GraphError, Result},
    protocol::{
        downcast_node, Constrained, Constraint, Directed, EdgeCreate, EdgeDelete, EdgeInvert,
        EdgeLabels, EdgeMove, GetReader, Graph, GraphRef, Labels, Node, NodeAll, NodeCreate,
        NodeDelete, NodeFromCreate, NodeLabelAdd, NodeLabels, NodeLess, NodeRead, NodeRef,
        NodeRename, NodeToCreate, NodeUpdate, NodeWrite, NodeWriter, TypedCreate, Typer,
    },
};
use tracing::debug;

mod lines;
mod snapshot;

pub use lines::{LineNode, LinesDimension, LinesGraph};
pub use snapshot::{Snapshot, SnapshotEdge, SnapshotNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryNode {
    id: NodeId,
    label: String,
}

impl MemoryNode {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Node for MemoryNode {
    fn fingerprint(&self) -> String {
        format!("{}#{}", self.label, self.id)
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone)]
struct StoredNode {
    label: String,
    kind: String,
    labels: Labels,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<NodeId, StoredNode>,
    // Insertion ordered; adjacency order is the enumeration order.
    edges: Vec<(NodeId, NodeId)>,
    edge_labels: BTreeMap<(NodeId, NodeId), Labels>,
}

impl GraphState {
    fn id_of(&self, node: &NodeRef) -> Result<NodeId> {
        let id = downcast_node::<MemoryNode>(node)?.id;
        if self.nodes.contains_key(&id) {
            Ok(id)
        } else {
            Err(GraphError::NotFound(format!("node '{}'", node.fingerprint())))
        }
    }

    fn node_ref(&self, id: NodeId) -> Option<NodeRef> {
        self.nodes.get(&id).map(|stored| {
            Arc::new(MemoryNode {
                id,
                label: stored.label.clone(),
            }) as NodeRef
        })
    }

    fn refs(&self, ids: impl IntoIterator<Item = NodeId>) -> Vec<NodeRef> {
        ids.into_iter().filter_map(|id| self.node_ref(id)).collect()
    }

    fn outgoing_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(from, _)| *from == id)
            .map(|(_, to)| *to)
            .collect()
    }

    fn incoming_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, to)| *to == id)
            .map(|(from, _)| *from)
            .collect()
    }

    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if id == target {
                return true;
            }
            for next in self.outgoing_ids(id) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    fn check_edge(&self, constraints: &[Constraint], from: NodeId, to: NodeId) -> Result<()> {
        for constraint in constraints {
            match constraint {
                Constraint::Strict if self.edges.contains(&(from, to)) => {
                    return Err(GraphError::InvalidInput(format!(
                        "edge {from} -> {to} already exists"
                    )));
                }
                Constraint::Dag | Constraint::Tree if self.reaches(to, from) => {
                    return Err(GraphError::CycleDetected(format!(
                        "edge {from} -> {to} would close a cycle"
                    )));
                }
                Constraint::Tree if !self.incoming_ids(to).is_empty() => {
                    return Err(GraphError::InvalidInput(format!(
                        "node {to} already has a parent"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn insert(&mut self, id: NodeId, label: &str, kind: &str, labels: Labels) {
        self.nodes.insert(
            id,
            StoredNode {
                label: label.to_string(),
                kind: kind.to_string(),
                labels,
                content: Vec::new(),
            },
        );
    }
}

/// In-memory adapter implementing every mutation capability. Node identity
/// is `label#id`, so renaming yields a new fingerprint.
pub struct MemoryGraph {
    name: String,
    ids: IdCounter,
    state: Arc<RwLock<GraphState>>,
    constraints: Vec<Constraint>,
    types: Vec<String>,
}

impl MemoryGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ids: IdCounter::default(),
            state: Arc::new(RwLock::new(GraphState::default())),
            constraints: Vec::new(),
            types: vec![snapshot::default_kind(), "note".to_string()],
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = types;
        self
    }

    /// Inserts a node without the creation timestamp `node_create` adds.
    pub fn add_node(&self, label: &str) -> NodeRef {
        let id: NodeId = self.ids.next();
        let mut state = self.state.write();
        state.insert(id, label, &snapshot::default_kind(), Labels::new());
        Arc::new(MemoryNode {
            id,
            label: label.to_string(),
        })
    }

    pub fn add_edge(&self, from: &NodeRef, to: &NodeRef) -> Result<()> {
        self.edge_create(from, to)
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef> {
        self.state.read().node_ref(id)
    }

    pub fn find_by_label(&self, label: &str) -> Vec<NodeRef> {
        let state = self.state.read();
        let ids = state
            .nodes
            .iter()
            .filter(|(_, stored)| stored.label == label)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        state.refs(ids)
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.read().edges.len()
    }

    /// Edges as `(from label, to label)` pairs in insertion order.
    pub fn edge_labels_by_name(&self) -> Vec<(String, String)> {
        let state = self.state.read();
        state
            .edges
            .iter()
            .filter_map(|(from, to)| {
                Some((
                    state.nodes.get(from)?.label.clone(),
                    state.nodes.get(to)?.label.clone(),
                ))
            })
            .collect()
    }

    pub fn edge_label_add(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let mut state = self.state.write();
        let edge = (state.id_of(from)?, state.id_of(to)?);
        if !state.edges.contains(&edge) {
            return Err(GraphError::NotFound(format!("edge {} -> {}", edge.0, edge.1)));
        }
        state
            .edge_labels
            .entry(edge)
            .or_default()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            name: self.name.clone(),
            constraints: self.constraints.clone(),
            nodes: state
                .nodes
                .iter()
                .map(|(id, stored)| SnapshotNode {
                    id: *id,
                    label: stored.label.clone(),
                    kind: stored.kind.clone(),
                    labels: stored.labels.clone(),
                    content: String::from_utf8_lossy(&stored.content).into_owned(),
                })
                .collect(),
            edges: state
                .edges
                .iter()
                .map(|edge| SnapshotEdge {
                    from: edge.0,
                    to: edge.1,
                    labels: state.edge_labels.get(edge).cloned().unwrap_or_default(),
                })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let graph = Self::new(snapshot.name).with_constraints(snapshot.constraints);
        {
            let mut state = graph.state.write();
            for node in snapshot.nodes {
                if state.nodes.contains_key(&node.id) {
                    return Err(GraphError::InvalidInput(format!(
                        "duplicate node id {} in snapshot",
                        node.id
                    )));
                }
                graph.ids.bump_past(node.id.0);
                state.insert(node.id, &node.label, &node.kind, node.labels);
                if let Some(stored) = state.nodes.get_mut(&node.id) {
                    stored.content = node.content.into_bytes();
                }
            }
            for edge in snapshot.edges {
                if !state.nodes.contains_key(&edge.from) || !state.nodes.contains_key(&edge.to) {
                    return Err(GraphError::InvalidInput(format!(
                        "edge {} -> {} references an unknown node",
                        edge.from, edge.to
                    )));
                }
                state.check_edge(&graph.constraints, edge.from, edge.to)?;
                state.edges.push((edge.from, edge.to));
                if !edge.labels.is_empty() {
                    state.edge_labels.insert((edge.from, edge.to), edge.labels);
                }
            }
        }
        Ok(graph)
    }

    pub fn from_reader(reader: &mut dyn Read) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        Self::from_snapshot(snapshot)
    }

    fn create(&self, label: &str, kind: &str) -> NodeRef {
        let id: NodeId = self.ids.next();
        let labels = vec![("created".to_string(), Utc::now().to_rfc3339())];
        self.state.write().insert(id, label, kind, labels);
        debug!(graph = %self.name, node = %id, "created node");
        Arc::new(MemoryNode {
            id,
            label: label.to_string(),
        })
    }

    fn link(&self, from: NodeId, to: NodeId) -> Result<()> {
        let mut state = self.state.write();
        state.check_edge(&self.constraints, from, to)?;
        state.edges.push((from, to));
        Ok(())
    }
}

impl Graph for MemoryGraph {
    fn name(&self) -> String {
        self.name.clone()
    }

    /// Nodes without incoming edges; every node when each one has a parent.
    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        let state = self.state.read();
        let roots = state
            .nodes
            .keys()
            .filter(|id| state.incoming_ids(**id).is_empty())
            .copied()
            .collect::<Vec<_>>();
        if roots.is_empty() {
            return Ok(state.refs(state.nodes.keys().copied()));
        }
        Ok(state.refs(roots))
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
    fn as_node_from_create(&self) -> Option<&dyn NodeFromCreate> {
        Some(self)
    }
    fn as_node_to_create(&self) -> Option<&dyn NodeToCreate> {
        Some(self)
    }
    fn as_node_update(&self) -> Option<&dyn NodeUpdate> {
        Some(self)
    }
    fn as_node_delete(&self) -> Option<&dyn NodeDelete> {
        Some(self)
    }
    fn as_edge_create(&self) -> Option<&dyn EdgeCreate> {
        Some(self)
    }
    fn as_edge_delete(&self) -> Option<&dyn EdgeDelete> {
        Some(self)
    }
    fn as_edge_move(&self) -> Option<&dyn EdgeMove> {
        Some(self)
    }
    fn as_edge_invert(&self) -> Option<&dyn EdgeInvert> {
        Some(self)
    }
    fn as_node_read(&self) -> Option<&dyn NodeRead> {
        Some(self)
    }
    fn as_node_write(&self) -> Option<&dyn NodeWrite> {
        Some(self)
    }
    fn as_node_rename(&self) -> Option<&dyn NodeRename> {
        Some(self)
    }
    fn as_get_reader(&self) -> Option<&dyn GetReader> {
        Some(self)
    }
    fn as_typer(&self) -> Option<&dyn Typer> {
        Some(self)
    }
    fn as_typed_create(&self) -> Option<&dyn TypedCreate> {
        Some(self)
    }
    fn as_node_labels(&self) -> Option<&dyn NodeLabels> {
        Some(self)
    }
    fn as_node_label_add(&self) -> Option<&dyn NodeLabelAdd> {
        Some(self)
    }
    fn as_edge_labels(&self) -> Option<&dyn EdgeLabels> {
        Some(self)
    }
    fn as_node_less(&self) -> Option<&dyn NodeLess> {
        Some(self)
    }
    fn as_constrained(&self) -> Option<&dyn Constrained> {
        Some(self)
    }
}

impl Directed for MemoryGraph {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let state = self.state.read();
        let id = state.id_of(node)?;
        Ok(state.refs(state.incoming_ids(id)))
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let state = self.state.read();
        let id = state.id_of(node)?;
        Ok(state.refs(state.outgoing_ids(id)))
    }
}

impl NodeAll for MemoryGraph {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        let state = self.state.read();
        Ok(state.refs(state.nodes.keys().copied()))
    }
}

impl NodeCreate for MemoryGraph {
    fn node_create(&self, label: &str) -> Result<NodeRef> {
        if label.is_empty() {
            return Err(GraphError::InvalidInput("node label must not be empty".into()));
        }
        Ok(self.create(label, &snapshot::default_kind()))
    }
}

impl NodeFromCreate for MemoryGraph {
    fn node_from_create(&self, from: &NodeRef, label: &str) -> Result<NodeRef> {
        let from_id = self.state.read().id_of(from)?;
        let node = self.node_create(label)?;
        self.link(from_id, downcast_node::<MemoryNode>(&node)?.id)?;
        Ok(node)
    }
}

impl NodeToCreate for MemoryGraph {
    fn node_to_create(&self, to: &NodeRef, label: &str) -> Result<NodeRef> {
        let to_id = self.state.read().id_of(to)?;
        let node = self.node_create(label)?;
        self.link(downcast_node::<MemoryNode>(&node)?.id, to_id)?;
        Ok(node)
    }
}

impl NodeUpdate for MemoryGraph {
    fn node_update(&self, node: &NodeRef) -> Result<NodeRef> {
        let state = self.state.read();
        let id = state.id_of(node)?;
        state
            .node_ref(id)
            .ok_or_else(|| GraphError::NotFound(format!("node {id}")))
    }
}

impl NodeDelete for MemoryGraph {
    fn node_delete(&self, node: &NodeRef) -> Result<()> {
        let mut state = self.state.write();
        let id = state.id_of(node)?;
        state.nodes.remove(&id);
        state.edges.retain(|(from, to)| *from != id && *to != id);
        state
            .edge_labels
            .retain(|(from, to), _| *from != id && *to != id);
        Ok(())
    }
}

impl EdgeCreate for MemoryGraph {
    fn edge_create(&self, from: &NodeRef, to: &NodeRef) -> Result<()> {
        let (from, to) = {
            let state = self.state.read();
            (state.id_of(from)?, state.id_of(to)?)
        };
        self.link(from, to)
    }
}

impl EdgeDelete for MemoryGraph {
    fn edge_delete(&self, from: &NodeRef, to: &NodeRef) -> Result<()> {
        let mut state = self.state.write();
        let edge = (state.id_of(from)?, state.id_of(to)?);
        let Some(position) = state.edges.iter().position(|candidate| *candidate == edge) else {
            return Err(GraphError::NotFound(format!(
                "edge '{}' -> '{}'",
                from.fingerprint(),
                to.fingerprint()
            )));
        };
        state.edges.remove(position);
        if !state.edges.contains(&edge) {
            state.edge_labels.remove(&edge);
        }
        Ok(())
    }
}

impl EdgeMove for MemoryGraph {
    fn edge_move(&self, moved: &NodeRef, from: &NodeRef, to: &NodeRef) -> Result<()> {
        let mut state = self.state.write();
        let moved = state.id_of(moved)?;
        let (from, to) = (state.id_of(from)?, state.id_of(to)?);
        let Some(position) = state.edges.iter().position(|edge| *edge == (from, moved)) else {
            return Err(GraphError::NotFound(format!("edge {from} -> {moved}")));
        };
        state.edges.remove(position);
        if let Err(err) = state.check_edge(&self.constraints, to, moved) {
            state.edges.insert(position, (from, moved));
            return Err(err);
        }
        state.edges.insert(position, (to, moved));
        if let Some(labels) = state.edge_labels.remove(&(from, moved)) {
            state.edge_labels.insert((to, moved), labels);
        }
        Ok(())
    }
}

impl EdgeInvert for MemoryGraph {
    fn edge_invert(&self, from: &NodeRef, to: &NodeRef) -> Result<()> {
        let mut state = self.state.write();
        let (from, to) = (state.id_of(from)?, state.id_of(to)?);
        let Some(position) = state.edges.iter().position(|edge| *edge == (from, to)) else {
            return Err(GraphError::NotFound(format!("edge {from} -> {to}")));
        };
        state.edges.remove(position);
        if let Err(err) = state.check_edge(&self.constraints, to, from) {
            state.edges.insert(position, (from, to));
            return Err(err);
        }
        state.edges.insert(position, (to, from));
        if let Some(labels) = state.edge_labels.remove(&(from, to)) {
            state.edge_labels.insert((to, from), labels);
        }
        Ok(())
    }
}

impl NodeRead for MemoryGraph {
    fn node_read(&self, node: &NodeRef) -> Result<Box<dyn Read + Send>> {
        let state = self.state.read();
        let id = state.id_of(node)?;
        let content = state
            .nodes
            .get(&id)
            .map(|stored| stored.content.clone())
            .unwrap_or_default();
        Ok(Box::new(Cursor::new(content)))
    }
}

struct MemoryWriter {
    state: Arc<RwLock<GraphState>>,
    id: NodeId,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl NodeWriter for MemoryWriter {
    fn close(self: Box<Self>) -> Result<()> {
        let mut state = self.state.write();
        let stored = state
            .nodes
            .get_mut(&self.id)
            .ok_or_else(|| GraphError::NotFound(format!("node {} was deleted", self.id)))?;
        stored.content = self.buffer;
        Ok(())
    }
}

impl NodeWrite for MemoryGraph {
    fn node_write(&self, node: &NodeRef) -> Result<Box<dyn NodeWriter>> {
        let id = self.state.read().id_of(node)?;
        Ok(Box::new(MemoryWriter {
            state: self.state.clone(),
            id,
            buffer: Vec::new(),
        }))
    }
}

impl NodeRename for MemoryGraph {
    fn node_rename(&self, node: &NodeRef, new_name: &str) -> Result<NodeRef> {
        if new_name.is_empty() {
            return Err(GraphError::InvalidInput("node label must not be empty".into()));
        }
        let mut state = self.state.write();
        let id = state.id_of(node)?;
        if let Some(stored) = state.nodes.get_mut(&id) {
            stored.label = new_name.to_string();
        }
        state
            .node_ref(id)
            .ok_or_else(|| GraphError::NotFound(format!("node {id}")))
    }
}

impl GetReader for MemoryGraph {
    fn get_reader(&self) -> Result<Box<dyn Read + Send>> {
        let bytes = serde_json::to_vec_pretty(&self.snapshot())?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

impl Typer for MemoryGraph {
    fn node_type(&self, node: &NodeRef) -> Result<String> {
        let state = self.state.read();
        let id = state.id_of(node)?;
        Ok(state
            .nodes
            .get(&id)
            .map(|stored| stored.kind.clone())
            .unwrap_or_default())
    }
}

impl TypedCreate for MemoryGraph {
    fn types(&self) -> Result<Vec<String>> {
        Ok(self.types.clone())
    }

    fn typed_create(&self, type_name: &str, label: &str) -> Result<NodeRef> {
        if !self.types.iter().any(|known| known == type_name) {
            return Err(GraphError::InvalidInput(format!(
                "unknown node type '{type_name}'"
            )));
        }
        if label.is_empty() {
            return Err(GraphError::InvalidInput("node label must not be empty".into()));
        }
        Ok(self.create(label, type_name))
    }
}

impl NodeLabels for MemoryGraph {
    fn node_labels(&self, node: &NodeRef) -> Result<Labels> {
        let state = self.state.read();
        let id = state.id_of(node)?;
        Ok(state
            .nodes
            .get(&id)
            .map(|stored| stored.labels.clone())
            .unwrap_or_default())
    }
}

impl NodeLabelAdd for MemoryGraph {
    fn node_label_add(&self, node: &NodeRef, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.write();
        let id = state.id_of(node)?;
        if let Some(stored) = state.nodes.get_mut(&id) {
            stored.labels.push((key.to_string(), value.to_string()));
        }
        Ok(())
    }
}

impl EdgeLabels for MemoryGraph {
    fn edge_labels(&self, from: &NodeRef, to: &NodeRef) -> Result<Labels> {
        let state = self.state.read();
        let edge = (state.id_of(from)?, state.id_of(to)?);
        if !state.edges.contains(&edge) {
            return Err(GraphError::NotFound(format!("edge {} -> {}", edge.0, edge.1)));
        }
        Ok(state.edge_labels.get(&edge).cloned().unwrap_or_default())
    }
}

impl NodeLess for MemoryGraph {
    fn node_less(&self, a: &NodeRef, b: &NodeRef) -> bool {
        let key = |node: &NodeRef| {
            downcast_node::<MemoryNode>(node)
                .map(|memory| (memory.label.clone(), memory.id))
                .unwrap_or_else(|_| (node.label(), NodeId(i64::MAX)))
        };
        key(a) < key(b)
    }
}

impl Constrained for MemoryGraph {
    fn constraints(&self) -> Vec<Constraint> {
        self.constraints.clone()
    }
}

/// Dimension producing [`MemoryGraph`]s and reading their JSON snapshots.
#[derive(Default)]
pub struct MemoryDimension {
    created: IdCounter,
}

impl MemoryDimension {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dimension for MemoryDimension {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn new_graph(&self) -> Result<GraphRef> {
        let n: i64 = self.created.next();
        Ok(Arc::new(MemoryGraph::new(format!("memory {n}"))))
    }

    fn as_open_reader(&self) -> Option<&dyn OpenReader> {
        Some(self)
    }

    fn as_node_opener(&self) -> Option<&dyn NodeOpener> {
        Some(self)
    }
}

impl OpenReader for MemoryDimension {
    fn open(&self, reader: &mut dyn Read) -> Result<GraphRef> {
        Ok(Arc::new(MemoryGraph::from_reader(reader)?))
    }
}

impl NodeOpener for MemoryDimension {
    /// Copies the given nodes by label into a fresh graph.
    fn node_open(&self, nodes: &[NodeRef]) -> Result<GraphRef> {
        if nodes.is_empty() {
            return Err(GraphError::NilInput("no nodes to open".into()));
        }
        let n: i64 = self.created.next();
        let graph = MemoryGraph::new(format!("opened {n}"));
        for node in nodes {
            graph.add_node(&node.label());
        }
        Ok(Arc::new(graph))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
