//! Key-binding index: a prefix DAG from chord tokens to command leaves.
//!
//! Every registered command owns one leaf. A bound leaf hangs below the
//! internal node carrying its full chord, and internal nodes chain up one
//! token at a time, so commands sharing a prefix share the nodes up to the
//! point where their chords diverge.

use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    io::{Cursor, Read},
    sync::Arc,
};

use parking_lot::RwLock;
use petgraph::{
    algo::has_path_connecting,
    stable_graph::{NodeIndex, StableDiGraph},
    visit::Dfs,
    Direction,
};
use shared::{
    domain::{BindingId, IdCounter},
    error::{GraphError, Result},
    protocol::{
        downcast_node, Directed, EdgeCreate, EdgeDelete, GetReader, Graph, Node, NodeAll,
        NodeCreate, NodeRef, NodeUpdate,
    },
};
use tracing::{debug, warn};

use crate::keys::{Chord, Key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingNode {
    pub id: BindingId,
    pub chord: Chord,
    /// Set on leaves only.
    pub command: Option<String>,
}

impl BindingNode {
    pub fn is_leaf(&self) -> bool {
        self.command.is_some()
    }
}

impl Node for BindingNode {
    fn fingerprint(&self) -> String {
        match &self.command {
            Some(name) => format!("command:{name}"),
            None => format!("prefix:{}#{}", self.chord, self.id),
        }
    }

    fn label(&self) -> String {
        match &self.command {
            Some(name) if self.chord.is_empty() => name.clone(),
            Some(name) => format!("{name} [{}]", self.chord),
            None => self
                .chord
                .last()
                .map(Key::to_string)
                .unwrap_or_default(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Outcome of matching the buffered keys against the bound chords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Run(String),
    /// Several bindings still match; keep buffering.
    Pending(usize),
    Unbound,
}

#[derive(Default)]
struct Dag {
    graph: StableDiGraph<BindingNode, ()>,
    index: HashMap<BindingId, NodeIndex>,
}

impl Dag {
    fn insert(&mut self, node: BindingNode) -> NodeIndex {
        let id = node.id;
        let index = self.graph.add_node(node);
        self.index.insert(id, index);
        index
    }

    fn remove(&mut self, index: NodeIndex) {
        if let Some(node) = self.graph.remove_node(index) {
            self.index.remove(&node.id);
        }
    }

    fn locate(&self, node: &NodeRef) -> Result<NodeIndex> {
        let binding = downcast_node::<BindingNode>(node)?;
        self.index.get(&binding.id).copied().ok_or_else(|| {
            GraphError::NotFound(format!("binding {} is no longer in the index", binding.id))
        })
    }

    fn weight(&self, index: NodeIndex) -> Result<&BindingNode> {
        self.graph
            .node_weight(index)
            .ok_or_else(|| GraphError::Internal(format!("dangling binding index {index:?}")))
    }

    fn node_ref(&self, index: NodeIndex) -> Option<NodeRef> {
        self.graph
            .node_weight(index)
            .cloned()
            .map(|node| Arc::new(node) as NodeRef)
    }

    fn leaf(&self, command: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|index| self.graph[*index].command.as_deref() == Some(command))
    }

    fn prefix_node(&self, chord: &Chord) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|index| !self.graph[*index].is_leaf() && self.graph[*index].chord == *chord)
    }

    fn bound_leaves(&self) -> impl Iterator<Item = &BindingNode> + '_ {
        self.graph
            .node_weights()
            .filter(|node| node.is_leaf() && !node.chord.is_empty())
    }

    fn neighbors(&self, index: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(index, direction).collect()
    }

    /// Drops `start` and everything below it: leaves become unbound, prefix
    /// nodes are deleted. Edges into the subtree from elsewhere are cut and
    /// the prefixes they came from are pruned.
    fn detach(&mut self, start: NodeIndex) {
        let mut below = Vec::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(index) = dfs.next(&self.graph) {
            below.push(index);
        }
        let mut outside = Vec::new();
        for index in &below {
            for parent in self.neighbors(*index, Direction::Incoming) {
                if !below.contains(&parent) {
                    outside.push(parent);
                }
            }
        }
        for index in below {
            let is_leaf = match self.graph.node_weight(index) {
                Some(node) => node.is_leaf(),
                None => continue,
            };
            if !is_leaf {
                self.remove(index);
                continue;
            }
            for parent in self.neighbors(index, Direction::Incoming) {
                if let Some(edge) = self.graph.find_edge(parent, index) {
                    self.graph.remove_edge(edge);
                }
            }
            if let Some(node) = self.graph.node_weight_mut(index) {
                node.chord.clear();
            }
        }
        self.prune_upward(outside);
    }

    /// Cuts every edge into `index` except the one from `keep` and prunes
    /// the prefixes left empty.
    fn cut_parents(&mut self, index: NodeIndex, keep: Option<NodeIndex>) {
        let parents: Vec<NodeIndex> = self
            .neighbors(index, Direction::Incoming)
            .into_iter()
            .filter(|parent| Some(*parent) != keep)
            .collect();
        for parent in &parents {
            if let Some(edge) = self.graph.find_edge(*parent, index) {
                self.graph.remove_edge(edge);
            }
        }
        self.prune_upward(parents);
    }

    /// Deletes prefix nodes that no longer lead to any leaf.
    fn prune_upward(&mut self, mut pending: Vec<NodeIndex>) {
        while let Some(index) = pending.pop() {
            let Some(node) = self.graph.node_weight(index) else {
                continue;
            };
            if node.is_leaf() || !self.neighbors(index, Direction::Outgoing).is_empty() {
                continue;
            }
            pending.extend(self.neighbors(index, Direction::Incoming));
            self.remove(index);
        }
    }

    fn unbind(&mut self, leaf: NodeIndex) {
        self.cut_parents(leaf, None);
        self.detach(leaf);
    }
}

pub struct BindingIndex {
    dag: RwLock<Dag>,
    ids: IdCounter,
}

impl BindingIndex {
    /// Creates an unbound leaf for every command.
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = Self {
            dag: RwLock::new(Dag::default()),
            ids: IdCounter::default(),
        };
        for command in commands {
            index.add_command(&command.into());
        }
        index
    }

    pub fn from_map<I, S>(commands: I, chords: &BTreeMap<String, String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = Self::new(commands);
        index.apply(chords)?;
        Ok(index)
    }

    pub fn add_command(&self, command: &str) -> BindingId {
        let mut dag = self.dag.write();
        if let Some(existing) = dag.leaf(command) {
            return dag.graph[existing].id;
        }
        let id = self.ids.next();
        dag.insert(BindingNode {
            id,
            chord: Chord::default(),
            command: Some(command.to_string()),
        });
        id
    }

    /// Applies a `{ command: chord }` map. Names without a registered
    /// command are skipped. Returns how many bindings were applied.
    pub fn apply(&self, chords: &BTreeMap<String, String>) -> Result<usize> {
        let mut applied = 0;
        for (command, text) in chords {
            let chord = Chord::parse(text)?;
            match self.bind(command, &chord) {
                Ok(()) => applied += 1,
                Err(GraphError::NotFound(_)) => {
                    warn!(command = %command, "ignoring binding for unknown command");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(applied)
    }

    /// Reads the persisted JSON form.
    pub fn load(&self, reader: &mut dyn Read) -> Result<usize> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let chords: BTreeMap<String, String> = serde_json::from_str(&text)?;
        self.apply(&chords)
    }

    /// Binds `command` to `chord`, replacing its previous chord. The empty
    /// chord unbinds.
    pub fn bind(&self, command: &str, chord: &Chord) -> Result<()> {
        let mut dag = self.dag.write();
        let leaf = dag.leaf(command).ok_or_else(|| {
            GraphError::NotFound(format!("command '{command}' is not registered"))
        })?;
        if !chord.is_empty() {
            if let Some(other) = dag
                .bound_leaves()
                .find(|node| node.chord == *chord && node.command.as_deref() != Some(command))
            {
                return Err(GraphError::InvalidInput(format!(
                    "'{chord}' is already bound to '{}'",
                    other.command.as_deref().unwrap_or_default()
                )));
            }
        }

        dag.unbind(leaf);
        if chord.is_empty() {
            return Ok(());
        }

        let mut parent: Option<NodeIndex> = None;
        for len in 1..=chord.len() {
            let prefix = chord.prefix(len);
            let node = match dag.prefix_node(&prefix) {
                Some(existing) => existing,
                None => {
                    let id = self.ids.next();
                    dag.insert(BindingNode {
                        id,
                        chord: prefix,
                        command: None,
                    })
                }
            };
            if let Some(parent) = parent {
                dag.graph.update_edge(parent, node, ());
            }
            parent = Some(node);
        }
        if let Some(node) = dag.graph.node_weight_mut(leaf) {
            node.chord = chord.clone();
        }
        if let Some(parent) = parent {
            dag.graph.update_edge(parent, leaf, ());
        }
        debug!(command = %command, chord = %chord, "bound command");
        Ok(())
    }

    pub fn chord_of(&self, command: &str) -> Option<Chord> {
        let dag = self.dag.read();
        dag.leaf(command).map(|leaf| dag.graph[leaf].chord.clone())
    }

    /// The persisted form: bound commands only.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.dag
            .read()
            .bound_leaves()
            .filter_map(|node| {
                node.command
                    .clone()
                    .map(|command| (command, node.chord.to_string()))
            })
            .collect()
    }

    /// Bound leaves whose chord starts with `prefix`, by command name.
    pub fn filter(&self, prefix: &Chord) -> Vec<BindingNode> {
        let mut found: Vec<BindingNode> = self
            .dag
            .read()
            .bound_leaves()
            .filter(|node| node.chord.starts_with(prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.command.cmp(&b.command));
        found
    }

    pub fn dispatch(&self, buffer: &Chord) -> Dispatch {
        if buffer.is_empty() {
            return Dispatch::Unbound;
        }
        let matches = self.filter(buffer);
        match matches.as_slice() {
            [] => Dispatch::Unbound,
            [only] => match &only.command {
                Some(command) => Dispatch::Run(command.clone()),
                None => Dispatch::Unbound,
            },
            several => Dispatch::Pending(several.len()),
        }
    }

    pub fn node_count(&self) -> usize {
        self.dag.read().graph.node_count()
    }
}

impl Graph for BindingIndex {
    fn name(&self) -> String {
        "bindings".to_string()
    }

    /// Command leaves, bound or not.
    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        let dag = self.dag.read();
        let mut leaves: Vec<NodeRef> = dag
            .graph
            .node_indices()
            .filter(|index| dag.graph[*index].is_leaf())
            .filter_map(|index| dag.node_ref(index))
            .collect();
        leaves.sort_by_key(|node| node.fingerprint());
        Ok(leaves)
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
    fn as_node_update(&self) -> Option<&dyn NodeUpdate> {
        Some(self)
    }
    fn as_edge_create(&self) -> Option<&dyn EdgeCreate> {
        Some(self)
    }
    fn as_edge_delete(&self) -> Option<&dyn EdgeDelete> {
        Some(self)
    }
    fn as_get_reader(&self) -> Option<&dyn GetReader> {
        Some(self)
    }
}

impl Directed for BindingIndex {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let dag = self.dag.read();
        let index = dag.locate(node)?;
        Ok(dag
            .neighbors(index, Direction::Incoming)
            .into_iter()
            .filter_map(|parent| dag.node_ref(parent))
            .collect())
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let dag = self.dag.read();
        let index = dag.locate(node)?;
        Ok(dag
            .neighbors(index, Direction::Outgoing)
            .into_iter()
            .filter_map(|child| dag.node_ref(child))
            .collect())
    }
}

impl NodeAll for BindingIndex {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        let dag = self.dag.read();
        let mut all: Vec<&BindingNode> = dag.graph.node_weights().collect();
        all.sort_by_key(|node| node.id);
        Ok(all
            .into_iter()
            .map(|node| Arc::new(node.clone()) as NodeRef)
            .collect())
    }
}

impl NodeCreate for BindingIndex {
    /// Creates a detached prefix node for a single key token.
    fn node_create(&self, label: &str) -> Result<NodeRef> {
        let key = Key::parse(label)?;
        let mut dag = self.dag.write();
        let id = self.ids.next();
        let index = dag.insert(BindingNode {
            id,
            chord: Chord::new(vec![key]),
            command: None,
        });
        dag.node_ref(index)
            .ok_or_else(|| GraphError::Internal("created binding vanished".into()))
    }
}

impl NodeUpdate for BindingIndex {
    fn node_update(&self, node: &NodeRef) -> Result<NodeRef> {
        let dag = self.dag.read();
        let index = dag.locate(node)?;
        dag.node_ref(index)
            .ok_or_else(|| GraphError::NotFound(format!("binding '{}'", node.fingerprint())))
    }
}

impl EdgeCreate for BindingIndex {
    /// Hangs `to` below the prefix node `from`, cutting it from its previous
    /// parent. The prefix is prepended to `to`'s chord, and for a prefix node
    /// to every chord below it.
    fn edge_create(&self, from: &NodeRef, to: &NodeRef) -> Result<()> {
        let mut dag = self.dag.write();
        let from_index = dag.locate(from)?;
        let to_index = dag.locate(to)?;
        let source = dag.weight(from_index)?;
        if let Some(command) = &source.command {
            return Err(GraphError::InvalidInput(format!(
                "commands are leaves; no edge can start at '{command}'"
            )));
        }
        if source.chord.is_empty() {
            return Err(GraphError::InvalidInput("prefix node carries no key".into()));
        }
        let prefix = source.chord.clone();
        if from_index == to_index || has_path_connecting(&dag.graph, to_index, from_index, None) {
            return Err(GraphError::CycleDetected(format!(
                "linking '{}' below '{prefix}' would close a cycle",
                dag.weight(to_index)?.label()
            )));
        }
        if dag.graph.find_edge(from_index, to_index).is_some() {
            return Ok(());
        }

        let mut below = Vec::new();
        let mut dfs = Dfs::new(&dag.graph, to_index);
        while let Some(index) = dfs.next(&dag.graph) {
            below.push(index);
        }
        for index in below {
            if let Some(node) = dag.graph.node_weight_mut(index) {
                node.chord = node.chord.prepended(&prefix);
            }
        }
        dag.graph.add_edge(from_index, to_index, ());
        dag.cut_parents(to_index, Some(from_index));
        Ok(())
    }
}

impl EdgeDelete for BindingIndex {
    fn edge_delete(&self, from: &NodeRef, to: &NodeRef) -> Result<()> {
        let mut dag = self.dag.write();
        let from_index = dag.locate(from)?;
        let to_index = dag.locate(to)?;
        let edge = dag.graph.find_edge(from_index, to_index).ok_or_else(|| {
            GraphError::NotFound(format!(
                "no binding edge from '{}' to '{}'",
                from.label(),
                to.label()
            ))
        })?;
        dag.graph.remove_edge(edge);
        dag.detach(to_index);
        debug!(from = %from.label(), to = %to.label(), "cut binding edge");
        Ok(())
    }
}

impl GetReader for BindingIndex {
    fn get_reader(&self) -> Result<Box<dyn Read + Send>> {
        let bytes = serde_json::to_vec_pretty(&self.to_map())?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

#[cfg(test)]
#[path = "tests/bindings_tests.rs"]
mod tests;
