//! Graphs the engine builds about itself: the navigator root, command and
//! chooser listings, and the error log.

use std::{
    any::Any,
    sync::{Arc, Weak},
};

use parking_lot::{Mutex, RwLock};
use shared::{
    dimension::{dimension_node, graph_node, DimensionNode, GraphNode},
    error::{ErrorReport, GraphError, Result},
    protocol::{
        downcast_node, Directed, Executor, Graph, Host, Lifecycle, Node, NodeAll, NodeRef,
        TextNode,
    },
};
use tracing::{debug, warn};

use crate::{bindings::BindingIndex, command::CommandQueue, registry::CommandRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Dimensions,
    Graphs,
}

#[derive(Debug)]
struct CategoryNode(Category);

impl Node for CategoryNode {
    fn fingerprint(&self) -> String {
        format!("navigator:{}", self.label())
    }

    fn label(&self) -> String {
        match self.0 {
            Category::Dimensions => "dimensions".to_string(),
            Category::Graphs => "graphs".to_string(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Root graph: two category nodes leading to every registered dimension
/// and every open graph of the attached host.
#[derive(Default)]
pub struct NavigatorGraph {
    host: RwLock<Option<Weak<dyn Host>>>,
}

impl NavigatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn host(&self) -> Option<Arc<dyn Host>> {
        self.host.read().as_ref().and_then(Weak::upgrade)
    }

    fn members(&self, category: Category) -> Vec<NodeRef> {
        let Some(host) = self.host() else {
            return Vec::new();
        };
        match category {
            Category::Dimensions => host.dimensions().into_iter().map(dimension_node).collect(),
            Category::Graphs => host.open_graphs().into_iter().map(graph_node).collect(),
        }
    }

    fn category(category: Category) -> NodeRef {
        Arc::new(CategoryNode(category))
    }
}

impl Graph for NavigatorGraph {
    fn name(&self) -> String {
        "navigator".to_string()
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(vec![
            Self::category(Category::Dimensions),
            Self::category(Category::Graphs),
        ])
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
    fn as_lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

impl Directed for NavigatorGraph {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let any = node.as_any();
        if any.is::<DimensionNode>() {
            Ok(vec![Self::category(Category::Dimensions)])
        } else if any.is::<GraphNode>() {
            Ok(vec![Self::category(Category::Graphs)])
        } else {
            Ok(Vec::new())
        }
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        match node.as_any().downcast_ref::<CategoryNode>() {
            Some(CategoryNode(category)) => Ok(self.members(*category)),
            None => Ok(Vec::new()),
        }
    }
}

impl NodeAll for NavigatorGraph {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        let mut all = self.home_nodes()?;
        all.extend(self.members(Category::Dimensions));
        all.extend(self.members(Category::Graphs));
        Ok(all)
    }
}

impl Lifecycle for NavigatorGraph {
    fn attach(&self, host: Weak<dyn Host>) {
        *self.host.write() = Some(host);
    }
}

#[derive(Debug)]
struct CommandEntry {
    name: String,
    description: String,
    chord: String,
}

impl Node for CommandEntry {
    fn fingerprint(&self) -> String {
        format!("command:{}", self.name)
    }

    fn label(&self) -> String {
        match (self.chord.is_empty(), self.description.is_empty()) {
            (true, true) => self.name.clone(),
            (true, false) => format!("{}: {}", self.name, self.description),
            (false, true) => format!("{} [{}]", self.name, self.chord),
            (false, false) => format!("{} [{}]: {}", self.name, self.chord, self.description),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Listing of every registered command with its current chord. Executing
/// an entry queues its command.
pub struct CommandListGraph {
    entries: Vec<NodeRef>,
    queue: CommandQueue,
}

impl CommandListGraph {
    pub fn new(registry: &CommandRegistry, bindings: &BindingIndex, queue: CommandQueue) -> Self {
        let entries = registry
            .commands()
            .map(|command| {
                Arc::new(CommandEntry {
                    name: command.name.clone(),
                    description: command.description.clone(),
                    chord: bindings
                        .chord_of(&command.name)
                        .map(|chord| chord.to_string())
                        .unwrap_or_default(),
                }) as NodeRef
            })
            .collect();
        Self { entries, queue }
    }
}

impl Graph for CommandListGraph {
    fn name(&self) -> String {
        "commands".to_string()
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(self.entries.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_node_all(&self) -> Option<&dyn NodeAll> {
        Some(self)
    }

    fn as_executor(&self) -> Option<&dyn Executor> {
        Some(self)
    }
}

impl NodeAll for CommandListGraph {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        Ok(self.entries.clone())
    }
}

impl Executor for CommandListGraph {
    fn execute(&self, node: &NodeRef) -> Result<()> {
        let entry = downcast_node::<CommandEntry>(node)?;
        debug!(command = %entry.name, "queued command");
        self.queue.push(&entry.name);
        Ok(())
    }
}

/// A flat list of options pushed while a command waits for a choice.
pub struct ChooserGraph {
    title: String,
    options: Vec<NodeRef>,
}

impl ChooserGraph {
    pub fn new(title: impl Into<String>, options: Vec<NodeRef>) -> Self {
        Self {
            title: title.into(),
            options,
        }
    }
}

impl Graph for ChooserGraph {
    fn name(&self) -> String {
        format!("choose: {}", self.title)
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(self.options.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_node_all(&self) -> Option<&dyn NodeAll> {
        Some(self)
    }
}

impl NodeAll for ChooserGraph {
    fn node_all(&self) -> Result<Vec<NodeRef>> {
        Ok(self.options.clone())
    }
}

/// Captured command failures, newest last. Also browsable as a graph.
#[derive(Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<ErrorReport>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, err: &GraphError) {
        warn!(code = ?err.code(), error = %err, "captured error");
        self.entries.lock().push(ErrorReport::from(err));
    }

    pub fn entries(&self) -> Vec<ErrorReport> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Graph for ErrorLog {
    fn name(&self) -> String {
        "errors".to_string()
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(self
            .entries()
            .iter()
            .enumerate()
            .map(|(index, report)| TextNode::node(format!("{}: {report}", index + 1)))
            .collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
