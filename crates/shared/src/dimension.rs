//! Dimensions: kinds of graph adapters that can produce fresh graphs, open
//! persisted ones, or wrap existing ones.

use std::{
    any::Any,
    fmt, fs,
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    error::{GraphError, Result},
    protocol::{GraphRef, Node, NodeRef},
};

pub type DimensionRef = Arc<dyn Dimension>;

pub trait Dimension: Send + Sync {
    /// Display name; also matched against snapshot file names.
    fn name(&self) -> String;
    fn new_graph(&self) -> Result<GraphRef>;

    fn as_open_reader(&self) -> Option<&dyn OpenReader> {
        None
    }
    fn as_node_opener(&self) -> Option<&dyn NodeOpener> {
        None
    }
    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        None
    }
}

pub trait OpenReader {
    fn open(&self, reader: &mut dyn Read) -> Result<GraphRef>;
}

/// Opens a new graph rooted at the given nodes.
pub trait NodeOpener {
    fn node_open(&self, nodes: &[NodeRef]) -> Result<GraphRef>;
}

pub trait Wrapper {
    fn wrap(&self, graph: GraphRef) -> Result<GraphRef>;
}

/// A dimension shown as a node; entering it instantiates a fresh graph.
pub struct DimensionNode(pub DimensionRef);

impl fmt::Debug for DimensionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DimensionNode").field(&self.0.name()).finish()
    }
}

impl Node for DimensionNode {
    fn fingerprint(&self) -> String {
        format!("dimension:{}", self.0.name())
    }

    fn label(&self) -> String {
        self.0.name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_dimension(&self) -> Option<DimensionRef> {
        Some(self.0.clone())
    }
}

/// An open graph shown as a node.
pub struct GraphNode(pub GraphRef);

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GraphNode").field(&self.0.name()).finish()
    }
}

impl Node for GraphNode {
    fn fingerprint(&self) -> String {
        // Distinct graphs may share a display name.
        format!(
            "graph:{}@{:p}",
            self.0.name(),
            Arc::as_ptr(&self.0) as *const ()
        )
    }

    fn label(&self) -> String {
        self.0.name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_graph(&self) -> Option<GraphRef> {
        Some(self.0.clone())
    }
}

pub struct SnapshotLoad {
    pub graphs: Vec<(PathBuf, GraphRef)>,
    pub failures: Vec<(PathBuf, GraphError)>,
}

/// Registered dimensions, in registration order.
#[derive(Default)]
pub struct Catalog {
    dimensions: RwLock<Vec<DimensionRef>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, dimension: DimensionRef) -> Result<()> {
        let name = dimension.name();
        if name.trim().is_empty() {
            return Err(GraphError::InvalidInput(
                "dimension name must not be empty".into(),
            ));
        }
        let mut dimensions = self.dimensions.write();
        if dimensions.iter().any(|known| known.name() == name) {
            return Err(GraphError::InvalidInput(format!(
                "dimension '{name}' is already registered"
            )));
        }
        debug!(dimension = %name, "registered dimension");
        dimensions.push(dimension);
        Ok(())
    }

    pub fn dimensions(&self) -> Vec<DimensionRef> {
        self.dimensions.read().clone()
    }

    pub fn find(&self, name: &str) -> Option<DimensionRef> {
        self.dimensions
            .read()
            .iter()
            .find(|dimension| dimension.name() == name)
            .cloned()
    }

    /// Opens every regular file in `dir` whose lowercased name contains the
    /// lowercased name of a dimension able to open readers. Files matching
    /// several dimensions are opened once per match.
    pub fn open_snapshot_dir(&self, dir: &Path) -> Result<SnapshotLoad> {
        let openers: Vec<DimensionRef> = self
            .dimensions()
            .into_iter()
            .filter(|dimension| dimension.as_open_reader().is_some())
            .collect();

        let mut entries = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        entries.sort();

        let mut load = SnapshotLoad {
            graphs: Vec::new(),
            failures: Vec::new(),
        };
        for path in entries {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            for dimension in &openers {
                if !file_name.contains(&dimension.name().to_lowercase()) {
                    continue;
                }
                let Some(opener) = dimension.as_open_reader() else {
                    continue;
                };
                match open_file(opener, &path) {
                    Ok(graph) => {
                        info!(
                            path = %path.display(),
                            dimension = %dimension.name(),
                            "opened snapshot"
                        );
                        load.graphs.push((path.clone(), graph));
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to open snapshot");
                        load.failures.push((path.clone(), err));
                    }
                }
            }
        }
        Ok(load)
    }
}

fn open_file(opener: &dyn OpenReader, path: &Path) -> Result<GraphRef> {
    let mut file = fs::File::open(path)?;
    opener.open(&mut file)
}

pub fn graph_node(graph: GraphRef) -> NodeRef {
    Arc::new(GraphNode(graph))
}

pub fn dimension_node(dimension: DimensionRef) -> NodeRef {
    Arc::new(DimensionNode(dimension))
}
