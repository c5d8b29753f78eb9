//! The navigation stack.
//!
//! Frames live in an arena and the stack itself is a list of [`FrameId`]s.
//! History entries are copies of that list taken before every pop or
//! replace, so a frame stays alive for as long as some history entry still
//! refers to it. The lock is never held while a graph is being queried.

use std::{
    collections::{BTreeSet, HashSet, VecDeque},
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::{Mutex, RwLock};
use shared::{
    conformance::check_graph,
    dimension::{Catalog, DimensionRef},
    error::{GraphError, Result},
    protocol::{require, tunnel, unwrap_to, Capability, Graph, GraphRef, Host, NodeRef, Tunnel},
};
use tracing::{debug, warn};

use crate::{
    catalog::NavigatorGraph,
    views::{sparse_view, tree_view, Positions, Side},
};

/// Called with the graph of a frame being popped, e.g. to write it back to
/// the node it was opened from.
pub type WriteBack = Arc<dyn Fn(&dyn Graph) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(usize);

impl FrameId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which list of a frame has focus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Panel {
    Incoming,
    #[default]
    Current,
    Outgoing,
}

impl Panel {
    pub fn left(self) -> Self {
        match self {
            Self::Outgoing => Self::Current,
            _ => Self::Incoming,
        }
    }

    pub fn right(self) -> Self {
        match self {
            Self::Incoming => Self::Current,
            _ => Self::Outgoing,
        }
    }
}

/// How a frame lays out its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Modus {
    /// Whatever was listed last, with neighbour panels.
    #[default]
    List,
    /// One path through the cursor node; the panels show branches not taken.
    Sparse,
    /// The cursor node's siblings; the panels show the parent's siblings
    /// and the children.
    Tree,
}

/// One view on a graph: the listed items, a cursor and a selection.
/// Selection is kept by fingerprint so it survives item refreshes.
#[derive(Clone)]
pub struct Frame {
    graph: GraphRef,
    items: Vec<NodeRef>,
    cursor: usize,
    selected: BTreeSet<String>,
    focus: Panel,
    modus: Modus,
    positions: Positions,
    write_back: Option<WriteBack>,
}

impl Frame {
    fn new(graph: GraphRef, items: Vec<NodeRef>, write_back: Option<WriteBack>) -> Self {
        Self {
            graph,
            items,
            cursor: 0,
            selected: BTreeSet::new(),
            focus: Panel::default(),
            modus: Modus::default(),
            positions: Positions::default(),
            write_back,
        }
    }

    pub fn graph(&self) -> &GraphRef {
        &self.graph
    }

    pub fn items(&self) -> &[NodeRef] {
        &self.items
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn focus(&self) -> Panel {
        self.focus
    }

    pub fn set_focus(&mut self, focus: Panel) {
        self.focus = focus;
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn set_modus(&mut self, modus: Modus) {
        self.modus = modus;
    }

    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut Positions {
        &mut self.positions
    }

    pub fn cursor_node(&self) -> Option<NodeRef> {
        self.items.get(self.cursor).cloned()
    }

    pub fn is_selected(&self, node: &NodeRef) -> bool {
        self.selected.contains(&node.fingerprint())
    }

    /// Selected items in list order, or the cursor item when nothing is
    /// selected.
    pub fn targets(&self) -> Vec<NodeRef> {
        let selected: Vec<NodeRef> = self
            .items
            .iter()
            .filter(|node| self.is_selected(node))
            .cloned()
            .collect();
        if selected.is_empty() {
            self.cursor_node().into_iter().collect()
        } else {
            selected
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.items.is_empty() {
            self.cursor = 0;
            return;
        }
        let last = self.items.len() - 1;
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
    }

    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.items.len().saturating_sub(1));
    }

    /// Moves the cursor onto the first item with `fingerprint`.
    pub fn seek(&mut self, fingerprint: &str) -> bool {
        match self
            .items
            .iter()
            .position(|node| node.fingerprint() == fingerprint)
        {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    pub fn toggle_selected(&mut self) {
        let Some(node) = self.cursor_node() else {
            return;
        };
        let key = node.fingerprint();
        if !self.selected.remove(&key) {
            self.selected.insert(key);
        }
    }

    pub fn invert_selection(&mut self) {
        let all: BTreeSet<String> = self.items.iter().map(|node| node.fingerprint()).collect();
        self.selected = all.difference(&self.selected).cloned().collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    /// Replaces the listed items. The cursor is clamped and selections of
    /// items that are gone are dropped.
    pub fn set_items(&mut self, items: Vec<NodeRef>) {
        let present: HashSet<String> = items.iter().map(|node| node.fingerprint()).collect();
        self.selected.retain(|key| present.contains(key));
        self.items = items;
        self.set_cursor(self.cursor);
    }
}

struct Stack {
    arena: Vec<Option<Frame>>,
    free: Vec<usize>,
    live: Vec<FrameId>,
    history: VecDeque<Vec<FrameId>>,
    history_limit: usize,
}

impl Stack {
    fn new(history_limit: usize) -> Self {
        Self {
            arena: Vec::new(),
            free: Vec::new(),
            live: Vec::new(),
            history: VecDeque::new(),
            history_limit,
        }
    }

    fn alloc(&mut self, frame: Frame) -> FrameId {
        match self.free.pop() {
            Some(slot) => {
                self.arena[slot] = Some(frame);
                FrameId(slot)
            }
            None => {
                self.arena.push(Some(frame));
                FrameId(self.arena.len() - 1)
            }
        }
    }

    fn top(&self) -> FrameId {
        self.live.last().copied().unwrap_or_default()
    }

    fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.arena.get(id.0).and_then(Option::as_ref)
    }

    fn frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.arena.get_mut(id.0).and_then(Option::as_mut)
    }

    fn record_history(&mut self) {
        self.history.push_back(self.live.clone());
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// Frees every arena slot that neither the stack nor history refers to.
    fn collect(&mut self) {
        let referenced: HashSet<FrameId> = self
            .live
            .iter()
            .chain(self.history.iter().flatten())
            .copied()
            .collect();
        for (slot, frame) in self.arena.iter_mut().enumerate() {
            if frame.is_some() && !referenced.contains(&FrameId(slot)) {
                *frame = None;
                self.free.push(slot);
            }
        }
    }

    fn holds_graph(&self, graph: &GraphRef) -> bool {
        self.live.iter().any(|id| {
            self.frame(*id).is_some_and(|frame| {
                std::ptr::addr_eq(Arc::as_ptr(&frame.graph), Arc::as_ptr(graph))
            })
        })
    }
}

pub struct Navigator {
    me: Weak<Navigator>,
    catalog: Arc<Catalog>,
    stack: Mutex<Stack>,
    adopted: RwLock<Vec<GraphRef>>,
}

impl Navigator {
    /// Creates a navigator whose base frame shows `root`.
    pub fn new(root: GraphRef, catalog: Arc<Catalog>, history_limit: usize) -> Result<Arc<Self>> {
        let navigator = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            catalog,
            stack: Mutex::new(Stack::new(history_limit)),
            adopted: RwLock::new(Vec::new()),
        });
        navigator.push(root)?;
        Ok(navigator)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn host(&self) -> Weak<dyn Host> {
        self.me.clone()
    }

    /// Attaches lifecycle graphs, checks conformance and reads home nodes.
    fn prepare(&self, graph: &GraphRef) -> Result<Vec<NodeRef>> {
        if let Some(lifecycle) = graph.as_lifecycle() {
            lifecycle.attach(self.host());
        }
        check_graph(graph.as_ref())?;
        graph.home_nodes()
    }

    pub fn push(&self, graph: GraphRef) -> Result<FrameId> {
        self.push_frame(graph, None)
    }

    /// Pushes `graph`; `write_back` runs with it when the frame is popped.
    pub fn push_with_write_back(&self, graph: GraphRef, write_back: WriteBack) -> Result<FrameId> {
        self.push_frame(graph, Some(write_back))
    }

    fn push_frame(&self, graph: GraphRef, write_back: Option<WriteBack>) -> Result<FrameId> {
        let items = self.prepare(&graph)?;
        let name = graph.name();
        let mut stack = self.stack.lock();
        let id = stack.alloc(Frame::new(graph, items, write_back));
        stack.live.push(id);
        debug!(graph = %name, frame = %id, depth = stack.live.len(), "pushed frame");
        Ok(id)
    }

    /// Pops the top frame and returns the frame now on top. The base frame
    /// is never popped.
    pub fn pop(&self) -> FrameId {
        self.pop_where(None).1
    }

    /// Pops the top frame only while it is still `frame`.
    pub fn pop_frame(&self, frame: FrameId) -> bool {
        self.pop_where(Some(frame)).0
    }

    fn pop_where(&self, expected: Option<FrameId>) -> (bool, FrameId) {
        let (popped, top, still_open) = {
            let mut stack = self.stack.lock();
            if stack.live.len() <= 1 {
                debug!("refusing to pop the base frame");
                return (false, stack.top());
            }
            if expected.is_some_and(|frame| frame != stack.top()) {
                return (false, stack.top());
            }
            stack.record_history();
            let popped_id = stack.live.pop();
            let popped = popped_id.and_then(|id| stack.frame(id).cloned());
            let still_open = popped
                .as_ref()
                .is_some_and(|frame| stack.holds_graph(&frame.graph));
            stack.collect();
            (popped, stack.top(), still_open)
        };
        if let Some(frame) = popped {
            self.flush(&frame, still_open);
        }
        debug!(frame = %top, "popped frame");
        (true, top)
    }

    /// Best effort: failures are logged, the pop itself always succeeds.
    fn flush(&self, frame: &Frame, still_open: bool) {
        let name = frame.graph.name();
        if let Some(write_back) = &frame.write_back {
            if let Err(err) = write_back(frame.graph.as_ref()) {
                warn!(graph = %name, error = %err, "write back failed");
            }
        }
        if still_open {
            return;
        }
        if let Some(closer) = frame.graph.as_closer() {
            if let Err(err) = closer.close() {
                warn!(graph = %name, error = %err, "closing graph failed");
            }
            self.adopted
                .write()
                .retain(|graph| !std::ptr::addr_eq(Arc::as_ptr(graph), Arc::as_ptr(&frame.graph)));
        }
    }

    /// Puts `graph` in place of the top frame. The base frame can only be
    /// replaced while it shows the navigator graph.
    pub fn replace(&self, graph: GraphRef) -> Result<FrameId> {
        let (depth, current) = {
            let stack = self.stack.lock();
            let current = stack.frame(stack.top()).map(|frame| frame.graph.clone());
            (stack.live.len(), current)
        };
        let current =
            current.ok_or_else(|| GraphError::Internal("navigator has no frames".into()))?;
        if depth == 1 && unwrap_to::<NavigatorGraph>(&current).is_none() {
            return Err(GraphError::InvalidInput(format!(
                "the base frame '{}' cannot be replaced",
                current.name()
            )));
        }

        let items = self.prepare(&graph)?;
        let name = graph.name();
        let mut stack = self.stack.lock();
        stack.record_history();
        let id = stack.alloc(Frame::new(graph, items, None));
        if let Some(top) = stack.live.last_mut() {
            *top = id;
        }
        stack.collect();
        debug!(graph = %name, frame = %id, "replaced top frame");
        Ok(id)
    }

    /// Edits the first graph of type `T` in the current decorator chain and
    /// shows the result. A chain without a `T` is a dead end, not an error.
    pub fn edit_current<T, F>(&self, edit: F) -> Result<Tunnel<FrameId>>
    where
        T: Graph + 'static,
        F: FnOnce(&T) -> Result<GraphRef>,
    {
        let current = self.current_graph()?;
        match tunnel::<T, _>(&current, edit)? {
            Tunnel::Found(replacement) => {
                if std::ptr::addr_eq(Arc::as_ptr(&replacement), Arc::as_ptr(&current)) {
                    self.refresh()?;
                    Ok(Tunnel::Found(self.peek()))
                } else {
                    self.replace(replacement).map(Tunnel::Found)
                }
            }
            Tunnel::DeadEnd => {
                debug!(graph = %current.name(), "edit found no matching graph");
                Ok(Tunnel::DeadEnd)
            }
        }
    }

    pub fn peek(&self) -> FrameId {
        self.stack.lock().top()
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().live.len()
    }

    pub fn frame(&self, id: FrameId) -> Option<Frame> {
        self.stack.lock().frame(id).cloned()
    }

    /// Live frames, base first.
    pub fn frames(&self) -> Vec<(FrameId, Frame)> {
        let stack = self.stack.lock();
        stack
            .live
            .iter()
            .filter_map(|id| stack.frame(*id).map(|frame| (*id, frame.clone())))
            .collect()
    }

    /// Recorded stack shapes, oldest first.
    pub fn history(&self) -> Vec<Vec<FrameId>> {
        self.stack.lock().history.iter().cloned().collect()
    }

    pub fn current_graph(&self) -> Result<GraphRef> {
        let stack = self.stack.lock();
        stack
            .frame(stack.top())
            .map(|frame| frame.graph.clone())
            .ok_or_else(|| GraphError::Internal("navigator has no frames".into()))
    }

    pub fn cursor_node(&self) -> Option<NodeRef> {
        self.with_top(|frame| frame.cursor_node()).flatten()
    }

    /// Selected items of the top frame, or its cursor item.
    pub fn targets(&self) -> Vec<NodeRef> {
        self.with_top(|frame| frame.targets()).unwrap_or_default()
    }

    pub fn with_top<R>(&self, edit: impl FnOnce(&mut Frame) -> R) -> Option<R> {
        let mut stack = self.stack.lock();
        let top = stack.top();
        stack.frame_mut(top).map(edit)
    }

    pub fn set_items(&self, items: Vec<NodeRef>) {
        self.with_top(|frame| frame.set_items(items));
    }

    /// Re-reads the home nodes of the top frame's graph.
    pub fn refresh(&self) -> Result<()> {
        let graph = self.current_graph()?;
        let items = graph.home_nodes()?;
        self.set_items(items);
        Ok(())
    }

    /// Lays the top frame out again around its cursor node. List frames
    /// are left as they are.
    pub fn relayout(&self) -> Result<()> {
        let frame = self
            .frame(self.peek())
            .ok_or_else(|| GraphError::Internal("navigator has no frames".into()))?;
        let Some(node) = frame.cursor_node() else {
            return Ok(());
        };
        let graph = frame.graph().as_ref();
        let (items, cursor) = match frame.modus() {
            Modus::List => return Ok(()),
            Modus::Sparse => {
                let view = sparse_view(graph, &node, frame.positions())?;
                (view.items, view.cursor)
            }
            Modus::Tree => {
                let view = tree_view(graph, &node)?;
                (view.siblings, view.cursor)
            }
        };
        self.with_top(|frame| {
            frame.set_items(items);
            frame.set_cursor(cursor);
        });
        Ok(())
    }

    /// Switches the top frame to `modus` and lays it out. A frame that
    /// cannot be laid out keeps its previous modus.
    pub fn set_modus(&self, modus: Modus) -> Result<()> {
        let previous = self.with_top(|frame| {
            let previous = frame.modus();
            frame.set_modus(modus);
            previous
        });
        let laid_out = match modus {
            Modus::List => self.refresh(),
            Modus::Sparse | Modus::Tree => self.relayout(),
        };
        if laid_out.is_err() {
            if let Some(previous) = previous {
                self.with_top(|frame| frame.set_modus(previous));
            }
        }
        laid_out
    }

    /// Takes the next branch on `side` at the cursor node and lays the
    /// frame out again.
    pub fn next_branch(&self, side: Side) -> Result<usize> {
        let frame = self
            .frame(self.peek())
            .ok_or_else(|| GraphError::Internal("navigator has no frames".into()))?;
        let node = frame
            .cursor_node()
            .ok_or_else(|| GraphError::NilInput("no node under the cursor".into()))?;
        let graph = frame.graph();
        let directed = require(graph.as_directed(), Capability::Directed, graph.as_ref())?;
        let count = match side {
            Side::Incoming => directed.incoming(&node)?.len(),
            Side::Outgoing => directed.outgoing(&node)?.len(),
        };
        let key = node.fingerprint();
        let chosen = self
            .with_top(|frame| frame.positions_mut().advance(side, &key, count))
            .unwrap_or_default();
        self.relayout()?;
        self.with_top(|frame| frame.seek(&key));
        Ok(chosen)
    }

    /// Keeps `graph` listed among the open graphs without pushing it.
    pub fn adopt(&self, graph: GraphRef) {
        debug!(graph = %graph.name(), "adopted graph");
        self.adopted.write().push(graph);
    }
}

impl Host for Navigator {
    fn dimensions(&self) -> Vec<DimensionRef> {
        self.catalog.dimensions()
    }

    fn open_graphs(&self) -> Vec<GraphRef> {
        let mut graphs = self.adopted.read().clone();
        let stacked: Vec<GraphRef> = self
            .frames()
            .into_iter()
            .map(|(_, frame)| frame.graph)
            .collect();
        for graph in stacked {
            if graph.as_any().is::<NavigatorGraph>() {
                continue;
            }
            if !graphs
                .iter()
                .any(|known| std::ptr::addr_eq(Arc::as_ptr(known), Arc::as_ptr(&graph)))
            {
                graphs.push(graph);
            }
        }
        graphs
    }
}

#[cfg(test)]
#[path = "tests/stack_tests.rs"]
mod tests;
