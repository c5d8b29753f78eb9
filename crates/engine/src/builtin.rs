//! Commands every session starts with, and their default chords.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io,
    sync::Arc,
};

use shared::{
    dimension::{dimension_node, DimensionRef},
    error::{GraphError, Result},
    protocol::{
        find_capable, require, stable_fingerprint, Capability, Graph, GraphRef, NodeRef, TextNode,
        Tunnel,
    },
};
use tracing::{debug, info};
use traversal::{
    break_cycles, paths_between, reachable, sort_nodes, topo_sort, transfer, transitive_reduction,
    Ball, Filtered, Inverted, SortKey,
};

use crate::{
    catalog::{CommandListGraph, NavigatorGraph},
    command::CommandContext,
    history::HistoryGraph,
    registry::{Command, CommandRegistry},
    session::Session,
    stack::{Modus, Navigator},
    views::Side,
};

const DEFAULT_CHORDS: &[(&str, &str)] = &[
    ("cursor up", "k"),
    ("cursor down", "j"),
    ("cursor left", "h"),
    ("cursor right", "l"),
    ("beginning", "g,g"),
    ("end", "G"),
    ("toggle selected", "space"),
    ("invert selection", "v"),
    ("deselect all", "V"),
    ("enter node", "enter"),
    ("back", "backspace"),
    ("home", "g,h"),
    ("all nodes", "g,a"),
    ("navigator", "g,n"),
    ("list commands", "g,c"),
    ("list errors", "g,e"),
    ("history", "g,H"),
    ("create node", "c,n"),
    ("create outgoing node", "c,o"),
    ("create incoming node", "c,i"),
    ("create typed node", "c,t"),
    ("rename node", "c,r"),
    ("delete nodes", "d,d"),
    ("start new edge", "e,n"),
    ("delete edge", "e,d"),
    ("edge move", "e,m"),
    ("node swap", "e,s"),
    ("execute", "e,x"),
    ("invert graph", "i"),
    ("regex filter graph", "/"),
    ("set dimension", "D"),
    ("topo sort", "s,t"),
    ("string sort", "s,s"),
    ("degree sort", "s,d"),
    ("sparse path", "s,p"),
    ("tree view", "T"),
    ("list view", "L"),
    ("next branch", "b,n"),
    ("next parent", "b,p"),
    ("leave node", "u"),
    ("transitive reduce", "t,r"),
    ("break cycles", "t,b"),
    ("reachable transfer", "t,t"),
    ("remove from-to", "t,p"),
    ("transfer", "t,n"),
    ("ball", "B"),
    ("write graph", "w"),
    ("open from reader", "o"),
    ("open nodes", "O"),
];

pub fn default_bindings() -> BTreeMap<String, String> {
    DEFAULT_CHORDS
        .iter()
        .map(|(command, chord)| (command.to_string(), chord.to_string()))
        .collect()
}

pub fn register_builtins(registry: &mut CommandRegistry) -> Result<()> {
    for command in builtins() {
        registry.register(command)?;
    }
    Ok(())
}

fn builtins() -> Vec<Command> {
    vec![
        Command::control("cursor up", "move the cursor up", |s| {
            s.navigator.with_top(|frame| frame.move_cursor(-1));
            Ok(())
        }),
        Command::control("cursor down", "move the cursor down", |s| {
            s.navigator.with_top(|frame| frame.move_cursor(1));
            Ok(())
        }),
        Command::control("cursor left", "focus the panel to the left", |s| {
            s.navigator
                .with_top(|frame| frame.set_focus(frame.focus().left()));
            Ok(())
        }),
        Command::control("cursor right", "focus the panel to the right", |s| {
            s.navigator
                .with_top(|frame| frame.set_focus(frame.focus().right()));
            Ok(())
        }),
        Command::control("beginning", "jump to the first item", |s| {
            s.navigator.with_top(|frame| frame.set_cursor(0));
            Ok(())
        }),
        Command::control("end", "jump to the last item", |s| {
            s.navigator.with_top(|frame| frame.set_cursor(usize::MAX));
            Ok(())
        }),
        Command::control("toggle selected", "", |s| {
            s.navigator.with_top(|frame| frame.toggle_selected());
            Ok(())
        }),
        Command::control("invert selection", "", |s| {
            s.navigator.with_top(|frame| frame.invert_selection());
            Ok(())
        }),
        Command::control("deselect all", "", |s| {
            s.navigator.with_top(|frame| frame.deselect_all());
            Ok(())
        }),
        Command::control(
            "enter node",
            "open the graph or dimension under the cursor, or list its children",
            enter_node,
        ),
        Command::control("leave node", "list the incoming nodes of the cursor node", leave_node),
        Command::control("back", "leave the current graph", |s| {
            s.navigator.pop();
            Ok(())
        }),
        Command::control("home", "list the home nodes", |s| s.navigator.refresh()),
        Command::control("all nodes", "list every node of the graph", |s| {
            let graph = s.navigator.current_graph()?;
            let all =
                require(graph.as_node_all(), Capability::NodeAll, graph.as_ref())?.node_all()?;
            s.navigator.set_items(all);
            Ok(())
        }),
        Command::control("navigator", "open the navigator", |s| {
            s.navigator.push(Arc::new(NavigatorGraph::new()))?;
            Ok(())
        }),
        Command::control("list commands", "", |s| {
            let list = CommandListGraph::new(&s.registry, &s.bindings, s.queue.clone());
            s.navigator.push(Arc::new(list))?;
            Ok(())
        }),
        Command::control("list errors", "", |s| {
            s.navigator.push(s.errors.clone())?;
            Ok(())
        }),
        Command::control("history", "browse earlier stack shapes", |s| {
            s.navigator.push(Arc::new(HistoryGraph::capture(&s.navigator)))?;
            Ok(())
        }),
        Command::task("create node", "", create_node),
        Command::task("create outgoing node", "", |ctx| create_linked(ctx, true)),
        Command::task("create incoming node", "", |ctx| create_linked(ctx, false)),
        Command::task("create typed node", "create a node of a chosen type", create_typed),
        Command::task("rename node", "", rename_node),
        Command::control("delete nodes", "delete the selected nodes", |s| {
            let graph = capable(&s.navigator.current_graph()?, Capability::NodeDelete)?;
            let delete = require(graph.as_node_delete(), Capability::NodeDelete, graph.as_ref())?;
            for node in s.navigator.targets() {
                delete.node_delete(&node)?;
            }
            s.navigator.refresh()
        }),
        Command::task("start new edge", "link the cursor node to another node", |ctx| {
            let (graph, from) = focused(ctx.session())?;
            let graph = capable(&graph, Capability::EdgeCreate)?;
            let to = ctx.node("edge target")?;
            ctx.nav().write()?;
            require(graph.as_edge_create(), Capability::EdgeCreate, graph.as_ref())?
                .edge_create(&from, &to)?;
            ctx.session().navigator.refresh()
        }),
        Command::task("delete edge", "", |ctx| {
            let (graph, from) = focused(ctx.session())?;
            let graph = capable(&graph, Capability::EdgeDelete)?;
            let to = ctx.node("edge target to unlink")?;
            ctx.nav().write()?;
            require(graph.as_edge_delete(), Capability::EdgeDelete, graph.as_ref())?
                .edge_delete(&from, &to)?;
            ctx.session().navigator.refresh()
        }),
        Command::task("edge move", "move the cursor node to another parent", |ctx| {
            let (graph, moved) = focused(ctx.session())?;
            let graph = capable(&graph, Capability::EdgeMove)?;
            let from = ctx.node("current parent")?;
            let to = ctx.node("new parent")?;
            ctx.nav().write()?;
            require(graph.as_edge_move(), Capability::EdgeMove, graph.as_ref())?
                .edge_move(&moved, &from, &to)?;
            ctx.session().navigator.refresh()
        }),
        Command::control("node swap", "swap the two selected nodes", |s| {
            let graph = capable(&s.navigator.current_graph()?, Capability::NodeSwap)?;
            let swap = require(graph.as_node_swap(), Capability::NodeSwap, graph.as_ref())?;
            match s.navigator.targets().as_slice() {
                [a, b] => swap.node_swap(a, b)?,
                other => {
                    return Err(GraphError::InvalidInput(format!(
                        "select exactly two nodes to swap, not {}",
                        other.len()
                    )))
                }
            }
            s.navigator.refresh()
        }),
        Command::task("execute", "hand a node to the graph's executor", |ctx| {
            let graph = capable(&ctx.session().navigator.current_graph()?, Capability::Executor)?;
            let node = ctx.node("node to execute")?;
            ctx.nav().write()?;
            require(graph.as_executor(), Capability::Executor, graph.as_ref())?.execute(&node)
        }),
        Command::control("invert graph", "swap incoming and outgoing", |s| {
            let graph = s.navigator.current_graph()?;
            s.navigator.replace(Arc::new(Inverted::new(graph)))?;
            Ok(())
        }),
        Command::task("regex filter graph", "hide nodes not matching a pattern", regex_filter),
        Command::task("set dimension", "wrap the graph in a decorator", set_dimension),
        Command::control("topo sort", "", |s| {
            let graph = s.navigator.current_graph()?;
            s.navigator.set_items(topo_sort(graph.as_ref())?);
            Ok(())
        }),
        Command::control("string sort", "", |s| sort_current(s, SortKey::Fingerprint)),
        Command::control("degree sort", "", |s| sort_current(s, SortKey::Degree)),
        Command::control("sparse path", "list one path through the cursor node", |s| {
            s.navigator.set_modus(Modus::Sparse)
        }),
        Command::control("tree view", "list the cursor node among its siblings", |s| {
            s.navigator.set_modus(Modus::Tree)
        }),
        Command::control("list view", "go back to the plain listing", |s| {
            s.navigator.set_modus(Modus::List)
        }),
        Command::control("next branch", "follow the next child in the sparse path", |s| {
            s.navigator.next_branch(Side::Outgoing).map(|_| ())
        }),
        Command::control("next parent", "follow the next parent in the sparse path", |s| {
            s.navigator.next_branch(Side::Incoming).map(|_| ())
        }),
        Command::control("transitive reduce", "drop edges implied by two-step paths", |s| {
            let graph = s.navigator.current_graph()?;
            let removed = transitive_reduction(graph.as_ref())?;
            info!(graph = %graph.name(), removed, "transitive reduction");
            s.navigator.refresh()
        }),
        Command::task("break cycles", "copy the graph below the cursor without cycles", |ctx| {
            copy_into(ctx, |start, source, dest| break_cycles(start, source, dest).map(|_| ()))
        }),
        Command::task("reachable transfer", "copy everything reachable from the cursor", |ctx| {
            copy_into(ctx, |start, source, dest| reachable(start, source, dest).map(|_| ()))
        }),
        Command::task("remove from-to", "copy the paths between two nodes", remove_from_to),
        Command::task(
            "transfer",
            "copy the selected nodes into another graph",
            transfer_selection,
        ),
        Command::task("ball", "show the neighbourhood of the cursor node", |ctx| {
            let (graph, origin) = focused(ctx.session())?;
            let radius = ctx.number("ball radius")?;
            ctx.nav().write()?.push(Arc::new(Ball::new(origin, graph, radius)?))?;
            Ok(())
        }),
        Command::task("write graph", "write the graph into a node", write_graph),
        Command::task(
            "open from reader",
            "open the cursor node's content as a graph",
            open_from_reader,
        ),
        Command::task("open nodes", "open the selected nodes in a new graph", open_nodes),
    ]
}

/// The graph of the top frame and the node under its cursor.
fn focused(session: &Session) -> Result<(GraphRef, NodeRef)> {
    let graph = session.navigator.current_graph()?;
    let node = session.navigator.cursor_node().ok_or_else(|| {
        GraphError::NilInput(format!("no node under the cursor in '{}'", graph.name()))
    })?;
    Ok((graph, node))
}

/// The graph that carries out `capability` for `graph`: itself or the
/// first graph below its decorators that supports it.
fn capable(graph: &GraphRef, capability: Capability) -> Result<GraphRef> {
    find_capable(graph, capability).ok_or_else(|| GraphError::MissingCapability {
        capability,
        graph: graph.name(),
    })
}

fn refresh_onto(session: &Session, node: &NodeRef) -> Result<()> {
    session.navigator.refresh()?;
    let key = node.fingerprint();
    session.navigator.with_top(|frame| frame.seek(&key));
    Ok(())
}

fn enter_node(session: &Session) -> Result<()> {
    let (_, node) = focused(session)?;
    if let Some(graph) = node.as_graph() {
        session.navigator.push(graph)?;
        return Ok(());
    }
    if let Some(dimension) = node.as_dimension() {
        let graph = dimension.new_graph()?;
        session.navigator.adopt(graph.clone());
        session.navigator.push(graph)?;
        return Ok(());
    }
    let graph = session.navigator.current_graph()?;
    let children = match graph.as_directed() {
        Some(directed) => directed.outgoing(&node)?,
        None => Vec::new(),
    };
    if children.is_empty() {
        return Err(GraphError::InvalidInput(format!(
            "'{}' is not a graph or dimension and has no outgoing nodes",
            node.label()
        )));
    }
    session.navigator.with_top(|frame| {
        frame.set_items(children);
        frame.set_cursor(0);
    });
    session.navigator.relayout()
}

fn leave_node(session: &Session) -> Result<()> {
    let (graph, node) = focused(session)?;
    let directed = require(graph.as_directed(), Capability::Directed, graph.as_ref())?;
    let parents = directed.incoming(&node)?;
    if parents.is_empty() {
        return Err(GraphError::InvalidInput(format!(
            "'{}' has no incoming nodes",
            node.label()
        )));
    }
    session.navigator.with_top(|frame| {
        frame.set_items(parents);
        frame.set_cursor(0);
    });
    session.navigator.relayout()
}

fn sort_current(session: &Session, key: SortKey) -> Result<()> {
    let graph = session.navigator.current_graph()?;
    let items = session
        .navigator
        .frame(session.navigator.peek())
        .map(|frame| frame.items().to_vec())
        .unwrap_or_default();
    session.navigator.set_items(sort_nodes(graph.as_ref(), &items, key)?);
    Ok(())
}

fn create_node(ctx: &CommandContext) -> Result<()> {
    let graph = capable(&ctx.session().navigator.current_graph()?, Capability::NodeCreate)?;
    let create = require(graph.as_node_create(), Capability::NodeCreate, graph.as_ref())?;
    let label = ctx.input("label of the new node")?;
    ctx.nav().write()?;
    let node = create.node_create(&label)?;
    refresh_onto(ctx.session(), &node)
}

fn create_linked(ctx: &CommandContext, outgoing: bool) -> Result<()> {
    let (graph, anchor) = focused(ctx.session())?;
    let label = ctx.input("label of the new node")?;
    ctx.nav().write()?;
    let node = match (outgoing, graph.as_node_from_create(), graph.as_node_to_create()) {
        (true, Some(from_create), _) => from_create.node_from_create(&anchor, &label)?,
        (false, _, Some(to_create)) => to_create.node_to_create(&anchor, &label)?,
        _ => {
            let store = capable(&graph, Capability::NodeCreate)?;
            let node = require(store.as_node_create(), Capability::NodeCreate, store.as_ref())?
                .node_create(&label)?;
            let linker = capable(&graph, Capability::EdgeCreate)?;
            let link = require(linker.as_edge_create(), Capability::EdgeCreate, linker.as_ref())?;
            if outgoing {
                link.edge_create(&anchor, &node)?;
            } else {
                link.edge_create(&node, &anchor)?;
            }
            node
        }
    };
    refresh_onto(ctx.session(), &node)
}

fn create_typed(ctx: &CommandContext) -> Result<()> {
    let graph = capable(&ctx.session().navigator.current_graph()?, Capability::TypedCreate)?;
    let typed = require(graph.as_typed_create(), Capability::TypedCreate, graph.as_ref())?;
    let types = typed.types()?.into_iter().map(TextNode::node).collect();
    let label = ctx.input("label of the new node")?;
    let kind = ctx.choose("node type", types)?;
    ctx.nav().write()?;
    let node = typed.typed_create(&kind.label(), &label)?;
    refresh_onto(ctx.session(), &node)
}

fn rename_node(ctx: &CommandContext) -> Result<()> {
    let (graph, node) = focused(ctx.session())?;
    let graph = capable(&graph, Capability::NodeRename)?;
    let rename = require(graph.as_node_rename(), Capability::NodeRename, graph.as_ref())?;
    let name = ctx.input(&format!("new name for '{}'", node.label()))?;
    ctx.nav().write()?;
    let renamed = rename.node_rename(&node, &name)?;
    refresh_onto(ctx.session(), &renamed)
}

fn regex_filter(ctx: &CommandContext) -> Result<()> {
    let pattern = ctx.input("filter pattern")?;
    let navigator = ctx.nav().write()?;
    let graph = navigator.current_graph()?;
    let edited = navigator.edit_current::<Filtered, _>(|filtered| {
        filtered.set_pattern(&pattern)?;
        Ok(graph.clone())
    })?;
    if edited == Tunnel::DeadEnd {
        navigator.replace(Arc::new(Filtered::new(graph, &pattern)?))?;
    }
    Ok(())
}

fn dimension_nodes(session: &Session, keep: impl Fn(&DimensionRef) -> bool) -> Vec<NodeRef> {
    session
        .catalog
        .dimensions()
        .into_iter()
        .filter(|dimension| keep(dimension))
        .map(dimension_node)
        .collect()
}

fn chosen_dimension(
    ctx: &CommandContext,
    reason: &str,
    options: Vec<NodeRef>,
) -> Result<DimensionRef> {
    let picked = ctx.choose(reason, options)?;
    picked
        .as_dimension()
        .ok_or_else(|| GraphError::type_mismatch::<DimensionRef>())
}

fn set_dimension(ctx: &CommandContext) -> Result<()> {
    let graph = ctx.session().navigator.current_graph()?;
    let options = dimension_nodes(ctx.session(), |dimension| dimension.as_wrapper().is_some());
    let dimension = chosen_dimension(ctx, "decorator", options)?;
    let wrapper = dimension.as_wrapper().ok_or_else(|| {
        GraphError::InvalidInput(format!("'{}' cannot wrap graphs", dimension.name()))
    })?;
    let wrapped = wrapper.wrap(graph)?;
    ctx.nav().write()?.replace(wrapped)?;
    Ok(())
}

/// Waits for the user to open a destination graph other than `source` and
/// confirm, then returns it with write access to the navigator.
fn destination(ctx: &CommandContext, source: &GraphRef) -> Result<(Arc<Navigator>, GraphRef)> {
    ctx.pause("open the destination graph and confirm")?;
    let navigator = ctx.nav().write()?;
    let dest = navigator.current_graph()?;
    if std::ptr::addr_eq(Arc::as_ptr(source), Arc::as_ptr(&dest)) {
        return Err(GraphError::InvalidInput(
            "source and destination are the same graph".into(),
        ));
    }
    Ok((navigator.clone(), dest))
}

/// Runs `copy` from the cursor node of the current graph into whatever
/// graph is on top once the user confirms.
fn copy_into<F>(ctx: &CommandContext, copy: F) -> Result<()>
where
    F: FnOnce(&NodeRef, &dyn Graph, &dyn Graph) -> Result<()>,
{
    let (source, start) = focused(ctx.session())?;
    let (navigator, dest) = destination(ctx, &source)?;
    copy(&start, source.as_ref(), dest.as_ref())?;
    navigator.refresh()
}

fn transfer_selection(ctx: &CommandContext) -> Result<()> {
    let source = ctx.session().navigator.current_graph()?;
    let nodes = ctx.session().navigator.targets();
    if nodes.is_empty() {
        return Err(GraphError::NilInput("no nodes to transfer".into()));
    }
    let (navigator, dest) = destination(ctx, &source)?;
    let copied = transfer(&nodes, source.as_ref(), dest.as_ref())?;
    info!(from = %source.name(), into = %dest.name(), nodes = copied.len(), "transferred nodes");
    navigator.refresh()
}

fn remove_from_to(ctx: &CommandContext) -> Result<()> {
    let (source, from) = focused(ctx.session())?;
    let to = ctx.node("end of the paths")?;
    let paths = paths_between(source.as_ref(), &from, &to)?;
    debug!(paths = paths.len(), "collected paths");
    let (navigator, dest) = destination(ctx, &source)?;
    let create = require(dest.as_node_create(), Capability::NodeCreate, dest.as_ref())?;
    let link = require(dest.as_edge_create(), Capability::EdgeCreate, dest.as_ref())?;

    let mut copies: HashMap<String, NodeRef> = HashMap::new();
    let mut linked: HashSet<(String, String)> = HashSet::new();
    for path in &paths {
        let mut previous: Option<String> = None;
        for node in path {
            let key = stable_fingerprint(node)?;
            if !copies.contains_key(&key) {
                copies.insert(key.clone(), create.node_create(&node.label())?);
            }
            if let Some(parent) = previous.take() {
                if linked.insert((parent.clone(), key.clone())) {
                    if let (Some(a), Some(b)) = (copies.get(&parent), copies.get(&key)) {
                        link.edge_create(a, b)?;
                    }
                }
            }
            previous = Some(key);
        }
    }
    navigator.refresh()
}

fn write_graph(ctx: &CommandContext) -> Result<()> {
    let source = ctx.session().navigator.current_graph()?;
    let get_reader = require(source.as_get_reader(), Capability::GetReader, source.as_ref())?;
    let mut reader = get_reader.get_reader()?;
    ctx.pause("move the cursor to the node to write into and confirm")?;

    ctx.nav().write()?;
    let (dest, node) = focused(ctx.session())?;
    let node_write = require(dest.as_node_write(), Capability::NodeWrite, dest.as_ref())?;
    let mut writer = node_write.node_write(&node)?;
    let written = io::copy(&mut reader, &mut writer)?;
    writer.close()?;
    info!(from = %source.name(), into = %dest.name(), bytes = written, "wrote graph");

    let node = match dest.as_node_update() {
        Some(update) => update.node_update(&node)?,
        None => node,
    };
    refresh_onto(ctx.session(), &node)
}

fn open_from_reader(ctx: &CommandContext) -> Result<()> {
    let (graph, node) = focused(ctx.session())?;
    let node_read = require(graph.as_node_read(), Capability::NodeRead, graph.as_ref())?;
    let mut reader = node_read.node_read(&node)?;
    let options = dimension_nodes(ctx.session(), |dimension| dimension.as_open_reader().is_some());
    let dimension = chosen_dimension(ctx, "dimension to open with", options)?;
    let opener = dimension.as_open_reader().ok_or_else(|| {
        GraphError::InvalidInput(format!("'{}' cannot open readers", dimension.name()))
    })?;
    let opened = opener.open(&mut reader)?;

    let navigator = ctx.nav().write()?;
    navigator.adopt(opened.clone());
    navigator.push(opened)?;
    Ok(())
}

fn open_nodes(ctx: &CommandContext) -> Result<()> {
    let nodes = ctx.session().navigator.targets();
    if nodes.is_empty() {
        return Err(GraphError::NilInput("no nodes to open".into()));
    }
    let options = dimension_nodes(ctx.session(), |dimension| dimension.as_node_opener().is_some());
    let dimension = chosen_dimension(ctx, "dimension to open the nodes in", options)?;
    let opener = dimension.as_node_opener().ok_or_else(|| {
        GraphError::InvalidInput(format!("'{}' cannot open nodes", dimension.name()))
    })?;
    let opened = opener.node_open(&nodes)?;

    let navigator = ctx.nav().write()?;
    navigator.adopt(opened.clone());
    navigator.push(opened)?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/builtin_tests.rs"]
mod tests;
