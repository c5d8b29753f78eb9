use std::sync::Arc;

use shared::{
    dimension::Catalog,
    error::{GraphError, Result},
    protocol::GraphRef,
};

use crate::{
    bindings::BindingIndex,
    builtin::{default_bindings, register_builtins},
    catalog::{ErrorLog, NavigatorGraph},
    command::{CallStack, CommandQueue},
    registry::{Command, CommandRegistry},
    stack::Navigator,
};

/// Everything a command can reach. Cheap to clone; all parts are shared.
#[derive(Clone)]
pub struct Session {
    pub navigator: Arc<Navigator>,
    pub registry: Arc<CommandRegistry>,
    pub bindings: Arc<BindingIndex>,
    pub catalog: Arc<Catalog>,
    pub errors: Arc<ErrorLog>,
    pub calls: CallStack,
    pub queue: CommandQueue,
}

impl Session {
    /// Builds a session whose base frame is the navigator graph. Every
    /// registered command gets an unbound leaf in the binding index.
    pub fn new(
        registry: CommandRegistry,
        catalog: Arc<Catalog>,
        history_limit: usize,
    ) -> Result<Self> {
        let registry = Arc::new(registry);
        let bindings = Arc::new(BindingIndex::new(registry.names()));
        let root: GraphRef = Arc::new(NavigatorGraph::new());
        let navigator = Navigator::new(root, catalog.clone(), history_limit)?;
        navigator.adopt(bindings.clone());
        Ok(Self {
            navigator,
            registry,
            bindings,
            catalog,
            errors: Arc::new(ErrorLog::new()),
            calls: CallStack::default(),
            queue: CommandQueue::new(),
        })
    }

    /// A session with every built-in command bound to its default chord.
    pub fn standard(catalog: Arc<Catalog>, history_limit: usize) -> Result<Self> {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry)?;
        let session = Self::new(registry, catalog, history_limit)?;
        session.bindings.apply(&default_bindings())?;
        Ok(session)
    }

    pub fn command(&self, name: &str) -> Result<&Command> {
        self.registry
            .get(name)
            .ok_or_else(|| GraphError::NotFound(format!("command '{name}'")))
    }
}
