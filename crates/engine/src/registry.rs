use std::{collections::BTreeMap, fmt, sync::Arc};

use shared::error::{GraphError, Result};

use crate::{command::CommandContext, session::Session};

pub type TaskBody = Arc<dyn Fn(&CommandContext) -> Result<()> + Send + Sync>;
pub type ControlAction = Arc<dyn Fn(&Session) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub enum CommandKind {
    /// Runs on its own thread and may pause for input.
    Task(TaskBody),
    /// Runs inline on the controller thread and never pauses.
    Control(ControlAction),
}

#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub kind: CommandKind,
}

impl Command {
    pub fn task<F>(name: impl Into<String>, description: impl Into<String>, body: F) -> Self
    where
        F: Fn(&CommandContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            kind: CommandKind::Task(Arc::new(body)),
        }
    }

    pub fn control<F>(name: impl Into<String>, description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Session) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            kind: CommandKind::Control(Arc::new(action)),
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self.kind, CommandKind::Task(_))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("task", &self.is_task())
            .finish()
    }
}

/// Commands by name. Built once at startup and shared read-only.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) -> Result<()> {
        if command.name.trim().is_empty() {
            return Err(GraphError::InvalidInput("command name must not be empty".into()));
        }
        if self.commands.contains_key(&command.name) {
            return Err(GraphError::InvalidInput(format!(
                "command '{}' is already registered",
                command.name
            )));
        }
        self.commands.insert(command.name.clone(), command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> + '_ {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
