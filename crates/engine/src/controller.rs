//! Turns key presses into command runs.
//!
//! Keys accumulate in a chord buffer until the binding index resolves them.
//! While a task is paused the controller answers its request: `enter`
//! resumes it, `esc` cancels it, and text requests capture typed keys.
//! Every other key still dispatches, so the user can move around before
//! answering.

use std::time::Duration;

use shared::error::{ErrorCode, GraphError};
use tracing::debug;

use crate::{
    bindings::Dispatch,
    command::{run_control, CommandTask, Input, InputRequest, TaskStatus},
    keys::{Chord, Key},
    registry::CommandKind,
    session::Session,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The buffer is a strict prefix of this many bindings.
    Pending(usize),
    /// Nothing is bound to the buffer; it was cleared.
    Unbound,
    /// A command ran or was resumed and is now in `status`.
    Command { name: String, status: TaskStatus },
    /// The key went into the text being entered.
    Typed,
    /// The key was not usable in the current state.
    Ignored,
}

pub struct Controller {
    session: Session,
    buffer: Chord,
    task: Option<CommandTask>,
    text: String,
    timeout: Duration,
}

impl Controller {
    pub fn new(session: Session, timeout: Duration) -> Self {
        Self {
            session,
            buffer: Chord::default(),
            task: None,
            text: String::new(),
            timeout,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn buffer(&self) -> &Chord {
        &self.buffer
    }

    /// What the paused task is waiting for, if any.
    pub fn waiting_for(&self) -> Option<&InputRequest> {
        self.task.as_ref().and_then(CommandTask::request)
    }

    /// Text typed so far for a text request.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn handle_key(&mut self, key: Key) -> KeyOutcome {
        let outcome = self.answer(key);
        self.run_queued(outcome)
    }

    fn answer(&mut self, key: Key) -> KeyOutcome {
        match self.waiting_for().cloned() {
            Some(InputRequest::Text { .. }) => self.handle_text(key),
            Some(request) if key.is("enter") => {
                let input = match request {
                    InputRequest::Node { .. } => match self.session.navigator.cursor_node() {
                        Some(node) => Input::Node(node),
                        None => {
                            self.session
                                .errors
                                .record(&GraphError::NilInput("no node under the cursor".into()));
                            return KeyOutcome::Ignored;
                        }
                    },
                    _ => Input::Proceed,
                };
                self.resume(input)
            }
            Some(_) if key.is("esc") => self.cancel(),
            _ => self.dispatch(key),
        }
    }

    fn handle_text(&mut self, key: Key) -> KeyOutcome {
        if key.is("enter") {
            let text = std::mem::take(&mut self.text);
            return self.resume(Input::Text(text));
        }
        if key.is("esc") {
            self.text.clear();
            return self.cancel();
        }
        if key.is("backspace") {
            self.text.pop();
            return KeyOutcome::Typed;
        }
        match key.text() {
            Some(c) => {
                self.text.push(c);
                KeyOutcome::Typed
            }
            None => KeyOutcome::Ignored,
        }
    }

    fn dispatch(&mut self, key: Key) -> KeyOutcome {
        self.buffer.push(key);
        match self.session.bindings.dispatch(&self.buffer) {
            Dispatch::Run(name) => {
                self.buffer.clear();
                self.run_one(&name)
            }
            Dispatch::Pending(count) => {
                debug!(buffer = %self.buffer, count, "chord pending");
                KeyOutcome::Pending(count)
            }
            Dispatch::Unbound => {
                debug!(buffer = %self.buffer, "chord unbound");
                self.buffer.clear();
                KeyOutcome::Unbound
            }
        }
    }

    /// Runs a registered command by name, then whatever it queued. Control
    /// commands run inline; a task is spawned and waited on, unless another
    /// task is still paused.
    pub fn run(&mut self, name: &str) -> KeyOutcome {
        let outcome = self.run_one(name);
        self.run_queued(outcome)
    }

    /// Runs queued commands in order until one pauses. The outcome is that
    /// of the last command run.
    fn run_queued(&mut self, mut outcome: KeyOutcome) -> KeyOutcome {
        while self.task.is_none() {
            let Some(name) = self.session.queue.pop() else {
                break;
            };
            debug!(command = %name, "running queued command");
            outcome = self.run_one(&name);
        }
        outcome
    }

    fn run_one(&mut self, name: &str) -> KeyOutcome {
        let command = match self.session.command(name) {
            Ok(command) => command.clone(),
            Err(err) => return self.failed(name, err),
        };
        match &command.kind {
            CommandKind::Control(action) => {
                let status = match run_control(&command.name, action, &self.session) {
                    Ok(()) => TaskStatus::Done,
                    Err(err) => {
                        self.session.errors.record(&err);
                        TaskStatus::Failed
                    }
                };
                KeyOutcome::Command {
                    name: command.name,
                    status,
                }
            }
            CommandKind::Task(_) => {
                if let Some(active) = &self.task {
                    let err = GraphError::InvalidInput(format!(
                        "'{}' is still waiting for input",
                        active.command()
                    ));
                    return self.failed(name, err);
                }
                match CommandTask::spawn(&self.session, &command) {
                    Ok(mut task) => {
                        task.wait(self.timeout);
                        self.settle(task)
                    }
                    Err(err) => self.failed(name, err),
                }
            }
        }
    }

    fn resume(&mut self, input: Input) -> KeyOutcome {
        let Some(mut task) = self.task.take() else {
            return KeyOutcome::Ignored;
        };
        if let Err(err) = task.resume(input, self.timeout) {
            self.session.errors.record(&err);
        }
        self.settle(task)
    }

    fn cancel(&mut self) -> KeyOutcome {
        let Some(mut task) = self.task.take() else {
            return KeyOutcome::Ignored;
        };
        task.cancel();
        KeyOutcome::Command {
            name: task.command().to_string(),
            status: task.status(),
        }
    }

    /// Keeps a paused task; records the error of a finished one.
    fn settle(&mut self, mut task: CommandTask) -> KeyOutcome {
        let status = task.status();
        let name = task.command().to_string();
        if status == TaskStatus::Paused {
            self.text.clear();
            self.task = Some(task);
        } else if let Some(err) = task.take_error() {
            if err.code() != ErrorCode::Cancelled || status == TaskStatus::TimedOut {
                self.session.errors.record(&err);
            }
        }
        KeyOutcome::Command { name, status }
    }

    fn failed(&mut self, name: &str, err: GraphError) -> KeyOutcome {
        self.session.errors.record(&err);
        KeyOutcome::Command {
            name: name.to_string(),
            status: TaskStatus::Failed,
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
