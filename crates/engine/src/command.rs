//! Commands as suspendable tasks.
//!
//! A task body runs on its own thread. Whenever it needs input it hands an
//! [`InputRequest`] to the controller over a rendezvous channel and blocks
//! until the controller answers with an [`Input`]. The controller never
//! blocks longer than its timeout; a task that overruns it is cancelled, and
//! every later pause or navigator mutation in that task fails with
//! `Cancelled`.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{bounded, select, unbounded, Receiver, SendTimeoutError, Sender};
use parking_lot::Mutex;
use shared::{
    error::{ErrorCode, GraphError, Result},
    protocol::NodeRef,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    catalog::ChooserGraph,
    registry::{Command, CommandKind, ControlAction},
    session::Session,
    stack::{FrameId, Navigator},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Created,
    Running,
    Paused,
    Done,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

/// What a paused task is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRequest {
    /// Any confirmation; the task reads what it needs from the navigator.
    Resume { reason: String },
    Node { reason: String },
    Text { prompt: String },
    /// The chooser `frame` is on top of the stack.
    Choice { reason: String, frame: FrameId },
}

impl InputRequest {
    pub fn reason(&self) -> &str {
        match self {
            Self::Resume { reason } | Self::Node { reason } | Self::Choice { reason, .. } => {
                reason
            }
            Self::Text { prompt } => prompt,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Input {
    Proceed,
    Node(NodeRef),
    Text(String),
}

enum Signal {
    Paused(InputRequest),
    Done(Result<()>),
}

/// Shared cancellation flag. Cancelling drops the only sender of an internal
/// channel, which wakes every thread blocked in a `select!` on it.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(trigger))),
            signal,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.trigger.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub task: TaskId,
    pub command: String,
}

/// Commands currently executing, outermost first. Nested calls share the
/// task id of the command that started them.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Arc<Mutex<Vec<CallFrame>>>,
}

impl CallStack {
    pub fn push(&self, frame: CallFrame) {
        self.frames.lock().push(frame);
    }

    /// Removes every frame belonging to `task`.
    pub fn remove_task(&self, task: TaskId) -> usize {
        let mut frames = self.frames.lock();
        let before = frames.len();
        frames.retain(|frame| frame.task != task);
        before - frames.len()
    }

    pub fn frames(&self) -> Vec<CallFrame> {
        self.frames.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

/// Commands handed over by executed nodes, run by the controller once no
/// task is waiting for input.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    sender: Sender<String>,
    receiver: Receiver<String>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, command: &str) {
        // both ends live in self, so the channel cannot be disconnected
        let _ = self.sender.send(command.to_string());
    }

    pub fn pop(&self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Controller-side record of one running command.
pub struct CommandTask {
    id: TaskId,
    command: String,
    status: TaskStatus,
    request: Option<InputRequest>,
    error: Option<GraphError>,
    /// Chooser frame pushed by the task and not yet popped by it.
    chooser: Option<FrameId>,
    navigator: Arc<Navigator>,
    signals: Receiver<Signal>,
    inputs: Sender<Input>,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl CommandTask {
    pub fn spawn(session: &Session, command: &Command) -> Result<Self> {
        let CommandKind::Task(body) = &command.kind else {
            return Err(GraphError::InvalidInput(format!(
                "'{}' runs inline and cannot be spawned",
                command.name
            )));
        };
        let id = TaskId::new();
        let (signal_tx, signal_rx) = bounded(0);
        let (input_tx, input_rx) = bounded(0);
        let cancel = CancelToken::new();
        let context = CommandContext {
            task: id,
            session: session.clone(),
            signals: signal_tx.clone(),
            inputs: input_rx,
            cancel: cancel.clone(),
        };

        let body = body.clone();
        let name = command.name.clone();
        let calls = session.calls.clone();
        let token = cancel.clone();
        calls.push(CallFrame {
            task: id,
            command: name.clone(),
        });

        let spawned = thread::Builder::new()
            .name(format!("command {name}"))
            .spawn(move || {
                info!(command = %name, task = %id, "command started");
                let result = catch_panic(&name, || body(&context));
                calls.remove_task(id);
                match &result {
                    Ok(()) => info!(command = %name, task = %id, "command finished"),
                    Err(err) => warn!(command = %name, task = %id, error = %err, "command failed"),
                }
                drop(context);
                select! {
                    send(signal_tx, Signal::Done(result)) -> _ => {}
                    recv(token.signal) -> _ => {}
                }
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                session.calls.remove_task(id);
                return Err(err.into());
            }
        };

        Ok(Self {
            id,
            command: command.name.clone(),
            status: TaskStatus::Running,
            request: None,
            error: None,
            chooser: None,
            navigator: session.navigator.clone(),
            signals: signal_rx,
            inputs: input_tx,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn request(&self) -> Option<&InputRequest> {
        self.request.as_ref()
    }

    pub fn error(&self) -> Option<&GraphError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<GraphError> {
        self.error.take()
    }

    /// Blocks until the task pauses or finishes, or `timeout` passes. On
    /// timeout the task is cancelled.
    pub fn wait(&mut self, timeout: Duration) -> TaskStatus {
        if self.status.is_finished() || self.status == TaskStatus::Paused {
            return self.status;
        }
        select! {
            recv(self.signals) -> signal => self.settle(signal.ok()),
            default(timeout) => self.time_out(timeout),
        }
        self.status
    }

    /// Answers the pending request, then waits like [`CommandTask::wait`].
    pub fn resume(&mut self, input: Input, timeout: Duration) -> Result<TaskStatus> {
        if self.status != TaskStatus::Paused {
            return Err(GraphError::InvalidInput(format!(
                "command '{}' is not waiting for input",
                self.command
            )));
        }
        self.request = None;
        self.status = TaskStatus::Running;
        match self.inputs.send_timeout(input, timeout) {
            Ok(()) | Err(SendTimeoutError::Disconnected(_)) => Ok(self.wait(timeout)),
            Err(SendTimeoutError::Timeout(_)) => {
                self.time_out(timeout);
                Ok(self.status)
            }
        }
    }

    pub fn cancel(&mut self) {
        if self.status.is_finished() {
            return;
        }
        self.cancel.cancel();
        self.drop_chooser();
        self.request = None;
        self.status = TaskStatus::Cancelled;
        self.error = Some(GraphError::Cancelled(format!(
            "command '{}' was cancelled",
            self.command
        )));
        debug!(command = %self.command, task = %self.id, "command cancelled");
    }

    fn settle(&mut self, signal: Option<Signal>) {
        match signal {
            Some(Signal::Paused(request)) => {
                debug!(
                    command = %self.command,
                    task = %self.id,
                    reason = request.reason(),
                    "command paused"
                );
                self.chooser = match &request {
                    InputRequest::Choice { frame, .. } => Some(*frame),
                    _ => None,
                };
                self.status = TaskStatus::Paused;
                self.request = Some(request);
            }
            Some(Signal::Done(Ok(()))) => self.status = TaskStatus::Done,
            Some(Signal::Done(Err(err))) => {
                self.status = if err.code() == ErrorCode::Cancelled {
                    TaskStatus::Cancelled
                } else {
                    TaskStatus::Failed
                };
                self.error = Some(err);
            }
            None => {
                self.status = TaskStatus::Failed;
                self.error = Some(GraphError::Internal(format!(
                    "command '{}' exited without reporting",
                    self.command
                )));
            }
        }
        if self.status.is_finished() {
            self.chooser = None;
            self.join();
        }
    }

    /// A cancelled task leaves its chooser to the controller side.
    fn drop_chooser(&mut self) {
        if let Some(frame) = self.chooser.take() {
            if self.navigator.pop_frame(frame) {
                debug!(command = %self.command, task = %self.id, "dropped chooser");
            }
        }
    }

    fn time_out(&mut self, timeout: Duration) {
        warn!(command = %self.command, task = %self.id, ?timeout, "command timed out; cancelling");
        self.cancel.cancel();
        self.drop_chooser();
        self.request = None;
        self.status = TaskStatus::TimedOut;
        self.error = Some(GraphError::Timeout(timeout));
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(
                    command = %self.command,
                    task = %self.id,
                    "command thread panicked after reporting"
                );
            }
        }
    }
}

/// Runs `run`, turning a panic into an `Internal` error naming `command`.
fn catch_panic(command: &str, run: impl FnOnce() -> Result<()>) -> Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(result) => result,
        Err(payload) => Err(GraphError::Internal(format!(
            "command '{command}' panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Runs a control action inline. A panic is returned as an error.
pub fn run_control(command: &str, action: &ControlAction, session: &Session) -> Result<()> {
    catch_panic(command, || action(session))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Navigator access for a task. Reads are always allowed; mutation is
/// refused once the task has been cancelled.
pub struct NavigatorHandle<'a> {
    navigator: &'a Arc<Navigator>,
    cancel: &'a CancelToken,
}

impl<'a> NavigatorHandle<'a> {
    pub fn read(&self) -> &'a Arc<Navigator> {
        self.navigator
    }

    pub fn write(&self) -> Result<&'a Arc<Navigator>> {
        if self.cancel.is_cancelled() {
            return Err(GraphError::Cancelled(
                "a cancelled command may not change the navigator".into(),
            ));
        }
        Ok(self.navigator)
    }
}

/// Task-side handle passed to a command body.
pub struct CommandContext {
    task: TaskId,
    session: Session,
    signals: Sender<Signal>,
    inputs: Receiver<Input>,
    cancel: CancelToken,
}

impl CommandContext {
    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn nav(&self) -> NavigatorHandle<'_> {
        NavigatorHandle {
            navigator: &self.session.navigator,
            cancel: &self.cancel,
        }
    }

    fn cancelled(&self) -> GraphError {
        GraphError::Cancelled(format!("task {} was cancelled", self.task))
    }

    /// Hands `request` to the controller and blocks for the answer.
    pub fn request(&self, request: InputRequest) -> Result<Input> {
        if self.is_cancelled() {
            return Err(self.cancelled());
        }
        debug!(task = %self.task, reason = request.reason(), "pausing");
        select! {
            send(self.signals, Signal::Paused(request)) -> sent => {
                if sent.is_err() {
                    return Err(GraphError::Cancelled("controller stopped listening".into()));
                }
            }
            recv(self.cancel.signal) -> _ => return Err(self.cancelled()),
        }
        select! {
            recv(self.inputs) -> input => {
                input.map_err(|_| GraphError::Cancelled("controller dropped the command".into()))
            }
            recv(self.cancel.signal) -> _ => Err(self.cancelled()),
        }
    }

    pub fn pause(&self, reason: &str) -> Result<()> {
        self.request(InputRequest::Resume {
            reason: reason.to_string(),
        })
        .map(|_| ())
    }

    pub fn node(&self, reason: &str) -> Result<NodeRef> {
        match self.request(InputRequest::Node {
            reason: reason.to_string(),
        })? {
            Input::Node(node) => Ok(node),
            other => Err(GraphError::InvalidInput(format!(
                "expected a node for '{reason}', got {other:?}"
            ))),
        }
    }

    pub fn input(&self, prompt: &str) -> Result<String> {
        match self.request(InputRequest::Text {
            prompt: prompt.to_string(),
        })? {
            Input::Text(text) => Ok(text),
            other => Err(GraphError::InvalidInput(format!(
                "expected text for '{prompt}', got {other:?}"
            ))),
        }
    }

    pub fn number(&self, prompt: &str) -> Result<u32> {
        let text = self.input(prompt)?;
        text.trim()
            .parse()
            .map_err(|_| GraphError::InvalidInput(format!("'{text}' is not a number")))
    }

    /// Pushes a chooser over `options`, pauses, and returns the node under
    /// the cursor once resumed. The chooser frame is popped afterwards, by
    /// the task or, once it is cancelled, by its [`CommandTask`].
    pub fn choose(&self, reason: &str, options: Vec<NodeRef>) -> Result<NodeRef> {
        if options.is_empty() {
            return Err(GraphError::NilInput(format!("nothing to choose for '{reason}'")));
        }
        let navigator = self.nav().write()?;
        let frame = navigator.push(Arc::new(ChooserGraph::new(reason, options)))?;
        let answer = self.request(InputRequest::Choice {
            reason: reason.to_string(),
            frame,
        });
        let picked = match answer {
            Ok(Input::Node(node)) => Ok(node),
            Ok(_) if navigator.peek() == frame => navigator
                .cursor_node()
                .ok_or_else(|| GraphError::NilInput("the chooser is empty".into())),
            Ok(_) => Err(GraphError::InvalidInput(
                "the chooser is no longer on top of the stack".into(),
            )),
            Err(err) => Err(err),
        };
        if !self.is_cancelled() {
            navigator.pop_frame(frame);
        }
        picked
    }

    /// Runs another registered command inline under this task.
    pub fn call(&self, name: &str) -> Result<()> {
        let command = self
            .session
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(format!("command '{name}'")))?;
        self.session.calls.push(CallFrame {
            task: self.task,
            command: name.to_string(),
        });
        debug!(task = %self.task, command = %name, "nested call");
        match &command.kind {
            CommandKind::Task(body) => body(self),
            CommandKind::Control(action) => {
                self.nav().write()?;
                run_control(name, action, &self.session)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/command_tests.rs"]
mod tests;
