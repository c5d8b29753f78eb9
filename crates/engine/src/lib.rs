//! Interactive core: key chords and their binding index, commands running as
//! suspendable tasks, the navigation stack and the controller tying them
//! together.

pub mod bindings;
pub mod builtin;
pub mod catalog;
pub mod command;
pub mod config;
pub mod controller;
pub mod history;
pub mod keys;
pub mod registry;
pub mod session;
pub mod stack;
pub mod views;

pub use bindings::{BindingIndex, BindingNode, Dispatch};
pub use builtin::{default_bindings, register_builtins};
pub use catalog::{ChooserGraph, CommandListGraph, ErrorLog, NavigatorGraph};
pub use command::{
    CallFrame, CallStack, CancelToken, CommandContext, CommandQueue, CommandTask, Input,
    InputRequest, NavigatorHandle, TaskId, TaskStatus,
};
pub use config::{load_settings, Settings};
pub use controller::{Controller, KeyOutcome};
pub use history::HistoryGraph;
pub use keys::{Chord, Key};
pub use registry::{Command, CommandKind, CommandRegistry};
pub use session::Session;
pub use stack::{Frame, FrameId, Modus, Navigator, Panel, WriteBack};
pub use views::{
    choose_path, panels, side_panels, sparse_view, tree_view, Panels, Positions, Side, SparseView,
    TreeView, PATH_LIMIT,
};
