use super::*;

use std::{sync::Arc, thread, time::Duration};

use shared::dimension::Catalog;
use storage::MemoryGraph;

use crate::registry::{Command, CommandRegistry};

const WAIT: Duration = Duration::from_secs(5);

fn standard() -> Controller {
    let session = Session::standard(Arc::new(Catalog::new()), 16).expect("session");
    Controller::new(session, WAIT)
}

fn key(token: &str) -> Key {
    Key::parse(token).expect("key")
}

fn press(controller: &mut Controller, tokens: &[&str]) -> Vec<KeyOutcome> {
    tokens.iter().map(|token| controller.handle_key(key(token))).collect()
}

fn cursor_label(controller: &Controller) -> Option<String> {
    controller.session().navigator.cursor_node().map(|node| node.label())
}

#[test]
fn chords_accumulate_until_resolved() {
    let mut c = standard();
    assert_eq!(c.handle_key(key("g")), KeyOutcome::Pending(7));
    assert_eq!(c.buffer().len(), 1);
    assert_eq!(c.handle_key(key("x")), KeyOutcome::Unbound);
    assert!(c.buffer().is_empty());

    assert_eq!(
        press(&mut c, &["g", "c"]).pop(),
        Some(KeyOutcome::Command {
            name: "list commands".into(),
            status: TaskStatus::Done,
        })
    );
    assert!(c.buffer().is_empty());
}

#[test]
fn single_keys_move_the_cursor() {
    let mut c = standard();
    assert_eq!(cursor_label(&c).as_deref(), Some("dimensions"));
    assert_eq!(
        c.handle_key(key("j")),
        KeyOutcome::Command {
            name: "cursor down".into(),
            status: TaskStatus::Done,
        }
    );
    assert_eq!(cursor_label(&c).as_deref(), Some("graphs"));
}

#[test]
fn text_requests_capture_keys() {
    let mut c = standard();
    let graph = Arc::new(MemoryGraph::new("m"));
    c.session().navigator.push(graph.clone()).expect("push");

    assert_eq!(
        press(&mut c, &["c", "n"]).pop(),
        Some(KeyOutcome::Command {
            name: "create node".into(),
            status: TaskStatus::Paused,
        })
    );
    assert_eq!(press(&mut c, &["a", "b", "backspace", "c"]), vec![KeyOutcome::Typed; 4]);
    assert_eq!(c.text(), "ac");
    // keys without text are ignored while typing
    assert_eq!(c.handle_key(key("up")), KeyOutcome::Ignored);

    assert_eq!(
        c.handle_key(key("enter")),
        KeyOutcome::Command {
            name: "create node".into(),
            status: TaskStatus::Done,
        }
    );
    assert_eq!(graph.find_by_label("ac").len(), 1);
    assert_eq!(cursor_label(&c).as_deref(), Some("ac"));
    assert!(c.waiting_for().is_none());
}

#[test]
fn escape_cancels_quietly() {
    let mut c = standard();
    c.session()
        .navigator
        .push(Arc::new(MemoryGraph::new("m")))
        .expect("push");
    press(&mut c, &["c", "n", "x"]);

    assert_eq!(
        c.handle_key(key("esc")),
        KeyOutcome::Command {
            name: "create node".into(),
            status: TaskStatus::Cancelled,
        }
    );
    assert!(c.waiting_for().is_none());
    assert!(c.text().is_empty());
    assert!(c.session().errors.is_empty());
}

#[test]
fn slow_tasks_time_out_and_are_logged() {
    let mut registry = CommandRegistry::new();
    registry
        .register(Command::task("slow", "", |ctx| {
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            Err(GraphError::Cancelled("stopped".into()))
        }))
        .expect("register");
    let session = Session::new(registry, Arc::new(Catalog::new()), 16).expect("session");
    let mut c = Controller::new(session, Duration::from_millis(50));

    assert_eq!(
        c.run("slow"),
        KeyOutcome::Command {
            name: "slow".into(),
            status: TaskStatus::TimedOut,
        }
    );
    let entries = c.session().errors.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].code, ErrorCode::Timeout);
}

#[test]
fn only_one_task_waits_at_a_time() {
    let mut c = standard();
    let graph = Arc::new(MemoryGraph::new("m"));
    graph.add_node("a");
    c.session().navigator.push(graph).expect("push");

    assert_eq!(
        c.run("create node"),
        KeyOutcome::Command {
            name: "create node".into(),
            status: TaskStatus::Paused,
        }
    );
    assert_eq!(
        c.run("rename node"),
        KeyOutcome::Command {
            name: "rename node".into(),
            status: TaskStatus::Failed,
        }
    );
    assert_eq!(c.session().errors.entries()[0].code, ErrorCode::InvalidInput);
    assert!(matches!(c.waiting_for(), Some(InputRequest::Text { .. })));

    // control commands still run
    assert_eq!(
        c.run("end"),
        KeyOutcome::Command {
            name: "end".into(),
            status: TaskStatus::Done,
        }
    );
}

#[test]
fn failures_are_logged() {
    let mut c = standard();
    c.run("list errors");
    assert_eq!(
        c.run("all nodes"),
        KeyOutcome::Command {
            name: "all nodes".into(),
            status: TaskStatus::Failed,
        }
    );
    assert_eq!(
        c.run("no such command"),
        KeyOutcome::Command {
            name: "no such command".into(),
            status: TaskStatus::Failed,
        }
    );

    let codes: Vec<ErrorCode> = c
        .session()
        .errors
        .entries()
        .iter()
        .map(|entry| entry.code)
        .collect();
    assert_eq!(codes, vec![ErrorCode::MissingCapability, ErrorCode::NotFound]);
    // the log is live while it is on the stack
    c.run("home");
    assert_eq!(cursor_label(&c).map(|label| label.starts_with("1: ")), Some(true));
}

#[test]
fn panicking_control_commands_are_captured() {
    let mut registry = CommandRegistry::new();
    registry
        .register(Command::control("boom", "", |_| panic!("adapter blew up")))
        .expect("register");
    let session = Session::new(registry, Arc::new(Catalog::new()), 16).expect("session");
    let mut c = Controller::new(session, WAIT);

    assert_eq!(
        c.run("boom"),
        KeyOutcome::Command {
            name: "boom".into(),
            status: TaskStatus::Failed,
        }
    );
    let entries = c.session().errors.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].code, ErrorCode::Internal);
    assert!(entries[0].message.contains("adapter blew up"));
}
