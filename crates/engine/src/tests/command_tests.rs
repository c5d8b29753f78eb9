use super::*;

use std::thread;

use crossbeam_channel::unbounded;
use shared::{dimension::Catalog, protocol::TextNode};

use crate::registry::CommandRegistry;

const WAIT: Duration = Duration::from_secs(5);

fn session(commands: Vec<Command>) -> Session {
    let mut registry = CommandRegistry::new();
    for command in commands {
        registry.register(command).expect("register");
    }
    Session::new(registry, Arc::new(Catalog::new()), 16).expect("session")
}

fn spawn(session: &Session, name: &str) -> CommandTask {
    let command = session.command(name).expect("command").clone();
    CommandTask::spawn(session, &command).expect("spawn")
}

#[test]
fn inputs_arrive_in_request_order() {
    let (tx, rx) = unbounded();
    let session = session(vec![Command::task("ask", "", move |ctx| {
        let node = ctx.node("need node")?;
        let text = ctx.input("need text")?;
        tx.send((node.fingerprint(), text)).expect("send");
        Ok(())
    })]);

    let mut task = spawn(&session, "ask");
    assert_eq!(task.wait(WAIT), TaskStatus::Paused);
    assert_eq!(
        task.request(),
        Some(&InputRequest::Node {
            reason: "need node".into()
        })
    );

    let status = task.resume(Input::Node(TextNode::node("N")), WAIT).expect("resume");
    assert_eq!(status, TaskStatus::Paused);
    assert_eq!(task.request().map(InputRequest::reason), Some("need text"));

    let status = task.resume(Input::Text("foo".into()), WAIT).expect("resume");
    assert_eq!(status, TaskStatus::Done);
    assert_eq!(rx.recv_timeout(WAIT).expect("result"), ("N".to_string(), "foo".to_string()));
    assert!(session.calls.is_empty());
}

#[test]
fn timeout_cancels_and_blocks_navigator_writes() {
    let (tx, rx) = unbounded();
    let session = session(vec![Command::task("spin", "", move |ctx| {
        while !ctx.is_cancelled() {
            thread::sleep(Duration::from_millis(2));
        }
        let refused = ctx.nav().write().err().map(|err| err.code());
        tx.send(refused).expect("send");
        ctx.pause("never answered")
    })]);

    let mut task = spawn(&session, "spin");
    assert_eq!(task.wait(Duration::from_millis(20)), TaskStatus::TimedOut);
    assert_eq!(task.error().map(GraphError::code), Some(ErrorCode::Timeout));
    assert_eq!(rx.recv_timeout(WAIT).expect("report"), Some(ErrorCode::Cancelled));
}

#[test]
fn paused_task_wakes_with_cancelled_when_cancelled() {
    let (tx, rx) = unbounded();
    let session = session(vec![Command::task("wait", "", move |ctx| {
        let outcome = ctx.pause("confirm");
        tx.send(outcome.map_err(|err| err.code())).expect("send");
        Ok(())
    })]);

    let mut task = spawn(&session, "wait");
    assert_eq!(task.wait(WAIT), TaskStatus::Paused);
    task.cancel();
    assert_eq!(task.status(), TaskStatus::Cancelled);
    assert_eq!(rx.recv_timeout(WAIT).expect("outcome"), Err(ErrorCode::Cancelled));
}

#[test]
fn panics_are_captured_as_internal_errors() {
    let session = session(vec![Command::task("boom", "", |_| panic!("boom"))]);
    let mut task = spawn(&session, "boom");
    assert_eq!(task.wait(WAIT), TaskStatus::Failed);
    let err = task.take_error().expect("error");
    assert_eq!(err.code(), ErrorCode::Internal);
    assert!(err.to_string().contains("boom"));
    assert!(session.calls.is_empty());
}

#[test]
fn body_errors_fail_the_task() {
    let session = session(vec![Command::task("missing", "", |_| {
        Err(GraphError::NotFound("thing".into()))
    })]);
    let mut task = spawn(&session, "missing");
    assert_eq!(task.wait(WAIT), TaskStatus::Failed);
    assert_eq!(task.error().map(GraphError::code), Some(ErrorCode::NotFound));
}

#[test]
fn resume_requires_a_pause() {
    let session = session(vec![Command::task("quick", "", |_| Ok(()))]);
    let mut task = spawn(&session, "quick");
    assert_eq!(task.wait(WAIT), TaskStatus::Done);
    let err = task.resume(Input::Proceed, WAIT).expect_err("not paused");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}

#[test]
fn control_commands_are_not_spawned() {
    let session = session(vec![Command::control("inline", "", |_| Ok(()))]);
    let command = session.command("inline").expect("command").clone();
    let err = CommandTask::spawn(&session, &command).err().expect("refused");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}

#[test]
fn nested_calls_share_the_task_id() {
    let (tx, rx) = unbounded();
    let inner_tx = tx.clone();
    let session = session(vec![
        Command::task("outer", "", move |ctx| {
            tx.send(ctx.session().calls.frames()).expect("send");
            ctx.call("inner")
        }),
        Command::task("inner", "", move |ctx| {
            inner_tx.send(ctx.session().calls.frames()).expect("send");
            Ok(())
        }),
    ]);

    let mut task = spawn(&session, "outer");
    assert_eq!(task.wait(WAIT), TaskStatus::Done);

    let outer = rx.recv_timeout(WAIT).expect("outer frames");
    let inner = rx.recv_timeout(WAIT).expect("inner frames");
    assert_eq!(outer.len(), 1);
    assert_eq!(inner.len(), 2);
    assert!(inner.iter().all(|frame| frame.task == task.id()));
    assert_eq!(inner[1].command, "inner");
    assert!(session.calls.is_empty());
}

#[test]
fn choose_reads_the_cursor_of_the_chooser() {
    let (tx, rx) = unbounded();
    let session = session(vec![Command::task("pick", "", move |ctx| {
        let picked = ctx.choose("letter", vec![TextNode::node("a"), TextNode::node("b")])?;
        tx.send(picked.fingerprint()).expect("send");
        Ok(())
    })]);

    let mut task = spawn(&session, "pick");
    assert_eq!(task.wait(WAIT), TaskStatus::Paused);
    assert_eq!(session.navigator.depth(), 2);
    session.navigator.with_top(|frame| frame.move_cursor(1));

    assert_eq!(task.resume(Input::Proceed, WAIT).expect("resume"), TaskStatus::Done);
    assert_eq!(rx.recv_timeout(WAIT).expect("picked"), "b");
    assert_eq!(session.navigator.depth(), 1);
}

#[test]
fn choose_needs_options() {
    let (tx, rx) = unbounded();
    let session = session(vec![Command::task("pick", "", move |ctx| {
        tx.send(ctx.choose("nothing", Vec::new()).err().map(|err| err.code()))
            .expect("send");
        Ok(())
    })]);
    let mut task = spawn(&session, "pick");
    assert_eq!(task.wait(WAIT), TaskStatus::Done);
    assert_eq!(rx.recv_timeout(WAIT).expect("code"), Some(ErrorCode::NilInput));
}

#[test]
fn numbers_are_parsed_from_text() {
    let (tx, rx) = unbounded();
    let session = session(vec![Command::task("count", "", move |ctx| {
        tx.send(ctx.number("radius").map_err(|err| err.code())).expect("send");
        Ok(())
    })]);

    let mut task = spawn(&session, "count");
    assert_eq!(task.wait(WAIT), TaskStatus::Paused);
    task.resume(Input::Text(" 3 ".into()), WAIT).expect("resume");
    assert_eq!(rx.recv_timeout(WAIT).expect("number"), Ok(3));

    let mut task = spawn(&session, "count");
    assert_eq!(task.wait(WAIT), TaskStatus::Paused);
    task.resume(Input::Text("three".into()), WAIT).expect("resume");
    assert_eq!(rx.recv_timeout(WAIT).expect("number"), Err(ErrorCode::InvalidInput));
}

#[test]
fn cancelling_a_choice_drops_the_chooser() {
    let (tx, rx) = unbounded();
    let session = session(vec![Command::task("pick", "", move |ctx| {
        let outcome = ctx.choose("letter", vec![TextNode::node("a")]);
        tx.send(outcome.err().map(|err| err.code())).expect("send");
        Ok(())
    })]);

    let mut task = spawn(&session, "pick");
    assert_eq!(task.wait(WAIT), TaskStatus::Paused);
    assert!(matches!(task.request(), Some(InputRequest::Choice { .. })));
    assert_eq!(session.navigator.depth(), 2);

    task.cancel();
    assert_eq!(session.navigator.depth(), 1);
    assert_eq!(rx.recv_timeout(WAIT).expect("outcome"), Some(ErrorCode::Cancelled));
    assert_eq!(session.navigator.depth(), 1);
}
