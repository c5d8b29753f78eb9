use std::io::{self, Write};

use engine::{side_panels, Controller, InputRequest, KeyOutcome, Modus, Panel, TaskStatus};
use shared::protocol::NodeRef;

fn joined(nodes: &[NodeRef]) -> String {
    nodes
        .iter()
        .map(|node| node.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prints the top frame: its items, the cursor node's neighbours, and any
/// pending input request.
pub fn frame(out: &mut impl Write, controller: &Controller) -> io::Result<()> {
    let navigator = &controller.session().navigator;
    let Some(frame) = navigator.frame(navigator.peek()) else {
        return Ok(());
    };
    let modus = match frame.modus() {
        Modus::List => "",
        Modus::Sparse => " sparse",
        Modus::Tree => " tree",
    };
    writeln!(
        out,
        "== {}{modus} [depth {}] ==",
        frame.graph().name(),
        navigator.depth()
    )?;
    for (index, node) in frame.items().iter().enumerate() {
        let cursor = if index == frame.cursor() { '>' } else { ' ' };
        let selected = if frame.is_selected(node) { '*' } else { ' ' };
        writeln!(out, "{cursor}{selected} {}", node.label())?;
    }

    if frame.cursor_node().is_some() {
        match side_panels(&frame) {
            Ok(sides) => {
                let mark = |panel: Panel| if frame.focus() == panel { "*" } else { " " };
                writeln!(out, "{}in:  {}", mark(Panel::Incoming), joined(&sides.incoming))?;
                writeln!(out, "{}out: {}", mark(Panel::Outgoing), joined(&sides.outgoing))?;
            }
            Err(err) => writeln!(out, "  ({err})")?,
        }
    }

    if !controller.buffer().is_empty() {
        writeln!(out, "keys: {}", controller.buffer())?;
    }
    match controller.waiting_for() {
        Some(InputRequest::Text { prompt }) => writeln!(out, "? {prompt}: {}", controller.text())?,
        Some(request) => {
            writeln!(out, "? {} (enter to confirm, esc to cancel)", request.reason())?
        }
        None => {}
    }
    out.flush()
}

/// Reports outcomes worth a line; successes stay quiet.
pub fn outcome(
    out: &mut impl Write,
    controller: &Controller,
    outcome: &KeyOutcome,
) -> io::Result<()> {
    match outcome {
        KeyOutcome::Unbound => writeln!(out, "unbound key"),
        KeyOutcome::Command { name, status } => match status {
            TaskStatus::Failed | TaskStatus::TimedOut => {
                let last = controller.session().errors.entries().pop();
                match last {
                    Some(report) => writeln!(out, "{name}: {report}"),
                    None => writeln!(out, "{name}: {status:?}"),
                }
            }
            TaskStatus::Cancelled => writeln!(out, "{name}: cancelled"),
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}
