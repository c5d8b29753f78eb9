use std::{
    fs,
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use engine::{load_settings, Controller, Key, Session, Settings};
use shared::dimension::Catalog;
use storage::{LinesDimension, MemoryDimension};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use traversal::InvertedDimension;

mod render;

/// Reads key tokens from stdin, one or more per line, and prints the top
/// frame after each line. `quit` ends the session.
#[derive(Parser, Debug)]
struct Cli {
    /// TOML settings file; `APP__*` variables override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON map of command names to chords.
    #[arg(long)]
    bindings: Option<PathBuf>,
    /// Open every snapshot in this directory at startup.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Print the chord of every bound command and exit.
    #[arg(long)]
    list_bindings: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.bindings {
            settings.bindings_path = Some(path.clone());
        }
        if let Some(dir) = &self.snapshot_dir {
            settings.snapshot_dir = Some(dir.clone());
        }
        if let Some(ms) = self.timeout_ms {
            settings.command_timeout_ms = ms;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    cli.apply(&mut settings);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .with_writer(io::stderr)
        .init();

    let session = build_session(&settings)?;
    if cli.list_bindings {
        for (command, chord) in session.bindings.to_map() {
            println!("{chord}\t{command}");
        }
        return Ok(());
    }

    let mut controller = Controller::new(session, settings.command_timeout());
    let mut out = io::stdout().lock();
    render::frame(&mut out, &controller)?;

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read keys from stdin")?;
        for token in line.split_whitespace() {
            if token == "quit" {
                return Ok(());
            }
            let key = match Key::parse(token) {
                Ok(key) => key,
                Err(err) => {
                    warn!(token, %err, "skipping key");
                    continue;
                }
            };
            let outcome = controller.handle_key(key);
            render::outcome(&mut out, &controller, &outcome)?;
        }
        render::frame(&mut out, &controller)?;
    }
    Ok(())
}

fn build_session(settings: &Settings) -> Result<Session> {
    let catalog = Arc::new(Catalog::new());
    catalog.register(Arc::new(MemoryDimension::new()))?;
    catalog.register(Arc::new(LinesDimension::new()))?;
    catalog.register(Arc::new(InvertedDimension))?;

    let session = Session::standard(catalog.clone(), settings.history_limit)?;

    if let Some(path) = &settings.bindings_path {
        let mut file = fs::File::open(path)
            .with_context(|| format!("failed to open bindings file '{}'", path.display()))?;
        let applied = session
            .bindings
            .load(&mut file)
            .with_context(|| format!("failed to load bindings from '{}'", path.display()))?;
        info!(path = %path.display(), applied, "loaded key bindings");
    }

    if let Some(dir) = &settings.snapshot_dir {
        let load = catalog
            .open_snapshot_dir(dir)
            .with_context(|| format!("failed to scan snapshot dir '{}'", dir.display()))?;
        for (path, err) in &load.failures {
            warn!(path = %path.display(), %err, "snapshot not opened");
        }
        for (path, graph) in load.graphs {
            info!(path = %path.display(), graph = %graph.name(), "opened snapshot");
            session.navigator.adopt(graph);
        }
    }

    Ok(session)
}
