use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// JSON file mapping command names to chords.
    pub bindings_path: Option<PathBuf>,
    /// Directory whose files are opened by matching dimension names.
    pub snapshot_dir: Option<PathBuf>,
    pub command_timeout_ms: u64,
    pub history_limit: usize,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bindings_path: None,
            snapshot_dir: None,
            command_timeout_ms: 1000,
            history_limit: 256,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Defaults, then the optional TOML file, then `APP__*` environment
/// variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
            toml::from_str::<Settings>(&raw)
                .with_context(|| format!("failed to parse settings file '{}'", path.display()))?
        }
        None => Settings::default(),
    };
    apply_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub(crate) fn apply_overrides<F>(settings: &mut Settings, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("APP__BINDINGS_PATH") {
        settings.bindings_path = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("APP__SNAPSHOT_DIR") {
        settings.snapshot_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("APP__COMMAND_TIMEOUT_MS") {
        settings.command_timeout_ms = v
            .parse()
            .with_context(|| format!("APP__COMMAND_TIMEOUT_MS is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("APP__HISTORY_LIMIT") {
        settings.history_limit = v
            .parse()
            .with_context(|| format!("APP__HISTORY_LIMIT is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
