use super::*;

use std::collections::HashMap;

#[test]
fn partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("walker.toml");
    fs::write(&path, "command_timeout_ms = 250\nsnapshot_dir = \"snaps\"\n").expect("write");

    let settings = load_settings(Some(&path)).expect("load");
    assert_eq!(settings.command_timeout(), Duration::from_millis(250));
    assert_eq!(settings.snapshot_dir, Some(PathBuf::from("snaps")));
    assert_eq!(settings.history_limit, 256);
}

#[test]
fn env_overrides_file_values() {
    let mut settings = Settings {
        command_timeout_ms: 250,
        ..Settings::default()
    };
    let env = HashMap::from([
        ("APP__COMMAND_TIMEOUT_MS", "40"),
        ("APP__LOG_FILTER", "engine=debug"),
    ]);
    apply_overrides(&mut settings, |key| env.get(key).map(|v| v.to_string())).expect("apply");

    assert_eq!(settings.command_timeout_ms, 40);
    assert_eq!(settings.log_filter, "engine=debug");
    assert_eq!(settings.bindings_path, None);
}

#[test]
fn bad_numbers_are_reported() {
    let mut settings = Settings::default();
    let err = apply_overrides(&mut settings, |key| {
        (key == "APP__HISTORY_LIMIT").then(|| "lots".to_string())
    })
    .expect_err("not a number");
    assert!(err.to_string().contains("APP__HISTORY_LIMIT"));
}

#[test]
fn missing_file_names_the_path() {
    let err = load_settings(Some(Path::new("/nonexistent/walker.toml"))).expect_err("missing");
    assert!(format!("{err:#}").contains("/nonexistent/walker.toml"));
}
