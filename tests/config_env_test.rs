use dirwatch::Settings;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_env_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    fs::write(
        &config_path,
        r#"
[watcher]
poll_timeout_ms = 10
event_batch = 8

[logging]
default = "info"
"#,
    )
    .unwrap();

    unsafe {
        env::set_var("DIRWATCH_WATCHER__POLL_TIMEOUT_MS", "75");
        env::set_var("DIRWATCH_LOGGING__DEFAULT", "debug");
    }

    let settings = Settings::load_from(&config_path).unwrap();

    unsafe {
        env::remove_var("DIRWATCH_WATCHER__POLL_TIMEOUT_MS");
        env::remove_var("DIRWATCH_LOGGING__DEFAULT");
    }

    // Env wins over the file, file wins over defaults
    assert_eq!(settings.watcher.poll_timeout_ms, 75);
    assert_eq!(settings.watcher.event_batch, 8);
    assert_eq!(settings.watcher.tick_interval_ms, 250);
    assert_eq!(settings.logging.default, "debug");
}
