use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_path = config_dir.join("readnest.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[db]
path = "{}"

[fallback]
dir = "{}"

[server]
bind = "127.0.0.1:0"

[logging]
filter = "warn"
"#,
            root.join("data").join("readnest.sqlite").display(),
            root.join("data").join("fallback").display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run_readnest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_readnest"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run readnest");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, success) = run_readnest(&config, &["init"]);
    assert!(success);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("readnest.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    assert!(run_readnest(&config, &["init"]).2);
    let (_, stderr, success) = run_readnest(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_check_reports_stores() {
    let (_tmp, config) = setup_test_env();
    run_readnest(&config, &["init"]);

    let (stdout, stderr, success) = run_readnest(&config, &["check"]);
    assert!(success, "check failed: {}", stderr);
    assert!(stdout.contains("primary"));
    assert!(stdout.contains("OK"));
    for collection in ["journals", "feed_subscriptions", "articles", "documents"] {
        assert!(stdout.contains(collection), "missing {collection} in {stdout}");
    }
}

#[test]
fn test_check_flags_corrupt_fallback_file() {
    let (tmp, config) = setup_test_env();
    run_readnest(&config, &["init"]);

    let fallback = tmp.path().join("data").join("fallback");
    fs::create_dir_all(&fallback).unwrap();
    fs::write(fallback.join("articles.json"), "[[[").unwrap();

    let (stdout, _, _) = run_readnest(&config, &["check"]);
    assert!(stdout.contains("CORRUPT"), "got: {stdout}");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_readnest(&tmp.path().join("nope.toml"), &["check"]);
    assert!(!success);
    assert!(stderr.contains("config"));
}
