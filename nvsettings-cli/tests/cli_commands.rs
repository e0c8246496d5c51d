//! Drives the `nvsettings` binary against a temporary data directory

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn nvsettings(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nvsettings"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("NVSETTINGS_AUTOSAVE_ENABLED")
        .output()
        .expect("failed to run nvsettings")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_show_prints_defaults() {
    let dir = TempDir::new().unwrap();
    let output = nvsettings(dir.path(), &["show"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("test         = 0"));
    assert!(text.contains("sample_ms    = 750"));
}

#[test]
fn test_set_persists_between_runs() {
    let dir = TempDir::new().unwrap();

    let output = nvsettings(dir.path(), &["set", "test", "42"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = nvsettings(dir.path(), &["show", "--json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["test"], 42);
    assert_eq!(json["brightness"], 255);
}

#[test]
fn test_set_rejects_unknown_setting() {
    let dir = TempDir::new().unwrap();
    let output = nvsettings(dir.path(), &["set", "volume", "3"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown setting"));
}

#[test]
fn test_erase_restores_defaults() {
    let dir = TempDir::new().unwrap();
    assert!(nvsettings(dir.path(), &["set", "max_sensors", "4"]).status.success());
    assert!(nvsettings(dir.path(), &["erase"]).status.success());

    let output = nvsettings(dir.path(), &["show", "--json"]);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["max_sensors"], 10);
}

#[test]
fn test_set_through_autosave() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("nvsettings.toml");
    std::fs::write(&config, "[autosave]\nenabled = true\ndebounce = \"10ms\"\n").unwrap();

    let output = nvsettings(
        &dir.path().join("nvs"),
        &["--config", config.to_str().unwrap(), "set", "ntp_enabled", "false"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = nvsettings(&dir.path().join("nvs"), &["show", "--json"]);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ntp_enabled"], false);
}
