use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[study_params]
tr_s = 2.0
scanner_pulse_rate = 46

[runner]
backend = "emulated"
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

/// `--json` on a failing run prints one `{reason, message}` object to stdout.
#[rstest]
fn json_error_object_has_reason_and_message() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("mid").unwrap();
    cmd.arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--subject")
        .arg("s01")
        .arg("--sequence")
        .arg(dir.path().join("nope.csv"));

    let out = cmd.assert().failure().code(3).get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let line = stdout.lines().next().unwrap_or("");
    let v: serde_json::Value = serde_json::from_str(line).expect("valid JSON error object");

    assert_eq!(v.get("reason").and_then(|x| x.as_str()), Some("MissingSequence"));
    assert!(v.get("message").and_then(|x| x.as_str()).is_some_and(|m| !m.is_empty()));
}
