//! Integration tests for the `vyform` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! manifest checking and error exit codes, all without a live device.
#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `vyform` binary with env isolation.
///
/// Clears all `VYFORM_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn vyform_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vyform");
    cmd.env("HOME", "/tmp/vyform-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/vyform-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("VYFORM_PROFILE")
        .env_remove("VYFORM_ENDPOINT")
        .env_remove("VYFORM_API_KEY")
        .env_remove("VYFORM_OUTPUT")
        .env_remove("VYFORM_INSECURE")
        .env_remove("VYFORM_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const PORT_GROUP: &str = r#"
[resources.port_group]
key = "firewall group port-group {{name}}"

[resources.port_group.fields.name]
type = "string"
required = true

[resources.port_group.fields.description]
type = "string"

[resources.port_group.fields.port]
type = "list"
elem = "string"
"#;

/// Write `instances` after the port-group definition into a fresh manifest.
fn manifest(instances: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vyform.toml");
    std::fs::write(&path, format!("{PORT_GROUP}\n{instances}")).unwrap();
    (dir, path)
}

const WEB: &str = r#"
[[instances]]
resource = "port_group"
values = { name = "web", port = ["80", "443"] }
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = vyform_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    vyform_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("VyOS")
            .and(predicate::str::contains("plan"))
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("destroy"))
            .and(predicate::str::contains("import")),
    );
}

#[test]
fn test_version_flag() {
    vyform_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vyform"));
}

#[test]
fn test_unknown_output_format_is_rejected() {
    vyform_cmd()
        .args(["--output", "xml", "show", "system"])
        .assert()
        .code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    vyform_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vyform"));
}

#[test]
fn test_completions_zsh() {
    vyform_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Manifest checks (no device needed) ──────────────────────────────

#[test]
fn test_missing_manifest_is_a_usage_error() {
    vyform_cmd()
        .args(["plan", "-m", "/tmp/vyform-test-nonexistent/none.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid manifest"));
}

#[test]
fn test_malformed_manifest_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[resources.port_group\n").unwrap();

    vyform_cmd()
        .args(["plan", "-m"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid manifest"));
}

#[test]
fn test_multi_instance_block_is_rejected_at_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vyform.toml");
    std::fs::write(
        &path,
        r#"
[resources.nat]
key = "nat source rule {{rule}}"
[resources.nat.fields.rule]
type = "int"
required = true
[resources.nat.fields.translation]
type = "block_list"
[resources.nat.fields.translation.fields.address]
type = "string"
"#,
    )
    .unwrap();

    vyform_cmd()
        .args(["apply", "-m"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid manifest"));
}

#[test]
fn test_invalid_instance_fails_before_connecting() {
    let (_dir, path) = manifest(
        r#"
[[instances]]
resource = "port_group"
values = { port = ["80"] }
"#,
    );

    // The endpoint is unroutable; a validation failure must come first.
    vyform_cmd()
        .args(["apply", "--endpoint", "https://192.0.2.1", "--api-key", "k", "-m"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("instances[0]"));
}

#[test]
fn test_unknown_resource_in_instance() {
    let (_dir, path) = manifest("[[instances]]\nresource = \"nat_rule\"\n");

    vyform_cmd()
        .args(["plan", "-m"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown resource 'nat_rule'"));
}

// ── Connection resolution ───────────────────────────────────────────

#[test]
fn test_missing_endpoint_is_a_usage_error() {
    let (_dir, path) = manifest(WEB);

    vyform_cmd()
        .args(["plan", "-m"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No device endpoint configured"));
}

#[test]
fn test_missing_api_key_is_an_auth_error() {
    let (_dir, path) = manifest(WEB);

    vyform_cmd()
        .args(["plan", "--endpoint", "https://192.0.2.1", "-m"])
        .arg(&path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No API key"));
}

#[test]
fn test_unsupported_scheme_is_rejected() {
    vyform_cmd()
        .args(["show", "system", "--endpoint", "ftp://192.0.2.1", "--api-key", "k"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported scheme"));
}

#[test]
fn test_unknown_profile_is_a_usage_error() {
    vyform_cmd()
        .args(["show", "system", "--profile", "lab"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Profile 'lab' not found"));
}

// ── Import ──────────────────────────────────────────────────────────

#[test]
fn test_import_rejects_malformed_identity() {
    let (_dir, path) = manifest("");

    vyform_cmd()
        .args([
            "import",
            "port_group",
            "web",
            "--endpoint",
            "https://192.0.2.1",
            "--api-key",
            "k",
            "-m",
        ])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid value for id 'web'"));
}

#[test]
fn test_import_unknown_resource() {
    let (_dir, path) = manifest("");

    vyform_cmd()
        .args(["import", "nat_rule", "rule=10", "-m"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Defined resources: port_group"));
}
