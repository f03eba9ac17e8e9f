use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

const SERVE: &str = r#"
version: "1"
program:
  prog: serve
  about: Start a server.
root: Args
types:
  HTTPServer:
    fields:
      - { name: port, type: int, default: 8080, help: Port to bind. }
  SMTPServer:
    fields:
      - { name: relay, type: str }
  Args:
    fields:
      - { name: workers, type: int, help: Worker threads. }
      - { name: verbose, type: bool, default: false }
      - { name: backend, type: "union[HTTPServer, SMTPServer]" }
default: !Args
  workers: !missing
  verbose: false
  backend: !HTTPServer
    port: 9000
"#;

fn write_schema(dir: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, yaml).expect("failed to write schema");
    path
}

fn argschema(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_argschema"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run argschema")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_prints_parsed_value_as_json() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "serve.yaml", SERVE);

    let output = argschema(&["run", schema.to_str().unwrap(), "--", "--workers", "4", "--verbose"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["workers"], 4);
    assert_eq!(json["verbose"], true);
    assert_eq!(json["backend"]["port"], 9000);
}

#[test]
fn run_selects_subcommand_and_prints_debug_repr() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "serve.yaml", SERVE);

    let output = argschema(&[
        "run",
        schema.to_str().unwrap(),
        "--format",
        "debug",
        "--",
        "--workers",
        "2",
        "backend:smtp-server",
        "--backend.relay",
        "mx",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output).trim(),
        "Args(workers=2, verbose=False, backend=SMTPServer(relay='mx'))"
    );
}

#[test]
fn run_prints_yaml_with_tags() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "serve.yaml", SERVE);

    let output = argschema(&[
        "run",
        schema.to_str().unwrap(),
        "--format",
        "yaml",
        "--",
        "--workers",
        "1",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("!Args"), "{text}");
    assert!(text.contains("!HTTPServer"), "{text}");
}

#[test]
fn run_usage_error_exits_with_status_two() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "serve.yaml", SERVE);

    let output = argschema(&["run", schema.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(err.contains("--workers"), "{err}");
    assert!(err.contains("Usage: serve"), "{err}");
}

#[test]
fn run_help_for_schema_exits_zero() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "serve.yaml", SERVE);

    let output = argschema(&["run", schema.to_str().unwrap(), "--", "--help"]);
    assert_eq!(output.status.code(), Some(0));
    let help = stdout(&output);
    assert!(help.contains("Start a server."), "{help}");
    assert!(help.contains("Worker threads. (required)"), "{help}");
}

#[test]
fn run_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = argschema(&["run", dir.path().join("absent.yaml").to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to read"));
}

// ---------------------------------------------------------------------------
// lower
// ---------------------------------------------------------------------------

#[test]
fn lower_json_lists_scopes_and_arguments() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "serve.yaml", SERVE);

    let output = argschema(&["lower", schema.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["command"], "serve");
    assert_eq!(json["description"], "Start a server.");
    let flags: Vec<&str> = json["arguments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|arg| arg["name_or_flag"].as_str().unwrap())
        .collect();
    assert_eq!(flags, ["--workers", "--verbose"]);

    let subcommands: Vec<&str> = json["subcommands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|sub| sub["command"].as_str().unwrap())
        .collect();
    assert_eq!(subcommands, ["backend:http-server", "backend:smtp-server"]);
}

#[test]
fn lower_table_is_the_default() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "serve.yaml", SERVE);

    let output = argschema(&["lower", schema.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let table = stdout(&output);
    assert!(table.starts_with("serve  Start a server."), "{table}");
    assert!(table.contains("--workers"), "{table}");
    assert!(table.contains("subcommands (optional):"), "{table}");
    assert!(table.contains("--backend.relay"), "{table}");
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_reports_ok_for_valid_documents() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "serve.yaml", SERVE);

    let output = argschema(&["validate", schema.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("serve.yaml: ok"));
}

#[test]
fn validate_reports_every_problem_and_fails() {
    let dir = TempDir::new().unwrap();
    let good = write_schema(&dir, "good.yaml", SERVE);
    let bad = write_schema(
        &dir,
        "bad.yaml",
        r#"
root: Args
types:
  Args:
    fields:
      - { name: help, type: int }
      - { name: x, type: Missing }
"#,
    );

    let output = argschema(&["validate", good.to_str().unwrap(), bad.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));

    let out = stdout(&output);
    assert!(out.contains("good.yaml: ok"), "{out}");
    assert!(out.contains("reserved name `help`"), "{out}");
    assert!(out.contains("unknown type `Missing`"), "{out}");
    assert!(stderr(&output).contains("1 of 2 schema document(s) failed validation"));
}

#[test]
fn validate_catches_defaults_that_do_not_match_their_type() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(
        &dir,
        "decode.yaml",
        r#"
root: Args
types:
  Args:
    fields:
      - { name: count, type: int, default: many }
"#,
    );

    let output = argschema(&["validate", schema.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!stdout(&output).contains(": ok"));
}
