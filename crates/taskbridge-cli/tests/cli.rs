#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_taskbridge"))
}

/// Stand-in interpreter: records each call, then answers by matching the
/// script text it receives on stdin.
const FIXTURE: &str = r#"#!/bin/sh
script=$(cat)
echo call >> "$(dirname "$0")/calls.log"
case "$script" in
  *"is running then"*)
    printf '%s\n' '{"running":true,"version":"4.3"}'
    ;;
  *"set idList to"*)
    printf '%s\n' '{"succeeded":[{"id":"a1","name":"Alpha"}],"failed":[{"id":"b2","error":"Can’t get first flattened task whose id is \"b2\"."}]}'
    ;;
  *"first flattened task whose id is \"missing\""*)
    echo 'execution error: OmniFocus got an error: Can’t get first flattened task whose id is "missing". (-1728)' >&2
    exit 1
    ;;
  *"first flattened task whose id is \"garbled\""*)
    echo 'not json at all'
    ;;
  *"repeat with theTask in (flattened tasks)"*)
    printf '%s\n' '{"items":[{"id":"a1","name":"Alpha","note":null,"flagged":true,"completed":false,"dueDate":"2026-03-01T17:00:00","deferDate":null,"completionDate":null,"projectId":null,"projectName":null,"tags":[]}],"totalCount":7,"returnedCount":1,"offset":3,"limit":1,"hasMore":true}'
    ;;
  *"first flattened task whose id is"*)
    printf '%s\n' '{"id":"a1","name":"Alpha","note":null,"flagged":false,"completed":false,"dueDate":null,"deferDate":null,"completionDate":null,"projectId":"p1","projectName":"Home","tags":[{"id":"t1","name":"errands"}]}'
    ;;
  *)
    echo "unexpected script" >&2
    exit 1
    ;;
esac
"#;

const NOT_RUNNING_FIXTURE: &str = r#"#!/bin/sh
cat > /dev/null
echo call >> "$(dirname "$0")/calls.log"
echo "execution error: OmniFocus got an error: Application isn’t running. (-600)" >&2
exit 1
"#;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new(fixture: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let script = dir.path().join("host.sh");
        std::fs::write(&script, fixture).expect("write fixture");
        let config = dir.path().join("config.toml");
        std::fs::write(
            &config,
            format!(
                "interpreter = \"sh {}\"\ntimeout_secs = 10\n",
                script.display()
            ),
        )
        .expect("write config");
        Self { dir, config }
    }

    fn run(&self, args: &[&str]) -> Output {
        bin()
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("run taskbridge")
    }

    fn calls(&self) -> usize {
        calls_in(self.dir.path())
    }
}

fn calls_in(dir: &Path) -> usize {
    std::fs::read_to_string(dir.join("calls.log"))
        .map(|text| text.lines().count())
        .unwrap_or(0)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn version_needs_no_config() {
    let output = bin().arg("version").output().expect("version");
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("taskbridge "));
}

#[test]
fn status_as_json_envelope() {
    let ws = Workspace::new(FIXTURE);
    let output = ws.run(&["--format", "json", "status"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["running"], true);
    assert_eq!(value["data"]["version"], "4.3");
    assert!(value["error"].is_null());
}

#[test]
fn show_task_text() {
    let ws = Workspace::new(FIXTURE);
    let output = ws.run(&["tasks", "show", "a1"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "a1  [ ] Alpha  (Home)  @errands");
}

#[test]
fn list_tasks_prints_page_footer() {
    let ws = Workspace::new(FIXTURE);
    let output = ws.run(&["tasks", "list", "--limit", "1", "--offset", "3"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("a1  [ ] Alpha  flagged  due 2026-03-01 17:00"));
    assert!(text.trim_end().ends_with("showing 4-4 of 7 (next offset 4)"));
}

#[test]
fn not_found_exits_with_four() {
    let ws = Workspace::new(FIXTURE);
    let output = ws.run(&["tasks", "show", "missing"]);
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(stderr(&output).trim(), "error[TASK_NOT_FOUND]: Task not found");
}

#[test]
fn bad_id_exits_with_two_and_never_runs_the_interpreter() {
    let ws = Workspace::new(FIXTURE);
    let output = ws.run(&["tasks", "complete", "not/an-id"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("INVALID_ID_FORMAT"));

    let output = ws.run(&["tasks", "add", "Pay rent", "--due", "next tuesday"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("INVALID_DATE_FORMAT"));

    let output = ws.run(&["tasks", "list", "--limit=-1"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(ws.calls(), 0);
}

#[test]
fn garbled_output_exits_with_five() {
    let ws = Workspace::new(FIXTURE);
    let output = ws.run(&["--format", "json", "tasks", "show", "garbled"]);
    assert_eq!(output.status.code(), Some(5));
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["error"]["code"], "JSON_PARSE_ERROR");
}

#[test]
fn host_not_running_exits_with_three() {
    let ws = Workspace::new(NOT_RUNNING_FIXTURE);
    let output = ws.run(&["projects", "show", "p1"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("NOT_RUNNING"));
}

#[test]
fn partial_batch_exits_with_six() {
    let ws = Workspace::new(FIXTURE);
    let output = ws.run(&["--format", "json", "batch", "complete", "a1,b2", "a1"]);
    assert_eq!(output.status.code(), Some(6));
    assert_eq!(ws.calls(), 1);
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["totalSucceeded"], 1);
    assert_eq!(value["data"]["totalFailed"], 1);
    assert_eq!(value["data"]["failed"][0]["id"], "b2");
    assert_eq!(value["data"]["failed"][0]["code"], "TASK_NOT_FOUND");
}

#[test]
fn batch_defer_rejects_zero_days() {
    let ws = Workspace::new(FIXTURE);
    let output = ws.run(&["batch", "defer", "--days", "0", "a1"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(ws.calls(), 0);
}

#[test]
fn config_is_found_through_taskbridge_home() {
    let ws = Workspace::new(FIXTURE);
    let output = bin()
        .env("TASKBRIDGE_HOME", ws.dir.path())
        .args(["--format", "csv", "status"])
        .output()
        .expect("status");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "running,version\ntrue,4.3\n");
}

#[test]
fn malformed_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "timeout_secs = [").expect("write");
    let output = bin()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .output()
        .expect("status");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("failed to load config"));
}
