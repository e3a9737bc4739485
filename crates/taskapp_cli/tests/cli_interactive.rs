use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("taskapp-{nanos}-{name}"))
}

fn run_interactive_in(data_dir: &Path, input: &str) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_taskapp"))
        .env("TASKAPP_DATA_DIR", data_dir)
        .env("TASKAPP_CONFIG_PATH", data_dir.join("config.json"))
        .env("TASKAPP_DISABLE_BACKEND", "1")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn interactive session");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin
            .write_all(input.as_bytes())
            .expect("failed to write to stdin");
    }

    child
        .wait_with_output()
        .expect("failed to read interactive output")
}

fn run_interactive(input: &str) -> std::process::Output {
    let data_dir = temp_path("cli-interactive");
    let output = run_interactive_in(&data_dir, input);
    std::fs::remove_dir_all(&data_dir).ok();
    output
}

#[test]
fn interactive_help_shows_usage() {
    let output = run_interactive("help\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
}

#[test]
fn interactive_question_mark_shows_usage() {
    let output = run_interactive("?\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
}

#[test]
fn interactive_invalid_command_prints_error() {
    let output = run_interactive("nope\nexit\n");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}

#[test]
fn interactive_session_keeps_one_store() {
    let data_dir = temp_path("cli-interactive-session");
    let output = run_interactive_in(
        &data_dir,
        "reset\nadd \"demo task\" --category \"home office\"\nstats\nquit\n",
    );
    let content = std::fs::read_to_string(data_dir.join("taskapp_tasks_v1.json")).unwrap();
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Added task: demo task"));
    assert!(stdout.contains("total: 3 | completed: 1 | pending: 2"));

    let tasks: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(tasks[0]["title"], "demo task");
    assert_eq!(tasks[0]["category"], "home office");
}

#[test]
fn interactive_end_of_input_flushes_state() {
    let data_dir = temp_path("cli-interactive-eof");
    let output = run_interactive_in(&data_dir, "add \"written on exit\"\n");
    let content = std::fs::read_to_string(data_dir.join("taskapp_tasks_v1.json")).unwrap();
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(output.status.success());
    assert!(content.contains("written on exit"));
}
