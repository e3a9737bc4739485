use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("taskapp-{nanos}-{name}"))
}

fn write_store(data_dir: &Path, tasks: serde_json::Value) {
    std::fs::create_dir_all(data_dir).unwrap();
    std::fs::write(
        data_dir.join("taskapp_tasks_v1.json"),
        serde_json::to_string_pretty(&tasks).unwrap(),
    )
    .unwrap();
}

fn stored(data_dir: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(data_dir.join("taskapp_tasks_v1.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn run(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taskapp"))
        .args(args)
        .env("TASKAPP_DATA_DIR", data_dir)
        .env("TASKAPP_CONFIG_PATH", data_dir.join("config.json"))
        .env("TASKAPP_DISABLE_BACKEND", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run taskapp")
}

fn two_tasks() -> serde_json::Value {
    serde_json::json!([
        {
            "id": "task-2",
            "title": "second",
            "category": "work",
            "done": false,
            "createdAt": "2025-12-21T00:00:00Z"
        },
        {
            "id": "task-1",
            "title": "first",
            "done": true,
            "createdAt": "2025-12-20T00:00:00Z"
        }
    ])
}

#[test]
fn toggle_command_flips_done() {
    let data_dir = temp_path("cli-toggle");
    write_store(&data_dir, two_tasks());

    let output = run(&data_dir, &["toggle", "task-2"]);
    let tasks = stored(&data_dir);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Completed task: second (task-2)"));
    assert_eq!(tasks[0]["done"], true);
    assert_eq!(tasks[1]["done"], true);
}

#[test]
fn toggle_unknown_id_is_a_noop() {
    let data_dir = temp_path("cli-toggle-missing");
    write_store(&data_dir, two_tasks());

    let output = run(&data_dir, &["toggle", "task-9"]);
    let tasks = stored(&data_dir);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No task with id task-9"));
    assert_eq!(tasks, two_tasks());
}

#[test]
fn update_command_merges_fields() {
    let data_dir = temp_path("cli-update");
    write_store(&data_dir, two_tasks());

    let output = run(
        &data_dir,
        &["update", "task-1", "--title", "first, renamed", "--done", "false"],
    );
    let tasks = stored(&data_dir);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(output.status.success());
    assert_eq!(tasks[1]["id"], "task-1");
    assert_eq!(tasks[1]["title"], "first, renamed");
    assert_eq!(tasks[1]["done"], false);
    assert_eq!(tasks[1]["createdAt"], "2025-12-20T00:00:00Z");
}

#[test]
fn update_command_requires_a_field() {
    let data_dir = temp_path("cli-update-empty");
    write_store(&data_dir, two_tasks());

    let output = run(&data_dir, &["update", "task-1"]);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: invalid_input - nothing to update"));
}

#[test]
fn update_command_rejects_blank_title() {
    let data_dir = temp_path("cli-update-blank");
    write_store(&data_dir, two_tasks());

    let output = run(&data_dir, &["update", "task-1", "--title", "   "]);
    let tasks = stored(&data_dir);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: invalid_input - title is required"));
    assert_eq!(tasks, two_tasks());
}

#[test]
fn remove_command_twice_is_idempotent() {
    let data_dir = temp_path("cli-remove");
    write_store(&data_dir, two_tasks());

    let first = run(&data_dir, &["remove", "task-2"]);
    let second = run(&data_dir, &["remove", "task-2"]);
    let tasks = stored(&data_dir);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(first.status.success());
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&first.stdout).contains("Removed task: second"));
    assert!(String::from_utf8_lossy(&second.stdout).contains("No task with id task-2"));
    assert_eq!(tasks.as_array().map(Vec::len), Some(1));
}

#[test]
fn list_and_stats_reflect_store() {
    let data_dir = temp_path("cli-list");
    write_store(&data_dir, two_tasks());

    let list = run(&data_dir, &["list"]);
    let pending = run(&data_dir, &["--json", "list", "--pending"]);
    let stats = run(&data_dir, &["--json", "stats"]);
    std::fs::remove_dir_all(&data_dir).ok();

    let listed = String::from_utf8_lossy(&list.stdout);
    let lines: Vec<&str> = listed.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("task-2 | second | pending | work"));
    assert!(lines[1].starts_with("task-1 | first | done | -"));

    let pending: serde_json::Value = serde_json::from_slice(&pending.stdout).unwrap();
    assert_eq!(pending.as_array().map(Vec::len), Some(1));
    assert_eq!(pending[0]["id"], "task-2");

    let stats: serde_json::Value = serde_json::from_slice(&stats.stdout).unwrap();
    assert_eq!(
        stats,
        serde_json::json!({ "total": 2, "completed": 1, "pending": 1 })
    );
}

#[test]
fn corrupt_store_falls_back_to_starter_tasks() {
    let data_dir = temp_path("cli-corrupt");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("taskapp_tasks_v1.json"), "{ not json").unwrap();

    let output = run(&data_dir, &["--json", "stats"]);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total"], 2);
}

#[test]
fn reset_command_restores_starter_tasks() {
    let data_dir = temp_path("cli-reset");
    write_store(&data_dir, two_tasks());

    let output = run(&data_dir, &["reset"]);
    let tasks = stored(&data_dir);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(output.status.success());
    assert_eq!(tasks[0]["title"], "Buy milk");
    assert_eq!(tasks[1]["title"], "Send report");
}
