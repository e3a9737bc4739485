//! Durable key-value slots holding the serialized task list.

mod file_kv;
mod memory_kv;

pub use file_kv::{FileKvStore, data_dir};
pub use memory_kv::MemoryKvStore;

use crate::error::AppError;
use crate::model::{Task, parse_task_list};

pub const TASKS_KEY: &str = "taskapp:tasks:v1";
pub const LEGACY_TASKS_KEY: &str = "taskapp:tasks";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
}

/// Reads the task slot, falling back to the unversioned slot written by older builds.
///
/// `Ok(None)` means neither slot exists.
pub fn load_tasks(store: &dyn KeyValueStore) -> Result<Option<Vec<Task>>, AppError> {
    let raw = match store.get(TASKS_KEY)? {
        Some(raw) => raw,
        None => match store.get(LEGACY_TASKS_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        },
    };

    parse_task_list(&raw).map(Some)
}

pub fn save_tasks(store: &dyn KeyValueStore, tasks: &[Task]) -> Result<(), AppError> {
    let content = serde_json::to_string_pretty(tasks)?;
    store.set(TASKS_KEY, &content)
}
