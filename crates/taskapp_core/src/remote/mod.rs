//! Optional host backend that mirrors store mutations.
//!
//! The store only ever talks to a [`RemoteBridge`]. The bridge turns a missing
//! backend, a transport error and a timeout into the same `None`, so local
//! state never depends on the remote leg.

mod sqlite;

pub use sqlite::SqliteBackend;

use crate::config::Config;
use crate::error::AppError;
use crate::model::{Task, TaskPatch};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const BACKEND_DB_ENV_VAR: &str = "TASKAPP_BACKEND_DB";
const DISABLE_BACKEND_ENV_VAR: &str = "TASKAPP_DISABLE_BACKEND";

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Whether calls can reach anything at all.
    fn is_available(&self) -> bool {
        true
    }

    async fn invoke(&self, command: &str, payload: Value) -> Result<Value, AppError>;
}

/// Stand-in used when the process runs without a host backend.
#[derive(Debug, Default)]
pub struct NoopBackend;

#[async_trait]
impl RemoteBackend for NoopBackend {
    fn is_available(&self) -> bool {
        false
    }

    async fn invoke(&self, command: &str, _payload: Value) -> Result<Value, AppError> {
        Err(AppError::backend_unavailable(format!(
            "no backend for {command}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    GetTasks,
    AddTask(Task),
    ToggleTask { id: String },
    UpdateTask { id: String, patch: TaskPatch },
    RemoveTask { id: String },
    ReplaceAllTasks(Vec<Task>),
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetTasks => "get_tasks",
            Self::AddTask(_) => "add_task",
            Self::ToggleTask { .. } => "toggle_task",
            Self::UpdateTask { .. } => "update_task",
            Self::RemoveTask { .. } => "remove_task",
            Self::ReplaceAllTasks(_) => "replace_all_tasks",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::GetTasks => json!({}),
            Self::AddTask(task) => json!({ "task": task }),
            Self::ToggleTask { id } | Self::RemoveTask { id } => json!({ "id": id }),
            Self::UpdateTask { id, patch } => json!({ "id": id, "data": patch }),
            Self::ReplaceAllTasks(tasks) => json!({ "tasks": tasks }),
        }
    }
}

/// Time-bounded, failure-swallowing wrapper around a backend.
#[derive(Clone)]
pub struct RemoteBridge {
    backend: Arc<dyn RemoteBackend>,
    timeout: Duration,
    failures: Arc<AtomicUsize>,
}

impl RemoteBridge {
    pub fn new(backend: Option<Arc<dyn RemoteBackend>>, timeout: Duration) -> Self {
        Self {
            backend: backend.unwrap_or_else(|| Arc::new(NoopBackend)),
            timeout,
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Calls failed or timed out so far. Skipped calls to an absent backend are not counted.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Sends `command`. `None` means the backend is absent, failed, or did not answer in time.
    pub async fn call(&self, command: &BackendCommand) -> Option<Value> {
        if !self.backend.is_available() {
            return None;
        }

        let name = command.name();
        let outcome = tokio::time::timeout(self.timeout, self.backend.invoke(name, command.payload()))
            .await
            .unwrap_or_else(|_| {
                Err(AppError::timeout(format!(
                    "{name} took longer than {}ms",
                    self.timeout.as_millis()
                )))
            });

        match outcome {
            Ok(value) => {
                tracing::debug!(event = "remote_call", command = name, status = "ok");
                Some(value)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    event = "remote_call",
                    command = name,
                    status = "failed",
                    code = err.code(),
                    error = %err.message()
                );
                None
            }
        }
    }
}

/// Picks the backend described by env and config. Open failures degrade to no backend.
pub fn backend_from_config(config: &Config) -> Option<Arc<dyn RemoteBackend>> {
    if std::env::var(DISABLE_BACKEND_ENV_VAR).is_ok() {
        return None;
    }

    let path = match std::env::var(BACKEND_DB_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => config.backend_db.clone()?,
    };

    match SqliteBackend::open(&path) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(err) => {
            tracing::warn!(
                event = "backend_open",
                status = "failed",
                path = %path.display(),
                error = %err
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendCommand, NoopBackend, RemoteBackend, RemoteBridge};
    use crate::error::AppError;
    use crate::model::TaskPatch;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl RemoteBackend for RecordingBackend {
        async fn invoke(&self, command: &str, payload: Value) -> Result<Value, AppError> {
            self.calls
                .lock()
                .unwrap()
                .push((command.to_string(), payload));
            Ok(json!("ok"))
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl RemoteBackend for FailingBackend {
        async fn invoke(&self, _command: &str, _payload: Value) -> Result<Value, AppError> {
            Err(AppError::backend("connection refused"))
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl RemoteBackend for HangingBackend {
        async fn invoke(&self, _command: &str, _payload: Value) -> Result<Value, AppError> {
            std::future::pending::<()>().await;
            Ok(Value::Null)
        }
    }

    #[test]
    fn command_names_match_backend_surface() {
        assert_eq!(BackendCommand::GetTasks.name(), "get_tasks");
        assert_eq!(
            BackendCommand::ToggleTask { id: "a".into() }.name(),
            "toggle_task"
        );
        assert_eq!(
            BackendCommand::RemoveTask { id: "a".into() }.name(),
            "remove_task"
        );
        assert_eq!(
            BackendCommand::ReplaceAllTasks(Vec::new()).name(),
            "replace_all_tasks"
        );
    }

    #[test]
    fn update_payload_carries_only_patch_fields() {
        let command = BackendCommand::UpdateTask {
            id: "a".into(),
            patch: TaskPatch {
                title: Some("renamed".into()),
                ..TaskPatch::default()
            },
        };

        assert_eq!(
            command.payload(),
            json!({ "id": "a", "data": { "title": "renamed" } })
        );
    }

    #[tokio::test]
    async fn absent_backend_is_skipped() {
        let bridge = RemoteBridge::new(None, Duration::from_secs(5));

        assert!(!bridge.is_available());
        assert_eq!(bridge.call(&BackendCommand::GetTasks).await, None);
        assert_eq!(bridge.failures(), 0);
    }

    #[tokio::test]
    async fn noop_backend_refuses_direct_invocation() {
        let err = NoopBackend.invoke("get_tasks", json!({})).await.unwrap_err();
        assert_eq!(err.code(), "backend_unavailable");
    }

    #[tokio::test]
    async fn forwards_name_and_payload() {
        let backend = Arc::new(RecordingBackend::default());
        let bridge = RemoteBridge::new(Some(backend.clone()), Duration::from_secs(5));

        let value = bridge
            .call(&BackendCommand::RemoveTask { id: "task-1".into() })
            .await;

        assert_eq!(value, Some(json!("ok")));
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].0, "remove_task");
        assert_eq!(calls[0].1, json!({ "id": "task-1" }));
    }

    #[tokio::test]
    async fn transport_failure_becomes_none() {
        let bridge = RemoteBridge::new(Some(Arc::new(FailingBackend)), Duration::from_secs(5));

        assert_eq!(bridge.call(&BackendCommand::GetTasks).await, None);
        assert_eq!(bridge.failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_backend_is_cut_off() {
        let bridge = RemoteBridge::new(Some(Arc::new(HangingBackend)), Duration::from_secs(5));

        assert_eq!(bridge.call(&BackendCommand::GetTasks).await, None);
        assert_eq!(bridge.failures(), 1);
    }
}
