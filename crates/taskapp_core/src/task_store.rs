//! The task store: authoritative in-memory list, observers, debounced local
//! persistence, and best-effort mirroring to a backend.
//!
//! Every mutation runs synchronously: the list is updated, derived views are
//! recomputed, observers are called, then the side effects are scheduled. The
//! local write is coalesced by a [`Debouncer`]; remote calls go through one
//! ordered queue and never decide the outcome of the mutation.

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::AppError;
use crate::model::{NewTask, Task, TaskPatch, default_seed, parse_task_list, validate_tasks};
use crate::observer::{Observers, Subscription};
use crate::remote::{BackendCommand, RemoteBackend, RemoteBridge, backend_from_config};
use crate::storage::{self, FileKvStore, KeyValueStore};
use crate::views::{DerivedViews, TaskCounts};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

pub struct StoreOptions {
    /// `None` when the environment has no durable storage; persistence is then skipped.
    pub storage: Option<Arc<dyn KeyValueStore>>,
    pub backend: Option<Arc<dyn RemoteBackend>>,
    pub debounce: Duration,
    pub remote_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        let config = Config::default();
        Self {
            storage: None,
            backend: None,
            debounce: config.debounce(),
            remote_timeout: config.remote_timeout(),
        }
    }
}

impl StoreOptions {
    pub fn from_config(config: &Config) -> Self {
        let storage: Option<Arc<dyn KeyValueStore>> =
            match storage::data_dir(config.data_dir.as_deref()) {
                Ok(dir) => Some(Arc::new(FileKvStore::new(dir))),
                Err(err) => {
                    tracing::warn!(
                        event = "storage_unavailable",
                        error = %err,
                        "running without local persistence"
                    );
                    None
                }
            };

        Self {
            storage,
            backend: backend_from_config(config),
            debounce: config.debounce(),
            remote_timeout: config.remote_timeout(),
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn RemoteBackend>) -> Self {
        self.backend = Some(backend);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub ok: bool,
    pub imported: usize,
    pub error: Option<AppError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub ok: bool,
    pub loaded: usize,
}

enum MirrorJob {
    Call(BackendCommand),
    Settle(oneshot::Sender<()>),
}

struct StoreState {
    tasks: Vec<Task>,
    views: DerivedViews,
}

pub struct TaskStore {
    state: Mutex<StoreState>,
    observers: Arc<Observers>,
    storage: Option<Arc<dyn KeyValueStore>>,
    persist: Debouncer,
    bridge: RemoteBridge,
    mirror_queue: Mutex<Option<mpsc::UnboundedSender<MirrorJob>>>,
}

impl TaskStore {
    /// Builds a store seeded from the task slot, or from the default seed when the
    /// slot is missing, unreadable, or invalid.
    pub fn new(options: StoreOptions) -> Self {
        let tasks = match options.storage.as_deref() {
            Some(storage) => initial_tasks(storage),
            None => default_seed(),
        };

        Self {
            state: Mutex::new(StoreState {
                views: DerivedViews::compute(&tasks),
                tasks,
            }),
            observers: Observers::new(),
            storage: options.storage,
            persist: Debouncer::new(options.debounce),
            bridge: RemoteBridge::new(options.backend, options.remote_timeout),
            mirror_queue: Mutex::new(None),
        }
    }

    /// Registers `observer`, calls it right away with the current list, then on every change.
    ///
    /// Observers run synchronously inside the mutating call and must not mutate the store.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&[Task]) + Send + Sync + 'static,
    {
        let observer = Arc::new(observer);
        let (snapshot, subscription) = {
            let state = self.lock_state();
            let subscription = self.observers.register(observer.clone());
            (state.tasks.clone(), subscription)
        };
        observer(&snapshot);
        subscription
    }

    pub fn add(&self, input: NewTask) -> Result<Task, AppError> {
        let task = Task::create(input)?;
        let created = task.clone();
        self.commit(move |tasks| {
            tasks.insert(0, task);
            Some(())
        });
        tracing::debug!(event = "task_added", id = %created.id);
        self.mirror(BackendCommand::AddTask(created.clone()));
        Ok(created)
    }

    /// Flips `done`. Unknown ids are ignored.
    pub fn toggle(&self, id: &str) -> Option<Task> {
        let toggled = self.commit(|tasks| {
            let task = tasks.iter_mut().find(|task| task.id == id)?;
            task.done = !task.done;
            Some(task.clone())
        })?;
        self.mirror(BackendCommand::ToggleTask {
            id: toggled.id.clone(),
        });
        Some(toggled)
    }

    /// Merges the fields present in `patch`. Unknown ids are ignored; a blank
    /// replacement title is an error and changes nothing.
    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>, AppError> {
        let patch = patch.normalized()?;
        let Some(updated) = self.commit(|tasks| {
            let task = tasks.iter_mut().find(|task| task.id == id)?;
            patch.apply_to(task);
            Some(task.clone())
        }) else {
            return Ok(None);
        };
        self.mirror(BackendCommand::UpdateTask {
            id: updated.id.clone(),
            patch,
        });
        Ok(Some(updated))
    }

    /// Removes the task. Unknown ids are ignored, so repeated calls are harmless.
    pub fn remove(&self, id: &str) -> Option<Task> {
        let removed = self.commit(|tasks| {
            let index = tasks.iter().position(|task| task.id == id)?;
            Some(tasks.remove(index))
        })?;
        self.mirror(BackendCommand::RemoveTask {
            id: removed.id.clone(),
        });
        Some(removed)
    }

    pub fn reset(&self) {
        self.replace_all(default_seed());
        tracing::info!(event = "tasks_reset");
    }

    /// Replaces the list with `text`. Malformed input leaves the list untouched.
    pub fn import_json(&self, text: &str) -> ImportOutcome {
        match parse_task_list(text) {
            Ok(tasks) => {
                let imported = tasks.len();
                self.replace_all(tasks);
                tracing::info!(event = "tasks_imported", count = imported);
                ImportOutcome {
                    ok: true,
                    imported,
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(event = "tasks_imported", status = "rejected", error = %err);
                ImportOutcome {
                    ok: false,
                    imported: 0,
                    error: Some(err),
                }
            }
        }
    }

    pub fn export_json(&self) -> String {
        let state = self.lock_state();
        serde_json::to_string_pretty(&state.tasks).unwrap_or_else(|err| {
            tracing::warn!(event = "tasks_exported", status = "failed", error = %err);
            "[]".to_string()
        })
    }

    /// Replaces the list with the backend's copy when it answers with a valid list.
    pub async fn load_from_backend(&self) -> LoadOutcome {
        let failed = LoadOutcome {
            ok: false,
            loaded: 0,
        };

        let tasks = match self.bridge.call(&BackendCommand::GetTasks).await {
            Some(value @ Value::Array(_)) => match serde_json::from_value::<Vec<Task>>(value) {
                Ok(tasks) => tasks,
                Err(err) => {
                    tracing::warn!(event = "backend_load", status = "malformed", error = %err);
                    return failed;
                }
            },
            Some(_) => {
                tracing::warn!(event = "backend_load", status = "malformed");
                return failed;
            }
            None => return failed,
        };

        if let Err(err) = validate_tasks(&tasks) {
            tracing::warn!(event = "backend_load", status = "invalid", error = %err);
            return failed;
        }

        let loaded = tasks.len();
        self.replace_all(tasks);
        tracing::info!(event = "backend_load", status = "ok", count = loaded);
        LoadOutcome { ok: true, loaded }
    }

    /// Sends the whole list to the backend. True only when the backend acknowledged it.
    pub async fn push_to_backend(&self) -> bool {
        let command = BackendCommand::ReplaceAllTasks(self.tasks());
        self.bridge.call(&command).await.is_some()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock_state().tasks.clone()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.lock_state()
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_state().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn task_counts(&self) -> TaskCounts {
        self.lock_state().views.counts
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.lock_state().views.pending.clone()
    }

    pub fn remote_available(&self) -> bool {
        self.bridge.is_available()
    }

    pub fn remote_failures(&self) -> usize {
        self.bridge.failures()
    }

    /// Writes the current list now, dropping any pending debounced write.
    pub fn flush(&self) {
        let Some(storage) = self.storage.as_deref() else {
            return;
        };
        self.persist.cancel();
        write_slot(storage, &self.tasks());
    }

    /// Waits until every mirrored call issued so far has finished.
    pub async fn settle(&self) {
        let (done, finished) = oneshot::channel();
        let queued = match self.lock_mirror_queue().as_ref() {
            Some(queue) => queue.send(MirrorJob::Settle(done)).is_ok(),
            None => false,
        };
        if queued {
            let _ = finished.await;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_mirror_queue(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<MirrorJob>>> {
        self.mirror_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `mutate`; `None` from it means nothing changed and nothing is emitted.
    fn commit<R>(&self, mutate: impl FnOnce(&mut Vec<Task>) -> Option<R>) -> Option<R> {
        let (result, snapshot) = {
            let mut state = self.lock_state();
            let result = mutate(&mut state.tasks)?;
            state.views = DerivedViews::compute(&state.tasks);
            (result, state.tasks.clone())
        };

        self.observers.notify(&snapshot);
        self.schedule_persist(snapshot);
        Some(result)
    }

    fn replace_all(&self, tasks: Vec<Task>) {
        self.commit(move |current| {
            *current = tasks;
            Some(())
        });
    }

    fn schedule_persist(&self, snapshot: Vec<Task>) {
        let Some(storage) = self.storage.clone() else {
            return;
        };
        tracing::debug!(
            event = "persist_scheduled",
            delay_ms = self.persist.delay().as_millis() as u64
        );
        self.persist
            .schedule(move || write_slot(storage.as_ref(), &snapshot));
    }

    /// Queues `command` behind every earlier one. A single worker drains the
    /// queue, so the backend sees mutations in the order they were applied.
    fn mirror(&self, command: BackendCommand) {
        if !self.bridge.is_available() {
            return;
        }

        let mut queue = self.lock_mirror_queue();
        let job = match queue.as_ref() {
            Some(sender) => match sender.send(MirrorJob::Call(command)) {
                Ok(()) => return,
                // worker's runtime is gone; start a new one below
                Err(mpsc::error::SendError(job)) => job,
            },
            None => MirrorJob::Call(command),
        };

        let Ok(handle) = Handle::try_current() else {
            if let MirrorJob::Call(command) = &job {
                tracing::debug!(
                    event = "remote_call",
                    command = command.name(),
                    status = "skipped",
                    "no async runtime"
                );
            }
            *queue = None;
            return;
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(drain_mirror_queue(self.bridge.clone(), receiver));
        if sender.send(job).is_ok() {
            *queue = Some(sender);
        }
    }
}

async fn drain_mirror_queue(bridge: RemoteBridge, mut jobs: mpsc::UnboundedReceiver<MirrorJob>) {
    while let Some(job) = jobs.recv().await {
        match job {
            MirrorJob::Call(command) => {
                bridge.call(&command).await;
            }
            MirrorJob::Settle(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn initial_tasks(storage: &dyn KeyValueStore) -> Vec<Task> {
    match storage::load_tasks(storage) {
        Ok(Some(tasks)) => tasks,
        Ok(None) => default_seed(),
        Err(err) => {
            tracing::warn!(
                event = "tasks_load",
                status = "fallback",
                error = %err,
                "stored tasks unreadable, using default seed"
            );
            default_seed()
        }
    }
}

fn write_slot(storage: &dyn KeyValueStore, tasks: &[Task]) {
    match storage::save_tasks(storage, tasks) {
        Ok(()) => tracing::debug!(event = "tasks_persisted", count = tasks.len()),
        Err(err) => tracing::warn!(event = "tasks_persisted", status = "failed", error = %err),
    }
}
