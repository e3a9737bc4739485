use crate::model::Task;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl TaskCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|task| task.done).count();
        Self {
            total: tasks.len(),
            completed,
            pending: tasks.len() - completed,
        }
    }
}

pub fn pending_only(tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|task| !task.done).cloned().collect()
}

/// Projections kept in step with the task list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DerivedViews {
    pub counts: TaskCounts,
    pub pending: Vec<Task>,
}

impl DerivedViews {
    pub fn compute(tasks: &[Task]) -> Self {
        Self {
            counts: TaskCounts::from_tasks(tasks),
            pending: pending_only(tasks),
        }
    }
}
