use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(alias = "created_at")]
    pub created_at: String,
}

/// Input accepted by `TaskStore::add`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default, alias = "description")]
    pub category: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl NewTask {
    pub fn titled<T: Into<String>>(title: T) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update merged into an existing task.
///
/// `id` and `createdAt` have no field here, so an update can never rewrite them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.category.is_none() && self.content.is_none() && self.done.is_none()
    }

    /// Trims a replacement title; a blank one is rejected like it is on `add`.
    pub(crate) fn normalized(mut self) -> Result<Self, AppError> {
        if let Some(title) = self.title.as_mut() {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(AppError::invalid_input("title is required"));
            }
            *title = trimmed.to_string();
        }
        Ok(self)
    }

    pub(crate) fn apply_to(&self, task: &mut Task) {
        if let Some(title) = self.title.as_ref() {
            task.title = title.clone();
        }
        if let Some(category) = self.category.as_ref() {
            task.category = Some(category.clone());
        }
        if let Some(content) = self.content.as_ref() {
            task.content = Some(content.clone());
        }
        if let Some(done) = self.done {
            task.done = done;
        }
    }
}

impl Task {
    pub(crate) fn create(input: NewTask) -> Result<Self, AppError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_input("title is required"));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            category: input.category,
            content: input.content,
            done: false,
            created_at: now_rfc3339()?,
        })
    }
}

pub fn now_rfc3339() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Tasks shown on first run and after `reset`. Every call mints fresh ids.
pub fn default_seed() -> Vec<Task> {
    let created_at = now_rfc3339().unwrap_or_default();
    let seed = [
        (
            "Buy milk",
            "Whole or skimmed",
            "<p>Buy 1 litre of milk</p>",
            false,
        ),
        (
            "Send report",
            "Attach CSV",
            "<ul><li>Item 1</li><li>Item 2</li></ul>",
            true,
        ),
    ];

    seed.into_iter()
        .map(|(title, category, content, done)| Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            category: Some(category.to_string()),
            content: Some(content.to_string()),
            done,
            created_at: created_at.clone(),
        })
        .collect()
}

/// Parses a JSON array of tasks and rejects the whole list if any entry is malformed.
pub fn parse_task_list(text: &str) -> Result<Vec<Task>, AppError> {
    let tasks: Vec<Task> = serde_json::from_str(text)?;
    validate_tasks(&tasks)?;
    Ok(tasks)
}

pub fn validate_tasks(tasks: &[Task]) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for (index, task) in tasks.iter().enumerate() {
        if task.id.trim().is_empty() {
            return Err(AppError::invalid_data(format!("task #{index} has no id")));
        }
        if task.title.trim().is_empty() {
            return Err(AppError::invalid_data(format!(
                "task {} has no title",
                task.id
            )));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(AppError::invalid_data(format!(
                "duplicate task id {}",
                task.id
            )));
        }
    }
    Ok(())
}
