use crate::error::AppError;
use crate::model::{Task, TaskPatch};
use crate::remote::RemoteBackend;
use async_trait::async_trait;
use rusqlite::{Connection, Row, params};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex};

const TASK_COLUMNS: &str = "id, title, category, content, done, created_at";

/// Host-side task table served through the backend command set.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                category TEXT,
                content TEXT,
                done INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs one command against the database on the calling thread.
    pub fn dispatch(&self, command: &str, payload: &Value) -> Result<Value, AppError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|err| AppError::backend(format!("lock error: {err}")))?;

        match command {
            "get_tasks" => Ok(serde_json::to_value(load_tasks(&conn)?)?),
            "add_task" => {
                let task: Task = serde_json::from_value(field(payload, "task")?.clone())?;
                insert_task(&conn, &task)?;
                Ok(serde_json::to_value(task)?)
            }
            "toggle_task" => {
                let id = id_field(payload)?;
                conn.execute(
                    "UPDATE tasks SET done = CASE done WHEN 0 THEN 1 ELSE 0 END WHERE id = ?1",
                    params![id],
                )?;
                Ok(find_task(&conn, id)?.map_or(Value::Null, |task| json!(task)))
            }
            "update_task" => {
                let id = id_field(payload)?;
                let patch: TaskPatch = match payload.get("data") {
                    Some(data) => serde_json::from_value(data.clone())?,
                    None => TaskPatch::default(),
                };
                update_task(&conn, id, &patch)?;
                Ok(find_task(&conn, id)?.map_or(Value::Null, |task| json!(task)))
            }
            "remove_task" => {
                let id = id_field(payload)?;
                conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
                Ok(Value::Null)
            }
            "replace_all_tasks" => {
                let tasks: Vec<Task> = serde_json::from_value(field(payload, "tasks")?.clone())?;
                replace_all_tasks(&mut conn, &tasks)?;
                Ok(json!(tasks.len()))
            }
            other => Err(AppError::invalid_input(format!("unknown command {other}"))),
        }
    }
}

#[async_trait]
impl RemoteBackend for SqliteBackend {
    async fn invoke(&self, command: &str, payload: Value) -> Result<Value, AppError> {
        let backend = self.clone();
        let command = command.to_string();
        tokio::task::spawn_blocking(move || backend.dispatch(&command, &payload))
            .await
            .map_err(|err| AppError::backend(err.to_string()))?
    }
}

fn field<'a>(payload: &'a Value, name: &str) -> Result<&'a Value, AppError> {
    payload
        .get(name)
        .ok_or_else(|| AppError::invalid_input(format!("{name} is required")))
}

fn id_field(payload: &Value) -> Result<&str, AppError> {
    field(payload, "id")?
        .as_str()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::invalid_input("id is required"))
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        content: row.get(3)?,
        done: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
    })
}

fn load_tasks(conn: &Connection) -> Result<Vec<Task>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], task_from_row)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

fn find_task(conn: &Connection, id: &str) -> Result<Option<Task>, AppError> {
    let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
    let mut rows = stmt.query_map(params![id], task_from_row)?;
    Ok(rows.next().transpose()?)
}

fn insert_task(conn: &Connection, task: &Task) -> Result<(), AppError> {
    conn.execute(
        &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            task.id,
            task.title,
            task.category,
            task.content,
            task.done as i64,
            task.created_at
        ],
    )?;
    Ok(())
}

fn update_task(conn: &Connection, id: &str, patch: &TaskPatch) -> Result<(), AppError> {
    let mut sets = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(title) = patch.title.as_ref() {
        sets.push("title = ?");
        values.push(Box::new(title.clone()));
    }
    if let Some(category) = patch.category.as_ref() {
        sets.push("category = ?");
        values.push(Box::new(category.clone()));
    }
    if let Some(content) = patch.content.as_ref() {
        sets.push("content = ?");
        values.push(Box::new(content.clone()));
    }
    if let Some(done) = patch.done {
        sets.push("done = ?");
        values.push(Box::new(done as i64));
    }

    if sets.is_empty() {
        return Ok(());
    }

    values.push(Box::new(id.to_string()));
    let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
    let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|value| value.as_ref()).collect();
    conn.execute(&sql, refs.as_slice())?;
    Ok(())
}

fn replace_all_tasks(conn: &mut Connection, tasks: &[Task]) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM tasks", [])?;
    for task in tasks {
        insert_task(&tx, task)?;
    }
    tx.commit()?;
    Ok(())
}
