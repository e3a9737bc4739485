mod task;

pub use task::{NewTask, Task, TaskPatch, default_seed, now_rfc3339, parse_task_list, validate_tasks};
