use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io::{self, BufRead};
use taskapp_cli::cli::{Cli, Command, collect_overrides};
use taskapp_core::config::{load_config_with_fallback, merge_overrides};
use taskapp_core::error::AppError;
use taskapp_core::model::{NewTask, Task, TaskPatch};
use taskapp_core::{StoreOptions, TaskStore};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    // Opt-in via RUST_LOG; invalid or oversized filters are ignored.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn status_label(task: &Task) -> &'static str {
    if task.done { "done" } else { "pending" }
}

fn print_tasks_plain(tasks: &[Task]) {
    for task in tasks {
        let category = task.category.as_deref().unwrap_or("-");
        println!(
            "{} | {} | {} | {} | {}",
            task.id,
            task.title,
            status_label(task),
            category,
            task.created_at
        );
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn print_task(cli_json: bool, verb: &str, task: &Task) -> Result<(), AppError> {
    if cli_json {
        print_json(task)
    } else {
        println!("{verb} task: {} ({})", task.title, task.id);
        Ok(())
    }
}

fn print_missing(cli_json: bool, id: &str) -> Result<(), AppError> {
    if cli_json {
        print_json(&serde_json::Value::Null)
    } else {
        println!("No task with id {id}");
        Ok(())
    }
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn open_store(raw_overrides: &[String]) -> Result<TaskStore, AppError> {
    let loaded = load_config_with_fallback();
    if let Some(err) = loaded.error.as_ref() {
        tracing::warn!(event = "config_load", status = "fallback", error = %err);
    }

    let overrides = collect_overrides(raw_overrides)?;
    let config = merge_overrides(&loaded.config, &overrides);
    Ok(TaskStore::new(StoreOptions::from_config(&config)))
}

async fn run_command(store: &TaskStore, cli: Cli) -> Result<(), AppError> {
    let json = cli.json;
    match cli.command {
        Command::Add {
            title,
            category,
            content,
        } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("title is required")),
            };

            let task = store.add(NewTask {
                title,
                category,
                content,
            })?;
            print_task(json, "Added", &task)?;
        }
        Command::Toggle { id } => match store.toggle(&id) {
            Some(task) => {
                let verb = if task.done { "Completed" } else { "Reopened" };
                print_task(json, verb, &task)?;
            }
            None => print_missing(json, &id)?,
        },
        Command::Update {
            id,
            title,
            category,
            content,
            done,
        } => {
            let patch = TaskPatch {
                title,
                category,
                content,
                done,
            };
            if patch.is_empty() {
                return Err(AppError::invalid_input("nothing to update"));
            }
            match store.update_task(&id, patch)? {
                Some(task) => print_task(json, "Updated", &task)?,
                None => print_missing(json, &id)?,
            }
        }
        Command::Remove { id } => match store.remove(&id) {
            Some(task) => print_task(json, "Removed", &task)?,
            None => print_missing(json, &id)?,
        },
        Command::List { pending } => {
            let tasks = if pending {
                store.pending_tasks()
            } else {
                store.tasks()
            };
            if json {
                print_json(&tasks)?;
            } else {
                print_tasks_plain(&tasks);
            }
        }
        Command::Stats => {
            let counts = store.task_counts();
            if json {
                print_json(&counts)?;
            } else {
                println!(
                    "total: {} | completed: {} | pending: {}",
                    counts.total, counts.completed, counts.pending
                );
            }
        }
        Command::Reset => {
            store.reset();
            if json {
                print_json(&store.tasks())?;
            } else {
                println!("Reset to {} starter tasks", store.len());
            }
        }
        Command::Export { output } => {
            let exported = store.export_json();
            match output {
                Some(path) => {
                    std::fs::write(&path, &exported)
                        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
                    if !json {
                        println!("Exported {} tasks to {}", store.len(), path.display());
                    }
                }
                None => println!("{exported}"),
            }
        }
        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|err| AppError::io(format!("{}: {}", file.display(), err)))?;
            let outcome = store.import_json(&text);
            if let Some(err) = outcome.error {
                return Err(err);
            }
            if json {
                print_json(&serde_json::json!({ "imported": outcome.imported }))?;
            } else {
                println!("Imported {} tasks", outcome.imported);
            }
        }
        Command::Pull => {
            let outcome = store.load_from_backend().await;
            if json {
                print_json(&serde_json::json!({ "ok": outcome.ok, "loaded": outcome.loaded }))?;
            } else if outcome.ok {
                println!("Loaded {} tasks from backend", outcome.loaded);
            } else {
                println!("Backend unavailable, keeping {} local tasks", store.len());
            }
        }
        Command::Push => {
            let ok = store.push_to_backend().await;
            if json {
                print_json(&serde_json::json!({ "ok": ok }))?;
            } else if ok {
                println!("Sent {} tasks to backend", store.len());
            } else {
                println!("Backend unavailable, nothing sent");
            }
        }
    }

    Ok(())
}

async fn run_interactive(store: &TaskStore) -> Result<(), AppError> {
    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("taskapp".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = run_command(store, cli).await {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

async fn shutdown(store: &TaskStore) {
    store.flush();
    store.settle().await;
}

#[tokio::main]
async fn main() {
    init_tracing();

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        let store = match open_store(&[]) {
            Ok(store) => store,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                std::process::exit(1);
            }
        };
        let result = run_interactive(&store).await;
        shutdown(&store).await;
        if let Err(err) = result {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    let store = match open_store(&cli.config_override) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
    };

    let result = run_command(&store, cli).await;
    shutdown(&store).await;
    if let Err(err) = result {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
