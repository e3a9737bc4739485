use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskapp_core::config::{ConfigOverrides, canonical_key};
use taskapp_core::error::AppError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: taskapp add "Buy milk" --category groceries
    Add {
        title: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// HTML body stored with the task
        #[arg(long)]
        content: Option<String>,
    },
    /// Flip a task between pending and done
    ///
    /// Example: taskapp toggle 3f1c...
    Toggle { id: String },
    /// Change fields of a task
    ///
    /// Example: taskapp update 3f1c... --title "Buy oat milk" --done true
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        done: Option<bool>,
    },
    /// Remove a task
    ///
    /// Example: taskapp remove 3f1c...
    Remove { id: String },
    /// List tasks, newest first
    ///
    /// Example: taskapp list --pending
    List {
        /// Only tasks that are not done
        #[arg(long)]
        pending: bool,
    },
    /// Show total, completed and pending counts
    Stats,
    /// Replace all tasks with the starter set
    Reset,
    /// Print all tasks as JSON
    ///
    /// Example: taskapp export --output tasks.json
    Export {
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Replace all tasks with the JSON array in FILE
    ///
    /// Example: taskapp import tasks.json
    Import { file: PathBuf },
    /// Replace local tasks with the backend's copy
    Pull,
    /// Replace the backend's copy with local tasks
    Push,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    DataDir,
    BackendDb,
    DebounceMs,
    RemoteTimeoutMs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let key = canonical_key(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;
    let value = value_raw.trim().to_string();
    if value.is_empty() {
        return Err(format!("override '{key}' needs a value"));
    }

    let target = match key.as_str() {
        "data_dir" => ConfigOverrideTarget::DataDir,
        "backend_db" => ConfigOverrideTarget::BackendDb,
        "debounce_ms" => ConfigOverrideTarget::DebounceMs,
        "remote_timeout_ms" => ConfigOverrideTarget::RemoteTimeoutMs,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride { target, value })
}

pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();

    for entry in raw {
        let parsed = parse_config_override(entry).map_err(AppError::invalid_input)?;
        match parsed.target {
            ConfigOverrideTarget::DataDir => overrides.data_dir = Some(parsed.value.into()),
            ConfigOverrideTarget::BackendDb => overrides.backend_db = Some(parsed.value.into()),
            ConfigOverrideTarget::DebounceMs => {
                overrides.debounce_ms = Some(parse_millis("debounce_ms", &parsed.value)?)
            }
            ConfigOverrideTarget::RemoteTimeoutMs => {
                overrides.remote_timeout_ms = Some(parse_millis("remote_timeout_ms", &parsed.value)?)
            }
        }
    }

    Ok(overrides)
}

fn parse_millis(key: &str, value: &str) -> Result<u64, AppError> {
    value
        .parse()
        .map_err(|_| AppError::invalid_input(format!("{key} must be a whole number of milliseconds")))
}
