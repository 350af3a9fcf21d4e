use clap::{Args, Parser, Subcommand};
use kanban_core::config::ConfigOverrides;
use kanban_core::model::{NewTask, Subtask, TaskPatch};
use kanban_core::task_api::TaskQuery;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Personal kanban board", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Database file to use instead of the configured one
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: kanban add "Write report" --priority High --project Work
    Add {
        title: Option<String>,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        project: Option<String>,
        /// Deadline (YYYY-MM-DD, YYYY-MM-DD HH:MM or RFC3339); defaults to one day from now
        #[arg(long)]
        deadline: Option<String>,
        /// Checklist item, repeatable
        #[arg(long = "subtask", value_name = "TEXT")]
        subtasks: Vec<String>,
    },
    /// Show details of a task
    ///
    /// Example: kanban show 1
    Show { id: i64 },
    /// List tasks, newest first
    ///
    /// Example: kanban list --project QA --search report
    List(ListArgs),
    /// Show tasks grouped by column
    ///
    /// Example: kanban board --archived
    Board(ListArgs),
    /// Move a task to a workflow column
    ///
    /// Example: kanban move 1 "In Progress"
    Move { id: i64, to: String },
    /// Move a task one column to the left
    ///
    /// Example: kanban left 1
    Left { id: i64 },
    /// Move a task one column to the right
    ///
    /// Example: kanban right 1
    Right { id: i64 },
    /// Update fields of a task
    ///
    /// Example: kanban update 1 --title "New title" --priority Low
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Archive a task
    ///
    /// Example: kanban archive 1
    Archive { id: i64 },
    /// Bring an archived task back to Backlog
    ///
    /// Example: kanban unarchive 1
    Unarchive { id: i64 },
    /// Delete a task
    ///
    /// Example: kanban delete 1
    Delete { id: i64 },
    /// List project names
    ///
    /// Example: kanban projects
    Projects,
    /// Serve the REST API
    ///
    /// Example: kanban serve --listen 127.0.0.1:8502
    Serve {
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Include archived tasks
    #[arg(long)]
    pub archived: bool,
    #[arg(long)]
    pub project: Option<String>,
    /// Case-insensitive match on title or description
    #[arg(short, long)]
    pub search: Option<String>,
}

impl From<ListArgs> for TaskQuery {
    fn from(args: ListArgs) -> Self {
        TaskQuery {
            include_archived: args.archived,
            project: args.project,
            search: args.search,
        }
    }
}

impl Command {
    /// Key under which repeated interactive invocations are debounced. Read-only commands
    /// are never debounced.
    pub fn debounce_key(&self) -> Option<String> {
        match self {
            Command::Add { title, .. } => Some(format!("add-{}", title.as_deref().unwrap_or(""))),
            Command::Move { id, to } => Some(format!("move-{id}-{to}")),
            Command::Left { id } => Some(format!("left-{id}")),
            Command::Right { id } => Some(format!("right-{id}")),
            Command::Archive { id } => Some(format!("archive-{id}")),
            Command::Unarchive { id } => Some(format!("unarchive-{id}")),
            Command::Delete { id } => Some(format!("delete-{id}")),
            _ => None,
        }
    }
}

pub fn new_task_from_args(
    title: String,
    description: String,
    column: Option<String>,
    priority: Option<String>,
    project: Option<String>,
    deadline: Option<String>,
    subtasks: Vec<String>,
) -> NewTask {
    let subtasks = if subtasks.is_empty() {
        None
    } else {
        Some(
            subtasks
                .into_iter()
                .map(|text| Subtask {
                    text,
                    completed: false,
                })
                .collect(),
        )
    };

    NewTask {
        title,
        description,
        column,
        priority,
        project,
        date_added: None,
        deadline,
        subtasks,
    }
}

pub fn patch_from_args(
    title: Option<String>,
    description: Option<String>,
    column: Option<String>,
    priority: Option<String>,
    project: Option<String>,
    deadline: Option<String>,
) -> TaskPatch {
    TaskPatch {
        title,
        description,
        column,
        priority,
        project,
        deadline,
        subtasks: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    DbPath,
    Listen,
    DebounceMs,
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

    let value = value_raw.trim().to_string();
    let field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "db_path" | "db" | "database" => ConfigOverrideTarget::DbPath,
        "listen" | "address" => ConfigOverrideTarget::Listen,
        "debounce_ms" | "debounce" => ConfigOverrideTarget::DebounceMs,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("override value for '{field}' cannot be empty"));
    }

    Ok(ParsedConfigOverride { target, value })
}

/// Folds parsed overrides into a [`ConfigOverrides`], later entries winning.
pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)?;
        match parsed.target {
            ConfigOverrideTarget::DbPath => overrides.db_path = Some(PathBuf::from(parsed.value)),
            ConfigOverrideTarget::Listen => overrides.listen = Some(parsed.value),
            ConfigOverrideTarget::DebounceMs => {
                let millis = parsed
                    .value
                    .parse::<u64>()
                    .map_err(|_| format!("debounce_ms must be a whole number, got '{}'", parsed.value))?;
                overrides.debounce_ms = Some(millis);
            }
        }
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, ConfigOverrideTarget, collect_overrides, parse_config_override};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" DB-Path = /tmp/board.db ").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::DbPath);
        assert_eq!(parsed.value, "/tmp/board.db");
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("theme=noir").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("listen").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn parse_config_override_rejects_empty_value() {
        let err = parse_config_override("listen= ").unwrap_err();
        assert!(err.contains("cannot be empty"));
    }

    #[test]
    fn collect_overrides_parses_debounce() {
        let overrides = collect_overrides(&[
            "debounce_ms=250".to_string(),
            "db_path=a.db".to_string(),
            "db_path=b.db".to_string(),
        ])
        .unwrap();

        assert_eq!(overrides.debounce_ms, Some(250));
        assert_eq!(overrides.db_path, Some(PathBuf::from("b.db")));
        assert!(collect_overrides(&["debounce=soon".to_string()]).is_err());
    }

    #[test]
    fn mutating_commands_have_debounce_keys() {
        let cli = Cli::try_parse_from(["kanban", "right", "4"]).unwrap();
        assert_eq!(cli.command.debounce_key().as_deref(), Some("right-4"));

        let cli = Cli::try_parse_from(["kanban", "list", "--archived"]).unwrap();
        assert!(cli.command.debounce_key().is_none());
        assert!(matches!(cli.command, Command::List(ref args) if args.archived));
    }
}
