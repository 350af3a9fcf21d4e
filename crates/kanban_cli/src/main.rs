use clap::{CommandFactory, Parser};
use kanban_cli::cli::{self, Cli, Command};
use kanban_cli::{output, server};
use kanban_core::config::{self, Settings};
use kanban_core::debounce::Debouncer;
use kanban_core::error::AppError;
use kanban_core::model::Direction;
use kanban_core::storage::sqlite_store::TaskStore;
use kanban_core::task_api::{self, StepOutcome};
use serde_json::json;
use std::io::{self, BufRead};
use std::path::Path;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
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

/// Config file, then `KANBAN_DB_PATH`, then `--config-override`, then `--db`.
fn load_settings(db: Option<&Path>, raw_overrides: &[String]) -> Result<Settings, AppError> {
    let load = config::load_config_with_fallback();
    if let Some(err) = load.error.as_ref() {
        warn!(error = %err, "using default configuration");
    }

    let mut overrides = cli::collect_overrides(raw_overrides).map_err(AppError::invalid_input)?;
    if let Some(db) = db {
        overrides.db_path = Some(db.to_path_buf());
    }
    config::merge_overrides(&load.config, &overrides).resolve()
}

fn settings_for(cli: &Cli) -> Result<Settings, AppError> {
    load_settings(cli.db.as_deref(), &cli.config_override)
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

fn print_ack(json: bool, payload: serde_json::Value, message: String) -> Result<(), AppError> {
    if json {
        output::print_json(&payload)
    } else {
        println!("{message}");
        Ok(())
    }
}

fn step(store: &TaskStore, id: i64, direction: Direction, json: bool) -> Result<(), AppError> {
    match task_api::step_task(store, id, direction)? {
        StepOutcome::Moved { from, to } => print_ack(
            json,
            json!({ "moved": true, "from": from, "column": to }),
            format!("Moved task {id} from {from} to {to}"),
        ),
        StepOutcome::NotMoved => print_ack(
            json,
            json!({ "moved": false, "column": null }),
            format!("Task {id} not moved"),
        ),
    }
}

fn run_command(cli: Cli, settings: &Settings) -> Result<(), AppError> {
    if let Command::Serve { listen } = &cli.command {
        let listen = listen.clone().unwrap_or_else(|| settings.listen.clone());
        let store = TaskStore::open(&settings.db_path)?;
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|err| AppError::io(format!("failed to start runtime: {err}")))?;
        return runtime.block_on(server::serve(&listen, store));
    }

    let store = TaskStore::open(&settings.db_path)?;
    debug!(db = %store.path().display(), "store opened");

    match cli.command {
        Command::Add {
            title,
            description,
            column,
            priority,
            project,
            deadline,
            subtasks,
        } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("title is required")),
            };
            let request = cli::new_task_from_args(
                title, description, column, priority, project, deadline, subtasks,
            );
            let id = task_api::create_task(&store, request)?;
            let task = task_api::get_task(&store, id)?;
            if cli.json {
                output::print_json(&task)?;
            } else {
                println!("Added task: {} ({})", task.title, task.id);
            }
        }
        Command::Show { id } => {
            let task = task_api::get_task(&store, id)?;
            if cli.json {
                output::print_json(&task)?;
            } else {
                output::print_task_plain(&task);
            }
        }
        Command::List(args) => {
            let tasks = task_api::list_tasks(&store, &args.into())?;
            if cli.json {
                output::print_json(&tasks)?;
            } else {
                output::print_tasks_plain(&tasks);
            }
        }
        Command::Board(args) => {
            let view = task_api::board(&store, &args.into())?;
            if cli.json {
                output::print_json(&view)?;
            } else {
                output::print_board_plain(&view);
            }
        }
        Command::Move { id, to } => {
            let column = task_api::move_task(&store, id, &to)?;
            print_ack(
                cli.json,
                json!({ "moved": true, "to": column }),
                format!("Moved task {id} to {column}"),
            )?;
        }
        Command::Left { id } => step(&store, id, Direction::Left, cli.json)?,
        Command::Right { id } => step(&store, id, Direction::Right, cli.json)?,
        Command::Update {
            id,
            title,
            description,
            column,
            priority,
            project,
            deadline,
        } => {
            let patch =
                cli::patch_from_args(title, description, column, priority, project, deadline);
            task_api::update_task(&store, id, patch)?;
            print_ack(
                cli.json,
                json!({ "updated": true }),
                format!("Updated task {id}"),
            )?;
        }
        Command::Archive { id } => {
            task_api::archive_task(&store, id)?;
            print_ack(
                cli.json,
                json!({ "archived": true }),
                format!("Archived task {id}"),
            )?;
        }
        Command::Unarchive { id } => {
            task_api::unarchive_task(&store, id)?;
            print_ack(
                cli.json,
                json!({ "unarchived": true }),
                format!("Unarchived task {id}"),
            )?;
        }
        Command::Delete { id } => {
            task_api::delete_task(&store, id)?;
            print_ack(
                cli.json,
                json!({ "deleted": true }),
                format!("Deleted task {id}"),
            )?;
        }
        Command::Projects => {
            let projects = task_api::list_projects(&store)?;
            if cli.json {
                output::print_json(&projects)?;
            } else {
                for project in projects {
                    println!("{project}");
                }
            }
        }
        Command::Serve { .. } => {}
    }

    Ok(())
}

fn run_interactive() -> Result<(), AppError> {
    let mut debouncer = Debouncer::new(load_settings(None, &[])?.debounce);

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
        argv.push("kanban".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if matches!(cli.command, Command::Serve { .. }) {
            eprintln!(
                "ERROR: {}",
                AppError::invalid_input("serve is not available in interactive mode")
            );
            continue;
        }

        if let Some(key) = cli.command.debounce_key()
            && !debouncer.should_fire(&key)
        {
            debug!(key = %key, "debounced repeated command");
            continue;
        }

        let result = settings_for(&cli).and_then(|settings| run_command(cli, &settings));
        if let Err(err) = result {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn main() {
    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        init_tracing("warn");
        if let Err(err) = run_interactive() {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            // --help / --version
            let _ = err.print();
            return;
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    init_tracing(if matches!(cli.command, Command::Serve { .. }) {
        "info"
    } else {
        "warn"
    });

    let result = settings_for(&cli).and_then(|settings| run_command(cli, &settings));
    if let Err(err) = result {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
