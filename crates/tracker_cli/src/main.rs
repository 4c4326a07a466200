use clap::{CommandFactory, Parser};
use std::io::{self, IsTerminal, Write};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::Date;
use tracing_subscriber::EnvFilter;
use tracker_cli::cli::{Cli, Command, apply_config_override};
use tracker_core::TaskManager;
use tracker_core::config::{self, Config, ConfigOverrides};
use tracker_core::error::AppError;
use tracker_core::model::{Task, TaskStatus};

const LOG_ENV_VAR: &str = "TASK_TRACKER_LOG";

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl TaskRow {
    fn new(task: &Task, today: Date) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            status: status_text(task, today),
            due: task.due_date.clone().unwrap_or_else(|| "-".to_string()),
            created: task.created_at.clone(),
        }
    }
}

fn status_text(task: &Task, today: Date) -> String {
    if task.is_overdue(today) {
        format!("{} (overdue)", task.status.label())
    } else {
        task.status.label().to_string()
    }
}

fn task_json(task: &Task, today: Date) -> serde_json::Value {
    serde_json::json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "status": task.status,
        "created_at": task.created_at,
        "due_date": task.due_date,
        "completed_at": task.completed_at,
        "overdue": task.is_overdue(today),
    })
}

fn print_tasks_plain(tasks: &[Task], today: Date) {
    if tasks.is_empty() {
        println!("No tasks found. Add some tasks to get started!");
        return;
    }

    let rows: Vec<TaskRow> = tasks.iter().map(|task| TaskRow::new(task, today)).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
}

fn print_task_details(task: &Task, today: Date) {
    println!("Task ID: {}", task.id);
    println!("  Title: {}", task.title);
    if !task.description.is_empty() {
        println!("  Description: {}", task.description);
    }
    println!("  Status: {}", status_text(task, today));
    println!("  Created: {}", task.created_at);
    if let Some(due_date) = task.due_date.as_deref() {
        println!("  Due Date: {due_date}");
    }
    if let Some(completed_at) = task.completed_at.as_deref() {
        println!("  Completed: {completed_at}");
    }
}

fn not_found(id: u64) -> AppError {
    AppError::invalid_input(format!("task {id} not found"))
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

fn confirm(prompt: &str) -> Result<bool, AppError> {
    print!("{prompt} Type 'yes' to confirm: ");
    io::stdout()
        .flush()
        .map_err(|err| AppError::io(err.to_string()))?;

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .map_err(|err| AppError::io(err.to_string()))?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn warn_if_unsaved(manager: &TaskManager) {
    if let Some(err) = manager.last_persist_error() {
        eprintln!("WARNING: changes were not saved: {}", err);
    }
}

fn run_command(
    manager: &mut TaskManager,
    config: &Config,
    command: Command,
    json: bool,
) -> Result<(), AppError> {
    let today = manager.today();

    match command {
        Command::Add {
            title,
            description,
            due,
        } => {
            let task = manager.add(&title, &description, &due)?;
            if json {
                println!("{}", task_json(&task, today));
            } else {
                println!("Added task: {} ({})", task.title, task.id);
            }
            warn_if_unsaved(manager);
        }
        Command::List { sort_due } => {
            let tasks = manager.list(sort_due || config.sort_by_due_date);
            if json {
                let payload: Vec<_> = tasks.iter().map(|task| task_json(task, today)).collect();
                println!("{}", serde_json::Value::Array(payload));
            } else {
                print_tasks_plain(&tasks, today);
            }
        }
        Command::Show { id } => {
            let task = manager.get_by_id(id).ok_or_else(|| not_found(id))?;
            if json {
                println!("{}", task_json(task, today));
            } else {
                print_task_details(task, today);
            }
        }
        Command::Done { id } => {
            let task = manager.get_by_id(id).cloned().ok_or_else(|| not_found(id))?;
            if task.status == TaskStatus::Completed {
                if json {
                    println!("{}", task_json(&task, today));
                } else {
                    println!("Task '{}' is already completed.", task.title);
                }
                return Ok(());
            }

            if !manager.complete(id)? {
                return Err(not_found(id));
            }
            let task = manager.get_by_id(id).ok_or_else(|| not_found(id))?;
            if json {
                println!("{}", task_json(task, today));
            } else {
                println!("Completed task: {} ({})", task.title, task.id);
            }
            warn_if_unsaved(manager);
        }
        Command::Delete { id, yes } => {
            let task = manager.get_by_id(id).cloned().ok_or_else(|| not_found(id))?;
            let prompt = format!("Delete task '{}'?", task.title);
            if !yes && !confirm(&prompt)? {
                println!("Task deletion cancelled.");
                return Ok(());
            }

            if !manager.delete(id) {
                return Err(not_found(id));
            }
            if json {
                println!("{}", task_json(&task, today));
            } else {
                println!("Deleted task: {} ({})", task.title, task.id);
            }
            warn_if_unsaved(manager);
        }
        Command::Stats => {
            let stats = manager.stats();
            let completion_rate = stats.completion_rate();
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "total": stats.total,
                        "completed": stats.completed,
                        "pending": stats.pending,
                        "overdue": stats.overdue,
                        "completion_rate": completion_rate,
                    })
                );
            } else {
                println!("Total tasks: {}", stats.total);
                println!("Completed: {}", stats.completed);
                println!("Pending: {}", stats.pending);
                println!("Overdue: {}", stats.overdue);
                if let Some(rate) = completion_rate {
                    println!("Completion rate: {rate:.1}%");
                }
            }
        }
        Command::Backup => {
            let path = manager.backup()?;
            if json {
                println!("{}", serde_json::json!({ "backup_path": path.display().to_string() }));
            } else {
                println!("Backup written to {}", path.display());
            }
        }
    }

    Ok(())
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

fn run_interactive_line(
    manager: &mut TaskManager,
    config: &Config,
    line: &str,
) -> Result<(), AppError> {
    let args = split_command_line(line)?;
    if args.is_empty() {
        return Ok(());
    }

    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push("task_tracker".to_string());
    argv.extend(args);

    let cli = Cli::try_parse_from(argv).map_err(normalize_parse_error)?;
    if cli.store.is_some() || !cli.config_override.is_empty() {
        return Err(AppError::invalid_input(
            "--store and --config-override are only accepted when starting the shell",
        ));
    }

    match cli.command {
        Some(command) => run_command(manager, config, command, cli.json),
        None => Ok(()),
    }
}

fn run_interactive(manager: &mut TaskManager, config: &Config) -> Result<(), AppError> {
    let stdin = io::stdin();
    let prompt = stdin.is_terminal();
    if prompt {
        println!("Task tracker: {}", manager.store_path().display());
        println!("Type 'help' for commands, 'exit' to quit.");
    }

    let mut input = String::new();
    loop {
        if prompt {
            print!("> ");
            io::stdout()
                .flush()
                .map_err(|err| AppError::io(err.to_string()))?;
        }

        input.clear();
        let bytes = stdin
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

        if let Err(err) = run_interactive_line(manager, config, line) {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, AppError> {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error {
        eprintln!("WARNING: ignoring config: {}", err);
    }

    let mut overrides = ConfigOverrides::default();
    for raw in &cli.config_override {
        apply_config_override(&mut overrides, raw).map_err(AppError::invalid_input)?;
    }

    Ok(config::merge_overrides(&loaded.config, &overrides))
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;
    let store_path = config::resolve_store_path(cli.store.as_deref(), &config)?;
    tracing::debug!(path = %store_path.display(), "opening task store");
    let mut manager = TaskManager::open(store_path);

    match cli.command {
        Some(command) => run_command(&mut manager, &config, command, cli.json),
        None => run_interactive(&mut manager, &config),
    }
}

fn main() {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::split_command_line;

    #[test]
    fn split_command_line_honours_quotes() {
        let args = split_command_line(r#"add "Buy milk" --due 2025-07-01"#).unwrap();
        assert_eq!(args, vec!["add", "Buy milk", "--due", "2025-07-01"]);
    }

    #[test]
    fn split_command_line_keeps_escaped_quotes() {
        let args = split_command_line(r#"add "say \"hi\"""#).unwrap();
        assert_eq!(args, vec!["add", r#"say "hi""#]);
    }

    #[test]
    fn split_command_line_rejects_unterminated_quote() {
        let err = split_command_line(r#"add "Buy milk"#).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}
