use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracker_core::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(author, version, about = "Track tasks in a local JSON file", long_about = None)]
pub struct Cli {
    /// Run one command; omit to start the interactive shell
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Path of the task store (overrides env and config)
    #[arg(long, value_name = "PATH", global = true)]
    pub store: Option<PathBuf>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: task_tracker add "Buy milk" --due 2025-07-01
    Add {
        title: String,
        #[arg(short = 'd', long, default_value = "")]
        description: String,
        /// Due date in YYYY-MM-DD format
        #[arg(long, value_name = "YYYY-MM-DD", default_value = "")]
        due: String,
    },
    /// List all tasks
    ///
    /// Example: task_tracker list --sort-due
    List {
        /// Sort by due date, undated tasks last
        #[arg(long)]
        sort_due: bool,
    },
    /// Show details of a task
    ///
    /// Example: task_tracker show 1
    Show { id: u64 },
    /// Mark a task as completed
    ///
    /// Example: task_tracker done 1
    Done { id: u64 },
    /// Delete a task
    ///
    /// Example: task_tracker delete 1 --yes
    Delete {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show task statistics
    Stats,
    /// Copy the task store to <store>.backup
    Backup,
}

/// Parse a raw `KEY=VALUE` override string and fold it into `overrides`.
pub fn apply_config_override(overrides: &mut ConfigOverrides, raw: &str) -> Result<(), String> {
    let (key_raw, value_raw) = raw
        .trim()
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;
    let value = value_raw.trim();

    let key = canonicalize_flag_name(key_raw)
        .ok_or_else(|| "override key cannot be empty".to_string())?;

    match key.as_str() {
        "store_path" | "store" => {
            if value.is_empty() {
                return Err("store_path override cannot be empty".to_string());
            }
            overrides.store_path = Some(value.to_string());
        }
        "sort_by_due_date" | "sort_due" => {
            let parsed = match value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => true,
                "false" | "no" | "0" | "off" => false,
                other => return Err(format!("'{other}' is not a boolean")),
            };
            overrides.sort_by_due_date = Some(parsed);
        }
        other => return Err(format!("unknown config field '{other}'")),
    }

    Ok(())
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
