use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "task_tracker";
const CONFIG_FILE_NAME: &str = "config.json";
const STORE_FILE_NAME: &str = "tasks.json";
const CONFIG_ENV_VAR: &str = "TASK_TRACKER_CONFIG_PATH";
pub const STORE_ENV_VAR: &str = "TASK_TRACKER_STORE_PATH";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store_path: Option<String>,
    #[serde(default)]
    pub sort_by_due_date: bool,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub store_path: Option<String>,
    pub sort_by_due_date: Option<bool>,
}

fn app_dir() -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Some(path) = non_blank_env(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    Ok(app_dir()?.join(CONFIG_FILE_NAME))
}

pub fn default_store_path() -> Result<PathBuf, AppError> {
    Ok(app_dir()?.join(STORE_FILE_NAME))
}

/// Picks the backing file: explicit path, then `TASK_TRACKER_STORE_PATH`,
/// then the config's `store_path`, then the per-user default.
pub fn resolve_store_path(explicit: Option<&Path>, config: &Config) -> Result<PathBuf, AppError> {
    resolve_store_path_with(explicit, non_blank_env(STORE_ENV_VAR), config)
}

fn resolve_store_path_with(
    explicit: Option<&Path>,
    env_value: Option<String>,
    config: &Config,
) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = env_value {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = config.store_path.as_deref()
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    default_store_path()
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(store_path) = overrides.store_path.as_ref() {
        merged.store_path = Some(store_path.clone());
    }
    if let Some(sort_by_due_date) = overrides.sort_by_due_date {
        merged.sort_by_due_date = sort_by_due_date;
    }
    merged
}
