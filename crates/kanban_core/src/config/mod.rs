use crate::debounce::DEFAULT_WINDOW;
use crate::error::AppError;
use crate::storage::sqlite_store::DB_FILE_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "KANBAN_CONFIG_PATH";
const DB_PATH_ENV_VAR: &str = "KANBAN_DB_PATH";
const APP_DIR_NAME: &str = "kanban";

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8502";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub listen: Option<String>,
    pub debounce_ms: Option<u64>,
}

/// Fully resolved values the binaries run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub listen: String,
    pub debounce: Duration,
}

impl Config {
    pub fn resolve(&self) -> Result<Settings, AppError> {
        let db_path = match self.db_path.as_ref() {
            Some(path) => path.clone(),
            None => app_dir()?.join(DB_FILE_NAME),
        };

        Ok(Settings {
            db_path,
            listen: self
                .listen
                .clone()
                .unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            debounce: self
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_WINDOW),
        })
    }
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

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(app_dir()?.join(CONFIG_FILE_NAME))
}

/// Never fails: a missing file gives defaults, a broken one gives defaults plus the error.
pub fn load_config_with_fallback() -> ConfigLoad {
    let mut load = match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    };
    load.config = apply_env(load.config, env_db_path());
    load
}

fn env_db_path() -> Option<PathBuf> {
    std::env::var(DB_PATH_ENV_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn apply_env(mut config: Config, db_path: Option<PathBuf>) -> Config {
    if db_path.is_some() {
        config.db_path = db_path;
    }
    config
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
    if let Some(db_path) = overrides.db_path.as_ref() {
        merged.db_path = Some(db_path.clone());
    }
    if let Some(listen) = overrides.listen.as_ref() {
        merged.listen = Some(listen.clone());
    }
    if let Some(debounce_ms) = overrides.debounce_ms {
        merged.debounce_ms = Some(debounce_ms);
    }
    merged
}
