use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::AssetCache;
use crate::executor::{ProcessExecutor, DEFAULT_INTERPRETER, DEFAULT_TIMEOUT_SECS};
use crate::script::DEFAULT_APPLICATION;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskbridgeConfig {
    /// Scriptable application to target, e.g. "OmniFocus".
    pub application: Option<String>,
    /// Interpreter command line; the script is written to its stdin.
    pub interpreter: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Directory whose `<fragment>.applescript` files replace the built-in ones.
    pub asset_dir: Option<String>,
}

impl TaskbridgeConfig {
    pub fn application(&self) -> &str {
        self.application
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_APPLICATION)
    }

    pub fn interpreter(&self) -> &str {
        self.interpreter
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_INTERPRETER)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn build_executor(&self) -> Result<ProcessExecutor, ConfigError> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        ProcessExecutor::from_command_line(self.interpreter(), self.timeout())
            .map_err(|err| ConfigError::Invalid(format!("{:#}", err)))
    }

    pub fn build_assets(&self) -> AssetCache {
        match self.asset_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => AssetCache::with_override_dir(dir),
            _ => AssetCache::embedded(),
        }
    }
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

pub fn resolve_taskbridge_home_dir() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("TASKBRIDGE_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".taskbridge"))
}

pub fn global_config_path() -> Option<PathBuf> {
    resolve_taskbridge_home_dir().map(|home| home.join("config.toml"))
}

pub fn read_config(path: &Path) -> Result<TaskbridgeConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<TaskbridgeConfig>(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// An explicit path must exist. Without one the global file is optional and
/// its absence means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<TaskbridgeConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    match global_config_path() {
        Some(path) if path.is_file() => {
            tracing::debug!(path = %path.display(), "loading config");
            read_config(&path)
        }
        _ => Ok(TaskbridgeConfig::default()),
    }
}
