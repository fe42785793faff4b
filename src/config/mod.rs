use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const GLOBAL_STATE_DIR: &str = ".flowdeck";
pub const GLOBAL_SETTINGS_FILE_NAME: &str = "config.yaml";
pub const API_BASE_ENV_VAR: &str = "FLOWDECK_API_BASE";

const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to resolve home directory for client state root")]
    HomeDirectoryUnavailable,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("api_base `{api_base}` must start with http:// or https://")]
    UnsupportedApiBase { api_base: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// REST base address of the workflow service.
    pub api_base: String,
    /// Overrides the event-channel base derived from `api_base`. Useful when
    /// the service sits behind a proxy that terminates WebSocket upgrades on
    /// a different address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_base: Option<String>,
    #[serde(default = "default_state_root")]
    pub state_root: PathBuf,
}

fn default_state_root() -> PathBuf {
    default_state_root_path().unwrap_or_else(|_| PathBuf::from(GLOBAL_STATE_DIR))
}

pub fn default_state_root_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(GLOBAL_STATE_DIR))
}

pub fn default_global_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_state_root_path()?.join(GLOBAL_SETTINGS_FILE_NAME))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            event_base: None,
            state_root: default_state_root(),
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(ConfigError::UnsupportedApiBase {
                api_base: self.api_base.clone(),
            });
        }
        Ok(())
    }
}

/// Loads settings from the global config file when it exists, falling back to
/// defaults otherwise. `FLOWDECK_API_BASE` overrides the file in either case.
pub fn load_global_settings() -> Result<Settings, ConfigError> {
    let path = default_global_config_path()?;
    let mut settings = if path.exists() {
        Settings::from_path(&path)?
    } else {
        Settings::default()
    };
    if let Some(api_base) = std::env::var(API_BASE_ENV_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
    {
        settings.api_base = api_base;
    }
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(settings: &Settings) -> Result<PathBuf, ConfigError> {
    let path = default_global_config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let body = serde_yaml::to_string(settings).map_err(|source| ConfigError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(&path, body).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}
