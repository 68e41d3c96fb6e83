// Configuration loading and parsing (board.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// board.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire board.toml file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub event: EventConfig,
    pub control: ControlConfig,
}

/// Where the roster store lives.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// REST base URL, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// WebSocket change-feed URL, e.g. `wss://rt.example.com`.
    pub realtime_url: String,
    /// Optional API key sent with every request.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Which event this board instance drives.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    pub id: String,
    /// Recorded as `created_by` on picks made from this board.
    #[serde(default)]
    pub actor: Option<String>,
}

/// The local control socket for board UIs.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    pub port: u16,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/board.toml` relative to the
/// given `base_dir`.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    load_from_path(&base_dir.join("config").join("board.toml"))
}

/// Read, parse, and validate a board.toml at an explicit path.
fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working
/// directory, falling back to the per-user config directory
/// (`~/.config/draftboard/board.toml` on Linux) when the local file does
/// not exist.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    if cwd.join("config").join("board.toml").exists() {
        return load_config_from(&cwd);
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "draftboard") {
        let user_path = dirs.config_dir().join("board.toml");
        if user_path.exists() {
            return load_from_path(&user_path);
        }
    }

    Err(ConfigError::FileNotFound {
        path: cwd.join("config").join("board.toml"),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if !config.store.base_url.starts_with("http://") && !config.store.base_url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError {
            field: "store.base_url".into(),
            message: format!(
                "must start with http:// or https://, got `{}`",
                config.store.base_url
            ),
        });
    }

    if !config.store.realtime_url.starts_with("ws://")
        && !config.store.realtime_url.starts_with("wss://")
    {
        return Err(ConfigError::ValidationError {
            field: "store.realtime_url".into(),
            message: format!(
                "must start with ws:// or wss://, got `{}`",
                config.store.realtime_url
            ),
        });
    }

    if config.event.id.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "event.id".into(),
            message: "must not be empty".into(),
        });
    }

    if config.control.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "control.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
