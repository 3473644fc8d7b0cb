//! Client configuration types.
//!
//! The CLI reads and writes `scenewatch.toml` through these types. Every field
//! has a default so a missing or partial file still yields a usable config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "scenewatch.toml";

/// Environment variable that overrides `server.url`.
pub const API_BASE_ENV: &str = "SCENEWATCH_API_BASE_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,

    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config at {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level client configuration (persisted as `scenewatch.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    /// Cadence of the job poll loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Keyframes requested per scene detail.
    #[serde(default = "default_keyframes")]
    pub keyframes: usize,
    /// Page size for snapshot fetches. Unset means "let the server decide".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_limit: Option<u32>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            keyframes: default_keyframes(),
            snapshot_limit: None,
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_poll_interval_ms() -> u64 {
    1500
}
fn default_keyframes() -> usize {
    8
}

/// Replace values that would make the client unusable with their defaults.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut ClientConfig) -> bool {
    let mut changed = false;

    if config.server.url.trim().is_empty() {
        config.server.url = default_server_url();
        changed = true;
    }
    if config.server.timeout_secs == 0 {
        config.server.timeout_secs = default_timeout_secs();
        changed = true;
    }
    if config.sync.poll_interval_ms == 0 {
        config.sync.poll_interval_ms = default_poll_interval_ms();
        changed = true;
    }
    if config.sync.keyframes == 0 {
        config.sync.keyframes = default_keyframes();
        changed = true;
    }

    changed
}

/// Apply environment overrides using `lookup` (normally `std::env::var`).
/// Returns true when any field was updated.
pub fn apply_env_overrides(
    config: &mut ClientConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> bool {
    match lookup(API_BASE_ENV) {
        Some(url) if !url.trim().is_empty() => {
            config.server.url = url.trim().to_string();
            true
        }
        _ => false,
    }
}

/// Get the config directory path (~/.config/scenewatch/)
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config").join("scenewatch"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the config at `path`, returning defaults if the file does not exist.
pub fn load_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: ClientConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    apply_compat_fallbacks(&mut config);
    Ok(config)
}

/// Write `config` to `path`, creating parent directories as needed.
pub fn save_to(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the canonical config and apply environment overrides.
pub fn load() -> Result<ClientConfig, ConfigError> {
    let mut config = load_from(&config_path()?)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}
