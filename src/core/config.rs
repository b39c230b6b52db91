//! Configuration management for execdoc.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::env_state::DEFAULT_STATE_FILE;
use crate::environment::Environment;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Command execution settings
    pub execution: ExecutionConfig,

    /// Driver policies
    pub policy: PolicyConfig,

    /// UI/TUI settings
    pub ui: UiConfig,

    /// Keybinding overrides for the interactive mode
    pub keys: KeyConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Environment the scenarios run in
    pub environment: Environment,

    /// Log filter directive (e.g. "debug", "execdoc=trace")
    pub log_level: String,

    /// File to write logs to instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

/// Command execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Path of the persisted environment state file
    pub state_file: PathBuf,

    /// Pass the caller's environment to every command
    pub inherit_environment: bool,

    /// Append executed commands to `~/.bash_history`
    pub write_history: bool,

    /// Spinner refresh interval for `execute`, in milliseconds
    pub spinner_refresh_ms: u64,
}

/// Policies applied by the gated drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Refuse to run a block unless the previous block succeeded
    pub require_previous_success: bool,

    /// Emit a succeeded status before a final remote login command
    pub report_before_remote_login: bool,
}

/// UI/TUI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Color theme name (built-in: default, high-contrast)
    pub theme: String,

    /// Event loop tick rate in milliseconds
    pub tick_rate_ms: u64,
}

/// Keybindings for the interactive mode. Each value is a single character.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Execute the current block (default: "e")
    pub execute: String,

    /// Execute all remaining blocks (default: "a")
    pub execute_all: String,

    /// Start a numeric count, then execute that many blocks (default: "m")
    pub execute_many: String,

    /// Stop auto-advancing (default: "p")
    pub pause: String,

    /// Quit (default: "q")
    pub quit: String,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// Priority:
    /// 1. `.execdoc.toml` in the current directory
    /// 2. `~/.config/execdoc/config.toml`
    /// 3. Defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".execdoc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(global_config) = Self::global_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Path of the global config file.
    pub fn global_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("execdoc"))
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { environment: Environment::Local, log_level: "warn".to_string(), log_file: None }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            inherit_environment: true,
            write_history: false,
            spinner_refresh_ms: 100,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { require_previous_success: true, report_before_remote_login: true }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { theme: "default".to_string(), tick_rate_ms: 100 }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            execute: "e".to_string(),
            execute_all: "a".to_string(),
            execute_many: "m".to_string(),
            pause: "p".to_string(),
            quit: "q".to_string(),
        }
    }
}
