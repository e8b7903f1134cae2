//! Configuration for RobotCLI
//!
//! Settings come from `~/.robotcli/config.toml` when it exists, then from
//! environment variables (after loading `.env` files). Every field has a
//! default so an empty or missing file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RobotError};
use crate::providers::openai::DEFAULT_BASE_URL;

pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are RobotCLI, an advanced System Intelligence Agent. \
You can manage files (create, delete safely, zip), organize folders, monitor system health \
(CPU/RAM, disks, processes), search for large or duplicate files and commit work to git. Always prefer 'safe' delete (trash folder). When asked \
to organize, use the organize tool. Be helpful and precise.";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
const MODEL_ENV: &str = "ROBOTCLI_MODEL";
const BASE_URL_ENV: &str = "ROBOTCLI_BASE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model used when the session starts
    pub model: String,
    /// Chat completions base URL
    pub base_url: String,
    /// API key; usually supplied through the environment instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Timeout for each model request
    pub request_timeout_secs: u64,
    /// Extra attempts for the first model call of a turn
    pub model_retries: u32,
    /// Optional timeout for each tool call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
    /// Fixed first turn of every session
    pub system_prompt: String,
    /// Models offered by `robotcli models` and `/models`
    pub models: Vec<String>,
    /// Base directory for relative tool paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    /// Where safe deletes go; defaults to `~/.robotcli/trash`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout_secs: 120,
            model_retries: 0,
            tool_timeout_secs: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            models: vec![
                "google/gemini-2.0-flash-001".to_string(),
                "google/gemini-pro".to_string(),
                "openai/gpt-4-turbo".to_string(),
                "anthropic/claude-3-opus".to_string(),
            ],
            workspace: None,
            trash_dir: None,
        }
    }
}

impl Config {
    /// RobotCLI's home directory (`~/.robotcli`).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".robotcli")
    }

    pub fn path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load `.env` files, the config file and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();
        let _ = dotenvy::from_path(Self::dir().join(".env"));

        let mut config = Self::load_from_path(&Self::path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from a specific file, falling back to defaults when absent.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RobotError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.trash_dir
            .clone()
            .unwrap_or_else(|| Self::dir().join("trash"))
    }
}
