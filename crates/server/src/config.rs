//! Application configuration, persisted as JSON.

use std::path::{Path, PathBuf};

use gemma_core::EngineConfig;
use serde::{Deserialize, Serialize};

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Engine library location (overrides the loader search path).
    #[serde(default)]
    pub library_path: Option<PathBuf>,
    /// Model used when the command line does not name one.
    #[serde(default)]
    pub model: Option<EngineConfig>,
    /// Output bound for requests that do not set one, in bytes.
    #[serde(default = "default_max_length")]
    pub default_max_length: usize,
    /// Largest output bound an HTTP client may request, in bytes.
    #[serde(default = "default_max_request_length")]
    pub max_request_length: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_max_length() -> usize {
    gemma_core::DEFAULT_MAX_LENGTH
}
fn default_max_request_length() -> usize {
    1 << 20
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            library_path: None,
            model: None,
            default_max_length: default_max_length(),
            max_request_length: default_max_request_length(),
        }
    }
}

impl AppConfig {
    /// Platform config directory: `~/.config/gemma-server/`
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gemma-server")
    }

    fn config_file() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Load from disk, or return defaults if the file doesn't exist.
    pub fn load_or_default() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_file())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}
