//! Configuration loading
//!
//! Settings come from an optional TOML file; command-line flags override
//! them.

use anyhow::Context;
use pdfedit_core::raster::DEFAULT_MAX_DIM;
use quota_core::ThemePreference;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the state file inside `data_dir`
pub const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where persisted state (usage, pro flag, theme, error logs) lives
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log collector endpoint; reports are only stored locally when unset
    #[serde(default)]
    pub collector_url: Option<String>,
    /// Longest side of rendered page images, in pixels
    #[serde(default = "default_max_dim")]
    pub max_dim: u32,
    /// Theme applied when none has been saved yet
    #[serde(default)]
    pub theme: Option<ThemePreference>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".pdftools")
}

fn default_max_dim() -> u32 {
    DEFAULT_MAX_DIM
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            collector_url: None,
            max_dim: default_max_dim(),
            theme: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// The file at `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    /// Collector URL, treating an empty string as unset
    pub fn collector(&self) -> Option<&str> {
        self.collector_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
