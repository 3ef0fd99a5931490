//! Configuration file support for flync.
//!
//! Two configuration file locations are consulted:
//! - Global: `~/.flync/config.toml` - User-wide defaults
//! - Project: `<workspace>/.flync/config.toml` - Workspace-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// flync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Loader settings
    pub load: LoadConfig,

    /// Report settings
    pub report: ReportConfig,
}

/// Settings that control how a workspace is loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Parse documents on the rayon pool (default: true)
    pub parallel: Option<bool>,

    /// Number of parser threads (None = rayon default)
    pub jobs: Option<usize>,
}

impl LoadConfig {
    /// Whether phase-one parsing runs in parallel.
    pub fn parallel(&self) -> bool {
        self.parallel.unwrap_or(true)
    }
}

/// Settings that control how diagnostics are judged and printed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Treat warnings as failures
    pub deny_warnings: bool,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.load.parallel.is_some() {
            self.load.parallel = other.load.parallel;
        }
        if other.load.jobs.is_some() {
            self.load.jobs = other.load.jobs;
        }
        if other.report.deny_warnings {
            self.report.deny_warnings = true;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (<workspace>/.flync/config.toml)
/// 2. Global config (~/.flync/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global flync config directory (~/.flync).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".flync"))
}

/// Get the global config path (~/.flync/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (<workspace>/.flync/config.toml).
pub fn project_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".flync").join("config.toml")
}
