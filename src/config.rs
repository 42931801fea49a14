//! Configuration System
//!
//! Layered configuration built with the `config` crate. Later layers override
//! earlier ones:
//!
//! 1. built-in defaults
//! 2. global file: `$XDG_CONFIG_HOME/plotweave/config.toml` or
//!    `~/.config/plotweave/config.toml`
//! 3. workspace files: `config/config.toml`, then `config/{PLOTWEAVE_ENV}.toml`
//! 4. environment: `PLOTWEAVE__SECTION__KEY`

use crate::logging::LoggingConfig;
use crate::manager::ManagerConfig;
use crate::migration::MigrationOptions;
use crate::store::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
const MAX_HISTORY_VERSIONS: usize = 1_000;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotweaveConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub migration: MigrationOptions,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how contexts are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store directory; relative paths resolve against the workspace root
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Upper bound on the size of live records
    #[serde(default)]
    pub quota_bytes: Option<u64>,

    /// Contexts untouched for longer are removed by `cleanup`
    #[serde(default)]
    pub retention_days: Option<u32>,

    #[serde(default = "default_max_history_versions")]
    pub max_history_versions: usize,
}

pub(crate) fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "plotweave")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".plotweave/store"))
}

pub(crate) fn default_max_history_versions() -> usize {
    StoreOptions::default().max_history_versions
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            quota_bytes: None,
            retention_days: None,
            max_history_versions: default_max_history_versions(),
        }
    }
}

impl StorageConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            quota_bytes: self.quota_bytes,
            max_history_versions: self.max_history_versions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Layout given to a freshly created session
    #[serde(default = "default_layout")]
    pub default_layout: String,
}

pub(crate) fn default_layout() -> String {
    "default".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_layout: default_layout(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Storage: {0}")]
    Storage(String),

    #[error("Session: {0}")]
    Session(String),

    #[error("Logging: {0}")]
    Logging(String),
}

impl PlotweaveConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Store path cannot be empty".to_string(),
            ));
        }
        if self.storage.quota_bytes == Some(0) {
            errors.push(ValidationError::Storage(
                "quota_bytes must be positive when set".to_string(),
            ));
        }
        if self.storage.max_history_versions > MAX_HISTORY_VERSIONS {
            errors.push(ValidationError::Storage(format!(
                "max_history_versions {} exceeds {}",
                self.storage.max_history_versions, MAX_HISTORY_VERSIONS
            )));
        }
        if self.session.default_layout.trim().is_empty() {
            errors.push(ValidationError::Session(
                "default_layout cannot be empty".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "unknown level '{}'",
                self.logging.level
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Anchor a relative store path at the workspace root
    pub fn resolve_paths(&mut self, workspace_root: &Path) {
        if self.storage.path.is_relative() {
            self.storage.path = workspace_root.join(&self.storage.path);
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            default_layout: self.session.default_layout.clone(),
            retention_days: self.storage.retention_days,
            migration: self.migration.clone(),
        }
    }
}
