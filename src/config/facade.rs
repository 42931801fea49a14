//! Config loading entry point.

use crate::config::merge::merge_policy::builder_with_defaults;
use crate::config::sources::{global_file, workspace_file};
use crate::config::PlotweaveConfig;
use crate::error::ConfigError;
use config::{Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of environment overrides, e.g. `PLOTWEAVE__STORAGE__QUOTA_BYTES`
pub const ENV_PREFIX: &str = "PLOTWEAVE";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load every layer for a workspace, resolve paths, and validate.
    pub fn load(workspace_root: &Path) -> Result<PlotweaveConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let mut config: PlotweaveConfig = builder.build()?.try_deserialize()?;
        config.resolve_paths(workspace_root);
        Self::check(&config)?;
        debug!(store = %config.storage.path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<PlotweaveConfig, ConfigError> {
        let config: PlotweaveConfig = builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()))
            .build()?
            .try_deserialize()?;
        Self::check(&config)?;
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn check(config: &PlotweaveConfig) -> Result<(), ConfigError> {
        config.validate().map_err(|errors| {
            ConfigError::Invalid(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }
}
