//! Merge rules: defaults, override order, conflict handling.

use crate::config::{default_layout, default_max_history_versions, default_store_path};
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default(
            "storage.path",
            default_store_path().to_string_lossy().to_string(),
        )?
        .set_default(
            "storage.max_history_versions",
            default_max_history_versions() as u64,
        )?
        .set_default("session.default_layout", default_layout())?
        .set_default("migration.default_phase", "plotOutline")?
        .set_default("migration.generate_new_ids", true)
}
