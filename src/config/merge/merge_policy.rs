//! Merge rules: defaults applied before any file or environment source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the defaults that later sources override.
///
/// Struct-level serde defaults cover every other key.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("layout.root", ".artifact-forge/artifacts")?
        .set_default("logging.file", ".artifact-forge/artifact-forge.log")
}
