//! Config loading entry point.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::ForgeConfig;
use crate::error::PipelineError;
use config::{Config, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`ForgeConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace_root`.
    ///
    /// Precedence (lowest to highest): defaults, global file, `artifact-forge.toml`,
    /// `config/{ARTIFACT_FORGE_ENV}.toml`, `ARTIFACT_FORGE__SECTION__KEY` variables.
    /// A relative layout root is resolved against `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<ForgeConfig, PipelineError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let mut config: ForgeConfig = builder.build()?.try_deserialize()?;
        if config.layout.root.is_relative() {
            config.layout.root = workspace_root.join(&config.layout.root);
        }
        debug!(
            workspace_root = %workspace_root.display(),
            artifact_root = %config.layout.root.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from a single file over defaults.
    pub fn load_from_file(path: &Path) -> Result<ForgeConfig, PipelineError> {
        let config = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Path of the user-level config file, when a home directory is known.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
