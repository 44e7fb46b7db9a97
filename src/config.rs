//! Configuration Management
//!
//! Layered configuration for the pipeline, parser, skip guard, artifact layout, provider
//! and logging. Sources are merged by [`ConfigLoader`] in increasing precedence: defaults,
//! global file, workspace files, environment.

use crate::generation::parse::ParserConfig;
use crate::generation::pipeline::PipelineConfig;
use crate::generation::skip::SkipGuardConfig;
use crate::logging::LoggingConfig;
use crate::store::ArtifactLayout;
use serde::{Deserialize, Serialize};

pub use crate::provider::ProviderConfig;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub skip_guard: SkipGuardConfig,

    /// Where artifacts are read and written
    #[serde(default)]
    pub layout: ArtifactLayout,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Pipeline(String),
    Parser(String),
    Provider(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Parser(msg) => write!(f, "Parser: {}", msg),
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ForgeConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.pipeline.batch_size == 0 {
            errors.push(ValidationError::Pipeline(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.concurrency == 0 {
            errors.push(ValidationError::Pipeline(
                "concurrency must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.retry.max_attempts == 0 {
            errors.push(ValidationError::Pipeline(
                "retry.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.retry.max_delay_ms < self.pipeline.retry.base_delay_ms {
            errors.push(ValidationError::Pipeline(
                "retry.max_delay_ms must not be below retry.base_delay_ms".to_string(),
            ));
        }

        if self.parser.discriminator_fields.is_empty() {
            errors.push(ValidationError::Parser(
                "discriminator_fields cannot be empty".to_string(),
            ));
        }

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
