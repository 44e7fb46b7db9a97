//! CLI route: single route table and run context. Dispatches to the pipeline and presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_check_result, format_pipeline_result};
use crate::config::{ConfigLoader, ForgeConfig};
use crate::error::PipelineError;
use crate::generation::pipeline::GenerationPipeline;
use crate::metrics::InMemoryMetrics;
use crate::provider::OpenAiCompatibleClient;
use crate::source::{JsonFileSource, WorkItemSource};
use crate::store::FsArtifactStore;
use crate::types::{ArtifactKind, PipelineResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: workspace root and resolved configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: ForgeConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, PipelineError> {
        let mut config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        if config.layout.root.is_relative() {
            config.layout.root = workspace_root.join(&config.layout.root);
        }

        config.validate().map_err(|errors| {
            PipelineError::ConfigError(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    fn pipeline(&self, kind: ArtifactKind) -> Result<GenerationPipeline, PipelineError> {
        let client = OpenAiCompatibleClient::from_config(&self.config.provider)?;
        Ok(GenerationPipeline::new(Arc::new(client), kind)
            .with_store(Arc::new(FsArtifactStore::new()))
            .with_layout(self.config.layout.clone())
            .with_config(self.config.pipeline.clone())
            .with_parser(self.config.parser.clone())
            .with_skip_guard(self.config.skip_guard.clone()))
    }

    /// Execute a command and return its rendered output.
    pub async fn execute(&self, command: &Commands) -> Result<String, PipelineError> {
        match command {
            Commands::Run {
                items,
                kind,
                batch_size,
                concurrency,
                previous,
                context,
                no_persist,
                json,
            } => {
                let items = JsonFileSource::new(items).load().await?;
                let metrics = Arc::new(InMemoryMetrics::new());

                let mut pipeline_config = self.config.pipeline.clone();
                if let Some(batch_size) = batch_size {
                    pipeline_config.batch_size = *batch_size;
                }
                if let Some(concurrency) = concurrency {
                    pipeline_config.concurrency = *concurrency;
                }
                if *no_persist {
                    pipeline_config.persist = false;
                }
                let pipeline = self
                    .pipeline(*kind)?
                    .with_config(pipeline_config)
                    .with_metrics(metrics.clone());

                let result = match previous {
                    Some(previous_path) => {
                        let previous = load_previous(previous_path).await?;
                        pipeline
                            .refine(&items, &previous, context.as_deref().unwrap_or_default())
                            .await?
                    }
                    None => pipeline.run(&items).await?,
                };

                let batches = metrics.snapshot();
                info!(
                    batches = batches.batches,
                    failed_batches = batches.failed,
                    batches_with_fallback = batches.used_fallback,
                    "Batch metrics"
                );
                format_pipeline_result(&result, *json)
            }
            Commands::Check { items, kind, json } => {
                let items = JsonFileSource::new(items).load().await?;
                let checks = self.pipeline(*kind)?.check(&items).await?;
                format_check_result(&checks, *json)
            }
        }
    }
}

async fn load_previous(path: &Path) -> Result<PipelineResult, PipelineError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        PipelineError::SourceError(format!(
            "Failed to read previous result {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        PipelineError::SourceError(format!(
            "Failed to parse previous result {}: {}",
            path.display(),
            e
        ))
    })
}
