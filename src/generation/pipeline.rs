//! The generation pipeline: skip guard, batching, bounded dispatch, fallback, aggregation.
//!
//! Generation failures never escape as errors. Every input item ends in exactly one
//! terminal state of the returned [`PipelineResult`]; `Err` is reserved for invalid input.

use crate::error::PipelineError;
use crate::generation::aggregate::ResultAggregator;
use crate::generation::batch::{BatchGrouper, DEFAULT_BATCH_SIZE};
use crate::generation::client::{GenerationClient, GenerationOptions};
use crate::generation::dispatch::{ConcurrencyBoundedDispatcher, DEFAULT_CONCURRENCY};
use crate::generation::fallback::FallbackExecutor;
use crate::generation::generator::Generator;
use crate::generation::parse::ParserConfig;
use crate::generation::prompt::{DefaultPromptBuilder, PromptBuilder};
use crate::generation::retry::RetryPolicy;
use crate::generation::skip::{ArtifactSkipGuard, SkipGuardConfig};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::store::{ArtifactLayout, ArtifactStore, ArtifactWriter, FsArtifactStore};
use crate::types::{ArtifactKind, ItemOutcome, PipelineResult, WorkItem};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum items per multi-item call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum simultaneous generation calls
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub generation: GenerationOptions,
    /// Write generated artifacts through the store
    #[serde(default = "default_persist")]
    pub persist: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_persist() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            retry: RetryPolicy::default(),
            generation: GenerationOptions::default(),
            persist: default_persist(),
        }
    }
}

/// Existing-artifact status of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactCheck {
    pub item_id: String,
    pub path: PathBuf,
    pub valid: bool,
}

pub struct GenerationPipeline {
    kind: ArtifactKind,
    client: Arc<dyn GenerationClient>,
    store: Arc<dyn ArtifactStore>,
    layout: ArtifactLayout,
    prompts: Arc<dyn PromptBuilder>,
    metrics: Arc<dyn MetricsSink>,
    config: PipelineConfig,
    parser: ParserConfig,
    skip_guard: SkipGuardConfig,
}

impl GenerationPipeline {
    /// A pipeline with filesystem storage, default layout, prompts and tuning, and no
    /// metrics.
    pub fn new(client: Arc<dyn GenerationClient>, kind: ArtifactKind) -> Self {
        Self {
            kind,
            client,
            store: Arc::new(FsArtifactStore::new()),
            layout: ArtifactLayout::default(),
            prompts: Arc::new(DefaultPromptBuilder),
            metrics: Arc::new(NoopMetrics),
            config: PipelineConfig::default(),
            parser: ParserConfig::default(),
            skip_guard: SkipGuardConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_layout(mut self, layout: ArtifactLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_prompts(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_skip_guard(mut self, skip_guard: SkipGuardConfig) -> Self {
        self.skip_guard = skip_guard;
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate artifacts for `items`.
    pub async fn run(&self, items: &[WorkItem]) -> Result<PipelineResult, PipelineError> {
        self.execute(items, None, None).await
    }

    /// Re-run with additional prompt context, never losing what `previous` produced.
    pub async fn refine(
        &self,
        items: &[WorkItem],
        previous: &PipelineResult,
        context: &str,
    ) -> Result<PipelineResult, PipelineError> {
        self.execute(items, Some(previous), Some(context)).await
    }

    /// Report which items already have a valid artifact. Never calls the client.
    pub async fn check(&self, items: &[WorkItem]) -> Result<Vec<ArtifactCheck>, PipelineError> {
        validate_items(items)?;
        let guard = self.skip_guard();
        let checks = join_all(items.iter().map(|item| guard.check(item))).await;
        Ok(items
            .iter()
            .zip(checks)
            .map(|(item, existing)| ArtifactCheck {
                item_id: item.id.clone(),
                path: self.layout.path_for(self.kind, item),
                valid: existing.is_some(),
            })
            .collect())
    }

    fn skip_guard(&self) -> ArtifactSkipGuard {
        ArtifactSkipGuard::new(
            self.store.clone(),
            self.layout.clone(),
            self.kind,
            self.skip_guard.clone(),
        )
    }

    async fn execute(
        &self,
        items: &[WorkItem],
        previous: Option<&PipelineResult>,
        context: Option<&str>,
    ) -> Result<PipelineResult, PipelineError> {
        validate_items(items)?;
        info!(
            kind = %self.kind,
            items = items.len(),
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency,
            refine = previous.is_some(),
            "Starting generation pipeline"
        );

        let guard = self.skip_guard();
        let checks = join_all(items.iter().map(|item| guard.check(item))).await;
        let skipped: HashMap<String, ItemOutcome> = checks
            .into_iter()
            .flatten()
            .map(|outcome| (outcome.item_id.clone(), outcome))
            .collect();
        let pending: Vec<WorkItem> = items
            .iter()
            .filter(|item| !skipped.contains_key(&item.id))
            .cloned()
            .collect();
        debug!(skipped = skipped.len(), pending = pending.len(), "Skip guard finished");

        let writer = ArtifactWriter::new(
            self.store.clone(),
            self.layout.clone(),
            self.kind,
            self.config.persist,
        );
        let generator = Arc::new(
            Generator::new(self.client.clone(), self.prompts.clone(), writer, self.kind)
                .with_retry(self.config.retry.clone())
                .with_parser(self.parser.clone())
                .with_options(self.config.generation.clone())
                .with_context(context.map(str::to_string)),
        );

        let batches = BatchGrouper::new(self.config.batch_size).group(&pending);
        let dispatcher = ConcurrencyBoundedDispatcher::new(self.config.concurrency)
            .with_metrics(self.metrics.clone());
        let batch_generator = generator.as_ref();
        let batch_outcomes = dispatcher
            .dispatch(batches, move |batch| async move {
                batch_generator.process_batch(batch).await
            })
            .await;

        let unmatched: Vec<WorkItem> = batch_outcomes
            .iter()
            .flat_map(|outcome| outcome.unmatched.iter().cloned())
            .collect();
        let fallback = FallbackExecutor::new(generator.clone(), self.config.concurrency)
            .fallback(unmatched)
            .await;

        let result = ResultAggregator::new().aggregate(
            self.kind,
            items,
            skipped,
            batch_outcomes,
            fallback,
            previous,
        );
        info!(
            kind = %self.kind,
            coverage = result.coverage_percentage,
            failed = result.counts.failed,
            "{}",
            result.summary
        );
        Ok(result)
    }
}

/// Reject blank or duplicate identifiers. Ids that differ only in case or surrounding
/// whitespace count as duplicates, since reconciliation cannot tell them apart.
pub fn validate_items(items: &[WorkItem]) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    let mut problems = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if item.id.trim().is_empty() {
            problems.push(format!("item at position {} has a blank id", index));
        } else if !seen.insert(item.id.trim().to_lowercase()) {
            problems.push(format!("duplicate id '{}'", item.id));
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(problems.join("; ")))
    }
}
