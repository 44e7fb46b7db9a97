//! One generation call end to end: prompt, retried client call, parse, reconcile, persist.
//!
//! Shared by the batch path and the fallback path so both use the same retry policy,
//! parser and persistence rules.

use crate::generation::client::{GenerationClient, GenerationOptions};
use crate::generation::dispatch::{BatchFailure, BatchOutput};
use crate::generation::parse::{ParseOutcome, ParserConfig, ResponseParser};
use crate::generation::prompt::PromptBuilder;
use crate::generation::reconcile::Reconciler;
use crate::generation::retry::{RetryExecutor, RetryOutcome, RetryPolicy};
use crate::store::ArtifactWriter;
use crate::types::{
    ArtifactKind, Batch, BatchMode, GenerationAttempt, ItemOutcome, ItemState, ReconciledResult,
    WorkItem,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const NO_ENTRIES: &str = "response contained no parsable entries";

pub struct Generator {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<dyn PromptBuilder>,
    writer: ArtifactWriter,
    kind: ArtifactKind,
    retry: RetryExecutor,
    parser: ResponseParser,
    reconciler: Reconciler,
    options: GenerationOptions,
    context: Option<String>,
}

impl Generator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        prompts: Arc<dyn PromptBuilder>,
        writer: ArtifactWriter,
        kind: ArtifactKind,
    ) -> Self {
        Self {
            client,
            prompts,
            writer,
            kind,
            retry: RetryExecutor::default(),
            parser: ResponseParser::default(),
            reconciler: Reconciler::new(),
            options: GenerationOptions::default(),
            context: None,
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryExecutor::new(policy);
        self
    }

    pub fn with_parser(mut self, config: ParserConfig) -> Self {
        self.parser = ResponseParser::new(config);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Extra prompt context, used by refinement runs.
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    async fn call(&self, label: &str, prompt: &str) -> RetryOutcome<String> {
        self.retry
            .run(label, |_| self.client.generate(prompt, &self.options))
            .await
    }

    /// Generate a batch. Items that could not be reconciled or persisted are returned as
    /// unmatched; a call that never succeeds or yields no entries fails the whole batch.
    pub async fn process_batch(&self, batch: Batch) -> Result<BatchOutput, BatchFailure> {
        let items = batch.items();
        let context = self.context.as_deref();
        let prompt = match batch.mode() {
            BatchMode::Single => self.prompts.single_prompt(self.kind, &items[0], context),
            BatchMode::Multi => self.prompts.batch_prompt(self.kind, items, context),
        };

        let label = format!("batch-{}", batch.index);
        let call = self.call(&label, &prompt).await;
        let Some(text) = call.value.as_deref() else {
            return Err(BatchFailure {
                message: call.error_message(),
                attempts: call.attempts,
            });
        };

        let entries = match self.parser.parse(text, items) {
            ParseOutcome::Empty => {
                return Err(BatchFailure {
                    message: NO_ENTRIES.to_string(),
                    attempts: call.attempts,
                })
            }
            outcome => outcome.into_entries(),
        };

        let reconciliation = self.reconciler.reconcile_batch(entries, items);
        debug!(
            batch = batch.index,
            bound = reconciliation.results.len(),
            unmatched = reconciliation.unmatched.len(),
            dropped = reconciliation.dropped_entries,
            "Batch reconciled"
        );

        let results = self
            .persist_all(
                reconciliation.results,
                items,
                ItemState::BatchGenerated,
                &call.attempts,
            )
            .await;
        let produced: HashSet<&str> = results.iter().map(|r| r.item_id.as_str()).collect();
        let unmatched = items
            .iter()
            .filter(|item| !produced.contains(item.id.as_str()))
            .cloned()
            .collect();

        Ok(BatchOutput {
            results,
            unmatched,
            attempts: call.attempts,
        })
    }

    /// Generate a single item; any failure is terminal for that item.
    pub async fn process_item(&self, item: &WorkItem) -> ItemOutcome {
        let prompt = self
            .prompts
            .single_prompt(self.kind, item, self.context.as_deref());
        let label = format!("item-{}", item.id);
        let call = self.call(&label, &prompt).await;
        let Some(text) = call.value.as_deref() else {
            return ItemOutcome::failed(item.id.clone(), call.error_message(), call.attempts);
        };

        let expected = std::slice::from_ref(item);
        let entries = match self.parser.parse(text, expected) {
            ParseOutcome::Empty => {
                return ItemOutcome::failed(item.id.clone(), NO_ENTRIES, call.attempts);
            }
            outcome => outcome.into_entries(),
        };

        let reconciliation = self.reconciler.reconcile_batch(entries, expected);
        let mut results = self
            .persist_all(
                reconciliation.results,
                expected,
                ItemState::FallbackGenerated,
                &call.attempts,
            )
            .await;
        match results.pop() {
            Some(outcome) => outcome,
            None => ItemOutcome::failed(
                item.id.clone(),
                "no artifact could be bound or persisted for the item",
                call.attempts,
            ),
        }
    }

    async fn persist_all(
        &self,
        results: Vec<ReconciledResult>,
        items: &[WorkItem],
        state: ItemState,
        attempts: &[GenerationAttempt],
    ) -> Vec<ItemOutcome> {
        let mut outcomes = Vec::with_capacity(results.len());
        for result in results {
            let Some(item) = items.iter().find(|item| item.id == result.item_id) else {
                continue;
            };
            match self.writer.save(item, &result.entry.content).await {
                Ok(path) => outcomes.push(ItemOutcome {
                    item_id: result.item_id,
                    state,
                    content: Some(result.entry.content),
                    path,
                    strategy: Some(result.strategy),
                    attempts: attempts.to_vec(),
                    error: None,
                }),
                Err(err) => {
                    warn!(item_id = %item.id, error = %err, "Failed to persist artifact");
                }
            }
        }
        outcomes
    }
}
