//! Per-item regeneration for items the batch path did not produce.

use crate::generation::dispatch::run_in_waves;
use crate::generation::generator::Generator;
use crate::types::{ItemOutcome, WorkItem};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct FallbackExecutor {
    generator: Arc<Generator>,
    concurrency: usize,
}

impl FallbackExecutor {
    pub fn new(generator: Arc<Generator>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
        }
    }

    /// One single-item call per item, in waves bounded by the dispatch concurrency.
    /// A failed item never aborts its siblings.
    pub async fn fallback(&self, items: Vec<WorkItem>) -> HashMap<String, ItemOutcome> {
        if items.is_empty() {
            return HashMap::new();
        }
        info!(items = items.len(), concurrency = self.concurrency, "Running fallback generation");

        let generator = self.generator.as_ref();
        let outcomes = run_in_waves(items, self.concurrency, |item| async move {
            generator.process_item(&item).await
        })
        .await;

        outcomes
            .into_iter()
            .map(|outcome| (outcome.item_id.clone(), outcome))
            .collect()
    }
}
