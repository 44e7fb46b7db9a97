//! Wave-based bounded dispatch of batches.
//!
//! Each wave starts up to `concurrency` futures and joins all of them before the next wave
//! begins, so no more than `concurrency` generation calls are ever in flight.

use crate::metrics::{record_batch_best_effort, MetricsSink, NoopMetrics};
use crate::types::{Batch, GenerationAttempt, ItemOutcome, WorkItem};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of batches in flight per wave.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// What a successfully processed batch produced.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    /// Batch-generated outcomes for the items that were reconciled and persisted
    pub results: Vec<ItemOutcome>,
    /// Items still needing an artifact
    pub unmatched: Vec<WorkItem>,
    pub attempts: Vec<GenerationAttempt>,
}

/// Why a batch produced nothing.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub message: String,
    pub attempts: Vec<GenerationAttempt>,
}

/// Per-batch record of a dispatch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch: Batch,
    pub success: bool,
    pub results: Vec<ItemOutcome>,
    pub unmatched: Vec<WorkItem>,
    pub attempts: Vec<GenerationAttempt>,
    pub error: Option<String>,
}

impl BatchOutcome {
    fn from_result(batch: Batch, result: Result<BatchOutput, BatchFailure>) -> Self {
        match result {
            Ok(output) => Self {
                batch,
                success: true,
                results: output.results,
                unmatched: output.unmatched,
                attempts: output.attempts,
                error: None,
            },
            Err(failure) => {
                let unmatched = batch.items().to_vec();
                Self {
                    batch,
                    success: false,
                    results: Vec::new(),
                    unmatched,
                    attempts: failure.attempts,
                    error: Some(failure.message),
                }
            }
        }
    }

    /// Whether any item of this batch needs the fallback path.
    pub fn needs_fallback(&self) -> bool {
        !self.unmatched.is_empty()
    }
}

/// Run `operation` over `inputs` in waves of at most `concurrency`, preserving input order.
pub async fn run_in_waves<T, R, F, Fut>(inputs: Vec<T>, concurrency: usize, mut operation: F) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    let concurrency = concurrency.max(1);
    let mut outputs = Vec::with_capacity(inputs.len());
    let mut remaining = inputs.into_iter().peekable();
    while remaining.peek().is_some() {
        let wave: Vec<Fut> = remaining.by_ref().take(concurrency).map(&mut operation).collect();
        outputs.extend(join_all(wave).await);
    }
    outputs
}

/// Dispatches batches in bounded waves and isolates per-batch failure.
#[derive(Clone)]
pub struct ConcurrencyBoundedDispatcher {
    concurrency: usize,
    metrics: Arc<dyn MetricsSink>,
}

impl ConcurrencyBoundedDispatcher {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process every batch, returning one outcome per batch in batch order.
    pub async fn dispatch<F, Fut>(&self, batches: Vec<Batch>, process: F) -> Vec<BatchOutcome>
    where
        F: Fn(Batch) -> Fut,
        Fut: Future<Output = Result<BatchOutput, BatchFailure>>,
    {
        let total = batches.len();
        let waves = total.div_ceil(self.concurrency);
        info!(batches = total, waves, concurrency = self.concurrency, "Dispatching batches");

        let process = &process;
        let outcomes = run_in_waves(batches, self.concurrency, |batch| async move {
            let index = batch.index;
            debug!(batch = index, items = batch.len(), "Batch started");
            let result = process(batch.clone()).await;
            if let Err(failure) = &result {
                warn!(batch = index, error = %failure.message, "Batch failed; items routed to fallback");
            }
            BatchOutcome::from_result(batch, result)
        })
        .await;

        for outcome in &outcomes {
            record_batch_best_effort(
                self.metrics.as_ref(),
                outcome.success,
                outcome.batch.len(),
                !outcome.success || outcome.needs_fallback(),
            );
        }
        outcomes
    }
}
