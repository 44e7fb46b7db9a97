//! Merge skip, batch and fallback results into the final [`PipelineResult`].

use crate::generation::dispatch::BatchOutcome;
use crate::types::{ArtifactKind, ItemOutcome, OutcomeCounts, PipelineResult, WorkItem};
use chrono::Utc;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// One outcome per item, in input order.
    ///
    /// Precedence is skip > batch > fallback; an item with no result is `failed`. With a
    /// `previous` result, a previously handled item is never replaced by a failure.
    pub fn aggregate(
        &self,
        kind: ArtifactKind,
        items: &[WorkItem],
        mut skipped: HashMap<String, ItemOutcome>,
        batch_outcomes: Vec<BatchOutcome>,
        mut fallback: HashMap<String, ItemOutcome>,
        previous: Option<&PipelineResult>,
    ) -> PipelineResult {
        let mut batch_results: HashMap<String, ItemOutcome> = HashMap::new();
        let mut batch_errors: HashMap<String, String> = HashMap::new();
        for outcome in batch_outcomes {
            if let Some(error) = &outcome.error {
                for item in outcome.batch.items() {
                    batch_errors.insert(item.id.clone(), error.clone());
                }
            }
            for result in outcome.results {
                batch_results.entry(result.item_id.clone()).or_insert(result);
            }
        }

        let outcomes: Vec<ItemOutcome> = items
            .iter()
            .map(|item| {
                let current = skipped
                    .remove(&item.id)
                    .or_else(|| batch_results.remove(&item.id))
                    .or_else(|| fallback.remove(&item.id))
                    .unwrap_or_else(|| {
                        let error = batch_errors
                            .get(&item.id)
                            .cloned()
                            .unwrap_or_else(|| "no result was produced for the item".to_string());
                        ItemOutcome::failed(item.id.clone(), error, Vec::new())
                    });
                match previous.and_then(|prev| prev.outcome(&item.id)) {
                    Some(prior) if !current.state.is_handled() && prior.state.is_handled() => {
                        prior.clone()
                    }
                    _ => current,
                }
            })
            .collect();

        Self::finish(kind, outcomes)
    }

    /// Build the result from ordered outcomes: counts, coverage and summary.
    pub fn finish(kind: ArtifactKind, outcomes: Vec<ItemOutcome>) -> PipelineResult {
        let counts = OutcomeCounts::from_outcomes(&outcomes);
        let coverage_percentage = coverage(counts.handled(), counts.total());
        let summary = summarize(kind, &counts, coverage_percentage);
        PipelineResult {
            kind,
            outcomes,
            counts,
            coverage_percentage,
            summary,
            completed_at: Utc::now(),
        }
    }
}

/// `round(handled / total * 100)`; an empty item set is fully covered.
pub fn coverage(handled: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((handled as f64 / total as f64) * 100.0).round() as u32
}

fn summarize(kind: ArtifactKind, counts: &OutcomeCounts, coverage: u32) -> String {
    let mut summary = format!(
        "Generated {} artifacts for {}/{} items ({}% coverage): {} skipped, {} from batches, {} from fallback",
        kind.noun(),
        counts.handled(),
        counts.total(),
        coverage,
        counts.skipped,
        counts.batch_generated,
        counts.fallback_generated,
    );
    if counts.failed > 0 {
        summary.push_str(&format!(", {} failed", counts.failed));
    }
    summary
}
