//! Property-based tests for pipeline invariants

use artifact_forge::generation::aggregate::ResultAggregator;
use artifact_forge::generation::batch::BatchGrouper;
use artifact_forge::generation::parse::ResponseParser;
use artifact_forge::generation::reconcile::Reconciler;
use artifact_forge::types::{
    ArtifactKind, ItemOutcome, ItemState, MatchStrategy, ParseStrategy, ParsedEntry, WorkItem,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

fn work_items(categories: &[u8]) -> Vec<WorkItem> {
    categories
        .iter()
        .enumerate()
        .map(|(n, category)| {
            WorkItem::new(
                format!("item-{n}"),
                format!("Feature {n}"),
                "",
                format!("cat-{category}"),
                "",
            )
        })
        .collect()
}

fn entry(discriminator: &str) -> ParsedEntry {
    ParsedEntry {
        discriminator: discriminator.to_string(),
        content: format!("content for {discriminator}"),
        fields: Default::default(),
        strategy: ParseStrategy::JsonArray,
    }
}

fn outcome(id: &str, handled: bool) -> ItemOutcome {
    if handled {
        ItemOutcome {
            item_id: id.to_string(),
            state: ItemState::BatchGenerated,
            content: Some("artifact".to_string()),
            path: None,
            strategy: Some(MatchStrategy::ExactId),
            attempts: Vec::new(),
            error: None,
        }
    } else {
        ItemOutcome::failed(id, "timeout", Vec::new())
    }
}

/// Every item lands in exactly one batch, batches are bounded and single-category,
/// and input order survives within each category.
#[test]
fn test_batch_grouping_partitions_items() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(proptest::collection::vec(0u8..4, 0..40), 0usize..8),
            |(categories, batch_size)| {
                let items = work_items(&categories);
                let batches = BatchGrouper::new(batch_size).group(&items);

                let mut seen = HashSet::new();
                for batch in &batches {
                    prop_assert!(!batch.is_empty());
                    prop_assert!(batch.len() <= batch_size.max(1));
                    for item in batch.items() {
                        prop_assert_eq!(&item.category, &batch.category);
                        prop_assert!(seen.insert(item.id.clone()));
                    }
                }
                prop_assert_eq!(seen.len(), items.len());

                let mut per_category: HashMap<&str, Vec<&str>> = HashMap::new();
                for batch in &batches {
                    for item in batch.items() {
                        per_category
                            .entry(item.category.as_str())
                            .or_default()
                            .push(item.id.as_str());
                    }
                }
                for (category, ids) in per_category {
                    let expected: Vec<&str> = items
                        .iter()
                        .filter(|item| item.category == category)
                        .map(|item| item.id.as_str())
                        .collect();
                    prop_assert_eq!(ids, expected);
                }
                Ok(())
            },
        )
        .unwrap();
}

/// The parser never panics and every entry it returns carries a discriminator.
#[test]
fn test_parser_is_total() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let parser = ResponseParser::default();
    let expected = work_items(&[0, 0]);

    runner
        .run(&any::<String>(), |text| {
            let outcome = parser.parse(&text, &expected);
            for entry in outcome.into_entries() {
                prop_assert!(
                    entry.strategy == ParseStrategy::RawText
                        || !entry.discriminator.trim().is_empty()
                );
            }
            Ok(())
        })
        .unwrap();
}

/// An entry naming an item exactly always binds to that item, whatever fuzzy entries
/// precede it.
#[test]
fn test_exact_matches_take_precedence() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(1usize..8, proptest::collection::vec("[a-z0-9 ]{0,12}", 0..6)),
            |(count, noise)| {
                let items = work_items(&vec![0; count]);
                let mut entries: Vec<ParsedEntry> = noise.iter().map(|d| entry(d)).collect();
                entries.extend(items.iter().map(|item| entry(&item.id.to_uppercase())));

                let reconciliation = Reconciler::new().reconcile_batch(entries, &items);
                prop_assert_eq!(reconciliation.results.len(), items.len());
                prop_assert!(reconciliation.unmatched.is_empty());
                for result in &reconciliation.results {
                    prop_assert_eq!(result.strategy, MatchStrategy::ExactId);
                    prop_assert_eq!(
                        &result.entry.discriminator,
                        &result.item_id.to_uppercase()
                    );
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Aggregation yields one outcome per item, and merging with a previous result never
/// lowers coverage.
#[test]
fn test_aggregation_is_complete_and_monotonic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec((any::<bool>(), any::<bool>()), 0..30),
            |flags| {
                let items = work_items(&vec![0; flags.len()]);
                let previous_outcomes: Vec<ItemOutcome> = items
                    .iter()
                    .zip(&flags)
                    .map(|(item, (before, _))| outcome(&item.id, *before))
                    .collect();
                let previous = ResultAggregator::finish(ArtifactKind::Schema, previous_outcomes);

                let fallback: HashMap<String, ItemOutcome> = items
                    .iter()
                    .zip(&flags)
                    .filter(|(_, (_, now))| *now)
                    .map(|(item, _)| (item.id.clone(), outcome(&item.id, true)))
                    .collect();

                let merged = ResultAggregator::new().aggregate(
                    ArtifactKind::Schema,
                    &items,
                    HashMap::new(),
                    Vec::new(),
                    fallback,
                    Some(&previous),
                );

                prop_assert_eq!(merged.total(), items.len());
                prop_assert_eq!(merged.counts.total(), items.len());
                prop_assert!(merged.coverage_percentage >= previous.coverage_percentage);
                prop_assert!(merged.coverage_percentage <= 100);
                for (outcome, (before, now)) in merged.outcomes.iter().zip(&flags) {
                    prop_assert_eq!(outcome.state.is_handled(), *before || *now);
                }
                Ok(())
            },
        )
        .unwrap();
}
