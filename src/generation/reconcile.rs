//! Reconciliation: bind parsed entries back to the work items they were generated for.
//!
//! Discriminators come from model output and are not trustworthy. Strategies go from exact
//! to fuzzy; a strategy that finds more than one candidate is ambiguous and yields no
//! binding rather than a guess.

use crate::types::{MatchStrategy, ParsedEntry, ReconciledResult, WorkItem};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Separators tried when rebuilding a numeric identifier from digit tokens.
const DIGIT_SEPARATORS: &[&str] = &[".", "-", "_"];

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

/// Result of matching one entry against a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation<'a> {
    Matched {
        item: &'a WorkItem,
        strategy: MatchStrategy,
    },
    Ambiguous {
        strategy: MatchStrategy,
        candidates: usize,
    },
    Unmatched,
}

impl<'a> Reconciliation<'a> {
    pub fn item(&self) -> Option<&'a WorkItem> {
        match self {
            Reconciliation::Matched { item, .. } => Some(*item),
            _ => None,
        }
    }
}

/// Reconciliation of a whole batch response.
#[derive(Debug, Clone, Default)]
pub struct BatchReconciliation {
    /// Bound results, in batch item order
    pub results: Vec<ReconciledResult>,
    /// Items no entry was bound to, in batch item order
    pub unmatched: Vec<WorkItem>,
    /// Entries that matched nothing, matched ambiguously, or duplicated a binding
    pub dropped_entries: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    /// Match one entry against `candidates`, strongest strategy first.
    pub fn match_entry<'a>(
        &self,
        entry: &ParsedEntry,
        candidates: &[&'a WorkItem],
    ) -> Reconciliation<'a> {
        let discriminator = entry.discriminator.trim().to_lowercase();
        if discriminator.is_empty() || candidates.is_empty() {
            return Reconciliation::Unmatched;
        }

        for strategy in [
            MatchStrategy::ExactId,
            MatchStrategy::IdContains,
            MatchStrategy::TitleContains,
            MatchStrategy::DigitSequence,
        ] {
            let hits: Vec<&'a WorkItem> = candidates
                .iter()
                .copied()
                .filter(|item| matches_with(strategy, &discriminator, item))
                .collect();
            match hits.as_slice() {
                [] => continue,
                [item] => {
                    return Reconciliation::Matched {
                        item: *item,
                        strategy,
                    }
                }
                many => {
                    return Reconciliation::Ambiguous {
                        strategy,
                        candidates: many.len(),
                    }
                }
            }
        }

        Reconciliation::Unmatched
    }

    /// Convenience wrapper over [`Reconciler::match_entry`] for an owned item slice.
    pub fn match_item<'a>(&self, entry: &ParsedEntry, items: &'a [WorkItem]) -> Option<&'a WorkItem> {
        let candidates: Vec<&WorkItem> = items.iter().collect();
        self.match_entry(entry, &candidates).item()
    }

    /// Bind a batch response's entries to the batch's items.
    ///
    /// Exact identifier matches are bound first so a fuzzy entry can never take an item
    /// that another entry names exactly. Remaining entries are matched against the items
    /// still unbound. Each item receives at most one entry; later duplicates are dropped.
    /// With a single item in the batch, the first entry is bound to it when no strategy
    /// matched.
    pub fn reconcile_batch(&self, entries: Vec<ParsedEntry>, items: &[WorkItem]) -> BatchReconciliation {
        let mut bound: Vec<Option<ReconciledResult>> = vec![None; items.len()];
        let mut bound_ids: HashSet<&str> = HashSet::new();
        let mut pending = Vec::new();
        let mut dropped = 0usize;

        for entry in entries {
            let discriminator = entry.discriminator.trim().to_lowercase();
            let exact: Vec<usize> = items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.id.trim().to_lowercase() == discriminator)
                .map(|(index, _)| index)
                .collect();
            match exact.as_slice() {
                [index] => {
                    let item = &items[*index];
                    if bound_ids.insert(item.id.as_str()) {
                        bound[*index] = Some(ReconciledResult {
                            item_id: item.id.clone(),
                            entry,
                            strategy: MatchStrategy::ExactId,
                        });
                    } else {
                        debug!(item_id = %item.id, "Dropping duplicate entry for bound item");
                        dropped += 1;
                    }
                }
                [] => pending.push(entry),
                _ => {
                    debug!(discriminator = %entry.discriminator, "Ambiguous exact match; dropping entry");
                    dropped += 1;
                }
            }
        }

        for entry in pending {
            let candidates: Vec<&WorkItem> = items
                .iter()
                .filter(|item| !bound_ids.contains(item.id.as_str()))
                .collect();
            match self.match_entry(&entry, &candidates) {
                Reconciliation::Matched { item, strategy } => {
                    let index = items
                        .iter()
                        .position(|candidate| candidate.id == item.id)
                        .unwrap_or_default();
                    bound_ids.insert(item.id.as_str());
                    bound[index] = Some(ReconciledResult {
                        item_id: item.id.clone(),
                        entry,
                        strategy,
                    });
                }
                Reconciliation::Ambiguous {
                    strategy,
                    candidates,
                } => {
                    debug!(
                        discriminator = %entry.discriminator,
                        ?strategy,
                        candidates,
                        "Ambiguous reconciliation; dropping entry"
                    );
                    dropped += 1;
                }
                Reconciliation::Unmatched => {
                    if items.len() == 1 && bound[0].is_none() {
                        let item = &items[0];
                        bound_ids.insert(item.id.as_str());
                        bound[0] = Some(ReconciledResult {
                            item_id: item.id.clone(),
                            entry,
                            strategy: MatchStrategy::SoleCandidate,
                        });
                    } else {
                        debug!(discriminator = %entry.discriminator, "Entry matched no work item");
                        dropped += 1;
                    }
                }
            }
        }

        let mut results = Vec::new();
        let mut unmatched = Vec::new();
        for (item, slot) in items.iter().zip(bound) {
            match slot {
                Some(result) => results.push(result),
                None => unmatched.push(item.clone()),
            }
        }

        BatchReconciliation {
            results,
            unmatched,
            dropped_entries: dropped,
        }
    }
}

fn matches_with(strategy: MatchStrategy, discriminator: &str, item: &WorkItem) -> bool {
    let id = item.id.trim().to_lowercase();
    match strategy {
        MatchStrategy::ExactId => id == discriminator,
        MatchStrategy::IdContains => {
            !id.is_empty() && (discriminator.contains(&id) || id.contains(discriminator))
        }
        MatchStrategy::TitleContains => {
            let title = item.title.trim().to_lowercase();
            !title.is_empty() && (discriminator.contains(&title) || title.contains(discriminator))
        }
        MatchStrategy::DigitSequence => digit_sequence_matches(discriminator, &id),
        MatchStrategy::SoleCandidate => false,
    }
}

/// Pull the digit runs out of `discriminator` and look for them, joined by a separator,
/// inside `id` without touching neighbouring digits ("2.3" matches "task-2.3" but not
/// "task-12.3").
fn digit_sequence_matches(discriminator: &str, id: &str) -> bool {
    let tokens: Vec<&str> = digits_re()
        .find_iter(discriminator)
        .map(|m| m.as_str())
        .collect();
    if tokens.is_empty() {
        return false;
    }
    DIGIT_SEPARATORS
        .iter()
        .map(|separator| tokens.join(separator))
        .any(|needle| contains_on_digit_boundary(id, &needle))
}

fn contains_on_digit_boundary(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
    })
}
