//! Batch grouping: partition work items into per-category batches.

use crate::types::{Batch, WorkItem};
use indexmap::IndexMap;

/// Default maximum number of items per multi-item call.
pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct BatchGrouper {
    batch_size: usize,
}

impl Default for BatchGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchGrouper {
    /// A batch size of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Group items by category. Categories keep first-appearance order and items keep
    /// input order within their category.
    pub fn group_by_category(&self, items: &[WorkItem]) -> IndexMap<String, Vec<WorkItem>> {
        let mut groups: IndexMap<String, Vec<WorkItem>> = IndexMap::new();
        for item in items {
            groups
                .entry(item.category.clone())
                .or_default()
                .push(item.clone());
        }
        groups
    }

    /// Partition items into batches: one single-item batch for a category with exactly
    /// one item, otherwise chunks of at most `batch_size`. Batch indices are sequential.
    pub fn group(&self, items: &[WorkItem]) -> Vec<Batch> {
        let mut batches = Vec::new();
        for (category, members) in self.group_by_category(items) {
            for chunk in members.chunks(self.batch_size) {
                if let Some(batch) = Batch::new(batches.len(), category.clone(), chunk.to_vec()) {
                    batches.push(batch);
                }
            }
        }
        batches
    }
}
