//! Skip guard: detect work items whose artifact already exists and looks valid.

use crate::store::{ArtifactLayout, ArtifactStore};
use crate::types::{ArtifactKind, ItemOutcome, WorkItem};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validity thresholds for existing artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipGuardConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_schema_min_lines")]
    pub schema_min_lines: usize,
    #[serde(default = "default_test_plan_min_lines")]
    pub test_plan_min_lines: usize,
    /// Line prefixes that do not count as structural lines
    #[serde(default = "default_comment_prefixes")]
    pub comment_prefixes: Vec<String>,
}

fn default_min_chars() -> usize {
    10
}

fn default_schema_min_lines() -> usize {
    2
}

fn default_test_plan_min_lines() -> usize {
    3
}

fn default_comment_prefixes() -> Vec<String> {
    vec!["//".to_string(), "<!--".to_string(), "--".to_string()]
}

impl Default for SkipGuardConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            schema_min_lines: default_schema_min_lines(),
            test_plan_min_lines: default_test_plan_min_lines(),
            comment_prefixes: default_comment_prefixes(),
        }
    }
}

impl SkipGuardConfig {
    pub fn min_lines(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Schema => self.schema_min_lines,
            ArtifactKind::TestPlan => self.test_plan_min_lines,
        }
    }

    /// Apply the validity heuristic to existing artifact content.
    pub fn is_valid(&self, kind: ArtifactKind, path: &Path, content: &str) -> bool {
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.chars().count() < self.min_chars {
            return false;
        }

        let structural = trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| {
                !self
                    .comment_prefixes
                    .iter()
                    .any(|prefix| line.starts_with(prefix.as_str()))
            })
            .count();
        if structural < self.min_lines(kind) {
            return false;
        }

        if is_json_shaped(path, trimmed) {
            return serde_json::from_str::<serde_json::Value>(trimmed).is_ok();
        }
        true
    }
}

fn is_json_shaped(path: &Path, trimmed: &str) -> bool {
    let json_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    json_extension || trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Checks the artifact store for a valid pre-existing artifact.
#[derive(Clone)]
pub struct ArtifactSkipGuard {
    store: Arc<dyn ArtifactStore>,
    layout: ArtifactLayout,
    kind: ArtifactKind,
    config: SkipGuardConfig,
}

impl ArtifactSkipGuard {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        layout: ArtifactLayout,
        kind: ArtifactKind,
        config: SkipGuardConfig,
    ) -> Self {
        Self {
            store,
            layout,
            kind,
            config,
        }
    }

    /// Returns a `skipped` outcome when a valid artifact exists, otherwise `None`.
    ///
    /// Read failures count as "not present".
    pub async fn check(&self, item: &WorkItem) -> Option<ItemOutcome> {
        let path = self.layout.path_for(self.kind, item);
        if !self.store.exists(&path).await {
            return None;
        }

        let content = match self.store.read(&path).await {
            Ok(content) => content,
            Err(err) => {
                warn!(
                    item_id = %item.id,
                    path = %path.display(),
                    error = %err,
                    "Failed to read existing artifact; regenerating"
                );
                return None;
            }
        };

        if self.config.is_valid(self.kind, &path, &content) {
            debug!(item_id = %item.id, path = %path.display(), "Valid artifact exists; skipping");
            Some(ItemOutcome::skipped(item.id.clone(), path, content))
        } else {
            debug!(item_id = %item.id, path = %path.display(), "Existing artifact failed validation");
            None
        }
    }
}
