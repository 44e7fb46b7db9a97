//! Core data model: work items, batches, attempts, parsed entries and pipeline results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A unit of requested work needing one generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub phase: String,
}

fn default_category() -> String {
    "general".to_string()
}

impl WorkItem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            category: category.into(),
            phase: phase.into(),
        }
    }
}

/// The kind of artifact a pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Schema,
    TestPlan,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Schema => "schema",
            ArtifactKind::TestPlan => "test-plan",
        }
    }

    /// Human wording used in prompts and summaries.
    pub fn noun(self) -> &'static str {
        match self {
            ArtifactKind::Schema => "schema",
            ArtifactKind::TestPlan => "test plan",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "schema" | "schemas" => Ok(ArtifactKind::Schema),
            "test-plan" | "test_plan" | "testplan" | "test" | "tests" => Ok(ArtifactKind::TestPlan),
            other => Err(format!(
                "Unknown artifact kind '{}' (expected 'schema' or 'test-plan')",
                other
            )),
        }
    }
}

/// Whether a batch is sent as a single-item call or a multi-item call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchMode {
    Single,
    Multi,
}

/// An ordered, non-empty group of work items sharing one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub category: String,
    items: Vec<WorkItem>,
}

impl Batch {
    /// Returns `None` for an empty item list.
    pub fn new(index: usize, category: impl Into<String>, items: Vec<WorkItem>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self {
            index,
            category: category.into(),
            items,
        })
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn mode(&self) -> BatchMode {
        if self.items.len() == 1 {
            BatchMode::Single
        } else {
            BatchMode::Multi
        }
    }

    pub fn item_ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }
}

/// Outcome of one call to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { chars: usize },
    TransientFailure { message: String },
    FatalFailure { message: String },
}

/// One call to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub attempt: u32,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl GenerationAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Which parser strategy produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    JsonArray,
    FencedBlock,
    Sections,
    RawText,
}

/// A loosely-typed record extracted from response text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEntry {
    /// Intended to reference a work item identifier; not trusted.
    pub discriminator: String,
    /// Artifact content to persist.
    pub content: String,
    /// Case-specific fields (name, steps, expected result, ...).
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub strategy: ParseStrategy,
}

/// How a parsed entry was bound to a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExactId,
    IdContains,
    TitleContains,
    DigitSequence,
    SoleCandidate,
}

/// A parsed entry bound to exactly one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledResult {
    pub item_id: String,
    pub entry: ParsedEntry,
    pub strategy: MatchStrategy,
}

/// Terminal state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Skipped,
    BatchGenerated,
    FallbackGenerated,
    Failed,
}

impl ItemState {
    /// Whether the item ended with an artifact.
    pub fn is_handled(self) -> bool {
        !matches!(self, ItemState::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemState::Skipped => "skipped",
            ItemState::BatchGenerated => "batch-generated",
            ItemState::FallbackGenerated => "fallback-generated",
            ItemState::Failed => "failed",
        }
    }
}

/// Final outcome for one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub state: ItemState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MatchStrategy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<GenerationAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn skipped(item_id: impl Into<String>, path: PathBuf, content: String) -> Self {
        Self {
            item_id: item_id.into(),
            state: ItemState::Skipped,
            content: Some(content),
            path: Some(path),
            strategy: None,
            attempts: Vec::new(),
            error: None,
        }
    }

    pub fn failed(
        item_id: impl Into<String>,
        error: impl Into<String>,
        attempts: Vec<GenerationAttempt>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            state: ItemState::Failed,
            content: None,
            path: None,
            strategy: None,
            attempts,
            error: Some(error.into()),
        }
    }
}

/// Per-state counts of a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub skipped: usize,
    pub batch_generated: usize,
    pub fallback_generated: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn from_outcomes(outcomes: &[ItemOutcome]) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome.state {
                ItemState::Skipped => counts.skipped += 1,
                ItemState::BatchGenerated => counts.batch_generated += 1,
                ItemState::FallbackGenerated => counts.fallback_generated += 1,
                ItemState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn handled(&self) -> usize {
        self.skipped + self.batch_generated + self.fallback_generated
    }

    pub fn total(&self) -> usize {
        self.handled() + self.failed
    }
}

/// Final result of a pipeline run, one outcome per input item in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub kind: ArtifactKind,
    pub outcomes: Vec<ItemOutcome>,
    pub counts: OutcomeCounts,
    pub coverage_percentage: u32,
    pub summary: String,
    pub completed_at: DateTime<Utc>,
}

impl PipelineResult {
    pub fn outcome(&self, item_id: &str) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|outcome| outcome.item_id == item_id)
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcomes and aggregates, ignoring the completion timestamp.
    pub fn same_outcome_as(&self, other: &PipelineResult) -> bool {
        self.kind == other.kind
            && self.outcomes == other.outcomes
            && self.counts == other.counts
            && self.coverage_percentage == other.coverage_percentage
            && self.summary == other.summary
    }
}
