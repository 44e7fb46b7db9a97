//! Work item sources.

use crate::error::PipelineError;
use crate::types::WorkItem;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Supplies work items in a stable order.
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    async fn load(&self) -> Result<Vec<WorkItem>, PipelineError>;
}

/// Reads a JSON array of work items, or an object with an `items` array.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ItemsDocument {
    List(Vec<WorkItem>),
    Wrapped { items: Vec<WorkItem> },
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WorkItemSource for JsonFileSource {
    async fn load(&self) -> Result<Vec<WorkItem>, PipelineError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PipelineError::SourceError(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let document: ItemsDocument = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::SourceError(format!(
                "Failed to parse work items in {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let items = match document {
            ItemsDocument::List(items) | ItemsDocument::Wrapped { items } => items,
        };
        debug!(path = %self.path.display(), items = items.len(), "Loaded work items");
        Ok(items)
    }
}

/// In-memory source, mostly for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    items: Vec<WorkItem>,
}

impl StaticSource {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl WorkItemSource for StaticSource {
    async fn load(&self) -> Result<Vec<WorkItem>, PipelineError> {
        Ok(self.items.clone())
    }
}
