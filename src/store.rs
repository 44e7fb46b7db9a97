//! Artifact storage: where generated artifacts live and how they are read and written.

use crate::error::StoreError;
use crate::types::{ArtifactKind, WorkItem};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Simple filesystem-like artifact persistence.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;
    async fn read(&self, path: &Path) -> Result<String, StoreError>;
    async fn write(&self, path: &Path, content: &str) -> Result<(), StoreError>;
}

/// [`ArtifactStore`] backed by the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsArtifactStore;

impl FsArtifactStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> Result<String, StoreError> {
        tokio::fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Deterministic artifact locations: `<root>/<kind dir>/<sanitized id>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLayout {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_schema_dir")]
    pub schema_dir: String,
    #[serde(default = "default_schema_extension")]
    pub schema_extension: String,
    #[serde(default = "default_test_plan_dir")]
    pub test_plan_dir: String,
    #[serde(default = "default_test_plan_extension")]
    pub test_plan_extension: String,
}

fn default_root() -> PathBuf {
    PathBuf::from(".artifact-forge/artifacts")
}

fn default_schema_dir() -> String {
    "schemas".to_string()
}

fn default_schema_extension() -> String {
    "json".to_string()
}

fn default_test_plan_dir() -> String {
    "test-plans".to_string()
}

fn default_test_plan_extension() -> String {
    "md".to_string()
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            root: default_root(),
            schema_dir: default_schema_dir(),
            schema_extension: default_schema_extension(),
            test_plan_dir: default_test_plan_dir(),
            test_plan_extension: default_test_plan_extension(),
        }
    }
}

impl ArtifactLayout {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn extension(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Schema => &self.schema_extension,
            ArtifactKind::TestPlan => &self.test_plan_extension,
        }
    }

    pub fn path_for(&self, kind: ArtifactKind, item: &WorkItem) -> PathBuf {
        let dir = match kind {
            ArtifactKind::Schema => &self.schema_dir,
            ArtifactKind::TestPlan => &self.test_plan_dir,
        };
        self.root
            .join(dir)
            .join(format!("{}.{}", sanitize_id(&item.id), self.extension(kind)))
    }
}

/// Writes generated artifacts at their layout path.
#[derive(Clone)]
pub struct ArtifactWriter {
    store: Arc<dyn ArtifactStore>,
    layout: ArtifactLayout,
    kind: ArtifactKind,
    persist: bool,
}

impl ArtifactWriter {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        layout: ArtifactLayout,
        kind: ArtifactKind,
        persist: bool,
    ) -> Self {
        Self {
            store,
            layout,
            kind,
            persist,
        }
    }

    /// Persist `content` for `item`. Returns the written path, or `None` when persistence
    /// is disabled.
    pub async fn save(&self, item: &WorkItem, content: &str) -> Result<Option<PathBuf>, StoreError> {
        if !self.persist {
            return Ok(None);
        }
        let path = self.layout.path_for(self.kind, item);
        self.store.write(&path, content).await?;
        Ok(Some(path))
    }
}

/// Map an identifier to a safe file stem; anything outside `[A-Za-z0-9._-]` becomes `_`.
///
/// Identifiers that are already safe are kept as is. Any other identifier gets a short
/// blake3 suffix of the raw id, so `auth/login` and `auth_login` never share a file.
pub fn sanitize_id(id: &str) -> String {
    let sanitized: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    let stem = if sanitized.is_empty() { "_" } else { sanitized };
    if stem == id {
        return stem.to_string();
    }
    let digest = blake3::hash(id.as_bytes()).to_hex();
    format!("{}-{}", stem, &digest.as_str()[..8])
}
