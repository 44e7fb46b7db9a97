//! Shared test utilities: a scripted in-process generation client and pipeline setup.

use artifact_forge::generation::client::{GenerationClient, GenerationOptions};
use artifact_forge::generation::pipeline::{GenerationPipeline, PipelineConfig};
use artifact_forge::generation::retry::RetryPolicy;
use artifact_forge::store::ArtifactLayout;
use artifact_forge::{ArtifactKind, GenerationError, WorkItem};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Script = dyn Fn(&[String], u32) -> Result<String, GenerationError> + Send + Sync;

/// Replies according to a script keyed by the item ids found in the prompt.
///
/// The script receives the prompt's ids and the 1-based call count for that exact id set,
/// so a batch call and a later single-item call for one of its items count separately.
pub struct ScriptedClient {
    script: Box<Script>,
    delay: Duration,
    calls: Mutex<HashMap<String, u32>>,
    total: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(
        script: impl Fn(&[String], u32) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::from_millis(5),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answers with a well-formed entry for every requested id.
    pub fn echo() -> Self {
        Self::new(|ids, _| Ok(json_reply(ids)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Calls made for exactly this id set.
    pub fn calls_for(&self, ids: &[&str]) -> u32 {
        self.calls
            .lock()
            .get(&ids.join(","))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let ids = prompt_ids(prompt);
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(ids.join(",")).or_insert(0);
            *count += 1;
            *count
        };
        self.total.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.script)(&ids, call)
    }
}

/// Ids listed by the default prompt builder (`- id: <id>` lines).
pub fn prompt_ids(prompt: &str) -> Vec<String> {
    prompt
        .lines()
        .filter_map(|line| line.strip_prefix("- id: "))
        .map(|id| id.trim().to_string())
        .collect()
}

/// A JSON array response carrying one entry per id.
pub fn json_reply(ids: &[String]) -> String {
    let entries: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "content": format!("# Plan for {id}\n- prepare\n- act\n- verify"),
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

/// `count` items named item-01, item-02, ... in one category.
pub fn items(count: usize) -> Vec<WorkItem> {
    (1..=count)
        .map(|n| {
            WorkItem::new(
                format!("item-{n:02}"),
                format!("Feature {n}"),
                format!("Description of feature {n}"),
                "api",
                "phase-1",
            )
        })
        .collect()
}

pub fn fast_config(batch_size: usize, concurrency: usize) -> PipelineConfig {
    PipelineConfig {
        batch_size,
        concurrency,
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        ..PipelineConfig::default()
    }
}

/// Test-plan pipeline writing under `root`.
pub fn pipeline(client: Arc<ScriptedClient>, root: &Path, config: PipelineConfig) -> GenerationPipeline {
    GenerationPipeline::new(client, ArtifactKind::TestPlan)
        .with_layout(ArtifactLayout::with_root(root))
        .with_config(config)
}
