//! Refinement runs keep earlier successes and never lower coverage.

use super::support::{fast_config, items, json_reply, pipeline, ScriptedClient};
use artifact_forge::types::ItemState;
use artifact_forge::GenerationError;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn refinement_fills_gaps_and_keeps_successes() {
    let temp = TempDir::new().unwrap();
    let mut config = fast_config(5, 3);
    config.persist = false;
    let work = items(4);

    let flaky = Arc::new(ScriptedClient::new(|ids, _| {
        if ids.iter().any(|id| id == "item-04") {
            Err(GenerationError::Configuration("model not loaded".to_string()))
        } else {
            Ok(json_reply(ids))
        }
    }));
    let first = pipeline(flaky, temp.path(), config.clone())
        .run(&work)
        .await
        .unwrap();
    assert_eq!(first.coverage_percentage, 75);

    let healthy = Arc::new(ScriptedClient::echo());
    let refined = pipeline(healthy.clone(), temp.path(), config.clone())
        .refine(&work, &first, "Focus on error paths")
        .await
        .unwrap();

    assert_eq!(refined.coverage_percentage, 100);
    assert_eq!(refined.outcome("item-04").unwrap().state, ItemState::BatchGenerated);
    assert!(healthy.total_calls() >= 1);
}

#[tokio::test]
async fn failing_refinement_never_lowers_coverage() {
    let temp = TempDir::new().unwrap();
    let mut config = fast_config(5, 3);
    config.persist = false;
    let work = items(4);

    let first = pipeline(Arc::new(ScriptedClient::echo()), temp.path(), config.clone())
        .run(&work)
        .await
        .unwrap();
    assert_eq!(first.coverage_percentage, 100);

    let broken = Arc::new(ScriptedClient::new(|_, _| {
        Err(GenerationError::Unauthorized("key revoked".to_string()))
    }));
    let refined = pipeline(broken, temp.path(), config)
        .refine(&work, &first, "More detail please")
        .await
        .unwrap();

    assert_eq!(refined.coverage_percentage, 100);
    assert!(refined.coverage_percentage >= first.coverage_percentage);
    for outcome in &refined.outcomes {
        assert_eq!(outcome.state, ItemState::BatchGenerated);
        assert_eq!(Some(outcome), first.outcome(&outcome.item_id));
    }
}

#[tokio::test]
async fn refinement_context_reaches_the_prompt() {
    let temp = TempDir::new().unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
    let recorder = RecordingClient { seen: seen.clone() };
    let work = items(1);
    let first = artifact_forge::generation::aggregate::ResultAggregator::finish(
        artifact_forge::ArtifactKind::TestPlan,
        vec![artifact_forge::ItemOutcome::failed("item-01", "timeout", Vec::new())],
    );

    let pipeline = artifact_forge::GenerationPipeline::new(
        Arc::new(recorder),
        artifact_forge::ArtifactKind::TestPlan,
    )
    .with_layout(artifact_forge::store::ArtifactLayout::with_root(temp.path()))
    .with_config(fast_config(5, 1));
    let refined = pipeline
        .refine(&work, &first, "Cover the lockout rule")
        .await
        .unwrap();

    assert_eq!(refined.coverage_percentage, 100);
    assert!(seen.lock()[0].contains("Cover the lockout rule"));
}

struct RecordingClient {
    seen: Arc<parking_lot::Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl artifact_forge::GenerationClient for RecordingClient {
    async fn generate(
        &self,
        prompt: &str,
        _options: &artifact_forge::GenerationOptions,
    ) -> Result<String, GenerationError> {
        self.seen.lock().push(prompt.to_string());
        Ok(json_reply(&super::support::prompt_ids(prompt)))
    }
}
