//! End-to-end pipeline runs against a scripted generation service.

use super::support::{fast_config, items, json_reply, pipeline, ScriptedClient};
use artifact_forge::types::{ItemState, MatchStrategy};
use artifact_forge::GenerationError;
use std::sync::Arc;
use tempfile::TempDir;

const BATCH_ONE: &[&str] = &["item-01", "item-02", "item-03", "item-04", "item-05"];
const BATCH_TWO: &[&str] = &["item-06", "item-07", "item-08", "item-09", "item-10"];
const BATCH_THREE: &[&str] = &["item-11", "item-12"];

#[tokio::test]
async fn twelve_items_with_malformed_and_slow_batches() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|ids, call| {
        if ids.len() == 5 && ids[0] == "item-06" {
            // Prose instead of the requested JSON
            return Ok("I am unable to complete this request right now.".to_string());
        }
        if ids.len() == 2 && call == 1 {
            return Err(GenerationError::Timeout("request exceeded 120s".to_string()));
        }
        Ok(json_reply(ids))
    }));
    let work = items(12);

    let result = pipeline(client.clone(), temp.path(), fast_config(5, 3))
        .run(&work)
        .await
        .unwrap();

    assert_eq!(result.total(), 12);
    assert_eq!(result.counts.batch_generated, 7);
    assert_eq!(result.counts.fallback_generated, 5);
    assert_eq!(result.counts.failed, 0);
    assert_eq!(result.counts.skipped, 0);
    assert_eq!(result.coverage_percentage, 100);

    let ids: Vec<&str> = result.outcomes.iter().map(|o| o.item_id.as_str()).collect();
    let expected: Vec<String> = work.iter().map(|item| item.id.clone()).collect();
    assert_eq!(ids, expected);

    for id in BATCH_TWO {
        let outcome = result.outcome(id).unwrap();
        assert_eq!(outcome.state, ItemState::FallbackGenerated);
        assert_eq!(client.calls_for(&[*id]), 1);
    }
    for id in BATCH_ONE.iter().chain(BATCH_THREE) {
        let outcome = result.outcome(id).unwrap();
        assert_eq!(outcome.state, ItemState::BatchGenerated);
        assert_eq!(outcome.strategy, Some(MatchStrategy::ExactId));
        assert!(outcome.path.as_ref().unwrap().exists());
    }

    assert_eq!(client.calls_for(BATCH_ONE), 1);
    assert_eq!(client.calls_for(BATCH_TWO), 1);
    assert_eq!(client.calls_for(BATCH_THREE), 2);
    assert_eq!(client.total_calls(), 9);
    assert!(client.max_in_flight() <= 3);

    let slow = result.outcome("item-11").unwrap();
    assert_eq!(slow.attempts.len(), 2);
    assert!(!slow.attempts[0].succeeded());
    assert!(slow.attempts[1].succeeded());
}

#[tokio::test]
async fn fatal_batch_and_fallback_failures_end_as_failed() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|ids, _| {
        if ids.iter().any(|id| id == "item-03") {
            return Err(GenerationError::Unauthorized("invalid api key".to_string()));
        }
        Ok(json_reply(ids))
    }));

    let result = pipeline(client.clone(), temp.path(), fast_config(5, 2))
        .run(&items(4))
        .await
        .unwrap();

    // The batch fails fatally, the fallback recovers everything but item-03.
    assert_eq!(result.counts.fallback_generated, 3);
    assert_eq!(result.counts.failed, 1);
    assert_eq!(result.coverage_percentage, 75);

    let failed = result.outcome("item-03").unwrap();
    assert_eq!(failed.state, ItemState::Failed);
    assert!(failed.error.as_deref().unwrap().contains("invalid api key"));
    assert_eq!(failed.attempts.len(), 1);
    assert_eq!(client.calls_for(&["item-03"]), 1);
    assert!(result.summary.contains("1 failed"));
}

#[tokio::test]
async fn partially_reconciled_batch_only_falls_back_for_missing_items() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::new(|ids, _| {
        if ids.len() > 1 {
            // Drops the last item and labels the rest loosely
            let entries: Vec<serde_json::Value> = ids[..ids.len() - 1]
                .iter()
                .map(|id| serde_json::json!({"id": format!("Test plan {id}"), "content": format!("plan {id}\n- a\n- b")}))
                .collect();
            return Ok(serde_json::Value::Array(entries).to_string());
        }
        Ok(json_reply(ids))
    }));

    let result = pipeline(client.clone(), temp.path(), fast_config(3, 3))
        .run(&items(3))
        .await
        .unwrap();

    assert_eq!(result.counts.batch_generated, 2);
    assert_eq!(result.counts.fallback_generated, 1);
    assert_eq!(
        result.outcome("item-01").unwrap().strategy,
        Some(MatchStrategy::IdContains)
    );
    assert_eq!(result.outcome("item-03").unwrap().state, ItemState::FallbackGenerated);
    assert_eq!(client.calls_for(&["item-01"]), 0);
    assert_eq!(client.calls_for(&["item-03"]), 1);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_call() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::echo());
    let mut work = items(2);
    work[1].id = work[0].id.clone();

    let err = pipeline(client.clone(), temp.path(), fast_config(5, 3))
        .run(&work)
        .await
        .unwrap_err();

    assert!(matches!(err, artifact_forge::PipelineError::InvalidInput(_)));
    assert_eq!(client.total_calls(), 0);
}

#[tokio::test]
async fn empty_item_set_is_fully_covered() {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::echo());
    let result = pipeline(client.clone(), temp.path(), fast_config(5, 3))
        .run(&[])
        .await
        .unwrap();

    assert_eq!(result.total(), 0);
    assert_eq!(result.coverage_percentage, 100);
    assert_eq!(client.total_calls(), 0);
}
