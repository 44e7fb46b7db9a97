//! Skip guard and idempotence: valid artifacts mean no generation calls.

use super::support::{fast_config, items, pipeline, ScriptedClient};
use artifact_forge::store::ArtifactLayout;
use artifact_forge::types::{ArtifactKind, ItemState, WorkItem};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn item_with_valid_artifact_is_skipped_without_calls() {
    let temp = TempDir::new().unwrap();
    let work = items(3);
    let layout = ArtifactLayout::with_root(temp.path());
    let existing = layout.path_for(ArtifactKind::TestPlan, &work[1]);
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, "# Existing plan\n- step one\n- step two\n").unwrap();

    let client = Arc::new(ScriptedClient::echo());
    let result = pipeline(client.clone(), temp.path(), fast_config(5, 3))
        .run(&work)
        .await
        .unwrap();

    let skipped = result.outcome("item-02").unwrap();
    assert_eq!(skipped.state, ItemState::Skipped);
    assert_eq!(
        skipped.content.as_deref(),
        Some("# Existing plan\n- step one\n- step two\n")
    );
    assert!(skipped.attempts.is_empty());
    assert_eq!(client.calls_for(&["item-02"]), 0);
    assert_eq!(client.calls_for(&["item-01", "item-03"]), 1);
    assert_eq!(result.counts.skipped, 1);
    assert_eq!(result.counts.batch_generated, 2);
}

#[tokio::test]
async fn invalid_existing_artifact_is_regenerated() {
    let temp = TempDir::new().unwrap();
    let work = items(1);
    let layout = ArtifactLayout::with_root(temp.path());
    let existing = layout.path_for(ArtifactKind::TestPlan, &work[0]);
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, "TODO\n").unwrap();

    let client = Arc::new(ScriptedClient::echo());
    let result = pipeline(client.clone(), temp.path(), fast_config(5, 3))
        .run(&work)
        .await
        .unwrap();

    assert_eq!(result.outcomes[0].state, ItemState::BatchGenerated);
    assert_eq!(client.total_calls(), 1);
    let rewritten = std::fs::read_to_string(&existing).unwrap();
    assert!(rewritten.starts_with("# Plan for item-01"));
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let temp = TempDir::new().unwrap();
    let work = items(7);

    let first_client = Arc::new(ScriptedClient::echo());
    let first = pipeline(first_client.clone(), temp.path(), fast_config(3, 2))
        .run(&work)
        .await
        .unwrap();
    assert_eq!(first.counts.batch_generated, 7);
    assert_eq!(first_client.total_calls(), 3);

    let client = Arc::new(ScriptedClient::echo());
    let second = pipeline(client.clone(), temp.path(), fast_config(3, 2))
        .run(&work)
        .await
        .unwrap();
    let third = pipeline(client.clone(), temp.path(), fast_config(3, 2))
        .run(&work)
        .await
        .unwrap();

    assert_eq!(client.total_calls(), 0);
    assert_eq!(second.counts.skipped, 7);
    assert_eq!(second.coverage_percentage, 100);
    assert!(second.same_outcome_as(&third));
}

#[tokio::test]
async fn ids_with_the_same_safe_spelling_keep_separate_artifacts() {
    let temp = TempDir::new().unwrap();
    let work = vec![
        WorkItem::new("auth/login", "Login", "", "auth", "phase-1"),
        WorkItem::new("auth_login", "Login helper", "", "auth", "phase-1"),
    ];

    let first = pipeline(Arc::new(ScriptedClient::echo()), temp.path(), fast_config(5, 1))
        .run(&work)
        .await
        .unwrap();
    let slash_path = first.outcome("auth/login").unwrap().path.clone().unwrap();
    let underscore_path = first.outcome("auth_login").unwrap().path.clone().unwrap();
    assert_ne!(slash_path, underscore_path);
    assert_eq!(slash_path.parent(), underscore_path.parent());

    let client = Arc::new(ScriptedClient::echo());
    let second = pipeline(client.clone(), temp.path(), fast_config(5, 1))
        .run(&work)
        .await
        .unwrap();
    assert_eq!(client.total_calls(), 0);
    for id in ["auth/login", "auth_login"] {
        let outcome = second.outcome(id).unwrap();
        assert_eq!(outcome.state, ItemState::Skipped);
        assert!(outcome
            .content
            .as_deref()
            .unwrap()
            .starts_with(&format!("# Plan for {id}\n")));
    }
}
