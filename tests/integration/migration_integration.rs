//! Integration tests for migrating legacy chapter state into a stored story

use super::test_utils::{open_manager, story};
use plotweave::context::ContextData;
use plotweave::manager::CreateOptions;
use plotweave::migration::{validate_composed_state, LegacyState, PhaseKind};
use plotweave::types::ContextType;

const LEGACY_JSON: &str = r#"{
    "plotPoint": "The lighthouse keeper finds a letter",
    "incorporatedFeedback": [
        {"content": "Slow the opening", "phase": "plotOutline", "priority": "high"},
        {"content": "Name the ship"}
    ],
    "feedbackRequests": {"r1": {"request": "more dread", "status": "pending"}},
    "generatedChapter": {"title": "One", "content": "Fog rolled in."},
    "editorReview": {
        "suggestions": [
            {"issue": "Tense shifts", "suggestion": "Stay in past tense"},
            {"issue": "Dialogue tags"}
        ],
        "userSelections": [true, false]
    }
}"#;

#[tokio::test]
async fn test_legacy_state_becomes_story_composition() {
    let (_dir, _store, manager) = open_manager().await;
    let s = manager
        .create_context(story("Beacon"), CreateOptions::default())
        .await
        .unwrap();
    let legacy: LegacyState = serde_json::from_str(LEGACY_JSON).unwrap();

    let result = manager.apply_migration(&s.id, &legacy, None).await.unwrap();
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.warnings().count() >= 1, "dropped feedback requests should warn");

    let stored = manager.load_context(&s.id, ContextType::Story).await.unwrap();
    assert_eq!(stored.version(), 2);
    let ContextData::Story(data) = stored.data else {
        panic!("story payload expected");
    };
    let composition = data.composition.expect("composition stored");
    assert_eq!(composition.current_phase, PhaseKind::FinalEdit);
    assert!(validate_composed_state(&composition).valid);
}

#[tokio::test]
async fn test_failed_migration_writes_nothing() {
    let (_dir, _store, manager) = open_manager().await;
    let s = manager
        .create_context(story("Broken"), CreateOptions::default())
        .await
        .unwrap();
    let legacy: LegacyState = serde_json::from_str(
        r#"{"incorporatedFeedback": [{"content": "x", "phase": "epilogue"}]}"#,
    )
    .unwrap();

    let result = manager.apply_migration(&s.id, &legacy, None).await.unwrap();
    assert!(!result.success);
    assert!(result.state.is_none());
    assert!(!result.log.is_empty());
    let stored = manager.load_context(&s.id, ContextType::Story).await.unwrap();
    assert_eq!(stored.version(), 1);
}
