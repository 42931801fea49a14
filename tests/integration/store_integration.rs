//! Integration tests for the sled context store

use super::test_utils::{character, open_store, story};
use plotweave::context::{Context, ContextPatch};
use plotweave::error::ContextError;
use plotweave::store::{ContextStore, SledContextStore, StoreOptions};
use plotweave::types::{now, ContextId, ContextType};
use tempfile::TempDir;

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    let id = ContextId::from("story-1");
    {
        let store = SledContextStore::open(&path, StoreOptions::default()).unwrap();
        let ctx = Context::new(id.clone(), story("Ashfall"), vec!["draft".into()], now());
        store.save(&ctx).await.unwrap();
        store.set_current_session_id(&ContextId::from("s-1")).await.unwrap();
        store.flush().await.unwrap();
    }

    let store = SledContextStore::open(&path, StoreOptions::default()).unwrap();
    let loaded = store.load(&id, ContextType::Story).await.unwrap();
    assert_eq!(loaded.metadata.tags, vec!["draft".to_string()]);
    assert_eq!(
        store.current_session_id().await.unwrap(),
        Some(ContextId::from("s-1"))
    );
    assert_eq!(store.stats().count(ContextType::Story), 1);
}

#[tokio::test]
async fn test_same_id_different_types_do_not_collide() {
    let (_dir, store) = open_store(StoreOptions::default());
    let id = ContextId::from("shared");
    let story_ctx = Context::new(id.clone(), story("One"), vec![], now());
    let char_ctx = Context::new(id.clone(), character(&id, "Two"), vec![], now());
    store.save(&story_ctx).await.unwrap();
    store.save(&char_ctx).await.unwrap();

    assert_eq!(store.list(None).await.unwrap().len(), 2);
    store.delete(&id, ContextType::Story).await.unwrap();
    assert!(store.load(&id, ContextType::Character).await.is_ok());
    assert!(matches!(
        store.load(&id, ContextType::Story).await,
        Err(ContextError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_history_tracks_saved_versions_in_order() {
    let (_dir, store) = open_store(StoreOptions {
        quota_bytes: None,
        max_history_versions: 3,
    });
    let mut ctx = Context::new(ContextId::from("s"), story("v1"), vec![], now());
    store.save(&ctx).await.unwrap();
    for n in 2..=6 {
        ctx = ContextPatch::new()
            .set("title", format!("v{}", n))
            .unwrap()
            .apply(&ctx, now())
            .unwrap();
        store.save(&ctx).await.unwrap();
    }

    let history = store.history(&ctx.id, ContextType::Story).await.unwrap();
    let versions: Vec<u64> = history.iter().map(|c| c.version()).collect();
    assert_eq!(versions, vec![3, 4, 5]);
    assert_eq!(store.load(&ctx.id, ContextType::Story).await.unwrap().version(), 6);
}

#[tokio::test]
async fn test_quota_rejects_write_and_keeps_old_record() {
    let (_dir, store) = open_store(StoreOptions::default());
    let ctx = Context::new(ContextId::from("s"), story("short"), vec![], now());
    store.save(&ctx).await.unwrap();
    let used = store.stats().size_bytes;

    let (_dir2, tight) = open_store(StoreOptions {
        quota_bytes: Some(used + 16),
        max_history_versions: 10,
    });
    tight.save(&ctx).await.unwrap();
    let bigger = ContextPatch::new()
        .set("synopsis", "x".repeat(512))
        .unwrap()
        .apply(&ctx, now())
        .unwrap();
    let err = tight.save(&bigger).await.unwrap_err();
    assert!(matches!(err, ContextError::StorageFailure(_)), "got {:?}", err);
    assert_eq!(tight.load(&ctx.id, ContextType::Story).await.unwrap().version(), 1);
}

#[tokio::test]
async fn test_stats_subscription_sees_writes() {
    let (_dir, store) = open_store(StoreOptions::default());
    let mut rx = store.subscribe_stats();
    let ctx = Context::new(ContextId::from("s"), story("watch"), vec![], now());
    store.save(&ctx).await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().count(ContextType::Story), 1);
    assert!(rx.borrow().size_bytes > 0);
}
