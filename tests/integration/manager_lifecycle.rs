//! Integration tests for the context manager over a real sled store

use super::test_utils::{character, conversation, open_manager, story, ScriptedGenerator};
use plotweave::context::{ContextData, ContextPatch, ContextQuery, MessageRole};
use plotweave::error::ContextError;
use plotweave::manager::{ContextManager, CreateOptions, ManagerConfig};
use plotweave::store::{ContextStore, SledContextStore, StoreOptions};
use plotweave::types::ContextType;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_story_workflow_end_to_end() {
    let (_dir, _store, manager) = open_manager().await;

    let s = manager
        .create_context(story("The Salt Road"), CreateOptions::default())
        .await
        .unwrap();
    let c = manager
        .create_context(character(&s.id, "Mara"), CreateOptions::default())
        .await
        .unwrap();
    let conv = manager
        .create_context(conversation(&s.id, Some(&c.id)), CreateOptions::default())
        .await
        .unwrap();

    manager.set_active_context(&s.id, ContextType::Story).await.unwrap();
    manager.set_active_context(&conv.id, ContextType::Conversation).await.unwrap();

    let generator = ScriptedGenerator { fail: false };
    let reply = manager
        .generate_reply(&conv.id, "Where does the road end?", &generator)
        .await
        .unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "The Salt Road#0: Where does the road end?");

    let stored = manager
        .load_context(&conv.id, ContextType::Conversation)
        .await
        .unwrap();
    assert_eq!(stored.version(), 2);
    match &stored.data {
        ContextData::Conversation(data) => {
            assert_eq!(data.messages.len(), 2);
            assert_eq!(data.messages[0].role, MessageRole::User);
        }
        other => panic!("unexpected payload {:?}", other),
    }

    let fleshed = manager.flesh_out_character(&c.id, &generator).await.unwrap();
    match fleshed.data {
        ContextData::Character(data) => assert_eq!(data.description, "character profile: Mara"),
        other => panic!("unexpected payload {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_generation_leaves_conversation_untouched() {
    let (_dir, _store, manager) = open_manager().await;
    let s = manager
        .create_context(story("Quiet"), CreateOptions::default())
        .await
        .unwrap();
    let conv = manager
        .create_context(conversation(&s.id, None), CreateOptions::default())
        .await
        .unwrap();

    let generator = ScriptedGenerator { fail: true };
    let err = manager
        .generate_reply(&conv.id, "hello", &generator)
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::StorageFailure(_)), "got {:?}", err);
    let stored = manager
        .load_context(&conv.id, ContextType::Conversation)
        .await
        .unwrap();
    assert_eq!(stored.version(), 1);
}

#[tokio::test]
async fn test_active_set_restored_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    let (session_id, story_id) = {
        let store: Arc<dyn ContextStore> =
            Arc::new(SledContextStore::open(&path, StoreOptions::default()).unwrap());
        let manager = ContextManager::open(store, ManagerConfig::default())
            .await
            .unwrap();
        let s = manager
            .create_context(story("Persisted"), CreateOptions::default())
            .await
            .unwrap();
        manager.set_active_context(&s.id, ContextType::Story).await.unwrap();
        manager.store().flush().await.unwrap();
        (manager.session_id().unwrap(), s.id)
    };

    let store: Arc<dyn ContextStore> =
        Arc::new(SledContextStore::open(&path, StoreOptions::default()).unwrap());
    let manager = ContextManager::open(store, ManagerConfig::default())
        .await
        .unwrap();
    assert_eq!(manager.session_id(), Some(session_id));
    assert_eq!(manager.active().story, Some(story_id.clone()));
    assert!(manager
        .collection()
        .get(&story_id, ContextType::Story)
        .is_some());
}

#[tokio::test]
async fn test_concurrent_patches_all_land() {
    let (_dir, _store, manager) = open_manager().await;
    let manager = Arc::new(manager);
    let s = manager
        .create_context(story("Busy"), CreateOptions::default())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..8 {
        let manager = Arc::clone(&manager);
        let id = s.id.clone();
        handles.push(tokio::spawn(async move {
            let patch = ContextPatch::new().set("synopsis", format!("pass {}", n)).unwrap();
            manager.update_context(&id, ContextType::Story, patch).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = manager.load_context(&s.id, ContextType::Story).await.unwrap();
    assert_eq!(stored.version(), 9);
}

#[tokio::test]
async fn test_stale_version_is_a_merge_conflict() {
    let (_dir, _store, manager) = open_manager().await;
    let s = manager
        .create_context(story("Race"), CreateOptions::default())
        .await
        .unwrap();
    let patch = ContextPatch::new().set("genre", "noir").unwrap();
    manager
        .update_context_if_version(&s.id, ContextType::Story, 1, patch.clone())
        .await
        .unwrap();
    let err = manager
        .update_context_if_version(&s.id, ContextType::Story, 1, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::MergeConflict(_)));
}

#[tokio::test]
async fn test_query_by_story_and_tags() {
    let (_dir, _store, manager) = open_manager().await;
    let a = manager
        .create_context(story("A"), CreateOptions::default())
        .await
        .unwrap();
    let b = manager
        .create_context(story("B"), CreateOptions::default())
        .await
        .unwrap();
    for (owner, name, tag) in [(&a, "Ann", "lead"), (&a, "Abe", "minor"), (&b, "Bo", "lead")] {
        manager
            .create_context(
                character(&owner.id, name),
                CreateOptions {
                    tags: vec![tag.to_string()],
                },
            )
            .await
            .unwrap();
    }

    let leads_of_a = manager
        .query_contexts(
            &ContextQuery::new(ContextType::Character)
                .story(a.id.clone())
                .any_tag(vec!["lead".into()]),
        )
        .await
        .unwrap();
    assert_eq!(leads_of_a.len(), 1);
    match &leads_of_a[0].data {
        ContextData::Character(data) => assert_eq!(data.name, "Ann"),
        other => panic!("unexpected payload {:?}", other),
    }
}

#[tokio::test]
async fn test_branch_switch_persists() {
    let (_dir, store, manager) = open_manager().await;
    let s = manager
        .create_context(story("Forks"), CreateOptions::default())
        .await
        .unwrap();
    let alt = manager
        .create_branch(&s.id, ContextType::Story, "Dark ending")
        .await
        .unwrap();
    manager
        .switch_branch(&s.id, ContextType::Story, &alt.id)
        .await
        .unwrap();

    let stored = store.load(&s.id, ContextType::Story).await.unwrap();
    assert_eq!(stored.current_branch_id, alt.id);
    assert_eq!(stored.branches.iter().filter(|b| b.is_active).count(), 1);
}
