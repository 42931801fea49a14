//! Integration tests for bundle export and import between stores

use super::test_utils::{character, open_manager, story};
use plotweave::context::{ContextData, ContextPatch};
use plotweave::error::ContextError;
use plotweave::manager::CreateOptions;
use plotweave::store::ContextStore;
use plotweave::transfer::{
    ExportBundle, ExportOptions, ImportOptions, ImportOutcome, MergeStrategy,
};
use plotweave::types::ContextType;

#[tokio::test]
async fn test_full_bundle_reproduces_store() {
    let (_src_dir, src_store, source) = open_manager().await;
    let s = source
        .create_context(story("Glass Tide"), CreateOptions::default())
        .await
        .unwrap();
    source
        .update_context(
            &s.id,
            ContextType::Story,
            ContextPatch::new().set("synopsis", "A drowned city").unwrap(),
        )
        .await
        .unwrap();
    source
        .create_branch(&s.id, ContextType::Story, "What if")
        .await
        .unwrap();
    let c = source
        .create_context(character(&s.id, "Ilse"), CreateOptions::default())
        .await
        .unwrap();

    let bundle = source.export(&ExportOptions::full()).await.unwrap();
    let json = bundle.to_json().unwrap();
    let bundle = ExportBundle::from_json(&json).unwrap();
    bundle.verify().unwrap();

    let (_dst_dir, dst_store, target) = open_manager().await;
    let report = target
        .import(
            &bundle,
            &ImportOptions {
                create_backup: false,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.count(ImportOutcome::Skipped), 0);

    for (id, ty) in [(&s.id, ContextType::Story), (&c.id, ContextType::Character)] {
        let original = src_store.load(id, ty).await.unwrap();
        let copied = dst_store.load(id, ty).await.unwrap();
        assert_eq!(copied.version(), original.version());
        assert_eq!(copied.branches, original.branches);
        assert_eq!(copied.data, original.data);
    }
    assert_eq!(
        dst_store.history(&s.id, ContextType::Story).await.unwrap().len(),
        src_store.history(&s.id, ContextType::Story).await.unwrap().len()
    );
    assert!(target.collection().get(&c.id, ContextType::Character).is_some());
    assert_eq!(
        target.collection().session.map(|session| session.id),
        target.session_id()
    );
}

#[tokio::test]
async fn test_tampered_bundle_is_rejected_without_writes() {
    let (_src_dir, _src_store, source) = open_manager().await;
    source
        .create_context(story("Original"), CreateOptions::default())
        .await
        .unwrap();
    let mut bundle = source
        .export(&ExportOptions {
            context_types: Some(vec![ContextType::Story]),
            ..ExportOptions::full()
        })
        .await
        .unwrap();
    if let ContextData::Story(data) = &mut bundle.contexts[0].data.data {
        data.title = "Forged".to_string();
    }

    let (_dst_dir, dst_store, target) = open_manager().await;
    let before = dst_store.stats().total_records();
    let err = target
        .import(&bundle, &ImportOptions::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::ValidationFailure(_)), "got {:?}", err);
    assert_eq!(dst_store.stats().total_records(), before);
}

#[tokio::test]
async fn test_keep_both_adds_a_second_copy() {
    let (_dir, store, manager) = open_manager().await;
    let s = manager
        .create_context(story("Twin"), CreateOptions::default())
        .await
        .unwrap();
    let bundle = manager
        .export(&ExportOptions {
            context_types: Some(vec![ContextType::Story]),
            ..ExportOptions::full()
        })
        .await
        .unwrap();

    let report = manager
        .import(
            &bundle,
            &ImportOptions {
                merge_strategy: MergeStrategy::KeepBoth,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.count(ImportOutcome::Duplicated), 1);
    assert!(report.backup.is_some());
    assert_ne!(report.entries[0].id, s.id);
    assert_eq!(store.list(Some(ContextType::Story)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ask_user_without_prompt_is_refused() {
    let (_dir, _store, manager) = open_manager().await;
    let bundle = manager.export(&ExportOptions::full()).await.unwrap();
    let err = manager
        .import(
            &bundle,
            &ImportOptions {
                merge_strategy: MergeStrategy::AskUser,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::MergeConflict(_)));
}
