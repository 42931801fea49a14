//! Patches always advance the version by exactly one and keep identity

use plotweave::context::{Context, ContextData, ContextPatch, StoryData};
use plotweave::types::{now, ContextId, ContextType};
use proptest::prelude::*;

fn patch_strategy() -> impl Strategy<Value = ContextPatch> {
    prop_oneof![
        "[a-zA-Z ]{1,24}".prop_map(|t| ContextPatch::new().set("title", t).unwrap()),
        ".{0,64}".prop_map(|s| ContextPatch::new().set("synopsis", s).unwrap()),
        proptest::collection::vec("[a-z]{1,8}", 0..4).prop_map(|tags| ContextPatch::new().tags(tags)),
    ]
}

proptest! {
    #[test]
    fn test_version_increments_once_per_patch(patches in proptest::collection::vec(patch_strategy(), 1..20)) {
        let start = Context::new(
            ContextId::from("story"),
            ContextData::Story(StoryData::titled("Seed")),
            vec![],
            now(),
        );
        let mut current = start.clone();
        for (n, patch) in patches.iter().enumerate() {
            let next = patch.apply(&current, now()).unwrap();
            prop_assert_eq!(next.version(), current.version() + 1);
            prop_assert_eq!(next.version(), n as u64 + 2);
            prop_assert_eq!(&next.id, &start.id);
            prop_assert_eq!(next.context_type(), ContextType::Story);
            prop_assert_eq!(next.metadata.created_at, start.metadata.created_at);
            prop_assert!(next.metadata.updated_at >= next.metadata.created_at);
            current = next;
        }
    }

    #[test]
    fn test_identity_fields_cannot_be_patched(value in "[a-z]{1,12}") {
        let ctx = Context::new(
            ContextId::from("story"),
            ContextData::Story(StoryData::titled("Seed")),
            vec![],
            now(),
        );
        for key in ["id", "type"] {
            let patch = ContextPatch::new().set(key, &value).unwrap();
            prop_assert!(patch.apply(&ctx, now()).is_err());
        }
    }
}
