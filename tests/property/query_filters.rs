//! Query results are exactly the filtered input, sliced by offset and limit

use plotweave::context::{CharacterData, Context, ContextData, ContextQuery};
use plotweave::types::{now, ContextId, ContextType};
use proptest::prelude::*;

const STORIES: [&str; 3] = ["s0", "s1", "s2"];
const TAGS: [&str; 3] = ["lead", "minor", "villain"];

fn character_strategy() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (0..STORIES.len(), proptest::collection::vec(0..TAGS.len(), 0..3))
}

fn build(specs: &[(usize, Vec<usize>)]) -> Vec<Context> {
    specs
        .iter()
        .enumerate()
        .map(|(n, (story, tags))| {
            Context::new(
                ContextId::new(format!("c{}", n)),
                ContextData::Character(CharacterData {
                    story_id: ContextId::from(STORIES[*story]),
                    name: format!("Character {}", n),
                    ..Default::default()
                }),
                tags.iter().map(|t| TAGS[*t].to_string()).collect(),
                now(),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn test_filters_are_and_combined(
        specs in proptest::collection::vec(character_strategy(), 0..30),
        story in 0..STORIES.len(),
        tag in 0..TAGS.len(),
    ) {
        let contexts = build(&specs);
        let query = ContextQuery::new(ContextType::Character)
            .story(ContextId::from(STORIES[story]))
            .any_tag(vec![TAGS[tag].to_string()]);
        let result = query.apply(contexts.clone());

        let expected: Vec<&Context> = contexts
            .iter()
            .filter(|c| {
                c.data.story_ref() == Some(&ContextId::from(STORIES[story]))
                    && c.metadata.tags.iter().any(|t| t == TAGS[tag])
            })
            .collect();
        prop_assert_eq!(result.iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_paging_slices_filtered_results(
        specs in proptest::collection::vec(character_strategy(), 0..30),
        offset in 0usize..10,
        limit in 0usize..10,
    ) {
        let contexts = build(&specs);
        let all = ContextQuery::new(ContextType::Character).apply(contexts.clone());
        let page = ContextQuery::new(ContextType::Character)
            .page(offset, limit)
            .apply(contexts);
        let expected: Vec<Context> = all.into_iter().skip(offset).take(limit).collect();
        prop_assert_eq!(page, expected);
    }
}
