//! Context query filters.
//!
//! Filters run in a fixed order (story, character, branch, creation date,
//! tags) and are AND-combined; a missing filter imposes no constraint.
//! Offset and limit are applied after filtering.

use crate::context::data::ContextData;
use crate::context::record::Context;
use crate::types::{ContextId, ContextType, Timestamp};
use serde::{Deserialize, Serialize};

/// Inclusive creation-date window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl DateRange {
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextQuery {
    pub context_type: ContextType,
    #[serde(default)]
    pub story_id: Option<ContextId>,
    #[serde(default)]
    pub character_id: Option<ContextId>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Match contexts carrying any of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ContextQuery {
    pub fn new(context_type: ContextType) -> Self {
        ContextQuery {
            context_type,
            story_id: None,
            character_id: None,
            branch_id: None,
            date_range: None,
            tags: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    pub fn story(mut self, story_id: ContextId) -> Self {
        self.story_id = Some(story_id);
        self
    }

    pub fn character(mut self, character_id: ContextId) -> Self {
        self.character_id = Some(character_id);
        self
    }

    pub fn branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    pub fn created_between(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.date_range = Some(DateRange { start, end });
        self
    }

    pub fn any_tag(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, context: &Context) -> bool {
        self.matches_story(context)
            && self.matches_character(context)
            && self.matches_branch(context)
            && self.matches_dates(context)
            && self.matches_tags(context)
    }

    /// Filter then slice, keeping input order.
    pub fn apply(&self, contexts: Vec<Context>) -> Vec<Context> {
        let filtered = contexts.into_iter().filter(|c| self.matches(c));
        match self.limit {
            Some(limit) => filtered.skip(self.offset).take(limit).collect(),
            None => filtered.skip(self.offset).collect(),
        }
    }

    fn matches_story(&self, context: &Context) -> bool {
        let Some(story_id) = &self.story_id else {
            return true;
        };
        match &context.data {
            ContextData::Story(_) => &context.id == story_id,
            other => other.story_ref() == Some(story_id),
        }
    }

    fn matches_character(&self, context: &Context) -> bool {
        let Some(character_id) = &self.character_id else {
            return true;
        };
        match &context.data {
            ContextData::Character(_) => &context.id == character_id,
            other => other.character_ref() == Some(character_id),
        }
    }

    fn matches_branch(&self, context: &Context) -> bool {
        self.branch_id
            .as_ref()
            .map_or(true, |b| &context.current_branch_id == b)
    }

    fn matches_dates(&self, context: &Context) -> bool {
        self.date_range
            .map_or(true, |range| range.contains(context.metadata.created_at))
    }

    fn matches_tags(&self, context: &Context) -> bool {
        self.tags.is_empty()
            || self
                .tags
                .iter()
                .any(|t| context.metadata.tags.contains(t))
    }
}
