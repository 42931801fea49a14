//! Context record: common header, branches, and invariant checks.

use crate::context::data::ContextData;
use crate::error::{ContextError, ContextResult};
use crate::types::{ContextId, ContextType, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Id of the branch every context starts on
pub const MAIN_BRANCH_ID: &str = "main";
/// Display name of the initial branch
pub const MAIN_BRANCH_NAME: &str = "Main";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Named line of history within a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub created_at: Timestamp,
    pub last_active: Timestamp,
    pub is_active: bool,
}

impl Branch {
    pub fn main(now: Timestamp) -> Self {
        Branch {
            id: MAIN_BRANCH_ID.to_string(),
            name: MAIN_BRANCH_NAME.to_string(),
            created_at: now,
            last_active: now,
            is_active: true,
        }
    }

    pub fn named(name: impl Into<String>, now: Timestamp) -> Self {
        Branch {
            id: format!("branch-{}", uuid::Uuid::new_v4()),
            name: name.into(),
            created_at: now,
            last_active: now,
            is_active: false,
        }
    }
}

/// A versioned, branchable record.
///
/// The payload is flattened next to the header so the serialized record is a
/// single flat object carrying a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub id: ContextId,
    pub metadata: ContextMetadata,
    pub branches: Vec<Branch>,
    pub current_branch_id: String,
    #[serde(flatten)]
    pub data: ContextData,
}

impl Context {
    /// Build a version-1 context on a single active "Main" branch.
    pub fn new(id: ContextId, data: ContextData, tags: Vec<String>, now: Timestamp) -> Self {
        Context {
            id,
            metadata: ContextMetadata {
                version: 1,
                created_at: now,
                updated_at: now,
                tags,
            },
            branches: vec![Branch::main(now)],
            current_branch_id: MAIN_BRANCH_ID.to_string(),
            data,
        }
    }

    pub fn context_type(&self) -> ContextType {
        self.data.context_type()
    }

    pub fn version(&self) -> u64 {
        self.metadata.version
    }

    pub fn current_branch(&self) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == self.current_branch_id)
    }

    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == branch_id)
    }

    /// Check structural invariants before the record is persisted.
    pub fn validate(&self) -> ContextResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(ContextError::ValidationFailure(
                "context id cannot be empty".to_string(),
            ));
        }
        if self.metadata.version == 0 {
            return Err(ContextError::ValidationFailure(format!(
                "context {} has version 0",
                self.id
            )));
        }
        if self.metadata.updated_at < self.metadata.created_at {
            return Err(ContextError::ValidationFailure(format!(
                "context {} updated before it was created",
                self.id
            )));
        }
        let mut seen = HashSet::new();
        for branch in &self.branches {
            if !seen.insert(branch.id.as_str()) {
                return Err(ContextError::ValidationFailure(format!(
                    "context {} has duplicate branch id '{}'",
                    self.id, branch.id
                )));
            }
        }
        if self.current_branch().is_none() {
            return Err(ContextError::ValidationFailure(format!(
                "context {} current branch '{}' is not among its branches",
                self.id, self.current_branch_id
            )));
        }
        Ok(())
    }

    pub fn summary(&self, size_bytes: u64) -> ContextSummary {
        ContextSummary {
            id: self.id.clone(),
            context_type: self.context_type(),
            version: self.metadata.version,
            created_at: self.metadata.created_at,
            updated_at: self.metadata.updated_at,
            tags: self.metadata.tags.clone(),
            current_branch_id: self.current_branch_id.clone(),
            size_bytes,
        }
    }
}

/// Metadata-only view returned by `ContextStore::list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub id: ContextId,
    pub context_type: ContextType,
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub tags: Vec<String>,
    pub current_branch_id: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::data::StoryData;
    use crate::types::now;

    fn story() -> Context {
        Context::new(
            ContextId::from("story-1"),
            ContextData::Story(StoryData::titled("The Lighthouse")),
            vec![],
            now(),
        )
    }

    #[test]
    fn new_context_starts_on_main() {
        let ctx = story();
        assert_eq!(ctx.version(), 1);
        assert_eq!(ctx.branches.len(), 1);
        assert_eq!(ctx.branches[0].name, "Main");
        assert!(ctx.branches[0].is_active);
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn dangling_current_branch_is_rejected() {
        let mut ctx = story();
        ctx.current_branch_id = "nowhere".to_string();
        assert!(matches!(
            ctx.validate(),
            Err(ContextError::ValidationFailure(_))
        ));
    }

    #[test]
    fn serialized_record_is_flat() {
        let ctx = story();
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["type"], "story");
        assert_eq!(json["title"], "The Lighthouse");
        assert_eq!(json["metadata"]["version"], 1);

        let back: Context = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}
