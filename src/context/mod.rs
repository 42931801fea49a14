//! Context domain: record model, typed payloads, patches, queries, and the
//! in-memory collection.

pub mod collection;
pub mod data;
pub mod patch;
pub mod query;
pub mod record;

pub use collection::{ActiveContextSet, ContextCollection, Slot};
pub use data::{
    CharacterData, ChatMessage, ContextData, ConversationData, MessageRole, ServerData,
    ServerStatus, SessionData, StoryData, WorkspaceState,
};
pub use patch::ContextPatch;
pub use query::{ContextQuery, DateRange};
pub use record::{Branch, Context, ContextMetadata, ContextSummary, MAIN_BRANCH_ID, MAIN_BRANCH_NAME};
