//! Per-type context payloads.
//!
//! `ContextData` is a closed union: every context carries exactly one of these
//! bodies and the variant doubles as the record's type tag.

use crate::migration::ComposedState;
use crate::types::{ContextId, ContextType, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextData {
    Session(SessionData),
    Story(StoryData),
    Character(CharacterData),
    Conversation(ConversationData),
    Server(ServerData),
}

impl ContextData {
    pub fn context_type(&self) -> ContextType {
        match self {
            ContextData::Session(_) => ContextType::Session,
            ContextData::Story(_) => ContextType::Story,
            ContextData::Character(_) => ContextType::Character,
            ContextData::Conversation(_) => ContextType::Conversation,
            ContextData::Server(_) => ContextType::Server,
        }
    }

    /// Story this context points at, if any
    pub fn story_ref(&self) -> Option<&ContextId> {
        match self {
            ContextData::Session(s) => s.active_story_id.as_ref(),
            ContextData::Story(_) => None,
            ContextData::Character(c) => Some(&c.story_id),
            ContextData::Conversation(c) => Some(&c.story_id),
            ContextData::Server(_) => None,
        }
    }

    /// Character this context points at, if any
    pub fn character_ref(&self) -> Option<&ContextId> {
        match self {
            ContextData::Session(s) => s.active_character_id.as_ref(),
            ContextData::Story(_) | ContextData::Character(_) | ContextData::Server(_) => None,
            ContextData::Conversation(c) => c.character_id.as_ref(),
        }
    }

    /// Rewrite every id reference through `map`, leaving unknown ids untouched.
    pub fn remap_refs(&mut self, map: &BTreeMap<ContextId, ContextId>) {
        let swap = |id: &mut ContextId| {
            if let Some(new_id) = map.get(id) {
                *id = new_id.clone();
            }
        };
        match self {
            ContextData::Session(s) => {
                s.active_story_id.iter_mut().for_each(swap);
                s.active_character_id.iter_mut().for_each(swap);
                s.active_conversation_id.iter_mut().for_each(swap);
                s.workspace.open_story_ids.iter_mut().for_each(swap);
            }
            ContextData::Story(s) => {
                s.character_ids.iter_mut().for_each(swap);
                s.conversation_ids.iter_mut().for_each(swap);
            }
            ContextData::Character(c) => swap(&mut c.story_id),
            ContextData::Conversation(c) => {
                swap(&mut c.story_id);
                c.character_id.iter_mut().for_each(swap);
            }
            ContextData::Server(_) => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub active_story_id: Option<ContextId>,
    #[serde(default)]
    pub active_character_id: Option<ContextId>,
    #[serde(default)]
    pub active_conversation_id: Option<ContextId>,
    #[serde(default)]
    pub workspace: WorkspaceState,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
}

/// UI workspace state restored on reload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    #[serde(default)]
    pub layout: String,
    #[serde(default)]
    pub open_story_ids: Vec<ContextId>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryData {
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub character_ids: Vec<ContextId>,
    #[serde(default)]
    pub conversation_ids: Vec<ContextId>,
    /// Chapter composition workflow state
    #[serde(default)]
    pub composition: Option<ComposedState>,
}

impl StoryData {
    pub fn titled(title: impl Into<String>) -> Self {
        StoryData {
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterData {
    pub story_id: ContextId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationData {
    pub story_id: ContextId,
    #[serde(default)]
    pub character_id: Option<ContextId>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: Timestamp,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, created_at: Timestamp) -> Self {
        ChatMessage {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            role,
            content: content.into(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Generation backend connection state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerData {
    pub endpoint: String,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub last_checked: Option<Timestamp>,
}
