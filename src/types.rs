//! Shared identifier and tag types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wall-clock timestamp used for all context metadata
pub type Timestamp = DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}

/// Opaque context identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        ContextId(id.into())
    }

    /// Allocate a fresh random identifier
    pub fn generate() -> Self {
        ContextId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        ContextId(s.to_string())
    }
}

impl From<String> for ContextId {
    fn from(s: String) -> Self {
        ContextId(s)
    }
}

/// Context type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Session,
    Story,
    Character,
    Conversation,
    Server,
}

impl ContextType {
    pub const ALL: [ContextType; 5] = [
        ContextType::Session,
        ContextType::Story,
        ContextType::Character,
        ContextType::Conversation,
        ContextType::Server,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContextType::Session => "session",
            ContextType::Story => "story",
            ContextType::Character => "character",
            ContextType::Conversation => "conversation",
            ContextType::Server => "server",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(ContextType::Session),
            "story" => Ok(ContextType::Story),
            "character" => Ok(ContextType::Character),
            "conversation" => Ok(ContextType::Conversation),
            "server" => Ok(ContextType::Server),
            other => Err(format!(
                "Unknown context type '{}' (expected session, story, character, conversation, or server)",
                other
            )),
        }
    }
}
