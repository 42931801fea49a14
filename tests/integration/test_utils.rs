//! Shared test utilities for integration tests
//!
//! Centralizes store setup and environment isolation so tests that touch
//! process-wide variables never race each other.

use async_trait::async_trait;
use plotweave::context::{
    CharacterData, ChatMessage, ContextData, ConversationData, StoryData,
};
use plotweave::error::GenerationError;
use plotweave::generation::{FleshOutKind, GenerationService};
use plotweave::manager::{ContextManager, ManagerConfig};
use plotweave::store::{ContextStore, SledContextStore, StoreOptions};
use plotweave::types::ContextId;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ISOLATED_VARS: [&str; 5] = [
    "HOME",
    "XDG_CONFIG_HOME",
    "PLOTWEAVE_ENV",
    "PLOTWEAVE__STORAGE__QUOTA_BYTES",
    "PLOTWEAVE__STORAGE__RETENTION_DAYS",
];

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir` and the
/// plotweave override variables cleared. The original environment is
/// restored afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> = ISOLATED_VARS
        .iter()
        .map(|name| (*name, std::env::var(name).ok()))
        .collect();

    let home = test_dir.path().join("home");
    let config_home = test_dir.path().join("xdg");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&config_home).unwrap();
    for name in ISOLATED_VARS {
        std::env::remove_var(name);
    }
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);

    let result = f();

    for (name, value) in saved {
        match value {
            Some(value) => std::env::set_var(name, value),
            None => std::env::remove_var(name),
        }
    }
    result
}

/// Open a sled store in a fresh temp dir. Keep the `TempDir` alive.
pub fn open_store(options: StoreOptions) -> (TempDir, Arc<SledContextStore>) {
    let dir = TempDir::new().unwrap();
    let store = SledContextStore::open(dir.path().join("store"), options).unwrap();
    (dir, Arc::new(store))
}

pub async fn open_manager() -> (TempDir, Arc<SledContextStore>, ContextManager) {
    let (dir, store) = open_store(StoreOptions::default());
    let dyn_store: Arc<dyn ContextStore> = store.clone();
    let manager = ContextManager::open(dyn_store, ManagerConfig::default())
        .await
        .unwrap();
    (dir, store, manager)
}

pub fn story(title: &str) -> ContextData {
    ContextData::Story(StoryData::titled(title))
}

pub fn character(story_id: &ContextId, name: &str) -> ContextData {
    ContextData::Character(CharacterData {
        story_id: story_id.clone(),
        name: name.to_string(),
        ..Default::default()
    })
}

pub fn conversation(story_id: &ContextId, character_id: Option<&ContextId>) -> ContextData {
    ContextData::Conversation(ConversationData {
        story_id: story_id.clone(),
        character_id: character_id.cloned(),
        messages: Vec::new(),
    })
}

/// Scripted generation backend
pub struct ScriptedGenerator {
    pub fail: bool,
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate_response(
        &self,
        story: &StoryData,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, GenerationError> {
        if self.fail {
            return Err(GenerationError::Unavailable("backend offline".into()));
        }
        Ok(format!("{}#{}: {}", story.title, history.len(), prompt))
    }

    async fn flesh_out(&self, kind: FleshOutKind, content: &str) -> Result<String, GenerationError> {
        if self.fail {
            return Err(GenerationError::Unavailable("backend offline".into()));
        }
        Ok(format!("{} profile: {}", kind, content))
    }
}
