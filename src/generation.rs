//! Generation collaborator boundary
//!
//! The writing backend is never called directly. Callers inject a
//! `GenerationService` and the manager stores whatever text it returns.

use crate::context::data::{ChatMessage, StoryData};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of draft content a flesh-out request expands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleshOutKind {
    Character,
    Setting,
    PlotPoint,
    Scene,
}

impl fmt::Display for FleshOutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FleshOutKind::Character => "character",
            FleshOutKind::Setting => "setting",
            FleshOutKind::PlotPoint => "plot_point",
            FleshOutKind::Scene => "scene",
        };
        f.write_str(name)
    }
}

/// Story-writing backend
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produce the next assistant reply for a conversation
    async fn generate_response(
        &self,
        story: &StoryData,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, GenerationError>;

    /// Expand short notes into fuller content of the given kind
    async fn flesh_out(&self, kind: FleshOutKind, content: &str)
        -> Result<String, GenerationError>;
}

// Scripted service for testing
#[cfg(test)]
pub struct MockGenerationService {
    pub reply: Option<String>,
}

#[cfg(test)]
#[async_trait]
impl GenerationService for MockGenerationService {
    async fn generate_response(
        &self,
        story: &StoryData,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, GenerationError> {
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None if story.title.is_empty() => {
                Err(GenerationError::Rejected("story has no title".to_string()))
            }
            None => Ok(format!(
                "[{}] reply to '{}' after {} messages",
                story.title,
                prompt,
                history.len()
            )),
        }
    }

    async fn flesh_out(
        &self,
        kind: FleshOutKind,
        content: &str,
    ) -> Result<String, GenerationError> {
        Ok(format!("{}: {}", kind, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_service_echoes_context() {
        let service = MockGenerationService { reply: None };
        let reply = service
            .generate_response(&StoryData::titled("Dunes"), "hello", &[])
            .await
            .unwrap();
        assert_eq!(reply, "[Dunes] reply to 'hello' after 0 messages");

        let expanded = service
            .flesh_out(FleshOutKind::PlotPoint, "the storm hits")
            .await
            .unwrap();
        assert_eq!(expanded, "plot_point: the storm hits");
    }

    #[test]
    fn test_flesh_out_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(FleshOutKind::PlotPoint).unwrap(),
            "plot_point"
        );
    }
}
