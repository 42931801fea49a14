//! Legacy flat chapter-creation state, as written by older releases.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyState {
    #[serde(default)]
    pub plot_point: Option<String>,
    #[serde(default)]
    pub incorporated_feedback: Vec<LegacyFeedbackItem>,
    #[serde(default)]
    pub feedback_requests: BTreeMap<String, LegacyFeedbackRequest>,
    #[serde(default)]
    pub generated_chapter: Option<LegacyChapter>,
    #[serde(default)]
    pub editor_review: Option<LegacyEditorReview>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFeedbackItem {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(rename = "type", default)]
    pub feedback_type: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default = "default_incorporated")]
    pub incorporated: bool,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

fn default_incorporated() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFeedbackRequest {
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChapter {
    #[serde(default)]
    pub title: String,
    pub content: String,
}

/// Editor review with selections stored as an array parallel to `suggestions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEditorReview {
    #[serde(default)]
    pub suggestions: Vec<LegacySuggestion>,
    #[serde(default)]
    pub user_selections: Vec<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySuggestion {
    pub issue: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub reason: String,
}
