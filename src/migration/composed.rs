//! Three-phase chapter composition state.

use crate::context::data::MessageRole;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Seed text of every phase conversation
pub const SEED_MESSAGE: &str = "Starting chapter composition...";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum PhaseKind {
    #[default]
    PlotOutline,
    ChapterDetailer,
    FinalEdit,
}

impl PhaseKind {
    /// Phases in workflow order
    pub const ALL: [PhaseKind; 3] = [
        PhaseKind::PlotOutline,
        PhaseKind::ChapterDetailer,
        PhaseKind::FinalEdit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::PlotOutline => "plotOutline",
            PhaseKind::ChapterDetailer => "chapterDetailer",
            PhaseKind::FinalEdit => "finalEdit",
        }
    }

    pub fn position(self) -> usize {
        match self {
            PhaseKind::PlotOutline => 0,
            PhaseKind::ChapterDetailer => 1,
            PhaseKind::FinalEdit => 2,
        }
    }

    /// Phases that come before this one
    pub fn predecessors(self) -> Vec<PhaseKind> {
        PhaseKind::ALL[..self.position()].to_vec()
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plotOutline" | "plot_outline" => Ok(PhaseKind::PlotOutline),
            "chapterDetailer" | "chapterDetail" | "chapter_detailer" => {
                Ok(PhaseKind::ChapterDetailer)
            }
            "finalEdit" | "final_edit" => Ok(PhaseKind::FinalEdit),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for FeedbackPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(FeedbackPriority::Low),
            "medium" => Ok(FeedbackPriority::Medium),
            "high" => Ok(FeedbackPriority::High),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedState {
    pub current_phase: PhaseKind,
    pub phases: BTreeMap<PhaseKind, PhaseState>,
    pub navigation: NavigationState,
    pub progress: OverallProgress,
    pub created_at: Timestamp,
    pub last_updated: Timestamp,
}

impl ComposedState {
    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseState> {
        self.phases.get(&kind)
    }

    pub fn current(&self) -> Option<&PhaseState> {
        self.phases.get(&self.current_phase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub conversation: PhaseConversation,
    #[serde(default)]
    pub outline: Vec<OutlineItem>,
    #[serde(default)]
    pub drafts: Vec<ChapterDraft>,
    #[serde(default)]
    pub feedback: Vec<FeedbackItem>,
    #[serde(default)]
    pub review: Option<ReviewState>,
    #[serde(default)]
    pub progress: PhaseProgress,
}

/// Branchable message thread owned by one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConversation {
    pub root_message_id: String,
    pub current_branch_id: String,
    pub messages: BTreeMap<String, ThreadMessage>,
    pub branches: BTreeMap<String, ThreadBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub parent_id: Option<String>,
    pub branch_id: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadBranch {
    pub id: String,
    pub name: String,
    pub head_message_id: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub order: u32,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDraft {
    pub id: String,
    pub title: String,
    pub content: String,
    pub phase: PhaseKind,
    #[serde(default)]
    pub feedback: Vec<FeedbackItem>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: String,
    pub content: String,
    pub feedback_type: String,
    pub phase: PhaseKind,
    pub priority: FeedbackPriority,
    pub incorporated: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSuggestion {
    pub issue: String,
    pub suggestion: String,
    pub reason: String,
}

/// Editor review with selections keyed by suggestion issue text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub suggestions: Vec<ReviewSuggestion>,
    pub selections: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub draft_count: u32,
    pub feedback_count: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub phase_history: Vec<PhaseKind>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallProgress {
    pub current_step: u32,
    pub total_steps: u32,
    pub completed_phases: Vec<PhaseKind>,
}
