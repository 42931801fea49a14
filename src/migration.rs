//! Legacy state migration
//!
//! Converts the flat chapter-creation state written by older releases into the
//! three-phase composition state. The transform is pure and one-way: it reads
//! a `LegacyState` and produces a `MigrationResult` carrying either the new
//! state or the failure, plus an ordered log of every step.

pub mod composed;
pub mod legacy;
pub mod validate;

pub use composed::{
    ChapterDraft, ComposedState, FeedbackItem, FeedbackPriority, NavigationState, OutlineItem,
    OverallProgress, PhaseConversation, PhaseKind, PhaseProgress, PhaseState, ReviewState,
    ReviewSuggestion, ThreadBranch, ThreadMessage, SEED_MESSAGE,
};
pub use legacy::{
    LegacyChapter, LegacyEditorReview, LegacyFeedbackItem, LegacyFeedbackRequest, LegacyState,
    LegacySuggestion,
};
pub use validate::{validate_composed_state, ValidationReport, ValidationRule, VALIDATION_RULES};

use crate::context::data::MessageRole;
use crate::error::MigrationError;
use crate::types::{now, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

const MAIN_THREAD_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Phase to land in when no legacy artifact implies a later one
    #[serde(default)]
    pub default_phase: PhaseKind,
    /// Allocate fresh random ids instead of reusing legacy ones
    #[serde(default = "default_generate_new_ids")]
    pub generate_new_ids: bool,
}

fn default_generate_new_ids() -> bool {
    true
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            default_phase: PhaseKind::default(),
            generate_new_ids: default_generate_new_ids(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationLogEntry {
    pub step: String,
    pub status: LogStatus,
    pub message: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    pub state: Option<ComposedState>,
    pub log: Vec<MigrationLogEntry>,
    pub errors: Vec<String>,
}

impl MigrationResult {
    pub fn warnings(&self) -> impl Iterator<Item = &MigrationLogEntry> {
        self.log.iter().filter(|e| e.status == LogStatus::Warning)
    }
}

/// Migrate a legacy state. Never panics; failures land in `errors`.
pub fn migrate(legacy: &LegacyState, options: &MigrationOptions) -> MigrationResult {
    let mut run = MigrationRun::new(options, now());
    info!(
        default_phase = %options.default_phase,
        feedback_items = legacy.incorporated_feedback.len(),
        "Starting legacy state migration"
    );

    match run.execute(legacy) {
        Ok(state) => {
            info!(current_phase = %state.current_phase, "Legacy state migrated");
            MigrationResult {
                success: true,
                state: Some(state),
                log: run.log,
                errors: Vec::new(),
            }
        }
        Err(err) => {
            error!(error = %err, "Legacy state migration failed");
            MigrationResult {
                success: false,
                state: None,
                log: run.log,
                errors: vec![format!("Migration failed: {}", err)],
            }
        }
    }
}

struct MigrationRun<'a> {
    options: &'a MigrationOptions,
    started: Timestamp,
    log: Vec<MigrationLogEntry>,
    id_counter: u64,
}

impl<'a> MigrationRun<'a> {
    fn new(options: &'a MigrationOptions, started: Timestamp) -> Self {
        Self {
            options,
            started,
            log: Vec::new(),
            id_counter: 0,
        }
    }

    fn record(&mut self, step: &str, status: LogStatus, message: impl Into<String>) {
        let message = message.into();
        match status {
            LogStatus::Success => debug!(step, %message, "migration step"),
            LogStatus::Warning => warn!(step, %message, "migration step"),
            LogStatus::Error => error!(step, %message, "migration step"),
        }
        self.log.push(MigrationLogEntry {
            step: step.to_string(),
            status,
            message,
            timestamp: now(),
        });
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.id_counter += 1;
        if self.options.generate_new_ids {
            format!("{}-{}", prefix, uuid::Uuid::new_v4())
        } else {
            format!("{}-{}", prefix, self.id_counter)
        }
    }

    fn execute(&mut self, legacy: &LegacyState) -> Result<ComposedState, MigrationError> {
        let mut state = self.step("skeleton", |run| Ok(run.skeleton()))?;
        let feedback = self.step("feedback", |run| run.convert_feedback(legacy))?;
        self.step("feedback_placement", |run| {
            run.place_feedback(&mut state, &feedback)
        })?;
        self.step("outline", |run| run.migrate_outline(&mut state, legacy))?;
        self.step("chapter", |run| {
            run.migrate_chapter(&mut state, legacy, &feedback)
        })?;
        self.step("review", |run| run.migrate_review(&mut state, legacy))?;
        self.step("phase", |run| run.infer_phase(&mut state, legacy))?;
        Ok(state)
    }

    /// Run one step, recording an error entry if it fails.
    fn step<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T, MigrationError>,
    ) -> Result<T, MigrationError> {
        f(self).map_err(|err| {
            self.record(name, LogStatus::Error, err.to_string());
            err
        })
    }

    fn skeleton(&mut self) -> ComposedState {
        let mut phases = BTreeMap::new();
        for kind in PhaseKind::ALL {
            let conversation = self.seed_conversation(kind);
            phases.insert(
                kind,
                PhaseState {
                    conversation,
                    outline: Vec::new(),
                    drafts: Vec::new(),
                    feedback: Vec::new(),
                    review: None,
                    progress: PhaseProgress::default(),
                },
            );
        }
        self.record(
            "skeleton",
            LogStatus::Success,
            format!("Created {} phases with seeded conversations", phases.len()),
        );
        ComposedState {
            current_phase: self.options.default_phase,
            phases,
            navigation: NavigationState {
                phase_history: vec![self.options.default_phase],
                can_go_back: false,
                can_go_forward: false,
            },
            progress: OverallProgress {
                current_step: 1,
                total_steps: PhaseKind::ALL.len() as u32,
                completed_phases: Vec::new(),
            },
            created_at: self.started,
            last_updated: self.started,
        }
    }

    fn seed_conversation(&mut self, kind: PhaseKind) -> PhaseConversation {
        let root_id = self.next_id(&format!("{}-root", kind));
        let root = ThreadMessage {
            id: root_id.clone(),
            role: MessageRole::System,
            content: SEED_MESSAGE.to_string(),
            parent_id: None,
            branch_id: MAIN_THREAD_BRANCH.to_string(),
            created_at: self.started,
        };
        let branch = ThreadBranch {
            id: MAIN_THREAD_BRANCH.to_string(),
            name: "Main".to_string(),
            head_message_id: root_id.clone(),
            created_at: self.started,
        };
        PhaseConversation {
            root_message_id: root_id.clone(),
            current_branch_id: MAIN_THREAD_BRANCH.to_string(),
            messages: BTreeMap::from([(root_id, root)]),
            branches: BTreeMap::from([(MAIN_THREAD_BRANCH.to_string(), branch)]),
        }
    }

    fn convert_feedback(&mut self, legacy: &LegacyState) -> Result<Vec<FeedbackItem>, MigrationError> {
        let mut items = Vec::with_capacity(legacy.incorporated_feedback.len());
        let mut blank = 0;
        for item in &legacy.incorporated_feedback {
            if item.content.trim().is_empty() {
                blank += 1;
            }
            let phase = match &item.phase {
                Some(raw) => raw
                    .parse::<PhaseKind>()
                    .map_err(MigrationError::UnknownPhase)?,
                None => PhaseKind::ChapterDetailer,
            };
            let priority = match &item.priority {
                Some(raw) => raw
                    .parse::<FeedbackPriority>()
                    .map_err(MigrationError::UnknownPriority)?,
                None => FeedbackPriority::Medium,
            };
            let id = match (&item.id, self.options.generate_new_ids) {
                (Some(id), false) => id.clone(),
                _ => self.next_id("feedback"),
            };
            items.push(FeedbackItem {
                id,
                content: item.content.clone(),
                feedback_type: item
                    .feedback_type
                    .clone()
                    .unwrap_or_else(|| "general".to_string()),
                phase,
                priority,
                incorporated: item.incorporated,
                created_at: item.timestamp.unwrap_or(self.started),
            });
        }
        self.record(
            "feedback",
            LogStatus::Success,
            format!("Converted {} feedback items", items.len()),
        );
        if blank > 0 {
            self.record(
                "feedback",
                LogStatus::Warning,
                format!("{} feedback items have empty content", blank),
            );
        }
        if !legacy.feedback_requests.is_empty() {
            self.record(
                "feedback",
                LogStatus::Warning,
                format!(
                    "Dropped {} pending feedback requests; they have no counterpart in composed state",
                    legacy.feedback_requests.len()
                ),
            );
        }
        Ok(items)
    }

    fn place_feedback(
        &mut self,
        state: &mut ComposedState,
        feedback: &[FeedbackItem],
    ) -> Result<(), MigrationError> {
        for item in feedback {
            let phase = phase_mut(state, item.phase)?;
            phase.feedback.push(item.clone());
            phase.progress.feedback_count += 1;
        }
        Ok(())
    }

    fn migrate_outline(
        &mut self,
        state: &mut ComposedState,
        legacy: &LegacyState,
    ) -> Result<(), MigrationError> {
        let Some(plot_point) = legacy.plot_point.as_deref().filter(|p| !p.trim().is_empty())
        else {
            self.record("outline", LogStatus::Success, "No plot point to migrate");
            return Ok(());
        };
        let id = self.next_id("outline");
        phase_mut(state, PhaseKind::PlotOutline)?
            .outline
            .push(OutlineItem {
                id,
                title: "Plot point".to_string(),
                description: plot_point.to_string(),
                order: 0,
                completed: false,
            });
        self.record("outline", LogStatus::Success, "Created outline item from plot point");
        Ok(())
    }

    fn migrate_chapter(
        &mut self,
        state: &mut ComposedState,
        legacy: &LegacyState,
        feedback: &[FeedbackItem],
    ) -> Result<(), MigrationError> {
        let Some(chapter) = &legacy.generated_chapter else {
            self.record("chapter", LogStatus::Success, "No generated chapter to migrate");
            return Ok(());
        };
        for kind in [PhaseKind::ChapterDetailer, PhaseKind::FinalEdit] {
            let id = self.next_id("draft");
            let draft = ChapterDraft {
                id,
                title: chapter.title.clone(),
                content: chapter.content.clone(),
                phase: kind,
                feedback: feedback.to_vec(),
                created_at: self.started,
            };
            let phase = phase_mut(state, kind)?;
            phase.drafts.push(draft);
            phase.progress.draft_count += 1;
        }
        self.record(
            "chapter",
            LogStatus::Success,
            "Migrated generated chapter into chapterDetailer and finalEdit drafts",
        );
        Ok(())
    }

    fn migrate_review(
        &mut self,
        state: &mut ComposedState,
        legacy: &LegacyState,
    ) -> Result<(), MigrationError> {
        let Some(review) = &legacy.editor_review else {
            self.record("review", LogStatus::Success, "No editor review to migrate");
            return Ok(());
        };

        // Selections are positional in legacy data; replay that alignment.
        let suggestions: Vec<ReviewSuggestion> = review
            .suggestions
            .iter()
            .map(|s| ReviewSuggestion {
                issue: s.issue.clone(),
                suggestion: s.suggestion.clone(),
                reason: s.reason.clone(),
            })
            .collect();
        let mut selections = BTreeMap::new();
        for (index, suggestion) in suggestions.iter().enumerate() {
            let selected = review.user_selections.get(index).copied().unwrap_or(false);
            selections.insert(suggestion.issue.clone(), selected);
        }

        if review.user_selections.len() != suggestions.len() {
            self.record(
                "review",
                LogStatus::Warning,
                format!(
                    "Selection count {} does not match suggestion count {}; keyed by position",
                    review.user_selections.len(),
                    suggestions.len()
                ),
            );
        }
        if selections.len() != suggestions.len() {
            self.record(
                "review",
                LogStatus::Warning,
                "Duplicate suggestion issues collapsed into one selection",
            );
        }

        let count = suggestions.len();
        phase_mut(state, PhaseKind::FinalEdit)?.review = Some(ReviewState {
            suggestions,
            selections,
        });
        self.record(
            "review",
            LogStatus::Success,
            format!("Migrated editor review with {} suggestions", count),
        );
        Ok(())
    }

    fn infer_phase(
        &mut self,
        state: &mut ComposedState,
        legacy: &LegacyState,
    ) -> Result<(), MigrationError> {
        let current = match (&legacy.generated_chapter, &legacy.editor_review) {
            (Some(_), Some(_)) => PhaseKind::FinalEdit,
            (Some(_), None) => PhaseKind::ChapterDetailer,
            _ => self.options.default_phase,
        };
        let completed = current.predecessors();
        for kind in &completed {
            phase_mut(state, *kind)?.progress.completed = true;
        }

        state.current_phase = current;
        state.navigation = NavigationState {
            phase_history: completed.iter().copied().chain([current]).collect(),
            can_go_back: !completed.is_empty(),
            can_go_forward: false,
        };
        state.progress = OverallProgress {
            current_step: current.position() as u32 + 1,
            total_steps: PhaseKind::ALL.len() as u32,
            completed_phases: completed,
        };
        self.record(
            "phase",
            LogStatus::Success,
            format!("Current phase set to {}", current),
        );
        Ok(())
    }
}

fn phase_mut(state: &mut ComposedState, kind: PhaseKind) -> Result<&mut PhaseState, MigrationError> {
    state
        .phases
        .get_mut(&kind)
        .ok_or_else(|| MigrationError::MissingPhase(kind.to_string()))
}
