//! Structural checks for composed state.

use crate::migration::composed::ComposedState;
use serde::{Deserialize, Serialize};

/// A named structural check returning one message per violation
pub struct ValidationRule {
    pub name: &'static str,
    pub check: fn(&ComposedState) -> Vec<String>,
}

/// Rules every composed state must satisfy, applied in order
pub const VALIDATION_RULES: &[ValidationRule] = &[
    ValidationRule {
        name: "current_phase_present",
        check: current_phase_present,
    },
    ValidationRule {
        name: "conversation_roots_present",
        check: conversation_roots_present,
    },
    ValidationRule {
        name: "current_branch_present",
        check: current_branch_present,
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

pub fn validate_composed_state(state: &ComposedState) -> ValidationReport {
    let errors: Vec<String> = VALIDATION_RULES
        .iter()
        .flat_map(|rule| {
            (rule.check)(state)
                .into_iter()
                .map(move |msg| format!("{}: {}", rule.name, msg))
        })
        .collect();
    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn current_phase_present(state: &ComposedState) -> Vec<String> {
    if state.phases.contains_key(&state.current_phase) {
        vec![]
    } else {
        vec![format!(
            "current phase '{}' is not among the phases",
            state.current_phase
        )]
    }
}

fn conversation_roots_present(state: &ComposedState) -> Vec<String> {
    state
        .phases
        .iter()
        .filter(|(_, phase)| {
            !phase
                .conversation
                .messages
                .contains_key(&phase.conversation.root_message_id)
        })
        .map(|(kind, phase)| {
            format!(
                "phase '{}' root message '{}' is missing",
                kind, phase.conversation.root_message_id
            )
        })
        .collect()
}

fn current_branch_present(state: &ComposedState) -> Vec<String> {
    // Reported by current_phase_present
    let Some(phase) = state.current() else {
        return vec![];
    };
    let branch_id = &phase.conversation.current_branch_id;
    if phase.conversation.branches.contains_key(branch_id) {
        vec![]
    } else {
        vec![format!(
            "branch '{}' is not among the branches of phase '{}'",
            branch_id, state.current_phase
        )]
    }
}
