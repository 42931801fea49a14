//! Import, migration, and cleanup presentation.

use crate::context::ContextSummary;
use crate::migration::{LogStatus, MigrationResult};
use crate::transfer::{ImportOutcome, ImportReport};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn format_import_report(report: &ImportReport, backup: Option<&Path>) -> String {
    let mut out = format!(
        "Imported {} context(s): {} created, {} overwritten, {} merged, {} duplicated, {} skipped",
        report.entries.len(),
        report.count(ImportOutcome::Created),
        report.count(ImportOutcome::Overwritten),
        report.count(ImportOutcome::Merged),
        report.count(ImportOutcome::Duplicated),
        report.count(ImportOutcome::Skipped),
    );
    for entry in report.entries.iter().filter(|e| e.id != e.source_id) {
        out.push_str(&format!(
            "\n  {} {} -> {}",
            entry.context_type, entry.source_id, entry.id
        ));
    }
    if let Some(path) = backup {
        out.push_str(&format!("\nBackup written to {}", path.display()));
    }
    out
}

pub fn format_migration_result(result: &MigrationResult, stored: bool) -> String {
    let mut out = String::new();
    for entry in &result.log {
        let status = match entry.status {
            LogStatus::Success => format!("{}", "ok".green()),
            LogStatus::Warning => format!("{}", "warn".yellow()),
            LogStatus::Error => format!("{}", "error".red()),
        };
        out.push_str(&format!("[{:>5}] {:<16} {}\n", status, entry.step, entry.message));
    }
    match (&result.state, result.success) {
        (Some(state), true) => {
            out.push_str(&format!("Current phase: {}\n", state.current_phase));
            out.push_str(if stored {
                "Composition stored."
            } else {
                "Dry run: nothing stored."
            });
        }
        _ => {
            for error in &result.errors {
                out.push_str(&format!("{}\n", error.red()));
            }
            out.push_str("Migration failed: nothing stored.");
        }
    }
    out
}

pub fn format_cleanup(removed: &[ContextSummary], retention_days: Option<u32>) -> String {
    let Some(days) = retention_days else {
        return "No retention configured (storage.retention_days); nothing removed.".to_string();
    };
    let mut out = format!(
        "Removed {} context(s) untouched for more than {} day(s)",
        removed.len(),
        days
    );
    for summary in removed {
        out.push_str(&format!("\n  {} {}", summary.context_type, summary.id));
    }
    out
}
