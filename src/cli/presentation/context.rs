//! Context presentation: status, listings, and single records.

use crate::context::{ActiveContextSet, Context, ContextData, ContextSummary};
use crate::error::ContextResult;
use crate::store::StorageStats;
use crate::types::ContextType;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Short human label for a context
pub fn context_label(context: &Context) -> String {
    match &context.data {
        ContextData::Session(s) => format!("layout {}", s.workspace.layout),
        ContextData::Story(s) => s.title.clone(),
        ContextData::Character(c) => c.name.clone(),
        ContextData::Conversation(c) => format!("{} messages", c.messages.len()),
        ContextData::Server(s) => format!("{} ({:?})", s.endpoint, s.status),
    }
}

pub fn format_status_text(
    session: Option<&Context>,
    active: &ActiveContextSet,
    stats: &StorageStats,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", format_section_heading("Session")));
    match session {
        Some(session) => {
            out.push_str(&format!("  Id: {}\n", session.id));
            out.push_str(&format!("  Version: {}\n", session.version()));
            out.push_str(&format!("  Workspace: {}\n", context_label(session)));
        }
        None => out.push_str("  (none)\n"),
    }

    out.push_str(&format!("\n{}\n", format_section_heading("Active")));
    for context_type in [
        ContextType::Story,
        ContextType::Character,
        ContextType::Conversation,
    ] {
        let id = active
            .get(context_type)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("  {:<13} {}\n", context_type, id));
    }

    out.push_str(&format!("\n{}\n", format_section_heading("Storage")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Type", "Records"]);
    for context_type in ContextType::ALL {
        table.add_row(vec![
            context_type.to_string(),
            stats.count(context_type).to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    let usage = match stats.quota_bytes {
        Some(quota) => {
            let used = format!("{} of {}", human_bytes(stats.size_bytes), human_bytes(quota));
            if stats.size_bytes.saturating_mul(10) >= quota.saturating_mul(9) {
                format!("{}", used.yellow())
            } else {
                used
            }
        }
        None => human_bytes(stats.size_bytes),
    };
    out.push_str(&format!("  Size: {}\n", usage));
    out
}

pub fn format_status_json(
    session: Option<&Context>,
    active: &ActiveContextSet,
    stats: &StorageStats,
) -> ContextResult<String> {
    let out = json!({
        "session_id": session.map(|s| s.id.clone()),
        "active": active,
        "stats": stats,
    });
    Ok(serde_json::to_string_pretty(&out)?)
}

pub fn format_summaries_text(summaries: &[ContextSummary]) -> String {
    if summaries.is_empty() {
        return "No contexts found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Type", "Id", "Version", "Branch", "Updated", "Tags", "Size"]);
    for summary in summaries {
        table.add_row(vec![
            summary.context_type.to_string(),
            summary.id.to_string(),
            summary.version.to_string(),
            summary.current_branch_id.clone(),
            summary.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            summary.tags.join(", "),
            human_bytes(summary.size_bytes),
        ]);
    }
    format!("{}\nTotal: {} context(s)", table, summaries.len())
}

pub fn format_summaries_json(summaries: &[ContextSummary]) -> ContextResult<String> {
    let out = json!({ "contexts": summaries, "total": summaries.len() });
    Ok(serde_json::to_string_pretty(&out)?)
}

pub fn format_context_json(context: &Context, history: Option<&[Context]>) -> ContextResult<String> {
    let out = match history {
        Some(history) => json!({ "context": context, "history": history }),
        None => serde_json::to_value(context)?,
    };
    Ok(serde_json::to_string_pretty(&out)?)
}
