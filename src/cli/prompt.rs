//! Interactive conflict resolution for `import --strategy ask_user`.

use crate::cli::presentation::context_label;
use crate::context::Context;
use crate::error::{ContextError, ContextResult};
use crate::transfer::{ConflictResolver, Resolution};
use dialoguer::Select;

const CHOICES: [(&str, Resolution); 5] = [
    ("Keep existing", Resolution::KeepExisting),
    ("Use incoming", Resolution::UseIncoming),
    ("Deep merge", Resolution::DeepMerge),
    ("Shallow merge", Resolution::ShallowMerge),
    ("Keep both", Resolution::KeepBoth),
];

/// Asks on the terminal which side of each conflict to keep
pub struct DialoguerResolver;

impl DialoguerResolver {
    fn prompt(existing: &Context, incoming: &Context) -> String {
        format!(
            "{} {} exists (v{}, \"{}\"); bundle has v{} (\"{}\")",
            existing.context_type(),
            existing.id,
            existing.version(),
            context_label(existing),
            incoming.version(),
            context_label(incoming),
        )
    }
}

impl ConflictResolver for DialoguerResolver {
    fn resolve(&self, existing: &Context, incoming: &Context) -> ContextResult<Resolution> {
        let items: Vec<&str> = CHOICES.iter().map(|(label, _)| *label).collect();
        let index = Select::new()
            .with_prompt(Self::prompt(existing, incoming))
            .items(&items)
            .default(0)
            .interact()
            .map_err(|e| ContextError::MergeConflict(format!("conflict prompt failed: {}", e)))?;
        Ok(CHOICES[index].1)
    }
}
