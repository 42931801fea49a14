//! CLI output: error mapping from domain errors to stable CLI surface.

/// Map a command failure to the line printed on stderr. The full cause chain
/// is kept so storage and parse errors stay diagnosable.
pub fn map_error(e: &anyhow::Error) -> String {
    format!("Error: {:#}", e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use anyhow::Context as _;

    #[test]
    fn keeps_cause_chain() {
        let err: anyhow::Result<()> = Err(ContextError::MergeConflict("v2 != v3".into()))
            .context("Import failed");
        let text = map_error(&err.unwrap_err());
        assert_eq!(text, "Error: Import failed: Merge conflict: v2 != v3");
    }
}
