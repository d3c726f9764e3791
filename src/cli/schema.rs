//! # Schema Command

use anyhow::{Context, Result};
use baas_reconciler::state::StateDocument;

/// Print the JSON schema of the declared-state file
pub fn schema_command() -> Result<()> {
    let schema = serde_json::to_string_pretty(&StateDocument::json_schema())
        .context("Failed to render state schema")?;
    println!("{schema}");
    Ok(())
}
