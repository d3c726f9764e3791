//! # Apply Command
//!
//! Converge every declared resource, in document order.

use super::{print_header, print_row, Session};
use anyhow::Result;
use baas_reconciler::state::sync;

/// Create missing resources and update changed mutable ones
pub async fn apply_command(session: &Session) -> Result<()> {
    print_header();

    let report = sync::apply(&session.reconciler, &session.ctx, &session.store, |row| {
        print_row(&row);
    })
    .await?;

    if !report.needs_replacement.is_empty() {
        println!("\nThe following changes cannot be applied in place and need a replacement:");
        for (name, keys) in &report.needs_replacement {
            println!("  {name}: {}", keys.join(", "));
        }
    }

    Ok(())
}
