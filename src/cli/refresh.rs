//! # Refresh Command
//!
//! Re-read every provisioned resource without changing anything remotely.

use super::{print_header, print_row, Session};
use anyhow::Result;
use baas_reconciler::state::sync;

/// Record the current remote state of every provisioned resource
pub async fn refresh_command(session: &Session) -> Result<()> {
    print_header();
    sync::refresh(&session.reconciler, &session.ctx, &session.store, |row| {
        print_row(&row);
    })
    .await?;
    Ok(())
}
