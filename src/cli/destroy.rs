//! # Destroy Command
//!
//! Delete every provisioned resource, children first. Shared deployments
//! and parent-scoped kinds are only forgotten locally.

use super::{print_header, print_row, Session};
use anyhow::Result;
use baas_reconciler::state::sync;

/// Delete or detach every provisioned resource
pub async fn destroy_command(session: &Session) -> Result<()> {
    print_header();
    sync::destroy(&session.reconciler, &session.ctx, &session.store, |row| {
        print_row(&row);
    })
    .await?;
    Ok(())
}
