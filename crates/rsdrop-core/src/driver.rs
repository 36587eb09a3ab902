//! End-to-end flow: install views, plan, print, execute

use crate::backend::CatalogBackend;
use crate::plan::{build_execution_plan, collect_grants, collect_statements};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct DropOptions {
    /// Print the plan without executing it
    pub dry_run: bool,
    /// Write the user's current GRANT statements here before revoking
    pub save_grants: Option<PathBuf>,
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropReport {
    pub statements: Vec<String>,
    pub warnings: Vec<String>,
    /// Number of statements executed and committed
    pub executed: usize,
    pub saved_grants: usize,
}

/// Strip `user` of every privilege and ownership, then drop it.
///
/// Statements are printed to `out` before anything runs, then executed one at
/// a time. Each one is committed on its own, so a failure part-way leaves the
/// earlier statements in effect.
pub async fn drop_user<B, W>(
    backend: &mut B,
    user: &str,
    options: &DropOptions,
    out: &mut W,
) -> Result<DropReport>
where
    B: CatalogBackend + ?Sized,
    W: Write + ?Sized,
{
    backend
        .install_views()
        .await
        .context("Failed to install admin views")?;

    let new_owner = backend.session_user().to_string();
    let collected = collect_statements(&*backend, user, &new_owner).await?;
    for warning in &collected.warnings {
        writeln!(out, "{}", warning)?;
    }

    let statements = build_execution_plan(&collected, user);
    let mut report = DropReport {
        statements: statements.clone(),
        warnings: collected.warnings.clone(),
        ..Default::default()
    };

    if let Some(path) = &options.save_grants {
        let grants = collect_grants(&*backend, user).await?;
        save_grants(path, user, &grants).await?;
        info!(path = %path.display(), count = grants.len(), "saved current grants");
        report.saved_grants = grants.len();
    }

    for sql in &statements {
        writeln!(out, "\n{}", sql)?;
    }
    out.flush()?;

    if options.dry_run {
        info!(count = statements.len(), "dry run, nothing executed");
        return Ok(report);
    }

    let total = statements.len();
    for (i, sql) in statements.iter().enumerate() {
        info!(step = i + 1, total = total, "executing");
        backend
            .execute(sql)
            .await
            .with_context(|| format!("Statement {} of {} failed: {}", i + 1, total, sql))?;
        report.executed += 1;
    }

    info!(user = user, executed = report.executed, "user dropped");
    Ok(report)
}

async fn save_grants(path: &Path, user: &str, grants: &[String]) -> Result<()> {
    let mut content = format!("-- Grants held by {} before it was dropped\n", user);
    for sql in grants {
        content.push_str(sql);
        content.push('\n');
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write grants to {}", path.display()))?;
    Ok(())
}
