//! Turning catalog rows into the ordered statements that strip and drop a user

use crate::backend::CatalogBackend;
use crate::types::*;
use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Statements gathered from the two views, before the final `DROP USER`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedStatements {
    /// Revokes first, then ownership transfers
    pub statements: Vec<String>,
    /// Messages for owned objects that cannot be reassigned
    pub warnings: Vec<String>,
}

/// Gather every revoke and ownership transfer needed before `user` can be
/// dropped, handing owned objects to `new_owner`.
pub async fn collect_statements<B>(
    backend: &B,
    user: &str,
    new_owner: &str,
) -> Result<CollectedStatements>
where
    B: CatalogBackend + ?Sized,
{
    let mut collected = CollectedStatements::default();

    let revokes = backend
        .grant_revoke_records(user, DdlKind::Revoke)
        .await
        .with_context(|| format!("Failed to list privileges held by {}", user))?;
    debug!(user = user, count = revokes.len(), "collected revoke statements");
    collected
        .statements
        .extend(revokes.into_iter().map(|record| record.ddl));

    let owned = backend
        .owned_objects(user)
        .await
        .with_context(|| format!("Failed to list objects owned by {}", user))?;
    debug!(user = user, count = owned.len(), "collected owned objects");

    for record in owned {
        match record.transfer_to(new_owner) {
            OwnershipTransfer::Statement(sql) => collected.statements.push(sql),
            OwnershipTransfer::Unsupported(message) => {
                warn!(
                    object = %record.objname,
                    kind = %record.objtype,
                    "object cannot be reassigned"
                );
                collected.warnings.push(message);
            }
            OwnershipTransfer::Empty => {
                debug!(object = %record.objname, "ownership template is empty, skipping");
            }
        }
    }

    Ok(collected)
}

/// The statement that removes the user once nothing references it
pub fn drop_user_statement(user: &str) -> String {
    format!("DROP USER {};", user)
}

/// Append the final `DROP USER` and discard blank statements
pub fn build_execution_plan(collected: &CollectedStatements, user: &str) -> Vec<String> {
    collected
        .statements
        .iter()
        .cloned()
        .chain(std::iter::once(drop_user_statement(user)))
        .filter(|sql| !sql.trim().is_empty())
        .collect()
}

/// GRANT statements that would give `user` back its current privileges
pub async fn collect_grants<B>(backend: &B, user: &str) -> Result<Vec<String>>
where
    B: CatalogBackend + ?Sized,
{
    let grants = backend
        .grant_revoke_records(user, DdlKind::Grant)
        .await
        .with_context(|| format!("Failed to list grants held by {}", user))?;

    Ok(grants
        .into_iter()
        .map(|record| record.ddl)
        .filter(|sql| !sql.trim().is_empty())
        .collect())
}
