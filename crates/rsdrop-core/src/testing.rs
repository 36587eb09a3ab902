use crate::backend::CatalogBackend;
use crate::types::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Backend that answers from fixed rows and records what it is asked to run
#[derive(Debug, Default)]
pub struct FixedBackend {
    pub revokes: Vec<GrantRevokeRecord>,
    pub grants: Vec<GrantRevokeRecord>,
    pub owned: Vec<OwnershipRecord>,
    pub views_installed: bool,
    pub executed: Vec<String>,
    /// Statement that fails when executed
    pub fail_on: Option<String>,
}

#[async_trait]
impl CatalogBackend for FixedBackend {
    async fn install_views(&mut self) -> Result<()> {
        self.views_installed = true;
        Ok(())
    }

    async fn grant_revoke_records(
        &self,
        grantee: &str,
        kind: DdlKind,
    ) -> Result<Vec<GrantRevokeRecord>> {
        let rows = match kind {
            DdlKind::Grant => &self.grants,
            DdlKind::Revoke => &self.revokes,
        };
        Ok(rows
            .iter()
            .filter(|r| r.grantee.as_deref() == Some(grantee))
            .cloned()
            .collect())
    }

    async fn owned_objects(&self, owner: &str) -> Result<Vec<OwnershipRecord>> {
        Ok(self.owned.iter().filter(|r| r.objowner == owner).cloned().collect())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        if self.fail_on.as_deref() == Some(sql) {
            return Err(anyhow!("permission denied"));
        }
        self.executed.push(sql.to_string());
        Ok(())
    }

    fn session_user(&self) -> &str {
        "admin"
    }
}
