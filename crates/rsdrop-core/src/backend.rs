//! Backend trait for the catalogs rsdrop can run against

use crate::types::*;
use anyhow::Result;
use async_trait::async_trait;

/// A database session able to answer the two catalog views and run DDL.
/// Implemented by the live Redshift connection and by the offline emulator.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Create or replace the admin views and commit
    async fn install_views(&mut self) -> Result<()>;

    /// Rows of the grant/revoke view for one grantee and statement kind
    async fn grant_revoke_records(
        &self,
        grantee: &str,
        kind: DdlKind,
    ) -> Result<Vec<GrantRevokeRecord>>;

    /// Rows of the ownership view for one owner
    async fn owned_objects(&self, owner: &str) -> Result<Vec<OwnershipRecord>>;

    /// Execute one statement (which may hold several `;`-separated commands)
    /// and commit it
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Name of the user this session is connected as
    fn session_user(&self) -> &str;
}
