//! # Redshift catalog emulator
//!
//! Offline stand-in for a Redshift cluster. Holds the catalogs that grants
//! and ownership live in, answers the two admin views from them and applies
//! the revoke, ownership and drop statements rsdrop generates, so a plan can
//! be rehearsed before it touches a real cluster.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rsdrop_core::*;
use std::path::PathBuf;
use tracing::{debug, info};

pub mod apply;
pub mod catalog;
pub mod storage;
pub mod views;

pub use apply::{apply_statement, CatalogError, Session};
pub use catalog::*;
pub use storage::FileStorage;

/// Emulated cluster session
#[derive(Debug)]
pub struct EmulatorBackend {
    catalog: Catalog,
    /// Optional JSON file the catalog is loaded from and committed to
    storage: Option<FileStorage>,
    session: Session,
}

impl EmulatorBackend {
    /// Open the catalog in `state_file` (empty when the file is missing) and
    /// connect as `session_user`
    pub async fn new(state_file: Option<PathBuf>, session_user: &str) -> Result<Self> {
        let storage = state_file.map(FileStorage::new);
        let catalog = match &storage {
            Some(storage) => storage.load().await?,
            None => Catalog::default(),
        };
        let backend = Self::with_storage(catalog, storage, session_user)?;
        info!(user = session_user, "connected to emulated cluster");
        Ok(backend)
    }

    /// In-memory backend over an existing catalog
    pub fn from_catalog(catalog: Catalog, session_user: &str) -> Result<Self> {
        Self::with_storage(catalog, None, session_user)
    }

    fn with_storage(
        catalog: Catalog,
        storage: Option<FileStorage>,
        session_user: &str,
    ) -> Result<Self> {
        if catalog.user(session_user).is_none() {
            return Err(CatalogError::UnknownUser(session_user.to_string()).into());
        }
        Ok(Self {
            catalog,
            storage,
            session: Session::new(session_user),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn commit(&mut self, catalog: Catalog) -> Result<()> {
        self.catalog = catalog;
        if let Some(storage) = &self.storage {
            storage.save(&self.catalog).await?;
        }
        Ok(())
    }

    fn require_views(&self, view: &str) -> Result<()> {
        if self.catalog.views_installed {
            Ok(())
        } else {
            Err(CatalogError::ViewsNotInstalled(view.to_string()).into())
        }
    }
}

#[async_trait]
impl CatalogBackend for EmulatorBackend {
    async fn install_views(&mut self) -> Result<()> {
        let mut catalog = self.catalog.clone();
        catalog.views_installed = true;
        self.commit(catalog).await?;
        debug!("admin views installed");
        Ok(())
    }

    async fn grant_revoke_records(
        &self,
        grantee: &str,
        kind: DdlKind,
    ) -> Result<Vec<GrantRevokeRecord>> {
        self.require_views(rsdrop_core::views::GRANT_REVOKE_VIEW)?;

        let mut records: Vec<GrantRevokeRecord> =
            views::grant_revoke_records(&self.catalog, &self.session.connected_as)?
                .into_iter()
                .filter(|r| r.ddltype == kind && r.grantee.as_deref() == Some(grantee))
                .collect();
        records.sort_by_key(|r| (r.objseq, r.grantseq));
        Ok(records)
    }

    async fn owned_objects(&self, owner: &str) -> Result<Vec<OwnershipRecord>> {
        self.require_views(rsdrop_core::views::OWNERSHIP_VIEW)?;

        Ok(views::ownership_records(&self.catalog)
            .into_iter()
            .filter(|r| r.objowner == owner)
            .collect())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let statements = rsdrop_parser::parse_script(sql)?;

        // a failing statement leaves neither the catalog nor the session changed
        let mut catalog = self.catalog.clone();
        let mut session = self.session.clone();
        for statement in &statements {
            apply_statement(&mut catalog, &mut session, statement)
                .with_context(|| format!("Failed to apply: {}", sql))?;
        }

        self.session = session;
        self.commit(catalog).await
    }

    fn session_user(&self) -> &str {
        &self.session.connected_as
    }
}
