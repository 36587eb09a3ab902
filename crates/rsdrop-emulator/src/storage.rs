//! JSON persistence for the emulated catalog

use crate::catalog::Catalog;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

/// Catalog state kept in a single JSON file
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the catalog, or an empty one when the file does not exist yet
    pub async fn load(&self) -> Result<Catalog> {
        if !self.exists() {
            debug!(path = %self.path.display(), "no catalog file, starting empty");
            return Ok(Catalog::default());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read catalog file {}", self.path.display()))?;
        let catalog = serde_json::from_str(&content)
            .with_context(|| format!("Invalid catalog file {}", self.path.display()))?;
        Ok(catalog)
    }

    pub async fn save(&self, catalog: &Catalog) -> Result<()> {
        let content = serde_json::to_string_pretty(catalog)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write catalog file {}", self.path.display()))?;
        debug!(path = %self.path.display(), "saved catalog");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
