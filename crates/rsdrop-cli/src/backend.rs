//! Picks and opens the backend a run executes against

use anyhow::Result;
use rsdrop_core::{BackendConfig, CatalogBackend};
use rsdrop_emulator::EmulatorBackend;
use rsdrop_redshift::RedshiftBackend;
use tracing::debug;

/// Open a session on the configured backend
pub async fn open(config: BackendConfig) -> Result<Box<dyn CatalogBackend>> {
    debug!(?config, "opening backend");
    match config {
        BackendConfig::Redshift(connection) => {
            Ok(Box::new(RedshiftBackend::connect(&connection).await?))
        }
        BackendConfig::Emulator {
            state_file,
            session_user,
        } => Ok(Box::new(
            EmulatorBackend::new(Some(state_file), &session_user).await?,
        )),
    }
}
