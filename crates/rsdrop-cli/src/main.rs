use anyhow::Result;
use clap::Parser;
use rsdrop_core::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod backend;

#[derive(Parser, Debug)]
#[command(name = "rsdrop")]
#[command(about = "Revoke a Redshift user's privileges, hand its objects to the connecting user, then drop it")]
#[command(
    after_help = "The connecting user is read from RS_CONN_USER and its password from RS_CONN_PASSWORD. \
The connecting user becomes the new owner of everything the dropped user owned."
)]
struct Cli {
    /// Cluster endpoint
    #[arg(long, required_unless_present = "catalog_file")]
    host: Option<String>,

    #[arg(long, required_unless_present = "catalog_file")]
    port: Option<String>,

    /// Database to connect to
    #[arg(long, required_unless_present = "catalog_file")]
    db: Option<String>,

    /// User to strip and drop
    #[arg(long = "user_to_drop", visible_alias = "user-to-drop")]
    user_to_drop: String,

    /// TLS for the live connection: disable, prefer, require or verify-full
    #[arg(long, default_value = "prefer")]
    sslmode: SslMode,

    /// Print the statements without executing them
    #[arg(long)]
    dry_run: bool,

    /// Write the user's current GRANT statements to this file first
    #[arg(long, value_name = "FILE")]
    save_grants: Option<PathBuf>,

    /// Run against an emulated catalog stored in this JSON file
    #[arg(long, value_name = "FILE")]
    catalog_file: Option<PathBuf>,
}

impl Cli {
    fn backend_config(&self) -> Result<BackendConfig> {
        if let Some(state_file) = &self.catalog_file {
            let session_user = connecting_user(&|key: &str| std::env::var(key).ok())?;
            return Ok(BackendConfig::Emulator {
                state_file: state_file.clone(),
                session_user,
            });
        }

        let host = self.host.clone().ok_or(ConfigError::MissingSetting("--host"))?;
        let port = self.port.as_deref().ok_or(ConfigError::MissingSetting("--port"))?;
        let database = self.db.clone().ok_or(ConfigError::MissingSetting("--db"))?;
        let connection = ConnectionConfig::from_env(host, port, database)?.with_ssl_mode(self.sslmode);
        Ok(BackendConfig::Redshift(connection))
    }

    fn options(&self) -> DropOptions {
        DropOptions {
            dry_run: self.dry_run,
            save_grants: self.save_grants.clone(),
        }
    }
}

fn init_tracing() {
    // stdout carries the statements, diagnostics go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = cli.backend_config()?;
    let mut backend = backend::open(config).await?;

    let mut stdout = std::io::stdout();
    let report = drop_user(&mut *backend, &cli.user_to_drop, &cli.options(), &mut stdout).await?;

    info!(
        user = %cli.user_to_drop,
        statements = report.statements.len(),
        executed = report.executed,
        "finished"
    );
    Ok(())
}
