//! # Redshift backend
//!
//! Runs rsdrop against a live cluster over the Postgres wire protocol,
//! negotiating TLS through OpenSSL according to the configured sslmode. Every
//! statement goes through the simple query protocol outside an explicit
//! transaction, so each one is committed as soon as it completes.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use openssl::error::ErrorStack;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use rsdrop_core::views::{install_statements, SELECT_GRANT_REVOKE_SQL, SELECT_OWNED_OBJECTS_SQL};
use rsdrop_core::*;
use std::str::FromStr;
use tokio_postgres::{Client, Row};
use tracing::{debug, error, info};

const APPLICATION_NAME: &str = "rsdrop";

/// Session on a live Redshift cluster
pub struct RedshiftBackend {
    client: Client,
    session_user: String,
}

impl RedshiftBackend {
    /// Open a session as the configured privileged user
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let pg_config = pg_config(config);
        let tls = make_tls(config.ssl_mode).context("Failed to set up TLS")?;
        let (client, connection) = pg_config.connect(tls).await.with_context(|| {
            format!(
                "Failed to connect to {}:{}/{} as {}",
                config.host, config.port, config.database, config.user
            )
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("redshift connection error: {}", e);
            }
        });

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            user = %config.user,
            sslmode = %config.ssl_mode,
            "connected"
        );
        Ok(Self {
            client,
            session_user: config.user.clone(),
        })
    }
}

fn pg_config(config: &ConnectionConfig) -> tokio_postgres::Config {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.host)
        .port(config.port)
        .dbname(&config.database)
        .user(&config.user)
        .application_name(APPLICATION_NAME)
        .ssl_mode(pg_ssl_mode(config.ssl_mode));
    if let Some(password) = &config.password {
        pg.password(password);
    }
    pg
}

fn pg_ssl_mode(ssl_mode: SslMode) -> tokio_postgres::config::SslMode {
    use tokio_postgres::config::SslMode as PgSslMode;
    match ssl_mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require | SslMode::VerifyFull => PgSslMode::Require,
    }
}

/// TLS connector for the requested mode. Only `verify-full` checks the
/// certificate chain and host name; the other modes encrypt without
/// verifying, as libpq does.
fn make_tls(ssl_mode: SslMode) -> Result<MakeTlsConnector, ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;
    let verify = ssl_mode == SslMode::VerifyFull;
    if !verify {
        builder.set_verify(SslVerifyMode::NONE);
    }

    let mut connector = MakeTlsConnector::new(builder.build());
    if !verify {
        connector.set_callback(|connect, _| {
            connect.set_verify_hostname(false);
            Ok(())
        });
    }
    Ok(connector)
}

fn parse_column<T>(row: &Row, column: &str) -> Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    let value: Option<String> = row.try_get(column)?;
    parse_value(column, value.as_deref())
}

fn parse_value<T>(column: &str, value: Option<&str>) -> Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    value
        .ok_or_else(|| anyhow!("column {} is NULL", column))?
        .trim()
        .parse()
        .with_context(|| format!("Unexpected value in column {}", column))
}

fn grant_revoke_record(row: &Row) -> Result<GrantRevokeRecord> {
    Ok(GrantRevokeRecord {
        objowner: row.try_get("objowner")?,
        schemaname: row.try_get("schemaname")?,
        objname: row.try_get::<_, Option<String>>("objname")?.unwrap_or_default(),
        objtype: parse_column(row, "objtype")?,
        grantor: row.try_get::<_, Option<String>>("grantor")?.unwrap_or_default(),
        grantee: row.try_get("grantee")?,
        ddltype: parse_column(row, "ddltype")?,
        grantseq: row.try_get::<_, Option<i32>>("grantseq")?.unwrap_or_default(),
        objseq: row.try_get::<_, Option<i32>>("objseq")?.unwrap_or_default(),
        ddl: row.try_get::<_, Option<String>>("ddl")?.unwrap_or_default(),
    })
}

fn ownership_record(row: &Row) -> Result<OwnershipRecord> {
    Ok(OwnershipRecord {
        objtype: parse_column(row, "objtype")?,
        objowner: row.try_get::<_, Option<String>>("objowner")?.unwrap_or_default(),
        userid: row.try_get::<_, Option<i32>>("userid")?.unwrap_or_default(),
        schemaname: row.try_get("schemaname")?,
        objname: row.try_get::<_, Option<String>>("objname")?.unwrap_or_default(),
        ddl: row.try_get("ddl")?,
    })
}

#[async_trait]
impl CatalogBackend for RedshiftBackend {
    async fn install_views(&mut self) -> Result<()> {
        for sql in install_statements() {
            self.client.batch_execute(sql).await?;
        }
        debug!("admin views installed");
        Ok(())
    }

    async fn grant_revoke_records(
        &self,
        grantee: &str,
        kind: DdlKind,
    ) -> Result<Vec<GrantRevokeRecord>> {
        let rows = self
            .client
            .query(SELECT_GRANT_REVOKE_SQL, &[&grantee, &kind.as_str()])
            .await?;
        rows.iter().map(grant_revoke_record).collect()
    }

    async fn owned_objects(&self, owner: &str) -> Result<Vec<OwnershipRecord>> {
        let rows = self.client.query(SELECT_OWNED_OBJECTS_SQL, &[&owner]).await?;
        rows.iter().map(ownership_record).collect()
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    fn session_user(&self) -> &str {
        &self.session_user
    }
}
