//! Connection and backend configuration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming the privileged connecting user
pub const CONN_USER_ENV: &str = "RS_CONN_USER";
/// Environment variable holding the connecting user's password
pub const CONN_PASSWORD_ENV: &str = "RS_CONN_PASSWORD";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set; export the privileged user to connect as")]
    MissingUser(&'static str),
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("missing connection setting: {0}")]
    MissingSetting(&'static str),
    #[error("invalid sslmode '{0}', expected disable, prefer, require or verify-full")]
    InvalidSslMode(String),
}

/// TLS negotiation for the live connection, named after libpq's `sslmode`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Plaintext only
    Disable,
    /// TLS when the server offers it, plaintext otherwise
    #[default]
    Prefer,
    /// TLS or fail, without certificate checks
    Require,
    /// TLS with the certificate chain and host name verified
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-full" => Ok(SslMode::VerifyFull),
            _ => Err(ConfigError::InvalidSslMode(s.to_string())),
        }
    }
}

/// Everything needed to open a session against a live cluster
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub ssl_mode: SslMode,
}

// Keep the password out of logs
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build from CLI values, taking credentials from the process environment
    pub fn from_env(host: String, port: &str, database: String) -> Result<Self, ConfigError> {
        Self::from_lookup(host, port, database, |key| std::env::var(key).ok())
    }

    /// Build from CLI values with an explicit credential lookup
    pub fn from_lookup<F>(
        host: String,
        port: &str,
        database: String,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port.to_string()))?;
        let user = connecting_user(&lookup)?;

        Ok(Self {
            host,
            port,
            database,
            user,
            password: lookup(CONN_PASSWORD_ENV),
            ssl_mode: SslMode::default(),
        })
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }
}

/// Resolve the connecting user from a lookup, rejecting unset or blank values
pub fn connecting_user<F>(lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(CONN_USER_ENV)
        .filter(|user| !user.trim().is_empty())
        .ok_or(ConfigError::MissingUser(CONN_USER_ENV))
}

/// Which backend to run the plan against
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Live cluster over the Postgres wire protocol
    Redshift(ConnectionConfig),
    /// Offline emulated catalog
    Emulator {
        /// JSON catalog file; changes are written back after each statement
        state_file: PathBuf,
        /// User the emulated session connects as
        session_user: String,
    },
}
