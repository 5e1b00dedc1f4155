//! PostgreSQL client implementation
//!
//! Pooled connections to the relational source, shared by the page fetcher
//! and the PostgreSQL checkpoint storage.

use crate::config::schema::SourceConfig;
use crate::domain::{PagefoldError, Result, SourceError};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

/// PostgreSQL client for Pagefold
///
/// Provides pooled query execution with a per-statement timeout.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: SourceConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// No connection is opened until the first query.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed or the
    /// pool or TLS connector cannot be built.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                PagefoldError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;
        pg_config.ssl_mode(ssl_mode(&config.ssl_mode));
        pg_config.connect_timeout(Duration::from_secs(config.connection_timeout_seconds));

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = if config.ssl_mode == "disable" {
            Manager::from_config(pg_config, NoTls, manager_config)
        } else {
            Manager::from_config(pg_config, tls_connector(&config.ssl_mode)?, manager_config)
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| {
                PagefoldError::Configuration(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| query_error("Connection test", e))?;

        tracing::info!(source = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            SourceError::ConnectionFailed(format!("Failed to get connection from pool: {e}")).into()
        })
    }

    /// Execute a query and return rows
    pub async fn query(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        let client = self.get_connection().await?;
        self.set_statement_timeout(&client).await?;

        client
            .query(query, params)
            .await
            .map_err(|e| query_error("Query", e))
    }

    /// Execute a statement and return the number of affected rows
    pub async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let client = self.get_connection().await?;
        self.set_statement_timeout(&client).await?;

        client
            .execute(statement, params)
            .await
            .map_err(|e| query_error("Statement", e))
    }

    /// Run a batch of statements without parameters
    pub async fn batch_execute(&self, statements: &str) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .batch_execute(statements)
            .await
            .map_err(|e| query_error("Batch", e))
    }

    async fn set_statement_timeout(&self, client: &deadpool_postgres::Object) -> Result<()> {
        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.config.statement_timeout_seconds * 1000
        );
        client
            .execute(&timeout_query, &[])
            .await
            .map(|_| ())
            .map_err(|e| query_error("Setting statement timeout", e))
    }

    /// Get the connection string (without password)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_ref())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

fn ssl_mode(mode: &str) -> SslMode {
    match mode {
        "disable" => SslMode::Disable,
        "prefer" => SslMode::Prefer,
        _ => SslMode::Require,
    }
}

/// TLS connector honouring the certificate checks of `mode`
///
/// `prefer` and `require` encrypt without verifying, `verify-ca` checks the
/// chain only and `verify-full` also checks the host name.
fn tls_connector(mode: &str) -> Result<postgres_native_tls::MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    match mode {
        "verify-full" => {}
        "verify-ca" => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {
            builder.danger_accept_invalid_certs(true);
        }
    }
    let connector = builder
        .build()
        .map_err(|e| PagefoldError::Configuration(format!("Failed to build TLS connector: {e}")))?;
    Ok(postgres_native_tls::MakeTlsConnector::new(connector))
}

fn query_error(what: &str, e: tokio_postgres::Error) -> PagefoldError {
    if e.code() == Some(&SqlState::QUERY_CANCELED) {
        return SourceError::Timeout(format!("{what} exceeded statement timeout: {e}")).into();
    }
    if e.is_closed() {
        return SourceError::ConnectionFailed(format!("{what} failed: {e}")).into();
    }
    SourceError::QueryFailed(format!("{what} failed: {e}")).into()
}

/// Replaces the credentials of a connection string
pub fn redact_connection_string(connection_string: &str) -> String {
    connection_string
        .rsplit_once('@')
        .map(|(_, host)| format!("postgresql://***@{host}"))
        .unwrap_or_else(|| "postgresql://***".to_string())
}
