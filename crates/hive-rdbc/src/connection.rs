//! Driver-facing connection abstractions for hive-rdbc
//!
//! The physical driver is an external collaborator. This crate reaches it only
//! through two traits:
//! - Driver: opens physical connections for a connection configuration
//! - Connection: the minimal surface the pool needs to prepare, validate and
//!   close a physical connection

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::SensitiveString;

/// A physical connection opened by a driver
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a statement that returns no rows (used for init SQL)
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Enable or disable auto-commit
    async fn set_auto_commit(&self, enabled: bool) -> Result<()>;

    /// Switch the default catalog
    async fn set_catalog(&self, catalog: &str) -> Result<()> {
        Err(Error::unsupported(format!(
            "set_catalog({catalog}) not supported by this driver"
        )))
    }

    /// Switch the default schema
    async fn set_schema(&self, schema: &str) -> Result<()> {
        Err(Error::unsupported(format!(
            "set_schema({schema}) not supported by this driver"
        )))
    }

    /// Check if connection is valid/alive
    async fn is_valid(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Factory for physical connections, identified by a driver class name
#[async_trait]
pub trait Driver: Send + Sync {
    /// Fully-qualified driver class name this driver answers to
    fn class_name(&self) -> &str;

    /// Open a new physical connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;
}

/// Transaction commit policy applied to freshly opened connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommitMode {
    /// Leave the driver's own default untouched
    #[default]
    DriverSpecified,
    /// Force auto-commit on
    Auto,
    /// Force auto-commit off; callers commit explicitly
    Manual,
}

impl CommitMode {
    /// The auto-commit value to apply, if any
    pub fn auto_commit(self) -> Option<bool> {
        match self {
            Self::DriverSpecified => None,
            Self::Auto => Some(true),
            Self::Manual => Some(false),
        }
    }
}

impl std::fmt::Display for CommitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DriverSpecified => write!(f, "driver-specified"),
            Self::Auto => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Configuration handed to a driver when opening a connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Resolved driver connection string (carries the plaintext password)
    pub url: SensitiveString,
    /// Statement executed once on every new connection
    pub init_sql: Option<String>,
    /// Default catalog applied to new connections
    pub catalog: Option<String>,
    /// Default schema applied to new connections
    pub schema: Option<String>,
    /// Commit policy applied to new connections
    pub commit_mode: CommitMode,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: SensitiveString::new(""),
            init_sql: None,
            catalog: None,
            schema: None,
            commit_mode: CommitMode::DriverSpecified,
            connect_timeout_ms: 10_000,
        }
    }
}

impl ConnectionConfig {
    /// Create configuration with just a connection string
    pub fn new(url: impl Into<SensitiveString>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set init SQL
    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }

    /// Set default catalog
    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// Set default schema
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set commit mode
    pub fn with_commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = mode;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Prepare a freshly opened connection: commit mode, catalog, schema, init SQL
    pub async fn prepare(&self, conn: &dyn Connection) -> Result<()> {
        if let Some(auto_commit) = self.commit_mode.auto_commit() {
            conn.set_auto_commit(auto_commit).await?;
        }
        if let Some(catalog) = &self.catalog {
            conn.set_catalog(catalog).await?;
        }
        if let Some(schema) = &self.schema {
            conn.set_schema(schema).await?;
        }
        if let Some(sql) = &self.init_sql {
            conn.execute(sql).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_mode_auto_commit() {
        assert_eq!(CommitMode::DriverSpecified.auto_commit(), None);
        assert_eq!(CommitMode::Auto.auto_commit(), Some(true));
        assert_eq!(CommitMode::Manual.auto_commit(), Some(false));
        assert_eq!(CommitMode::default(), CommitMode::DriverSpecified);
    }

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::new("jdbc:hive2://localhost:10000/default")
            .with_init_sql("SET hive.exec.parallel=true")
            .with_catalog("hive")
            .with_schema("default")
            .with_commit_mode(CommitMode::Auto)
            .with_connect_timeout(5000);

        assert_eq!(
            config.url.expose_secret(),
            "jdbc:hive2://localhost:10000/default"
        );
        assert_eq!(
            config.init_sql.as_deref(),
            Some("SET hive.exec.parallel=true")
        );
        assert_eq!(config.catalog.as_deref(), Some("hive"));
        assert_eq!(config.schema.as_deref(), Some("default"));
        assert_eq!(config.commit_mode, CommitMode::Auto);
        assert_eq!(config.connect_timeout_ms, 5000);
    }

    #[test]
    fn test_connection_config_debug_redacts_url() {
        let config = ConnectionConfig::new("jdbc:hive2://h:10000;user=a;password=secret;");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret;"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_commit_mode_display() {
        assert_eq!(
            format!("{}", CommitMode::DriverSpecified),
            "driver-specified"
        );
        assert_eq!(format!("{}", CommitMode::Auto), "auto");
        assert_eq!(format!("{}", CommitMode::Manual), "manual");
    }
}
