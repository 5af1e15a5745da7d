//! Plugin configuration assembly
//!
//! Turns a validated source configuration plus the shared dialect into the
//! immutable [`PluginConfig`] the hosting engine registers. Assembly is pure
//! composition: it validates and decodes, but opens nothing.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info_span};

use crate::conf::{HiveJdbcConf, HIVE_DRIVER, SOURCE_TYPE};
use crate::dialect::DialectDescriptor;
use crate::driver::DriverRegistry;
use crate::error::Result;
use crate::pool::{new_data_source, new_data_source_with_registry, CloseableDataSource, PoolConfig};

/// Resolves credentials referenced by a source (e.g. secret URIs)
pub trait CredentialsService: Send + Sync {
    /// Whether this service can resolve the given reference
    fn supports(&self, reference: &str) -> bool;

    /// Resolve a reference into its secret value
    fn lookup(&self, reference: &str) -> Result<String>;
}

/// Read access to engine-wide options
pub trait OptionManager: Send + Sync {
    /// Look up an option value by name
    fn option(&self, name: &str) -> Option<String>;
}

/// A source type that can be turned into a plugin configuration
pub trait SourceConf: Send + Sync {
    /// Source type identifier
    fn source_type(&self) -> &'static str;

    /// The shared dialect for this source type
    fn dialect(&self) -> Result<Arc<DialectDescriptor>>;

    /// Build the plugin configuration
    fn build_plugin_config(
        &self,
        credentials: &dyn CredentialsService,
        options: &dyn OptionManager,
    ) -> Result<PluginConfig>;
}

/// Zero-argument data source factory invoked by the hosting engine
pub type DataSourceFactory = Arc<dyn Fn() -> CloseableDataSource + Send + Sync>;

/// Finalized plugin configuration
#[derive(Clone)]
pub struct PluginConfig {
    dialect: Arc<DialectDescriptor>,
    fetch_size: i32,
    datasource_factory: DataSourceFactory,
    hidden_schemas: BTreeSet<String>,
}

impl PluginConfig {
    /// Create a plugin configuration with no hidden schemas
    pub fn new(
        dialect: Arc<DialectDescriptor>,
        fetch_size: i32,
        datasource_factory: DataSourceFactory,
    ) -> Self {
        Self {
            dialect,
            fetch_size,
            datasource_factory,
            hidden_schemas: BTreeSet::new(),
        }
    }

    /// Hide a schema from catalog listings
    pub fn with_hidden_schema(mut self, schema: impl Into<String>) -> Self {
        self.hidden_schemas.insert(schema.into());
        self
    }

    /// Shared dialect
    pub fn dialect(&self) -> &Arc<DialectDescriptor> {
        &self.dialect
    }

    /// Rows per round trip hint, passed to the driver unchanged
    pub fn fetch_size(&self) -> i32 {
        self.fetch_size
    }

    /// Schemas hidden from catalog listings
    pub fn hidden_schemas(&self) -> &BTreeSet<String> {
        &self.hidden_schemas
    }

    /// Create a new pooled data source. The caller owns it and must close it.
    pub fn new_data_source(&self) -> CloseableDataSource {
        (self.datasource_factory)()
    }

    /// The factory itself, for handing to the engine
    pub fn datasource_factory(&self) -> DataSourceFactory {
        Arc::clone(&self.datasource_factory)
    }
}

impl std::fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginConfig")
            .field("dialect", &self.dialect.metadata.name)
            .field("fetch_size", &self.fetch_size)
            .field("hidden_schemas", &self.hidden_schemas)
            .finish_non_exhaustive()
    }
}

/// Assemble a plugin configuration whose data sources use the process-wide driver registry
pub fn assemble(conf: &HiveJdbcConf, dialect: Arc<DialectDescriptor>) -> Result<PluginConfig> {
    let _span = info_span!("assemble", source_type = SOURCE_TYPE).entered();

    let url = conf.to_connection_string()?;
    let max_idle = conf.max_idle_connections;
    let idle_timeout = conf.idle_timeout_seconds;
    debug!(
        fetch_size = conf.fetch_size,
        max_idle, idle_timeout, "assembled plugin config"
    );

    let factory: DataSourceFactory =
        Arc::new(move || new_data_source(HIVE_DRIVER, url.clone(), max_idle, idle_timeout));
    Ok(PluginConfig::new(dialect, conf.fetch_size, factory))
}

/// Assemble a plugin configuration whose data sources resolve drivers from `registry`
pub fn assemble_with_registry(
    conf: &HiveJdbcConf,
    dialect: Arc<DialectDescriptor>,
    registry: Arc<DriverRegistry>,
) -> Result<PluginConfig> {
    let url = conf.to_connection_string()?;
    let pool_config = PoolConfig::new(HIVE_DRIVER, url)
        .with_max_idle(conf.max_idle_connections as usize)
        .with_idle_timeout(std::time::Duration::from_secs(u64::from(
            conf.idle_timeout_seconds,
        )));

    let factory: DataSourceFactory = Arc::new(move || {
        new_data_source_with_registry(pool_config.clone(), Arc::clone(&registry))
    });
    Ok(PluginConfig::new(dialect, conf.fetch_size, factory))
}

/// Credentials service that resolves nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialsService for NoCredentials {
    fn supports(&self, _reference: &str) -> bool {
        false
    }

    fn lookup(&self, reference: &str) -> Result<String> {
        Err(crate::error::Error::config(format!(
            "no credentials service configured for '{reference}'"
        )))
    }
}

/// Option manager with no options set
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOptions;

impl OptionManager for NoOptions {
    fn option(&self, _name: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::hive_dialect;
    use crate::pool::ConnectionPool;

    #[test]
    fn test_assemble_defaults() {
        let conf = HiveJdbcConf::new("jdbc:hive2://h:10000/default", "alice", "base64,c2VjcmV0");
        let plugin = assemble(&conf, hive_dialect().unwrap()).unwrap();

        assert_eq!(plugin.fetch_size(), 200);
        assert!(plugin.hidden_schemas().is_empty());
        assert_eq!(plugin.dialect().metadata.name, "HIVEJDBC");
    }

    #[test]
    fn test_factory_builds_lazy_pool() {
        let conf = HiveJdbcConf::new("jdbc:hive2://h:10000/default", "alice", "base64,c2VjcmV0")
            .with_max_idle_connections(3)
            .with_idle_timeout_seconds(15);
        let plugin = assemble(&conf, hive_dialect().unwrap()).unwrap();

        let ds = plugin.new_data_source();
        assert_eq!(ds.config().driver, HIVE_DRIVER);
        assert_eq!(ds.config().max_idle, 3);
        assert_eq!(ds.config().idle_timeout.as_secs(), 15);
        assert_eq!(
            ds.config().connection.url.expose_secret(),
            "jdbc:hive2://h:10000/default;user=alice;password=secret;"
        );
        assert_eq!(ds.size(), 0);
    }

    #[test]
    fn test_debug_does_not_leak_connection_string() {
        let conf = HiveJdbcConf::new("jdbc:hive2://h", "alice", "base64,c2VjcmV0");
        let plugin = assemble(&conf, hive_dialect().unwrap()).unwrap();
        let debug = format!("{:?}", plugin);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_hidden_schema() {
        let conf = HiveJdbcConf::new("jdbc:hive2://h", "alice", "base64,");
        let plugin = assemble(&conf, hive_dialect().unwrap())
            .unwrap()
            .with_hidden_schema("sys");
        assert!(plugin.hidden_schemas().contains("sys"));
    }
}
