//! # hive-rdbc
//!
//! Hive JDBC source plugin for a federated SQL query engine.
//!
//! The crate turns a user-supplied source configuration into everything the
//! engine needs to talk to Hive:
//!
//! - **Credential decoding**: stored passwords of the form `<prefix>base64,<payload>`
//! - **Connection strings**: `<connectionString>;user=<username>;password=<password>;`
//! - **Pooled data sources**: lazily connecting pools with bounded idle sets and idle eviction
//! - **Dialect loading**: the bundled ARP definition, parsed once per process and shared
//! - **Plugin assembly**: dialect, fetch size and a data source factory in one immutable value
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hive_rdbc::prelude::*;
//!
//! let conf = HiveJdbcConf::from_file("hive.yaml")?;
//! let plugin = conf.build_plugin_config(&NoCredentials, &NoOptions)?;
//!
//! let ds = plugin.new_data_source();
//! let conn = ds.get().await?;
//! conn.execute("SET hive.exec.parallel=true").await?;
//! conn.release().await;
//! ds.close().await?;
//! ```
//!
//! The physical driver is not part of this crate. Register one with
//! [`driver::DriverRegistry::global`] under [`conf::HIVE_DRIVER`] before the
//! first checkout.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod conf;
pub mod connection;
pub mod credential;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod plugin;
pub mod pool;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, RequiredField, Result};

    // Source configuration
    pub use crate::conf::{
        build_connection_string, hive_dialect, HiveJdbcConf, EXTERNAL_QUERY_SUPPORTED,
        HIVE_DRIVER, SOURCE_LABEL, SOURCE_TYPE,
    };

    // Credentials
    pub use crate::credential::{decode_secret, StoredSecret};

    // Connection traits and config
    pub use crate::connection::{CommitMode, Connection, ConnectionConfig, Driver};
    pub use crate::driver::DriverRegistry;

    // Pool types
    pub use crate::pool::{
        new_data_source, new_data_source_with_registry, new_generic_connection_pool_data_source,
        CloseableDataSource, ConnectionPool, GenericConnectionPool, PoolConfig, PoolStats,
        PooledConnection,
    };

    // Dialect types
    pub use crate::dialect::{load_dialect, DialectCell, DialectDescriptor, SqlDialect};

    // Plugin assembly
    pub use crate::plugin::{
        assemble, assemble_with_registry, CredentialsService, DataSourceFactory, NoCredentials,
        NoOptions, OptionManager, PluginConfig, SourceConf,
    };

    pub use crate::types::SensitiveString;
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use types::SensitiveString;
