//! Hive JDBC source configuration
//!
//! # Example
//!
//! ```yaml
//! connectionString: "jdbc:hive2://hive.internal:10000/default"
//! username: analytics
//! password: "${HIVE_PASSWORD}"
//! fetchSize: 500
//! maxIdleConnections: 4
//! idleTimeoutSeconds: 120
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::debug;
use validator::Validate;

use crate::credential::decode_secret;
use crate::dialect::{DialectCell, DialectDescriptor, HIVE_ARP_FILENAME};
use crate::error::{Error, RequiredField, Result};
use crate::plugin::{CredentialsService, OptionManager, PluginConfig, SourceConf};
use crate::types::SensitiveString;

/// Source type identifier
pub const SOURCE_TYPE: &str = "HIVEJDBC";

/// Human-readable source label
pub const SOURCE_LABEL: &str = "HiveJDBC";

/// Whether external (pass-through) queries are allowed for this source type
pub const EXTERNAL_QUERY_SUPPORTED: bool = true;

/// Driver class used for every Hive JDBC source
pub const HIVE_DRIVER: &str = "com.cloudera.hive.jdbc.HS2Driver";

static HIVE_DIALECT: DialectCell = DialectCell::new(HIVE_ARP_FILENAME);

/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// The process-wide Hive dialect, loaded on first access
pub fn hive_dialect() -> Result<Arc<DialectDescriptor>> {
    HIVE_DIALECT.get()
}

/// Hive JDBC source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HiveJdbcConf {
    /// Driver connection string (e.g. `jdbc:hive2://host:10000/default`)
    #[serde(default)]
    #[validate(length(min = 1))]
    pub connection_string: Option<String>,

    /// User name
    #[serde(default)]
    pub username: Option<String>,

    /// Stored password: `<prefix>base64,<payload>`
    #[serde(default)]
    pub password: Option<SensitiveString>,

    /// Rows fetched per round trip (default: 200)
    #[serde(default = "default_fetch_size")]
    pub fetch_size: i32,

    /// Maximum idle pooled connections (default: 8)
    #[serde(default = "default_max_idle_connections", alias = "maxIdleConns")]
    pub max_idle_connections: u32,

    /// Idle time in seconds before a pooled connection is evicted (default: 60)
    #[serde(default = "default_idle_timeout_seconds", alias = "idleTimeSec")]
    pub idle_timeout_seconds: u32,
}

fn default_fetch_size() -> i32 {
    200
}

fn default_max_idle_connections() -> u32 {
    8
}

fn default_idle_timeout_seconds() -> u32 {
    60
}

impl Default for HiveJdbcConf {
    fn default() -> Self {
        Self {
            connection_string: None,
            username: None,
            password: None,
            fetch_size: default_fetch_size(),
            max_idle_connections: default_max_idle_connections(),
            idle_timeout_seconds: default_idle_timeout_seconds(),
        }
    }
}

impl HiveJdbcConf {
    /// Create a configuration with the three connection fields set
    pub fn new(
        connection_string: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<SensitiveString>,
    ) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            username: Some(username.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// Set fetch size
    pub fn with_fetch_size(mut self, fetch_size: i32) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Set maximum idle connections
    pub fn with_max_idle_connections(mut self, max_idle: u32) -> Self {
        self.max_idle_connections = max_idle;
        self
    }

    /// Set idle timeout in seconds
    pub fn with_idle_timeout_seconds(mut self, seconds: u32) -> Self {
        self.idle_timeout_seconds = seconds;
        self
    }

    /// Load configuration from a YAML (or JSON) file, expanding `${VAR}` references
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML, expanding `${VAR}` references
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let conf: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| Error::config(format!("failed to parse config: {e}")))?;
        conf.check()?;
        Ok(conf)
    }

    /// Field-level validation that does not require the secret.
    ///
    /// Presence of the three connection fields is checked when the
    /// connection string is built.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("invalid configuration: {e}")))?;
        if let Some(cs) = &self.connection_string {
            if cs.trim().is_empty() {
                return Err(Error::config("connectionString must not be blank"));
            }
        }
        Ok(())
    }

    /// Compose the driver connection string
    /// `<connectionString>;user=<username>;password=<decoded password>;`.
    ///
    /// Presence of the three fields is checked first, in order, then [`check`](Self::check).
    ///
    /// The result carries the plaintext password and is never logged.
    pub fn to_connection_string(&self) -> Result<SensitiveString> {
        let connection_string = self
            .connection_string
            .as_deref()
            .ok_or(Error::MissingField(RequiredField::ConnectionString))?;
        let username = self
            .username
            .as_deref()
            .ok_or(Error::MissingField(RequiredField::Username))?;
        let password = self
            .password
            .as_ref()
            .ok_or(Error::MissingField(RequiredField::Password))?;
        self.check()?;

        let decoded = decode_secret(password.expose_secret())?;
        debug!(source_type = SOURCE_TYPE, user = %username, "built connection string");
        Ok(SensitiveString::new(format!(
            "{connection_string};user={username};password={decoded};"
        )))
    }
}

/// Build the driver connection string for a configuration
pub fn build_connection_string(conf: &HiveJdbcConf) -> Result<SensitiveString> {
    conf.to_connection_string()
}

impl SourceConf for HiveJdbcConf {
    fn source_type(&self) -> &'static str {
        SOURCE_TYPE
    }

    fn dialect(&self) -> Result<Arc<DialectDescriptor>> {
        hive_dialect()
    }

    fn build_plugin_config(
        &self,
        _credentials: &dyn CredentialsService,
        _options: &dyn OptionManager,
    ) -> Result<PluginConfig> {
        let dialect = self.dialect()?;
        crate::plugin::assemble(self, dialect)
    }
}

fn expand_env_vars(content: &str) -> String {
    ENV_VAR_REGEX
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str());

            std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
        })
        .to_string()
}
