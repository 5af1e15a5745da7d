//! Error types for hive-rdbc
//!
//! Errors are classified so callers can tell activation failures apart from
//! runtime failures:
//! - Configuration and credential errors reject source activation
//! - Dialect errors are fatal for every activation in the process
//! - Connection and pool errors are deferred to first checkout

use std::fmt;
use thiserror::Error;

/// Result type for hive-rdbc operations
pub type Result<T> = std::result::Result<T, Error>;

/// A configuration field that must be present before a connection string can be built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredField {
    /// The driver connection string
    ConnectionString,
    /// The user name
    Username,
    /// The (encoded) password
    Password,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionString => write!(f, "connection string"),
            Self::Username => write!(f, "username"),
            Self::Password => write!(f, "password"),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid configuration field
    Configuration,
    /// Stored credential could not be decoded
    Credential,
    /// Dialect resource missing or malformed
    Dialect,
    /// Connection-related errors (retriable)
    Connection,
    /// Timeout errors (retriable)
    Timeout,
    /// Pool exhausted (retriable with backoff)
    PoolExhausted,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connection | Self::Timeout | Self::PoolExhausted)
    }
}

/// Main error type for hive-rdbc
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// A required field is absent
    #[error("missing {0}")]
    MissingField(RequiredField),

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The stored password carries no `base64,` marker
    #[error("missing credential marker: password does not contain 'base64,'")]
    MissingCredentialMarker,

    /// The stored password payload is not valid base64 / UTF-8
    #[error("malformed credential payload: {message}")]
    MalformedCredential {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Dialect resource missing or malformed
    #[error("dialect error ({path}): {message}")]
    Dialect { path: String, message: String },

    /// No driver registered under the requested class name
    #[error("no driver registered for '{driver}'")]
    DriverNotFound { driver: String },

    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Connection pool exhausted
    #[error("pool exhausted: {message}")]
    PoolExhausted { message: String },

    /// The pool has been closed
    #[error("pool is closed")]
    PoolClosed,

    /// Unsupported operation for this driver
    #[error("unsupported: {message}")]
    Unsupported { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingField(_) | Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::MissingCredentialMarker | Self::MalformedCredential { .. } => {
                ErrorCategory::Credential
            }
            Self::Dialect { .. } => ErrorCategory::Dialect,
            Self::Connection { .. } | Self::DriverNotFound { .. } => ErrorCategory::Connection,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::PoolExhausted { .. } => ErrorCategory::PoolExhausted,
            Self::PoolClosed | Self::Unsupported { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        // An unregistered driver will not appear by retrying.
        !matches!(self, Self::DriverNotFound { .. }) && self.category().is_retriable()
    }

    /// Whether this error must reject source activation
    pub fn rejects_activation(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Credential | ErrorCategory::Dialect
        )
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a malformed credential error
    pub fn malformed_credential(message: impl Into<String>) -> Self {
        Self::MalformedCredential {
            message: message.into(),
            source: None,
        }
    }

    /// Create a malformed credential error with source
    pub fn malformed_credential_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::MalformedCredential {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a dialect error
    pub fn dialect(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dialect {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Credential => write!(f, "credential"),
            Self::Dialect => write!(f, "dialect"),
            Self::Connection => write!(f, "connection"),
            Self::Timeout => write!(f, "timeout"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::Other => write!(f, "other"),
        }
    }
}
