//! Pooled data sources for hive-rdbc
//!
//! A lazily connecting connection pool:
//! - No physical connection is opened (and no driver resolved) at construction
//! - Bounded idle set (`max_idle`); surplus connections are closed on return
//! - Idle connections past `idle_timeout` are discarded instead of reused
//! - Deterministic `close()` that drains and closes every pooled connection
//!
//! # Example
//!
//! ```rust,ignore
//! use hive_rdbc::pool::{new_data_source, ConnectionPool};
//!
//! let ds = new_data_source("com.cloudera.hive.jdbc.HS2Driver", url, 8, 60);
//! let conn = ds.get().await?;
//! conn.execute("SET hive.exec.parallel=true").await?;
//! conn.release().await;
//! ds.close().await?;
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connection::{CommitMode, Connection, ConnectionConfig};
use crate::driver::DriverRegistry;
use crate::error::{Error, Result};
use crate::types::SensitiveString;

/// Connection pool trait
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Get a connection from the pool, opening one if no idle connection is usable
    async fn get(&self) -> Result<PooledConnection>;

    /// Return a connection to the pool
    async fn return_connection(&self, conn: Box<dyn Connection>);

    /// Close a checked-out connection instead of returning it
    async fn discard_connection(&self, conn: Box<dyn Connection>);

    /// Current number of open physical connections (idle + checked out)
    fn size(&self) -> usize;

    /// Number of idle connections
    fn idle(&self) -> usize;

    /// Number of connections in use
    fn in_use(&self) -> usize {
        self.size().saturating_sub(self.idle())
    }

    /// Get pool statistics
    fn stats(&self) -> PoolStats;

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;

    /// Close all connections and shut the pool down
    async fn close(&self) -> Result<()>;
}

/// A connection borrowed from the pool
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    pool: Arc<dyn ConnectionPool>,
}

impl PooledConnection {
    /// Create a new pooled connection wrapper
    pub fn new(conn: Box<dyn Connection>, pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &(dyn Connection + 'static) {
        self.conn
            .as_ref()
            .expect("connection already returned")
            .as_ref()
    }

    /// Return the connection to the pool and wait until it is accepted or closed
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(conn).await;
        }
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let pool = self.pool.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        pool.return_connection(conn).await;
                    });
                }
                // No runtime to return on: close it on a short-lived one.
                Err(_) => match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(pool.discard_connection(conn)),
                    Err(e) => {
                        warn!(error = %e, "pooled connection dropped outside a runtime; leaking it");
                    }
                },
            }
        }
    }
}

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Driver class name resolved through the driver registry
    pub driver: String,
    /// Connection configuration handed to the driver
    pub connection: ConnectionConfig,
    /// Maximum number of idle connections retained (0 = retain none)
    pub max_idle: usize,
    /// Idle time after which a pooled connection is evicted (zero = never)
    pub idle_timeout: Duration,
    /// Maximum number of open connections (None = unbounded)
    pub max_total: Option<usize>,
    /// Maximum time to wait for a connection when `max_total` is reached
    pub acquire_timeout: Duration,
    /// Whether to test connections on borrow
    pub test_on_borrow: bool,
    /// Whether to test connections on return
    pub test_on_return: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            driver: String::new(),
            connection: ConnectionConfig::default(),
            max_idle: 8,
            idle_timeout: Duration::from_secs(60),
            max_total: None,
            acquire_timeout: Duration::from_secs(30),
            test_on_borrow: true,
            test_on_return: false,
        }
    }
}

impl PoolConfig {
    /// Create pool config for a driver and a resolved connection string
    pub fn new(driver: impl Into<String>, url: impl Into<SensitiveString>) -> Self {
        Self {
            driver: driver.into(),
            connection: ConnectionConfig::new(url),
            ..Default::default()
        }
    }

    /// Replace the connection configuration
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Set maximum idle connections
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Bound the number of open connections
    pub fn with_max_total(mut self, max_total: usize) -> Self {
        self.max_total = Some(max_total);
        self
    }

    /// Set acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Enable/disable test on borrow
    pub fn with_test_on_borrow(mut self, test: bool) -> Self {
        self.test_on_borrow = test;
        self
    }

    /// Enable/disable test on return
    pub fn with_test_on_return(mut self, test: bool) -> Self {
        self.test_on_return = test;
        self
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total number of connections created
    pub connections_created: u64,
    /// Total number of connections closed
    pub connections_closed: u64,
    /// Total number of connection acquisitions
    pub acquisitions: u64,
    /// Connections discarded for exceeding the idle timeout
    pub idle_evictions: u64,
    /// Number of times pool was exhausted
    pub exhausted_count: u64,
    /// Total wait time for connections (in milliseconds)
    pub total_wait_time_ms: u64,
    /// Number of health check failures
    pub health_check_failures: u64,
}

/// Atomic pool stats for concurrent updates
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicPoolStats {
    pub connections_created: AtomicU64,
    pub connections_closed: AtomicU64,
    pub acquisitions: AtomicU64,
    pub idle_evictions: AtomicU64,
    pub exhausted_count: AtomicU64,
    pub total_wait_time_ms: AtomicU64,
    pub health_check_failures: AtomicU64,
}

impl AtomicPoolStats {
    /// Create new atomic stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection creation
    pub fn record_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection close
    pub fn record_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an acquisition
    pub fn record_acquisition(&self, wait_time_ms: u64) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.total_wait_time_ms
            .fetch_add(wait_time_ms, Ordering::Relaxed);
    }

    /// Record an idle-timeout eviction
    pub fn record_evicted(&self) {
        self.idle_evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record pool exhaustion
    pub fn record_exhausted(&self) {
        self.exhausted_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record health check failure
    pub fn record_health_check_failure(&self) {
        self.health_check_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot current stats
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            idle_evictions: self.idle_evictions.load(Ordering::Relaxed),
            exhausted_count: self.exhausted_count.load(Ordering::Relaxed),
            total_wait_time_ms: self.total_wait_time_ms.load(Ordering::Relaxed),
            health_check_failures: self.health_check_failures.load(Ordering::Relaxed),
        }
    }
}

/// A closeable pooled data source, owned by whoever invoked the factory
pub type CloseableDataSource = Arc<GenericConnectionPool>;

/// Generic lazily connecting connection pool.
///
/// Idle connections are kept LIFO. Checkout and return go through a single
/// async mutex, so an idle connection is handed to at most one caller.
pub struct GenericConnectionPool {
    config: PoolConfig,
    registry: Arc<DriverRegistry>,
    idle: Mutex<Vec<PoolEntry>>,
    idle_count: AtomicUsize,
    /// Present only when `max_total` is set
    semaphore: Option<Semaphore>,
    total_connections: AtomicUsize,
    stats: AtomicPoolStats,
    shutdown: AtomicBool,
    self_ref: Weak<Self>,
}

struct PoolEntry {
    conn: Box<dyn Connection>,
    last_used: Instant,
}

impl GenericConnectionPool {
    /// Create a pool. Opens nothing until the first `get`.
    pub fn new(config: PoolConfig, registry: Arc<DriverRegistry>) -> Arc<Self> {
        debug!(
            driver = %config.driver,
            max_idle = config.max_idle,
            idle_timeout_secs = config.idle_timeout.as_secs(),
            commit_mode = %config.connection.commit_mode,
            "creating lazy connection pool"
        );
        Arc::new_cyclic(|self_ref| Self {
            semaphore: config.max_total.map(Semaphore::new),
            idle: Mutex::new(Vec::with_capacity(config.max_idle)),
            idle_count: AtomicUsize::new(0),
            total_connections: AtomicUsize::new(0),
            stats: AtomicPoolStats::new(),
            shutdown: AtomicBool::new(false),
            self_ref: self_ref.clone(),
            registry,
            config,
        })
    }

    /// Get pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Close every idle connection that exceeded the idle timeout.
    ///
    /// Returns the number of connections evicted.
    pub async fn evict_idle(&self) -> usize {
        let expired = {
            let mut idle = self.idle.lock().await;
            let (expired, keep): (Vec<_>, Vec<_>) =
                idle.drain(..).partition(|entry| self.is_idle_expired(entry));
            *idle = keep;
            self.idle_count.store(idle.len(), Ordering::Release);
            expired
        };

        let evicted = expired.len();
        for entry in expired {
            self.stats.record_evicted();
            self.discard(entry.conn).await;
        }
        if evicted > 0 {
            debug!(driver = %self.config.driver, evicted, "evicted idle connections");
        }
        evicted
    }

    fn is_idle_expired(&self, entry: &PoolEntry) -> bool {
        !self.config.idle_timeout.is_zero() && entry.last_used.elapsed() > self.config.idle_timeout
    }

    async fn create_connection(&self) -> Result<Box<dyn Connection>> {
        let driver = self.registry.resolve(&self.config.driver)?;
        let connection = &self.config.connection;

        let conn = if connection.connect_timeout_ms > 0 {
            let timeout = Duration::from_millis(connection.connect_timeout_ms);
            tokio::time::timeout(timeout, driver.connect(connection))
                .await
                .map_err(|_| {
                    Error::timeout(format!(
                        "connecting via {} took longer than {}ms",
                        self.config.driver, connection.connect_timeout_ms
                    ))
                })??
        } else {
            driver.connect(connection).await?
        };

        if let Err(e) = connection.prepare(conn.as_ref()).await {
            let _ = conn.close().await;
            return Err(e);
        }

        self.total_connections.fetch_add(1, Ordering::AcqRel);
        self.stats.record_created();
        debug!(driver = %self.config.driver, "opened physical connection");
        Ok(conn)
    }

    async fn discard(&self, conn: Box<dyn Connection>) {
        if let Err(e) = conn.close().await {
            warn!(driver = %self.config.driver, error = %e, "failed to close connection");
        }
        self.total_connections.fetch_sub(1, Ordering::AcqRel);
        self.stats.record_closed();
    }

    /// Pop the most recently used idle connection that is neither expired nor broken.
    ///
    /// Validation runs after the idle lock is released.
    async fn take_idle(&self) -> Option<Box<dyn Connection>> {
        loop {
            let mut expired = Vec::new();
            let found = {
                let mut idle = self.idle.lock().await;
                let found = loop {
                    match idle.pop() {
                        Some(entry) if self.is_idle_expired(&entry) => {
                            self.stats.record_evicted();
                            expired.push(entry.conn);
                        }
                        other => break other,
                    }
                };
                self.idle_count.store(idle.len(), Ordering::Release);
                found
            };

            for conn in expired {
                self.discard(conn).await;
            }

            let entry = found?;
            if self.config.test_on_borrow && !entry.conn.is_valid().await {
                self.stats.record_health_check_failure();
                self.discard(entry.conn).await;
                continue;
            }
            return Some(entry.conn);
        }
    }
}

#[async_trait]
impl ConnectionPool for GenericConnectionPool {
    async fn get(&self) -> Result<PooledConnection> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }

        let start = Instant::now();

        let permit = match &self.semaphore {
            Some(semaphore) => Some(
                tokio::time::timeout(self.config.acquire_timeout, semaphore.acquire())
                    .await
                    .map_err(|_| {
                        self.stats.record_exhausted();
                        Error::PoolExhausted {
                            message: format!(
                                "timeout waiting for connection ({}ms)",
                                self.config.acquire_timeout.as_millis()
                            ),
                        }
                    })?
                    .map_err(|_| Error::PoolClosed)?,
            ),
            None => None,
        };

        let conn = match self.take_idle().await {
            Some(conn) => conn,
            // On failure the permit is dropped and released.
            None => self.create_connection().await?,
        };

        self.stats
            .record_acquisition(start.elapsed().as_millis() as u64);

        // Released again in return_connection.
        if let Some(permit) = permit {
            permit.forget();
        }

        let pool: Arc<dyn ConnectionPool> = match self.self_ref.upgrade() {
            Some(pool) => pool as Arc<dyn ConnectionPool>,
            None => {
                self.discard(conn).await;
                return Err(Error::PoolClosed);
            }
        };

        Ok(PooledConnection::new(conn, pool))
    }

    async fn return_connection(&self, conn: Box<dyn Connection>) {
        if let Some(semaphore) = &self.semaphore {
            semaphore.add_permits(1);
        }

        if self.shutdown.load(Ordering::Acquire) {
            self.discard(conn).await;
            return;
        }

        if self.config.test_on_return && !conn.is_valid().await {
            self.stats.record_health_check_failure();
            self.discard(conn).await;
            return;
        }

        let mut to_close = Vec::new();
        {
            let mut idle = self.idle.lock().await;
            let mut i = 0;
            while i < idle.len() {
                if self.is_idle_expired(&idle[i]) {
                    self.stats.record_evicted();
                    to_close.push(idle.remove(i).conn);
                } else {
                    i += 1;
                }
            }

            // close() may have drained the idle set while this connection was validated
            if self.shutdown.load(Ordering::Acquire) {
                to_close.push(conn);
            } else if idle.len() < self.config.max_idle {
                idle.push(PoolEntry {
                    conn,
                    last_used: Instant::now(),
                });
            } else {
                to_close.push(conn);
            }
            self.idle_count.store(idle.len(), Ordering::Release);
        }

        for conn in to_close {
            self.discard(conn).await;
        }
    }

    async fn discard_connection(&self, conn: Box<dyn Connection>) {
        if let Some(semaphore) = &self.semaphore {
            semaphore.add_permits(1);
        }
        self.discard(conn).await;
    }

    fn size(&self) -> usize {
        self.total_connections.load(Ordering::Acquire)
    }

    fn idle(&self) -> usize {
        self.idle_count.load(Ordering::Acquire)
    }

    fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }

    fn is_closed(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<()> {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(semaphore) = &self.semaphore {
            semaphore.close();
        }

        let drained: Vec<_> = {
            let mut idle = self.idle.lock().await;
            self.idle_count.store(0, Ordering::Release);
            idle.drain(..).collect()
        };

        let closed = drained.len();
        for entry in drained {
            self.discard(entry.conn).await;
        }

        info!(
            driver = %self.config.driver,
            closed,
            in_use = self.size(),
            "connection pool closed"
        );
        Ok(())
    }
}

impl Drop for GenericConnectionPool {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Acquire) && self.idle_count.load(Ordering::Acquire) > 0 {
            warn!(
                driver = %self.config.driver,
                idle = self.idle_count.load(Ordering::Acquire),
                "connection pool dropped without close()"
            );
        }
    }
}

/// Create a pooled data source from a full pool configuration
pub fn new_data_source_with_registry(
    config: PoolConfig,
    registry: Arc<DriverRegistry>,
) -> CloseableDataSource {
    GenericConnectionPool::new(config, registry)
}

/// Generic pooled data source primitive.
///
/// `init_sql`, `catalog` and `schema` are applied to every new physical
/// connection when set. Uses the process-wide driver registry.
#[allow(clippy::too_many_arguments)]
pub fn new_generic_connection_pool_data_source(
    driver: &str,
    url: SensitiveString,
    init_sql: Option<String>,
    catalog: Option<String>,
    schema: Option<String>,
    commit_mode: CommitMode,
    max_idle: u32,
    idle_timeout_secs: u32,
) -> CloseableDataSource {
    let connection = ConnectionConfig {
        url,
        init_sql,
        catalog,
        schema,
        commit_mode,
        ..Default::default()
    };
    let config = PoolConfig {
        driver: driver.to_string(),
        connection,
        max_idle: max_idle as usize,
        idle_timeout: Duration::from_secs(u64::from(idle_timeout_secs)),
        ..Default::default()
    };
    new_data_source_with_registry(config, DriverRegistry::global())
}

/// Create a pooled data source with the driver's own commit mode and no init SQL
pub fn new_data_source(
    driver: &str,
    url: SensitiveString,
    max_idle: u32,
    idle_timeout_secs: u32,
) -> CloseableDataSource {
    new_generic_connection_pool_data_source(
        driver,
        url,
        None,
        None,
        None,
        CommitMode::DriverSpecified,
        max_idle,
        idle_timeout_secs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new("org.example.Driver", "jdbc:example://h")
            .with_max_idle(4)
            .with_idle_timeout(Duration::from_secs(30))
            .with_max_total(16)
            .with_acquire_timeout(Duration::from_secs(10))
            .with_test_on_borrow(false);

        assert_eq!(config.driver, "org.example.Driver");
        assert_eq!(config.max_idle, 4);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.max_total, Some(16));
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert!(!config.test_on_borrow);
    }

    #[test]
    fn test_atomic_pool_stats() {
        let stats = AtomicPoolStats::new();

        stats.record_created();
        stats.record_created();
        stats.record_acquisition(100);
        stats.record_acquisition(200);
        stats.record_closed();
        stats.record_evicted();
        stats.record_exhausted();
        stats.record_health_check_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_created, 2);
        assert_eq!(snapshot.connections_closed, 1);
        assert_eq!(snapshot.acquisitions, 2);
        assert_eq!(snapshot.total_wait_time_ms, 300);
        assert_eq!(snapshot.idle_evictions, 1);
        assert_eq!(snapshot.exhausted_count, 1);
        assert_eq!(snapshot.health_check_failures, 1);
    }

    #[test]
    fn test_new_data_source_is_lazy() {
        let ds = new_data_source(
            "org.example.NotRegistered",
            SensitiveString::new("jdbc:example://h"),
            0,
            60,
        );
        assert_eq!(ds.size(), 0);
        assert_eq!(ds.idle(), 0);
        assert_eq!(ds.config().max_idle, 0);
        assert_eq!(ds.config().connection.commit_mode, CommitMode::DriverSpecified);
        assert!(ds.config().connection.init_sql.is_none());
        assert_eq!(ds.stats().connections_created, 0);
    }
}
