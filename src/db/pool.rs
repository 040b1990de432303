//! Connection pool management.
//!
//! `ConnectionPool` owns a bounded sqlx `PgPool` behind an explicit lifecycle
//! (uninitialized, open, closed) and hands out `PooledConnection`s that are
//! exclusively owned by one operation until they are released.

use crate::config::{DEFAULT_IDLE_TIMEOUT_SECS, PoolConfig};
use crate::error::{DbError, DbResult};
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Executor, Postgres};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const READ_ONLY_SESSION: &str = "SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY";

enum PoolState {
    /// Never opened; the first acquire opens it.
    Uninitialized,
    Open(PgPool),
    /// Explicitly closed; only `initialize()` reopens it.
    Closed,
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub state: &'static str,
    /// Live connections, idle or checked out
    pub size: u32,
    pub idle: usize,
    pub max_connections: u32,
}

/// Bounded pool of PostgreSQL connections.
///
/// Safe to share between tasks (`Arc<ConnectionPool>`); the pool itself is the
/// only shared mutable state of the gateway.
pub struct ConnectionPool {
    config: PoolConfig,
    state: RwLock<PoolState>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConnectionPool {
    /// Create an uninitialized pool. No connection is made until `initialize()`
    /// or the first `acquire()`.
    pub fn new(config: PoolConfig) -> DbResult<Self> {
        config.validate().map_err(DbError::validation)?;
        Ok(Self {
            config,
            state: RwLock::new(PoolState::Uninitialized),
        })
    }

    /// Get the immutable pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Open the pool. A no-op when it is already open; reopens a closed pool.
    pub async fn initialize(&self) -> DbResult<()> {
        self.open(true).await.map(|_| ())
    }

    /// Check out a connection, waiting up to the connect timeout for one to free up.
    pub async fn acquire(&self) -> DbResult<PooledConnection> {
        let pool = self.open(false).await?;
        let timeout_secs = self.config.connect_timeout.as_secs();

        let conn = pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => DbError::pool_exhausted(timeout_secs),
            sqlx::Error::PoolClosed => DbError::PoolClosed,
            other => other.into(),
        })?;
        let mut conn = PooledConnection::new(conn);

        if self.config.read_only {
            // On failure the connection is dropped here; it is discarded if broken.
            conn.execute_raw(READ_ONLY_SESSION).await?;
        }

        debug!(read_only = self.config.read_only, "Connection acquired");
        Ok(conn)
    }

    /// Return a connection. Healthy connections go back to the free set; broken
    /// ones are closed, so the pool's live count shrinks and it reconnects on demand.
    pub fn release(&self, conn: PooledConnection) {
        if conn.is_broken() {
            warn!(
                host = %self.config.host,
                database = %self.config.database,
                "Discarding broken connection"
            );
        }
        drop(conn);
    }

    /// Terminate every connection. Later acquires fail with `PoolClosed` until
    /// `initialize()` runs again.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, PoolState::Closed)
        };

        if let PoolState::Open(pool) = previous {
            info!(database = %self.config.database, "Closing connection pool");
            // Waits for checked-out connections to come back.
            pool.close().await;
            info!("Connection pool closed");
        }
    }

    /// Current pool statistics.
    pub async fn status(&self) -> PoolStatus {
        let state = self.state.read().await;
        let (label, size, idle) = match &*state {
            PoolState::Uninitialized => ("uninitialized", 0, 0),
            PoolState::Open(pool) => ("open", pool.size(), pool.num_idle()),
            PoolState::Closed => ("closed", 0, 0),
        };
        PoolStatus {
            state: label,
            size,
            idle,
            max_connections: self.config.max_connections,
        }
    }

    /// Whether the pool is currently open.
    pub async fn is_open(&self) -> bool {
        matches!(*self.state.read().await, PoolState::Open(_))
    }

    async fn open(&self, reopen_closed: bool) -> DbResult<PgPool> {
        {
            let state = self.state.read().await;
            match &*state {
                PoolState::Open(pool) => return Ok(pool.clone()),
                PoolState::Closed if !reopen_closed => return Err(DbError::PoolClosed),
                _ => {}
            }
        }

        // Re-check under the write lock so concurrent callers open it only once.
        let mut state = self.state.write().await;
        match &*state {
            PoolState::Open(pool) => return Ok(pool.clone()),
            PoolState::Closed if !reopen_closed => return Err(DbError::PoolClosed),
            _ => {}
        }

        let pool = self.connect().await?;
        *state = PoolState::Open(pool.clone());
        Ok(pool)
    }

    async fn connect(&self) -> DbResult<PgPool> {
        let config = &self.config;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            min_connections = config.min_connections,
            max_connections = config.max_connections,
            read_only = config.read_only,
            ssl_mode = %config.ssl_mode,
            "Initializing connection pool"
        );

        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)))
            .test_before_acquire(true)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to connect: {}", e),
                    connection_suggestion(&e),
                )
            })?;

        info!(
            host = %config.host,
            database = %config.database,
            "Connection pool initialized"
        );
        Ok(pool)
    }
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return "Check that the PostgreSQL server is running and accessible".to_string();
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify POSTGRES_USER and POSTGRES_PASSWORD".to_string();
    }

    if error_str.contains("does not exist") {
        return "Check that the database named by POSTGRES_DB exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check the sslmode setting or build with a TLS feature".to_string();
    }

    if matches!(error, sqlx::Error::PoolTimedOut) {
        return "The server did not answer within the connect timeout".to_string();
    }

    "Verify POSTGRES_HOST, POSTGRES_PORT and network access to the server".to_string()
}

/// A connection checked out of a `ConnectionPool`.
///
/// Dropping it returns it to the pool, unless it was marked broken, in which
/// case it is detached and closed instead.
pub struct PooledConnection {
    inner: Option<PoolConnection<Postgres>>,
    broken: bool,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl PooledConnection {
    fn new(conn: PoolConnection<Postgres>) -> Self {
        Self {
            inner: Some(conn),
            broken: false,
        }
    }

    /// Borrow the underlying connection for running statements.
    pub fn as_mut(&mut self) -> DbResult<&mut PgConnection> {
        self.inner
            .as_deref_mut()
            .ok_or_else(|| DbError::internal("Connection already released"))
    }

    /// Never return this connection to the free set.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Pass a statement result through, marking the connection broken on
    /// transport-level failures.
    pub fn track<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            if e.is_connection_broken() {
                self.broken = true;
            }
        }
        result
    }

    /// Run a parameterless statement over the simple query protocol, outside of
    /// any transaction this wrapper opened. Returns rows affected.
    pub async fn execute_raw(&mut self, sql: &str) -> DbResult<u64> {
        let conn = self.as_mut()?;
        let result = conn
            .execute(sql)
            .await
            .map(|done| done.rows_affected())
            .map_err(DbError::from);
        self.track(result)
    }

    /// [`execute_raw`](Self::execute_raw) for statements whose interruption
    /// leaves the session in an unknown state (COMMIT, VACUUM).
    ///
    /// The connection counts as broken while the statement is in flight, so
    /// dropping the future at the await discards it instead of pooling it.
    pub async fn execute_settled(&mut self, sql: &str) -> DbResult<u64> {
        let was_broken = self.broken;
        self.broken = true;
        let result = self.execute_raw(sql).await;
        self.broken = was_broken || matches!(&result, Err(e) if e.is_connection_broken());
        result
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.inner.take() {
            if self.broken {
                drop(conn.detach());
            }
        }
    }
}
