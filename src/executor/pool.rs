//! Connection pool seam.
//!
//! The executor only sees [`ConnectionPool`] and [`Connection`]; a
//! [`Lease`] ties one connection to one execution and hands it back to the
//! pool when dropped, whatever the exit path.

use super::rows::Row;
use crate::error::ExecutionError;
use crate::transpiler::Dialect;
use crate::types::{LogicalType, Value};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One backend connection.
#[async_trait]
pub trait Connection: Send {
    /// Rows of a statement, converted towards `types` (one entry per expected column).
    fn stream<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [Value],
        types: &'a [Option<LogicalType>],
    ) -> BoxStream<'a, Result<Row, ExecutionError>>;

    /// Run a statement that returns no rows; returns the affected row count.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, ExecutionError>;

    async fn begin(&mut self) -> Result<(), ExecutionError>;

    async fn commit(&mut self) -> Result<(), ExecutionError>;

    async fn rollback(&mut self) -> Result<(), ExecutionError>;

    /// Close instead of returning to the pool.
    fn discard(self: Box<Self>) {}
}

/// A pool of connections that all speak one dialect.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn acquire(&self) -> Result<Box<dyn Connection>, ExecutionError>;

    /// Take a connection back. Unusable connections are closed instead of reused.
    fn release(&self, connection: Box<dyn Connection>, reusable: bool);
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

/// Pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

impl PoolConfig {
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// A connection borrowed for one execution or one transaction.
pub struct Lease {
    connection: Option<Box<dyn Connection>>,
    pool: Arc<dyn ConnectionPool>,
    reusable: bool,
}

impl Lease {
    pub async fn acquire(pool: &Arc<dyn ConnectionPool>) -> Result<Self, ExecutionError> {
        let connection = pool.acquire().await?;
        tracing::debug!(dialect = %pool.dialect(), "acquired connection");
        Ok(Self {
            connection: Some(connection),
            pool: Arc::clone(pool),
            reusable: true,
        })
    }

    pub fn connection(&mut self) -> Result<&mut (dyn Connection + 'static), ExecutionError> {
        self.connection
            .as_deref_mut()
            .ok_or_else(|| ExecutionError::Pool {
                message: "connection already released".into(),
            })
    }

    /// Close the connection on release instead of returning it to the pool.
    pub fn discard(&mut self) {
        self.reusable = false;
    }

    /// Discard the connection when the error says it is broken.
    pub fn observe(&mut self, err: &ExecutionError) {
        if matches!(err, ExecutionError::ConnectionLost { .. }) {
            self.discard();
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::debug!(reusable = self.reusable, "released connection");
            self.pool.release(connection, self.reusable);
        }
    }
}
