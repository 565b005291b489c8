//! [`ConnectionPool`] over `sqlx::AnyPool`.
//!
//! Covers PostgreSQL and MySQL URLs, plus SQLite, which speaks the H2
//! dialect closely enough for local runs and tests.

use super::pool::{Connection, ConnectionPool, PoolConfig};
use super::rows::{Row, coerce, decimal_from_f64};
use crate::error::ExecutionError;
use crate::transpiler::Dialect;
use crate::types::{LogicalType, Value};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use rust_decimal::prelude::ToPrimitive;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::error::ErrorKind;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Row as _, TypeInfo, ValueRef};

pub struct SqlxPool {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlxPool {
    /// Connect to `url`; the dialect follows the URL scheme.
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self, ExecutionError> {
        let dialect = match Dialect::from_url(url) {
            Some(d @ (Dialect::PostgreSql | Dialect::MySql)) => d,
            Some(Dialect::H2) if scheme(url).eq_ignore_ascii_case("sqlite") => Dialect::H2,
            _ => {
                return Err(ExecutionError::Pool {
                    message: format!("no supported driver for '{}'", scheme(url)),
                });
            }
        };
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(url)
            .await
            .map_err(|e| classify(&e))?;
        tracing::info!(%dialect, max_connections = config.max_connections, "connected pool");
        Ok(Self { pool, dialect })
    }

    pub fn from_pool(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    pub fn inner(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ConnectionPool for SqlxPool {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn acquire(&self) -> Result<Box<dyn Connection>, ExecutionError> {
        let conn = self.pool.acquire().await.map_err(|e| classify(&e))?;
        Ok(Box::new(SqlxConnection { conn }))
    }

    fn release(&self, connection: Box<dyn Connection>, reusable: bool) {
        if reusable {
            drop(connection);
        } else {
            connection.discard();
        }
    }
}

struct SqlxConnection {
    conn: PoolConnection<Any>,
}

#[async_trait]
impl Connection for SqlxConnection {
    fn stream<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [Value],
        types: &'a [Option<LogicalType>],
    ) -> BoxStream<'a, Result<Row, ExecutionError>> {
        bind_all(sqlx::query(sql), params)
            .fetch(&mut *self.conn)
            .map(move |row| {
                let row = row.map_err(|e| classify(&e))?;
                convert_row(&row, types).map_err(|e| classify(&e))
            })
            .boxed()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, ExecutionError> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| classify(&e))?;
        Ok(result.rows_affected())
    }

    async fn begin(&mut self) -> Result<(), ExecutionError> {
        self.simple("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), ExecutionError> {
        self.simple("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), ExecutionError> {
        self.simple("ROLLBACK").await
    }

    fn discard(self: Box<Self>) {
        let conn = self.conn.detach();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = sqlx::Connection::close(conn).await;
            });
        }
    }
}

impl SqlxConnection {
    async fn simple(&mut self, sql: &str) -> Result<(), ExecutionError> {
        sqlx::Executor::execute(&mut *self.conn, sql)
            .await
            .map(|_| ())
            .map_err(|e| classify(&e))
    }
}

type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

fn bind_all<'q>(mut query: AnyQuery<'q>, params: &'q [Value]) -> AnyQuery<'q> {
    for value in params {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Boolean(b) => query.bind(*b),
            Value::Integer(n) => query.bind(*n),
            Value::Decimal(d) => query.bind(d.to_f64().unwrap_or_default()),
            Value::Text(s) | Value::Geometry(s) => query.bind(s.as_str()),
            Value::Date(d) => query.bind(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(t) => query.bind(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::Binary(b) => query.bind(b.as_slice()),
        };
    }
    query
}

fn convert_row(row: &AnyRow, types: &[Option<LogicalType>]) -> Result<Row, sqlx::Error> {
    (0..row.len())
        .map(|i| Ok(coerce(decode(row, i)?, types.get(i).copied().flatten())))
        .collect()
}

fn decode(row: &AnyRow, index: usize) -> Result<Value, sqlx::Error> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_string()
    };
    Ok(match type_name.as_str() {
        "BOOLEAN" => Value::Boolean(row.try_get(index)?),
        "SMALLINT" => Value::Integer(row.try_get::<i16, _>(index)?.into()),
        "INTEGER" => Value::Integer(row.try_get::<i32, _>(index)?.into()),
        "BIGINT" => Value::Integer(row.try_get(index)?),
        "REAL" => decimal_from_f64(row.try_get::<f32, _>(index)?.into()),
        "DOUBLE" => decimal_from_f64(row.try_get(index)?),
        "BLOB" => Value::Binary(row.try_get(index)?),
        _ => Value::Text(row.try_get(index)?),
    })
}

fn scheme(url: &str) -> &str {
    url.split(':').next().unwrap_or(url)
}

/// Map a driver error onto the execution error kinds.
pub fn classify(err: &sqlx::Error) -> ExecutionError {
    let classified = match err {
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => ExecutionError::ConstraintViolation {
                message: db.message().to_string(),
            },
            _ => classify_code(db.code().as_deref(), db.message()),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => ExecutionError::ConnectionLost {
            message: err.to_string(),
        },
        sqlx::Error::PoolTimedOut => ExecutionError::Timeout {
            message: err.to_string(),
        },
        sqlx::Error::PoolClosed => ExecutionError::Pool {
            message: err.to_string(),
        },
        _ => ExecutionError::Backend {
            raw: err.to_string(),
        },
    };
    tracing::debug!(error = %err, classified = %classified, "backend error");
    classified
}

/// Classify by SQLSTATE (PostgreSQL, MySQL) or SQLite result code.
pub fn classify_code(code: Option<&str>, message: &str) -> ExecutionError {
    let lower = message.to_ascii_lowercase();
    let code = code.unwrap_or("");
    let sqlite_primary = code.parse::<i32>().ok().map(|n| n & 0xff);

    if code.starts_with("23") || sqlite_primary == Some(19) {
        ExecutionError::ConstraintViolation {
            message: message.to_string(),
        }
    } else if code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03") {
        ExecutionError::ConnectionLost {
            message: message.to_string(),
        }
    } else if code == "57014"
        || sqlite_primary == Some(5)
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("execution time exceeded")
    {
        ExecutionError::Timeout {
            message: message.to_string(),
        }
    } else {
        let raw = if code.is_empty() {
            message.to_string()
        } else {
            format!("[{}] {}", code, message)
        };
        ExecutionError::Backend { raw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_codes() {
        assert!(matches!(
            classify_code(Some("23505"), "duplicate key"),
            ExecutionError::ConstraintViolation { .. }
        ));
        assert!(matches!(
            classify_code(Some("2067"), "UNIQUE constraint failed: pets.id"),
            ExecutionError::ConstraintViolation { .. }
        ));
        assert!(matches!(
            classify_code(Some("08006"), "connection failure"),
            ExecutionError::ConnectionLost { .. }
        ));
        assert!(matches!(
            classify_code(Some("57014"), "canceling statement due to statement timeout"),
            ExecutionError::Timeout { .. }
        ));
        assert!(matches!(
            classify_code(Some("HY000"), "Lock wait timeout exceeded; try restarting transaction"),
            ExecutionError::Timeout { .. }
        ));
        assert!(matches!(
            classify_code(Some("5"), "database is locked"),
            ExecutionError::Timeout { .. }
        ));
        match classify_code(Some("42601"), "syntax error") {
            ExecutionError::Backend { raw } => assert_eq!(raw, "[42601] syntax error"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_transport_errors() {
        assert!(classify(&sqlx::Error::PoolTimedOut).is_retryable());
        assert!(
            classify(&sqlx::Error::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionReset
            )))
            .is_retryable()
        );
        assert!(matches!(
            classify(&sqlx::Error::PoolClosed),
            ExecutionError::Pool { .. }
        ));
        assert!(matches!(
            classify(&sqlx::Error::RowNotFound),
            ExecutionError::Backend { .. }
        ));
    }

    #[test]
    fn test_unsupported_url() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(SqlxPool::connect("oracle://db/x", &PoolConfig::default()))
            .err()
            .unwrap();
        assert!(err.to_string().contains("'oracle'"), "{}", err);
    }
}
