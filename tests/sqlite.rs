//! End-to-end runs over an in-memory SQLite database through `SqlxPool`.
//!
//! SQLite speaks the H2 dialect here; a single pooled connection keeps the
//! in-memory database alive for the whole test.

use polysql::catalog::introspect::introspect;
use polysql::error::ExecutionError;
use polysql::executor::{ConnectionPool, ExecutionRequest, Executor, PoolConfig, SqlxPool, prepare};
use polysql::module::{CrudOp, DataModule, ModuleOptions};
use polysql::parser::parse;
use polysql::resolver::ResolverConfig;
use polysql::transpiler::Dialect;
use polysql::types::{LogicalType, Value};
use pretty_assertions::assert_eq;
use sqlx::Row as _;
use std::sync::Arc;

struct Fixture {
    pool: Arc<SqlxPool>,
    catalog: polysql::catalog::CatalogSnapshot,
}

async fn fixture() -> Fixture {
    let pool = SqlxPool::connect("sqlite::memory:", &PoolConfig::default().max_connections(1))
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE pets (id INTEGER PRIMARY KEY, name TEXT, age INTEGER, owner_id INTEGER NOT NULL)",
    )
    .execute(pool.inner())
    .await
    .unwrap();
    for i in 1..=30i64 {
        sqlx::query("INSERT INTO pets (id, name, age, owner_id) VALUES (?, ?, ?, ?)")
            .bind(i)
            .bind(format!("pet{:02}", i))
            .bind(i % 7)
            .bind(if i % 2 == 0 { 1i64 } else { 2 })
            .execute(pool.inner())
            .await
            .unwrap();
    }
    let catalog = introspect(pool.inner(), Dialect::H2, true).await.unwrap();
    Fixture {
        pool: Arc::new(pool),
        catalog,
    }
}

impl Fixture {
    fn module(&self, sql: &str) -> DataModule {
        DataModule::assemble(
            "pets",
            parse(sql).unwrap(),
            ModuleOptions::default(),
            &self.catalog,
            &ResolverConfig::default(),
        )
        .unwrap()
    }

    fn executor(&self) -> Executor {
        Executor::new(Arc::clone(&self.pool) as Arc<dyn ConnectionPool>)
    }
}

fn ids(rows: &[Vec<Value>]) -> Vec<i64> {
    rows.iter()
        .map(|r| match &r[0] {
            Value::Integer(n) => *n,
            other => panic!("unexpected id {:?}", other),
        })
        .collect()
}

#[tokio::test]
async fn test_introspected_metadata() {
    let f = fixture().await;
    let m = f.module("SELECT name, age FROM pets WHERE owner_id = :ownerId ORDER BY name");
    let params = m.parameters().unwrap();
    assert_eq!(params[0].name, "ownerId");
    assert_eq!(params[0].logical, LogicalType::Integer);
    assert!(!params[0].nullable);
    let columns = m.columns().unwrap();
    assert_eq!(columns[0].logical, LogicalType::Text);
    assert!(columns[0].nullable);
    assert!(m.is_updatable());
}

#[tokio::test]
async fn test_rows_come_back_typed() {
    let f = fixture().await;
    let m = f.module("SELECT id, name FROM pets WHERE owner_id = :ownerId ORDER BY id");
    let result = f
        .executor()
        .execute(&m, &ExecutionRequest::new().bind("ownerId", 1))
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 15);
    assert_eq!(
        result.rows[0],
        vec![Value::Integer(2), Value::Text("pet02".into())]
    );
}

#[tokio::test]
async fn test_pagination_window_matches_across_dialects() {
    let f = fixture().await;
    let m = f.module("SELECT id, name FROM pets WHERE owner_id = :ownerId ORDER BY id");
    let everything = f
        .executor()
        .execute(&m, &ExecutionRequest::new().bind("ownerId", 1))
        .await
        .unwrap();
    let expected = ids(&everything.rows[10..15]);

    let request = ExecutionRequest::new().bind("ownerId", 1).window(10, 5);
    let h2 = f.executor().execute(&m, &request).await.unwrap();
    assert_eq!(ids(&h2.rows), expected);

    // MySQL text runs unchanged on SQLite: same placeholders, same LIMIT/OFFSET.
    let mysql = prepare(&m, &request, Dialect::MySql).unwrap();
    let mut query = sqlx::query(&mysql.sql);
    for value in &mysql.values {
        if let Value::Integer(n) = value {
            query = query.bind(*n);
        }
    }
    let rows = query.fetch_all(f.pool.inner()).await.unwrap();
    let mysql_ids: Vec<i64> = rows.iter().map(|r| r.get::<i64, _>(0)).collect();
    assert_eq!(mysql_ids, expected);
}

#[tokio::test]
async fn test_order_override_and_page() {
    let f = fixture().await;
    let options = ModuleOptions::from_json(r#"{"pageSize": 4}"#).unwrap();
    let m = DataModule::assemble(
        "pets",
        parse("SELECT id, age FROM pets WHERE owner_id = :ownerId").unwrap(),
        options,
        &f.catalog,
        &ResolverConfig::default(),
    )
    .unwrap();
    let request = ExecutionRequest::new()
        .bind("ownerId", 2)
        .order_by("id", false)
        .page(1);
    let result = f.executor().execute(&m, &request).await.unwrap();
    assert_eq!(ids(&result.rows), vec![21, 19, 17, 15]);
}

#[tokio::test]
async fn test_crud_and_constraint_violation() {
    let f = fixture().await;
    let m = f.module("SELECT * FROM pets");
    let exec = f.executor();
    let insert = ExecutionRequest::new()
        .bind("id", 31)
        .bind("name", "Rex")
        .bind("age", Value::Null)
        .bind("owner_id", 3);

    assert_eq!(exec.apply(&m, CrudOp::Insert, &insert).await.unwrap(), 1);
    let err = exec.apply(&m, CrudOp::Insert, &insert).await.unwrap_err();
    assert!(matches!(err, ExecutionError::ConstraintViolation { .. }), "{}", err);

    let delete = ExecutionRequest::new().bind("id", 31);
    assert_eq!(exec.apply(&m, CrudOp::Delete, &delete).await.unwrap(), 1);
    assert_eq!(exec.apply(&m, CrudOp::Delete, &delete).await.unwrap(), 0);
}

#[tokio::test]
async fn test_transaction_rollback_undoes_changes() {
    let f = fixture().await;
    let m = f.module("SELECT * FROM pets");
    let count = f.module("SELECT COUNT(*) AS n FROM pets");
    let exec = f.executor();

    let mut tx = exec.begin().await.unwrap();
    tx.apply(&m, CrudOp::Delete, &ExecutionRequest::new().bind("id", 1))
        .await
        .unwrap();
    let inside = tx.execute(&count, &ExecutionRequest::new()).await.unwrap();
    assert_eq!(inside.rows[0], vec![Value::Integer(29)]);
    tx.rollback().await.unwrap();

    let after = exec.execute(&count, &ExecutionRequest::new()).await.unwrap();
    assert_eq!(after.rows[0], vec![Value::Integer(30)]);
}

#[tokio::test]
async fn test_backend_error_is_not_retryable() {
    let f = fixture().await;
    let m = f.module("SELECT id FROM pets");
    sqlx::query("DROP TABLE pets")
        .execute(f.pool.inner())
        .await
        .unwrap();
    let err = f
        .executor()
        .execute(&m, &ExecutionRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Backend { .. }), "{}", err);
    assert!(!err.is_retryable());
}
