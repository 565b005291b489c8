//! Shared fixtures: a pets catalog and an in-memory connection pool that
//! records every statement and counts leases.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use polysql::catalog::CatalogSnapshot;
use polysql::error::ExecutionError;
use polysql::executor::{Connection, ConnectionPool, Row};
use polysql::module::{DataModule, ModuleOptions};
use polysql::parser::parse;
use polysql::resolver::ResolverConfig;
use polysql::transpiler::Dialect;
use polysql::types::{LogicalType, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn pets_catalog() -> CatalogSnapshot {
    CatalogSnapshot::new(None)
        .with_table(
            "pets",
            &[
                ("id", "INTEGER", false),
                ("name", "VARCHAR(100)", true),
                ("age", "INTEGER", true),
                ("owner_id", "INTEGER", false),
            ],
            &["id"],
        )
        .with_table(
            "owners",
            &[("id", "INTEGER", false), ("name", "TEXT", false)],
            &["id"],
        )
}

pub fn module(name: &str, sql: &str) -> DataModule {
    DataModule::assemble(
        name,
        parse(sql).unwrap(),
        ModuleOptions::default(),
        &pets_catalog(),
        &ResolverConfig::default(),
    )
    .unwrap()
}

/// How the next statement misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    ConnectionLost,
    Constraint,
    /// Never completes.
    Hang,
}

#[derive(Default)]
pub struct MockState {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub discarded: AtomicUsize,
    /// Every statement run, with its bound values.
    pub log: Mutex<Vec<(String, Vec<Value>)>>,
    pub rows: Mutex<Vec<Row>>,
    pub fault: Mutex<Fault>,
    pub affected: AtomicUsize,
}

impl MockState {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn values(&self, index: usize) -> Vec<Value> {
        self.log.lock().unwrap()[index].1.clone()
    }

    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn set_fault(&self, fault: Fault) {
        *self.fault.lock().unwrap() = fault;
    }

    fn record(&self, sql: &str, params: &[Value]) -> Fault {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        *self.fault.lock().unwrap()
    }
}

pub struct MockPool {
    pub dialect: Dialect,
    pub state: Arc<MockState>,
}

impl MockPool {
    pub fn new(dialect: Dialect) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            state: Arc::new(MockState::default()),
        })
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn acquire(&self) -> Result<Box<dyn Connection>, ExecutionError> {
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }

    fn release(&self, connection: Box<dyn Connection>, reusable: bool) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
        if !reusable {
            self.state.discarded.fetch_add(1, Ordering::SeqCst);
            connection.discard();
        }
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

fn failure(fault: Fault) -> Option<ExecutionError> {
    match fault {
        Fault::ConnectionLost => Some(ExecutionError::ConnectionLost {
            message: "server closed the connection".into(),
        }),
        Fault::Constraint => Some(ExecutionError::ConstraintViolation {
            message: "duplicate key".into(),
        }),
        Fault::None | Fault::Hang => None,
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn stream<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [Value],
        _types: &'a [Option<LogicalType>],
    ) -> BoxStream<'a, Result<Row, ExecutionError>> {
        let fault = self.state.record(sql, params);
        if fault == Fault::Hang {
            return futures::stream::pending().boxed();
        }
        let mut items: Vec<Result<Row, ExecutionError>> =
            self.state.rows.lock().unwrap().iter().cloned().map(Ok).collect();
        if let Some(err) = failure(fault) {
            items.truncate(1);
            items.push(Err(err));
        }
        futures::stream::iter(items).boxed()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, ExecutionError> {
        let fault = self.state.record(sql, params);
        if fault == Fault::Hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        match failure(fault) {
            Some(err) => Err(err),
            None => Ok(self.state.affected.load(Ordering::SeqCst) as u64),
        }
    }

    async fn begin(&mut self) -> Result<(), ExecutionError> {
        self.state.record("BEGIN", &[]);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ExecutionError> {
        self.state.record("COMMIT", &[]);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ExecutionError> {
        self.state.record("ROLLBACK", &[]);
        Ok(())
    }
}

/// Wait until `done` holds, giving spawned tasks a chance to run.
pub async fn eventually(done: impl Fn() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
