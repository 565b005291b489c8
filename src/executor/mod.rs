//! Query execution.
//!
//! An execution validates the bound values against the module's parameter
//! metadata, renders the statement for the pool's dialect with any paging
//! or ordering override, leases one connection, binds every placeholder and
//! converts the rows back into logical values. Nothing is retried here;
//! [`ExecutionError::is_retryable`] tells the caller when retrying is sound.
//!
//! ```ignore
//! let pool = Arc::new(SqlxPool::connect("postgres://localhost/pets", &PoolConfig::default()).await?);
//! let executor = Executor::new(pool);
//! let rows = executor
//!     .execute(&module, &ExecutionRequest::new().bind("ownerId", 7).window(10, 5))
//!     .await?;
//! ```

pub mod pool;
pub mod rows;
pub mod sqlx_pool;

use crate::ast::{
    Expr, Ident, Limit, Literal, OrderByExpr, Query, Select, SelectItem, SetExpr, Statement,
    TableFactor, TableWithJoins,
};
use crate::error::ExecutionError;
use crate::module::{CrudOp, DataModule};
use crate::parser::ParsedStatement;
use crate::resolver::{ColumnMetadata, ParameterMetadata};
use crate::transpiler::{Dialect, RenderOptions};
use crate::types::{LogicalType, Value};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub use pool::{Connection, ConnectionPool, Lease, PoolConfig};
pub use rows::{ResultSet, Row, RowStream};
pub use sqlx_pool::SqlxPool;

/// Rows buffered between a streaming statement and its consumer.
const STREAM_BUFFER: usize = 64;

/// Alias of the derived table an override wraps a self-limited query in.
const PAGED_ALIAS: &str = "page__";

/// Which rows of the result to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// Skip `offset` rows, return at most `limit`.
    Window { offset: u64, limit: u64 },
    /// Zero-based page of the module's configured page size.
    Page(u64),
}

/// Values and overrides for one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionRequest {
    /// Bound values keyed by parameter name, matched case-insensitively.
    pub bindings: BTreeMap<String, Value>,
    pub paging: Option<Paging>,
    /// Result columns to order by, each ascending or not.
    pub order_by: Vec<(String, bool)>,
    pub deadline: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.paging = Some(Paging::Window { offset, limit });
        self
    }

    pub fn page(mut self, index: u64) -> Self {
        self.paging = Some(Paging::Page(index));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by.push((column.into(), ascending));
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// Backend text and the value for each placeholder, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub sql: String,
    pub values: Vec<Value>,
    pub columns: Vec<ColumnMetadata>,
    pub returns_rows: bool,
}

impl Prepared {
    fn types(&self) -> Vec<Option<LogicalType>> {
        self.columns.iter().map(|c| Some(c.logical)).collect()
    }
}

/// What a preparation works from: a module's statement or one of its CRUD templates.
struct Target<'m> {
    module: &'m str,
    parsed: &'m ParsedStatement,
    parameters: &'m [ParameterMetadata],
    columns: &'m [ColumnMetadata],
    page_size: Option<u64>,
}

/// Validate and render a module's statement for `dialect`. No connection is involved.
pub fn prepare(
    module: &DataModule,
    request: &ExecutionRequest,
    dialect: Dialect,
) -> Result<Prepared, ExecutionError> {
    let resolved = module.resolved().ok_or_else(|| ExecutionError::Unresolved {
        module: module.name.clone(),
    })?;
    let target = Target {
        module: &module.name,
        parsed: &module.parsed,
        parameters: &resolved.resolution.parameters,
        columns: &resolved.resolution.columns,
        page_size: module.options.page_size,
    };
    prepare_target(&target, request, dialect)
}

/// Validate and render one of a module's CRUD templates.
pub fn prepare_crud(
    module: &DataModule,
    op: CrudOp,
    request: &ExecutionRequest,
    dialect: Dialect,
) -> Result<Prepared, ExecutionError> {
    if !module.is_resolved() {
        return Err(ExecutionError::Unresolved {
            module: module.name.clone(),
        });
    }
    let statement = module
        .crud()
        .and_then(|crud| crud.get(op))
        .ok_or_else(|| ExecutionError::NoTemplate {
            module: module.name.clone(),
            operation: op.to_string(),
        })?;
    let target = Target {
        module: &module.name,
        parsed: &statement.parsed,
        parameters: &statement.parameters,
        columns: &[],
        page_size: None,
    };
    prepare_target(&target, request, dialect)
}

fn prepare_target(
    target: &Target<'_>,
    request: &ExecutionRequest,
    dialect: Dialect,
) -> Result<Prepared, ExecutionError> {
    let bound = bound_values(target.parameters, request)?;

    let mut statement = target.parsed.statement.clone();
    apply_overrides(&mut statement, target, request)?;

    let rendered = dialect.render(&statement, &RenderOptions::positional())?;
    let values = rendered
        .parameters
        .iter()
        .map(|name| {
            bound
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
                .ok_or_else(|| ExecutionError::MissingParameter { name: name.clone() })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let returns_rows = match &statement {
        Statement::Query(_) => true,
        Statement::Insert(i) => !i.returning.is_empty(),
        Statement::Update(u) => !u.returning.is_empty(),
        Statement::Delete(d) => !d.returning.is_empty(),
    };
    tracing::debug!(
        module = target.module,
        %dialect,
        sql = %rendered.sql,
        placeholders = values.len(),
        "prepared statement"
    );
    Ok(Prepared {
        sql: rendered.sql,
        values,
        columns: target.columns.to_vec(),
        returns_rows,
    })
}

/// The value of every declared parameter, from the request or its default.
fn bound_values<'p>(
    parameters: &'p [ParameterMetadata],
    request: &ExecutionRequest,
) -> Result<Vec<(&'p str, Value)>, ExecutionError> {
    let mut bound = Vec::with_capacity(parameters.len());
    for param in parameters {
        let value = request
            .binding(&param.name)
            .or(param.default.as_ref())
            .ok_or_else(|| ExecutionError::MissingParameter {
                name: param.name.clone(),
            })?;
        if !value.fits(&param.logical) {
            return Err(ExecutionError::TypeMismatch {
                name: param.name.clone(),
                expected: param.logical,
                actual: value.type_name().to_string(),
            });
        }
        bound.push((param.name.as_str(), value.clone()));
    }
    Ok(bound)
}

fn apply_overrides(
    statement: &mut Statement,
    target: &Target<'_>,
    request: &ExecutionRequest,
) -> Result<(), ExecutionError> {
    if request.paging.is_none() && request.order_by.is_empty() {
        return Ok(());
    }
    let Statement::Query(query) = statement else {
        return Err(ExecutionError::NotAQuery);
    };

    // The statement's own window picks its rows first; overrides only act on those.
    let own_window = query.limit.as_ref().and_then(literal_window);
    if query.limit.is_some() && (own_window.is_none() || !request.order_by.is_empty()) {
        **query = paged_subquery((**query).clone());
    }

    if !request.order_by.is_empty() {
        let mut order_by = Vec::with_capacity(request.order_by.len());
        for (column, ascending) in &request.order_by {
            let meta = target
                .columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(column))
                .ok_or_else(|| ExecutionError::UnknownOrderColumn {
                    column: column.clone(),
                })?;
            let mut item = OrderByExpr::new(Expr::column(meta.name.clone()));
            item.asc = Some(*ascending);
            order_by.push(item);
        }
        query.order_by = order_by;
    }

    if let Some(paging) = request.paging {
        let (offset, limit) = match paging {
            Paging::Window { offset, limit } => (offset, limit),
            Paging::Page(index) => {
                let size = target.page_size.ok_or_else(|| ExecutionError::NotPaged {
                    module: target.module.to_string(),
                })?;
                (index.saturating_mul(size), size)
            }
        };
        let (offset, limit) = match query.limit.as_ref().and_then(literal_window) {
            Some((own_offset, own_count)) => narrow_window(own_offset, own_count, offset, limit),
            None => (offset, limit),
        };
        query.limit = Some(Limit {
            count: Some(Expr::integer(clamp(limit))),
            offset: (offset > 0).then(|| Expr::integer(clamp(offset))),
        });
    }
    Ok(())
}

/// `(offset, count)` of a window written with integer literals only.
fn literal_window(limit: &Limit) -> Option<(u64, Option<u64>)> {
    let literal = |expr: &Option<Expr>| match expr {
        None => Some(None),
        Some(Expr::Literal(Literal::Integer(n))) => u64::try_from(*n).ok().map(Some),
        Some(_) => None,
    };
    let offset = literal(&limit.offset)?.unwrap_or(0);
    let count = literal(&limit.count)?;
    Some((offset, count))
}

/// Apply the requested window inside the statement's own one.
fn narrow_window(
    own_offset: u64,
    own_count: Option<u64>,
    offset: u64,
    limit: u64,
) -> (u64, u64) {
    let count = match own_count {
        Some(own) => own.saturating_sub(offset).min(limit),
        None => limit,
    };
    (own_offset.saturating_add(offset), count)
}

/// `SELECT * FROM (<query>) page__`
fn paged_subquery(query: Query) -> Query {
    Query::new(SetExpr::Select(Box::new(Select {
        projection: vec![SelectItem::Wildcard],
        from: vec![TableWithJoins {
            relation: TableFactor::Derived {
                subquery: Box::new(query),
                alias: Some(Ident::new(PAGED_ALIAS)),
            },
            joins: Vec::new(),
        }],
        ..Default::default()
    })))
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Runs data modules against a connection pool.
#[derive(Clone)]
pub struct Executor {
    pool: Arc<dyn ConnectionPool>,
}

impl Executor {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    /// Run the module's statement and collect every row.
    pub async fn execute(
        &self,
        module: &DataModule,
        request: &ExecutionRequest,
    ) -> Result<ResultSet, ExecutionError> {
        let prepared = prepare(module, request, self.dialect())?;
        with_deadline(request.deadline, async {
            let mut lease = Lease::acquire(&self.pool).await?;
            run(&mut lease, &prepared).await
        })
        .await
    }

    /// Run the module's statement, producing rows lazily.
    ///
    /// The deadline covers acquiring the connection; the stream itself runs
    /// until the consumer stops reading.
    pub async fn stream(
        &self,
        module: &DataModule,
        request: &ExecutionRequest,
    ) -> Result<RowStream, ExecutionError> {
        let prepared = prepare(module, request, self.dialect())?;
        if !prepared.returns_rows {
            return Err(ExecutionError::NotAQuery);
        }
        let lease = with_deadline(request.deadline, Lease::acquire(&self.pool)).await?;
        let (sender, receiver) = mpsc::channel(STREAM_BUFFER);
        let columns = prepared.columns.clone();
        tokio::spawn(pump(lease, prepared, sender));
        Ok(RowStream::new(columns, receiver))
    }

    /// Run one of the module's CRUD templates; returns the affected row count.
    pub async fn apply(
        &self,
        module: &DataModule,
        op: CrudOp,
        request: &ExecutionRequest,
    ) -> Result<u64, ExecutionError> {
        let prepared = prepare_crud(module, op, request, self.dialect())?;
        with_deadline(request.deadline, async {
            let mut lease = Lease::acquire(&self.pool).await?;
            Ok(run(&mut lease, &prepared).await?.rows_affected)
        })
        .await
    }

    /// Start a transaction on a dedicated connection.
    pub async fn begin(&self) -> Result<Transaction, ExecutionError> {
        let mut lease = Lease::acquire(&self.pool).await?;
        let started = lease.connection()?.begin().await;
        if let Err(err) = started {
            lease.observe(&err);
            return Err(err);
        }
        tracing::debug!("transaction started");
        Ok(Transaction {
            lease,
            dialect: self.dialect(),
            finished: false,
        })
    }
}

/// Statements run one after another on one connection until commit or rollback.
///
/// Dropping an unfinished transaction closes its connection, which makes
/// the backend roll it back.
pub struct Transaction {
    lease: Lease,
    dialect: Dialect,
    finished: bool,
}

impl Transaction {
    pub async fn execute(
        &mut self,
        module: &DataModule,
        request: &ExecutionRequest,
    ) -> Result<ResultSet, ExecutionError> {
        let prepared = prepare(module, request, self.dialect)?;
        with_deadline(request.deadline, run(&mut self.lease, &prepared)).await
    }

    pub async fn apply(
        &mut self,
        module: &DataModule,
        op: CrudOp,
        request: &ExecutionRequest,
    ) -> Result<u64, ExecutionError> {
        let prepared = prepare_crud(module, op, request, self.dialect)?;
        let result = with_deadline(request.deadline, run(&mut self.lease, &prepared)).await?;
        Ok(result.rows_affected)
    }

    pub async fn commit(mut self) -> Result<(), ExecutionError> {
        self.finish(true).await
    }

    pub async fn rollback(mut self) -> Result<(), ExecutionError> {
        self.finish(false).await
    }

    async fn finish(&mut self, commit: bool) -> Result<(), ExecutionError> {
        let connection = self.lease.connection()?;
        let result = if commit {
            connection.commit().await
        } else {
            connection.rollback().await
        };
        match &result {
            Ok(()) => self.finished = true,
            Err(err) => self.lease.observe(err),
        }
        tracing::debug!(commit, ok = result.is_ok(), "transaction finished");
        result
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("transaction dropped without commit or rollback");
            self.lease.discard();
        }
    }
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T, ExecutionError>>,
) -> Result<T, ExecutionError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ExecutionError::Timeout {
                message: format!("deadline of {:?} exceeded", limit),
            })?,
        None => fut.await,
    }
}

async fn run(lease: &mut Lease, prepared: &Prepared) -> Result<ResultSet, ExecutionError> {
    let result = run_on(lease.connection()?, prepared).await;
    if let Err(err) = &result {
        lease.observe(err);
    }
    result
}

async fn run_on(
    connection: &mut dyn Connection,
    prepared: &Prepared,
) -> Result<ResultSet, ExecutionError> {
    if !prepared.returns_rows {
        let rows_affected = connection.execute(&prepared.sql, &prepared.values).await?;
        return Ok(ResultSet {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected,
        });
    }
    let types = prepared.types();
    let width = prepared.columns.len();
    let mut stream = connection.stream(&prepared.sql, &prepared.values, &types);
    let mut rows = Vec::new();
    while let Some(row) = stream.next().await {
        rows.push(trimmed(row?, width));
    }
    Ok(ResultSet {
        columns: prepared.columns.clone(),
        rows,
        rows_affected: 0,
    })
}

/// Feed a streaming statement's rows to its consumer, then release the lease.
async fn pump(
    mut lease: Lease,
    prepared: Prepared,
    sender: mpsc::Sender<Result<Row, ExecutionError>>,
) {
    let types = prepared.types();
    let width = prepared.columns.len();
    let mut lost = false;
    match lease.connection() {
        Ok(connection) => {
            let mut stream = connection.stream(&prepared.sql, &prepared.values, &types);
            while let Some(row) = stream.next().await {
                let row = row.map(|r| trimmed(r, width));
                let stop = row.is_err();
                lost = matches!(row, Err(ExecutionError::ConnectionLost { .. }));
                if sender.send(row).await.is_err() {
                    tracing::debug!("row stream dropped by consumer");
                    break;
                }
                if stop {
                    break;
                }
            }
        }
        Err(err) => {
            let _ = sender.send(Err(err)).await;
        }
    }
    if lost {
        lease.discard();
    }
}

/// Drop helper columns a paging rewrite adds (Oracle's row number).
fn trimmed(mut row: Row, width: usize) -> Row {
    if width > 0 && row.len() > width {
        row.truncate(width);
    }
    row
}
