//! Result rows and their conversion into logical values.

use crate::error::ExecutionError;
use crate::resolver::ColumnMetadata;
use crate::types::{LogicalType, Value, parse_timestamp};
use chrono::NaiveDate;
use futures::Stream;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One row, aligned with the result columns.
pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Row>,
    /// Affected rows for statements that return none.
    pub rows_affected: u64,
}

impl ResultSet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn get<'r>(&self, row: &'r Row, column: &str) -> Option<&'r Value> {
        self.column_index(column).and_then(|i| row.get(i))
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.name.clone(), serde_json::to_value(v).unwrap_or_default()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

/// Convert a driver value towards the column's logical type.
///
/// Drivers report fewer types than the logical system has: booleans may come
/// back as integers, decimals as floats or text, temporal values as text.
/// Values that cannot be converted are returned unchanged.
pub fn coerce(value: Value, expected: Option<LogicalType>) -> Value {
    let Some(expected) = expected else {
        return value;
    };
    match (value, expected) {
        (Value::Integer(n), LogicalType::Boolean) => Value::Boolean(n != 0),
        (Value::Integer(n), LogicalType::Decimal(_)) => Value::Decimal(Decimal::from(n)),
        (Value::Decimal(d), LogicalType::Integer) if d.fract().is_zero() => {
            i64::try_from(d).map(Value::Integer).unwrap_or(Value::Decimal(d))
        }
        (Value::Text(s), LogicalType::Integer) => {
            s.trim().parse().map(Value::Integer).unwrap_or(Value::Text(s))
        }
        (Value::Text(s), LogicalType::Decimal(_)) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .map(Value::Decimal)
            .unwrap_or(Value::Text(s)),
        (Value::Text(s), LogicalType::Date) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .or_else(|_| parse_timestamp(s.trim()).map(|t| Value::Date(t.date())).ok_or(()))
            .unwrap_or(Value::Text(s)),
        (Value::Text(s), LogicalType::Timestamp) => parse_timestamp(s.trim())
            .map(Value::Timestamp)
            .unwrap_or(Value::Text(s)),
        (Value::Text(s), LogicalType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Value::Boolean(true),
            "false" | "f" | "0" => Value::Boolean(false),
            _ => Value::Text(s),
        },
        (Value::Text(s), LogicalType::Geometry) => Value::Geometry(s),
        (Value::Text(s), LogicalType::Binary) => Value::Binary(s.into_bytes()),
        (value, _) => value,
    }
}

/// Float from a driver, as a decimal.
pub fn decimal_from_f64(f: f64) -> Value {
    Decimal::from_f64(f)
        .map(|d| Value::Decimal(d.normalize()))
        .unwrap_or(Value::Null)
}

/// Rows produced lazily by a statement running on its own lease.
///
/// The stream ends after the last row or the first error. Dropping it early
/// cancels the statement and releases the connection.
pub struct RowStream {
    columns: Vec<ColumnMetadata>,
    receiver: mpsc::Receiver<Result<Row, ExecutionError>>,
}

impl RowStream {
    pub(crate) fn new(
        columns: Vec<ColumnMetadata>,
        receiver: mpsc::Receiver<Result<Row, ExecutionError>>,
    ) -> Self {
        Self { columns, receiver }
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Drain the stream into a result set.
    pub async fn collect(mut self) -> Result<ResultSet, ExecutionError> {
        let mut rows = Vec::new();
        while let Some(row) = self.receiver.recv().await {
            rows.push(row?);
        }
        Ok(ResultSet {
            columns: self.columns,
            rows,
            rows_affected: 0,
        })
    }
}

impl Stream for RowStream {
    type Item = Result<Row, ExecutionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
