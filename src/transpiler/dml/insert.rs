//! INSERT SQL generation.

use super::Renderer;
use crate::ast::*;
use crate::error::DialectError;

impl Renderer<'_> {
    pub fn insert(&mut self, insert: &Insert) -> Result<String, DialectError> {
        let mut sql = format!("INSERT INTO {}", self.table_name(&insert.table));
        if !insert.columns.is_empty() {
            let cols: Vec<String> = insert.columns.iter().map(|c| self.ident(c)).collect();
            sql.push_str(&format!(" ({})", cols.join(", ")));
        }
        match &insert.source {
            InsertSource::Values(rows) => {
                let mut tuples = Vec::with_capacity(rows.len());
                for row in rows {
                    tuples.push(format!("({})", self.expr_list(row)?));
                }
                sql.push_str(&format!(" VALUES {}", tuples.join(", ")));
            }
            InsertSource::Query(query) => {
                sql.push(' ');
                sql.push_str(&self.query(query)?);
            }
        }
        sql.push_str(&self.returning(&insert.returning)?);
        Ok(sql)
    }
}
