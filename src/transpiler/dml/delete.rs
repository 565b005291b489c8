//! DELETE SQL generation.

use super::Renderer;
use crate::ast::*;
use crate::error::DialectError;

impl Renderer<'_> {
    pub fn delete(&mut self, delete: &Delete) -> Result<String, DialectError> {
        let mut sql = format!("DELETE FROM {}", self.table_name(&delete.table));
        if let Some(alias) = &delete.alias {
            sql.push(' ');
            sql.push_str(&self.ident(alias));
        }
        if let Some(selection) = &delete.selection {
            sql.push_str(&format!(" WHERE {}", self.expr(selection)?));
        }
        sql.push_str(&self.returning(&delete.returning)?);
        Ok(sql)
    }
}
