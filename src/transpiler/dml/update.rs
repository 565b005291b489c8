//! UPDATE SQL generation.

use super::Renderer;
use crate::ast::*;
use crate::error::DialectError;

impl Renderer<'_> {
    pub fn update(&mut self, update: &Update) -> Result<String, DialectError> {
        let mut sql = format!("UPDATE {}", self.table_name(&update.table));
        if let Some(alias) = &update.alias {
            sql.push(' ');
            sql.push_str(&self.ident(alias));
        }

        let mut set_clauses = Vec::with_capacity(update.assignments.len());
        for assignment in &update.assignments {
            let value = self.expr(&assignment.value)?;
            set_clauses.push(format!("{} = {}", self.ident(&assignment.column), value));
        }
        sql.push_str(" SET ");
        sql.push_str(&set_clauses.join(", "));

        if let Some(selection) = &update.selection {
            sql.push_str(&format!(" WHERE {}", self.expr(selection)?));
        }
        sql.push_str(&self.returning(&update.returning)?);
        Ok(sql)
    }
}
