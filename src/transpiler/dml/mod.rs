//! Statement builders.
//!
//! A [`Renderer`] walks the tree left to right, so placeholders are
//! numbered and recorded in the order they appear in the output text.

pub mod delete;
pub mod expr;
pub mod insert;
pub mod select;
pub mod update;

use crate::ast::{Ident, SelectItem, Statement, TableName};
use crate::error::DialectError;
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{Construct, RenderMode, RenderedSql};

pub struct Renderer<'g> {
    generator: &'g dyn SqlGenerator,
    mode: RenderMode,
    parameters: Vec<String>,
}

impl<'g> Renderer<'g> {
    pub fn new(generator: &'g dyn SqlGenerator, mode: RenderMode) -> Self {
        Self {
            generator,
            mode,
            parameters: Vec::new(),
        }
    }

    pub fn finish(self, sql: String) -> RenderedSql {
        RenderedSql {
            sql,
            parameters: self.parameters,
        }
    }

    pub fn statement(&mut self, statement: &Statement) -> Result<String, DialectError> {
        match statement {
            Statement::Query(q) => self.query(q),
            Statement::Insert(i) => self.insert(i),
            Statement::Update(u) => self.update(u),
            Statement::Delete(d) => self.delete(d),
        }
    }

    fn require(&self, construct: Construct) -> Result<(), DialectError> {
        if self.generator.supports(construct) {
            Ok(())
        } else {
            Err(DialectError::Unsupported {
                construct,
                dialect: self.generator.dialect().unwrap_or_default(),
            })
        }
    }

    fn ident(&self, name: &Ident) -> String {
        self.generator.quote_identifier(name)
    }

    fn table_name(&self, name: &TableName) -> String {
        match &name.schema {
            Some(schema) => format!("{}.{}", self.ident(schema), self.ident(&name.name)),
            None => self.ident(&name.name),
        }
    }

    fn parameter(&mut self, name: &str) -> String {
        self.parameters.push(name.to_string());
        match self.mode {
            RenderMode::Named => format!(":{}", name),
            RenderMode::Positional => self.generator.placeholder(self.parameters.len()),
        }
    }

    fn select_items(&mut self, items: &[SelectItem]) -> Result<String, DialectError> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.push(match item {
                SelectItem::Wildcard => "*".to_string(),
                SelectItem::QualifiedWildcard(q) => format!("{}.*", self.ident(q)),
                SelectItem::Expr { expr, alias } => {
                    let sql = self.expr(expr)?;
                    match alias {
                        Some(a) => format!("{} AS {}", sql, self.ident(a)),
                        None => sql,
                    }
                }
            });
        }
        Ok(parts.join(", "))
    }

    /// `RETURNING ...` suffix, empty when there is nothing to return.
    fn returning(&mut self, items: &[SelectItem]) -> Result<String, DialectError> {
        if items.is_empty() {
            return Ok(String::new());
        }
        self.require(Construct::Returning)?;
        Ok(format!(" RETURNING {}", self.select_items(items)?))
    }
}
