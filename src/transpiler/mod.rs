//! Dialect adapters: render the neutral AST for one backend.
//!
//! Each backend has a [`SqlGenerator`] supplying its quoting, placeholders,
//! paging strategy, type names and construct-support table. The `dml`
//! builders walk the tree once and ask the generator at every point where
//! backends differ.

pub mod dialect;
pub mod dml;
pub mod sql;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests;

use crate::ast::{Expr, Query, Statement};
use crate::error::DialectError;
use crate::types::LogicalType;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use dialect::Dialect;
pub use traits::{ConcatStyle, PagingStyle, SqlGenerator, delimit_identifier, escape_identifier};

/// How parameters appear in rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// `:name`, re-parseable by every grammar.
    #[default]
    Named,
    /// The backend's bind markers (`$1`, `?`, `@p1`, `:1`).
    Positional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub mode: RenderMode,
}

impl RenderOptions {
    pub fn positional() -> Self {
        Self {
            mode: RenderMode::Positional,
        }
    }
}

/// Backend SQL text plus the parameter behind every placeholder, in textual order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSql {
    pub sql: String,
    pub parameters: Vec<String>,
}

/// Constructs whose availability differs between backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Construct {
    BooleanLiteral,
    Returning,
    Geometry,
    Merge,
    FullOuterJoin,
    Intersect,
    Except,
    NullsOrdering,
    /// OFFSET without ORDER BY.
    PagingWithoutOrder,
    /// A row limit on a UNION/INTERSECT/EXCEPT body.
    LimitOnSetOperation,
    CastTo(LogicalType),
    /// `#name` reference to another data module; linking replaces it.
    ModuleReference,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BooleanLiteral => write!(f, "boolean literal"),
            Self::Returning => write!(f, "RETURNING clause"),
            Self::Geometry => write!(f, "geometry type"),
            Self::Merge => write!(f, "MERGE statement"),
            Self::FullOuterJoin => write!(f, "FULL OUTER JOIN"),
            Self::Intersect => write!(f, "INTERSECT"),
            Self::Except => write!(f, "EXCEPT"),
            Self::NullsOrdering => write!(f, "NULLS FIRST/LAST"),
            Self::PagingWithoutOrder => write!(f, "OFFSET without ORDER BY"),
            Self::LimitOnSetOperation => write!(f, "row limit on a set operation"),
            Self::CastTo(ty) => write!(f, "CAST to {}", ty),
            Self::ModuleReference => write!(f, "data module reference"),
        }
    }
}

/// Conversion of AST nodes to SQL text.
pub trait ToSql {
    /// Dialect-neutral text with `:name` parameters. Never fails.
    fn to_sql(&self) -> String;

    /// Render for one backend.
    fn to_sql_with_dialect(
        &self,
        dialect: Dialect,
        mode: RenderMode,
    ) -> Result<RenderedSql, DialectError>;
}

impl ToSql for Statement {
    fn to_sql(&self) -> String {
        neutral(|r| r.statement(self))
    }

    fn to_sql_with_dialect(
        &self,
        dialect: Dialect,
        mode: RenderMode,
    ) -> Result<RenderedSql, DialectError> {
        dialect.render(self, &RenderOptions { mode })
    }
}

impl ToSql for Query {
    fn to_sql(&self) -> String {
        neutral(|r| r.query(self))
    }

    fn to_sql_with_dialect(
        &self,
        dialect: Dialect,
        mode: RenderMode,
    ) -> Result<RenderedSql, DialectError> {
        let generator = dialect.generator();
        let mut renderer = dml::Renderer::new(generator.as_ref(), mode);
        let sql = renderer.query(self)?;
        Ok(renderer.finish(sql))
    }
}

impl ToSql for Expr {
    fn to_sql(&self) -> String {
        neutral(|r| r.expr(self))
    }

    fn to_sql_with_dialect(
        &self,
        dialect: Dialect,
        mode: RenderMode,
    ) -> Result<RenderedSql, DialectError> {
        let generator = dialect.generator();
        let mut renderer = dml::Renderer::new(generator.as_ref(), mode);
        let sql = renderer.expr(self)?;
        Ok(renderer.finish(sql))
    }
}

fn neutral(
    f: impl FnOnce(&mut dml::Renderer<'_>) -> Result<String, DialectError>,
) -> String {
    let generator = sql::ansi::AnsiGenerator;
    let mut renderer = dml::Renderer::new(&generator, RenderMode::Named);
    match f(&mut renderer) {
        Ok(sql) => sql,
        // the neutral generator supports every construct
        Err(err) => format!("/* {} */", err),
    }
}
