//! # polysql
//!
//! One SQL statement per data module, rendered and executed across H2,
//! PostgreSQL, MySQL, SQL Server, Oracle and DB2.
//!
//! ## Quick Example
//!
//! ```rust
//! use polysql::prelude::*;
//!
//! let catalog = CatalogSnapshot::new(None).with_table(
//!     "pets",
//!     &[("id", "INTEGER", false), ("name", "TEXT", true), ("owner_id", "INTEGER", false)],
//!     &["id"],
//! );
//! let parsed = polysql::parse("SELECT name FROM pets WHERE owner_id = :ownerId ORDER BY name").unwrap();
//! let module = DataModule::assemble(
//!     "pets/by_owner",
//!     parsed,
//!     ModuleOptions::default(),
//!     &catalog,
//!     &ResolverConfig::default(),
//! )
//! .unwrap();
//!
//! let request = ExecutionRequest::new().bind("ownerId", 7).window(10, 5);
//! let prepared = polysql::executor::prepare(&module, &request, Dialect::SqlServer).unwrap();
//! assert_eq!(
//!     prepared.sql,
//!     "SELECT name FROM pets WHERE owner_id = @p1 ORDER BY name OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
//! );
//! ```
//!
//! ## Pipeline
//!
//! | Stage      | Module         | Output                          |
//! |------------|----------------|---------------------------------|
//! | Lex, parse | [`parser`]     | [`parser::ParsedStatement`]     |
//! | Resolve    | [`resolver`]   | column and parameter metadata   |
//! | Assemble   | [`module`]     | [`module::DataModule`]          |
//! | Render     | [`transpiler`] | backend SQL                     |
//! | Execute    | [`executor`]   | [`executor::ResultSet`]         |
//! | Generate   | [`codegen`]    | typed stub artifacts            |

pub mod ast;
pub mod catalog;
pub mod codegen;
pub mod config;
pub mod error;
pub mod executor;
pub mod module;
pub mod parser;
pub mod resolver;
pub mod transpiler;
pub mod types;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::catalog::{Catalog, CatalogSnapshot};
    pub use crate::codegen::{GeneratedArtifact, generate};
    pub use crate::config::Config;
    pub use crate::error::*;
    pub use crate::executor::{ExecutionRequest, Executor, ResultSet, SqlxPool};
    pub use crate::module::{DataModule, ModuleOptions};
    pub use crate::parser::{ParsedStatement, ParserConfig, parse};
    pub use crate::resolver::ResolverConfig;
    pub use crate::transpiler::{Dialect, ToSql};
    pub use crate::types::{LogicalType, Value};
}

/// Parse one statement with the dialect-neutral grammar.
///
/// # Example
///
/// ```
/// use polysql::parse;
///
/// let parsed = parse("SELECT name FROM pets WHERE id = :id OR owner_id = :id").unwrap();
/// assert_eq!(parsed.parameters, vec!["id"]);
/// ```
pub fn parse(sql: &str) -> Result<parser::ParsedStatement, error::ParseError> {
    parser::parse(sql)
}
