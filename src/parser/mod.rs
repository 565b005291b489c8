//! SQL statement parser.
//!
//! ```
//! use polysql::parser::parse;
//!
//! let stmt = parse("SELECT name FROM pets WHERE owner_id = :ownerId").unwrap();
//! assert_eq!(stmt.parameters, vec!["ownerId"]);
//! ```

pub mod grammar;
pub mod lexer;
pub mod params;
pub mod tokens;


use crate::ast::Statement;
use crate::error::ParseError;
use crate::transpiler::{Dialect, ToSql};
use grammar::Parser;
pub use params::ParamOccurrence;
use serde::{Deserialize, Serialize};

fn default_max_depth() -> usize {
    32
}

/// Parser settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Maximum nesting of parentheses, subqueries, unary operators and CASE.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// A parsed statement with its parameters in first-occurrence order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedStatement {
    pub source: String,
    pub statement: Statement,
    /// Distinct parameter names, first spelling wins.
    pub parameters: Vec<String>,
    /// Every parameter reference in textual order.
    pub occurrences: Vec<ParamOccurrence>,
}

impl ParsedStatement {
    pub fn new(source: impl Into<String>, statement: Statement) -> Self {
        let extracted = params::extract(&statement);
        Self {
            source: source.into(),
            statement,
            parameters: extracted.names,
            occurrences: extracted.occurrences,
        }
    }

    /// Wrap a tree built in code; the source text is its neutral rendering.
    pub fn synthesized(statement: Statement) -> Self {
        let source = statement.to_sql();
        Self::new(source, statement)
    }

    /// Occurrences of a parameter, matched case-insensitively.
    pub fn occurrences_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ParamOccurrence> {
        self.occurrences
            .iter()
            .filter(move |o| o.name.eq_ignore_ascii_case(name))
    }
}

/// Parse with the dialect-neutral grammar, which accepts every quoting and paging form.
pub fn parse(sql: &str) -> Result<ParsedStatement, ParseError> {
    parse_with(sql, None, &ParserConfig::default())
}

/// Parse using one backend's grammar.
pub fn parse_for(sql: &str, dialect: Dialect) -> Result<ParsedStatement, ParseError> {
    parse_with(sql, Some(dialect), &ParserConfig::default())
}

pub fn parse_with(
    sql: &str,
    dialect: Option<Dialect>,
    config: &ParserConfig,
) -> Result<ParsedStatement, ParseError> {
    let statement = Parser::new(sql, dialect, config)?.parse_statement()?;
    Ok(ParsedStatement::new(sql, statement))
}
