//! Recursive-descent grammar with a Pratt expression parser.
//!
//! The grammar is split the same way the statement is: `query` handles
//! SELECT bodies and set operations, `clauses` the FROM/ORDER BY/paging
//! clauses, `dml` the INSERT/UPDATE/DELETE statements and `expressions`
//! the operator precedence climbing.

pub mod base;
pub mod clauses;
pub mod dml;
pub mod expressions;
pub mod query;

use crate::ast::Statement;
use crate::error::ParseError;
use crate::parser::ParserConfig;
use crate::parser::lexer::{QuoteStyle, tokenize};
use crate::parser::tokens::{Keyword, Token, TokenKind};
use crate::transpiler::Dialect;

/// Token-level parser for one statement.
pub struct Parser<'c> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    dialect: Option<Dialect>,
    config: &'c ParserConfig,
}

impl<'c> Parser<'c> {
    /// Tokenize `sql` with the quoting rules of `dialect` (all styles when `None`).
    pub fn new(
        sql: &str,
        dialect: Option<Dialect>,
        config: &'c ParserConfig,
    ) -> Result<Self, ParseError> {
        let tokens = tokenize(sql, QuoteStyle::for_dialect(dialect))?;
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
            dialect,
            config,
        })
    }

    /// Parse exactly one statement, optionally terminated by `;`.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let statement = match self.peek().kind {
            TokenKind::Keyword(Keyword::INSERT) => Statement::Insert(self.parse_insert()?),
            TokenKind::Keyword(Keyword::UPDATE) => Statement::Update(self.parse_update()?),
            TokenKind::Keyword(Keyword::DELETE) => Statement::Delete(self.parse_delete()?),
            TokenKind::Keyword(Keyword::SELECT) | TokenKind::LParen => {
                Statement::Query(Box::new(self.parse_query()?))
            }
            _ => {
                return Err(ParseError::Syntax {
                    position: self.peek().position,
                    expected: vec![
                        "SELECT".into(),
                        "INSERT".into(),
                        "UPDATE".into(),
                        "DELETE".into(),
                    ],
                    found: self.peek().describe(),
                });
            }
        };
        self.eat(&TokenKind::Semicolon);
        if self.peek().kind != TokenKind::Eof {
            return Err(self.expected("end of statement"));
        }
        Ok(statement)
    }
}
