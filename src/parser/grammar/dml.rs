//! INSERT, UPDATE and DELETE statements.

use super::Parser;
use crate::ast::*;
use crate::error::ParseError;
use crate::parser::tokens::{Keyword, TokenKind};

impl Parser<'_> {
    /// `INSERT INTO t [(c, ...)] VALUES (...), ... | query [RETURNING ...]`
    pub(crate) fn parse_insert(&mut self) -> Result<Insert, ParseError> {
        self.expect_keyword(Keyword::INSERT)?;
        self.expect_keyword(Keyword::INTO)?;
        let table = self.parse_table_name()?;

        let mut columns = Vec::new();
        // A parenthesized SELECT is a source, not a column list.
        if self.peek().kind == TokenKind::LParen
            && !self.peek_nth(1).is_keyword(Keyword::SELECT)
        {
            self.advance();
            columns.push(self.parse_identifier("column name")?);
            while self.eat(&TokenKind::Comma) {
                columns.push(self.parse_identifier("column name")?);
            }
            self.expect(TokenKind::RParen, "')'")?;
        }

        let source = if self.eat_keyword(Keyword::VALUES) {
            let mut rows = vec![self.parse_values_row()?];
            while self.eat(&TokenKind::Comma) {
                rows.push(self.parse_values_row()?);
            }
            InsertSource::Values(rows)
        } else if self.check_keyword(Keyword::SELECT) || self.peek().kind == TokenKind::LParen {
            InsertSource::Query(Box::new(self.parse_query()?))
        } else {
            return Err(ParseError::Syntax {
                position: self.peek().position,
                expected: vec!["VALUES".into(), "SELECT".into()],
                found: self.peek().describe(),
            });
        };

        let returning = self.parse_returning()?;
        Ok(Insert {
            table,
            columns,
            source,
            returning,
        })
    }

    fn parse_values_row(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let row = self.parse_expr_list()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(row)
    }

    /// `UPDATE t [alias] SET c = e, ... [WHERE ...] [RETURNING ...]`
    pub(crate) fn parse_update(&mut self) -> Result<Update, ParseError> {
        self.expect_keyword(Keyword::UPDATE)?;
        let table = self.parse_table_name()?;
        let alias = self.parse_optional_alias()?;
        self.expect_keyword(Keyword::SET)?;

        let mut assignments = vec![self.parse_assignment()?];
        while self.eat(&TokenKind::Comma) {
            assignments.push(self.parse_assignment()?);
        }

        let selection = self.parse_optional_where()?;
        let returning = self.parse_returning()?;
        Ok(Update {
            table,
            alias,
            assignments,
            selection,
            returning,
        })
    }

    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let mut column = self.parse_identifier("column name")?;
        // `SET alias.col = ...` names the target table's column.
        if self.eat(&TokenKind::Dot) {
            column = self.parse_identifier("column name")?;
        }
        self.expect(TokenKind::Eq, "'='")?;
        let value = self.parse_expr()?;
        Ok(Assignment { column, value })
    }

    /// `DELETE FROM t [alias] [WHERE ...] [RETURNING ...]`
    pub(crate) fn parse_delete(&mut self) -> Result<Delete, ParseError> {
        self.expect_keyword(Keyword::DELETE)?;
        self.expect_keyword(Keyword::FROM)?;
        let table = self.parse_table_name()?;
        let alias = self.parse_optional_alias()?;
        let selection = self.parse_optional_where()?;
        let returning = self.parse_returning()?;
        Ok(Delete {
            table,
            alias,
            selection,
            returning,
        })
    }

    fn parse_optional_where(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.eat_keyword(Keyword::WHERE) {
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_returning(&mut self) -> Result<Vec<SelectItem>, ParseError> {
        if !self.eat_keyword(Keyword::RETURNING) {
            return Ok(Vec::new());
        }
        let mut items = vec![self.parse_returning_item()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_returning_item()?);
        }
        Ok(items)
    }

    fn parse_returning_item(&mut self) -> Result<SelectItem, ParseError> {
        if self.eat(&TokenKind::Star) {
            return Ok(SelectItem::Wildcard);
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }
}
