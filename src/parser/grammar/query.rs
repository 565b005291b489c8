//! SELECT bodies, set operations and the query tail.

use super::Parser;
use crate::ast::*;
use crate::error::ParseError;
use crate::parser::tokens::{Keyword, TokenKind};
use crate::transpiler::Dialect;

impl Parser<'_> {
    /// Parse a full query: set expression, ORDER BY and paging.
    pub(crate) fn parse_query(&mut self) -> Result<Query, ParseError> {
        let (body, top) = self.parse_set_expr(0)?;

        let order_by = if self.eat_keyword(Keyword::ORDER) {
            self.expect_keyword(Keyword::BY)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let paging_at = self.peek().position;
        let limit = match (top, self.parse_paging()?) {
            (Some(count), None) => Some(Limit {
                count: Some(count),
                offset: None,
            }),
            (Some(_), Some(_)) => {
                return Err(ParseError::expected(
                    paging_at,
                    "end of query (TOP already limits the rows)",
                    "paging clause",
                ));
            }
            (None, limit) => limit,
        };

        let query = Query {
            body,
            order_by,
            limit,
        };
        Ok(match self.dialect {
            Some(Dialect::Oracle) => super::clauses::unwrap_rownum(query),
            _ => query,
        })
    }

    /// Precedence climbing over UNION/EXCEPT (1) and INTERSECT (2).
    ///
    /// A `TOP` on the leftmost operand is handed back to the caller when no
    /// set operator follows, so it can become the query's paging window.
    fn parse_set_expr(&mut self, min_prec: u8) -> Result<(SetExpr, Option<Expr>), ParseError> {
        let (mut left, mut top) = self.parse_set_operand()?;
        while let Some(op) = self.peek_set_operator() {
            if op.precedence() < min_prec {
                break;
            }
            self.advance();
            let all = self.eat_keyword(Keyword::ALL);
            if !all {
                self.eat_keyword(Keyword::DISTINCT);
            }
            let (right, right_top) = self.parse_set_expr(op.precedence() + 1)?;
            left = SetExpr::SetOperation {
                op,
                all,
                left: Box::new(with_top(left, top.take())),
                right: Box::new(with_top(right, right_top)),
            };
        }
        Ok((left, top))
    }

    fn peek_set_operator(&self) -> Option<SetOperator> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::UNION) => Some(SetOperator::Union),
            TokenKind::Keyword(Keyword::INTERSECT) => Some(SetOperator::Intersect),
            TokenKind::Keyword(Keyword::EXCEPT) | TokenKind::Keyword(Keyword::MINUS) => {
                Some(SetOperator::Except)
            }
            _ => None,
        }
    }

    fn parse_set_operand(&mut self) -> Result<(SetExpr, Option<Expr>), ParseError> {
        if self.peek().kind == TokenKind::LParen {
            self.advance();
            let query = self.nested(|p| p.parse_query())?;
            self.expect(TokenKind::RParen, "')'")?;
            if query.order_by.is_empty() && query.limit.is_none() {
                return Ok((query.body, None));
            }
            return Ok((SetExpr::Query(Box::new(query)), None));
        }
        let (select, top) = self.parse_select()?;
        Ok((SetExpr::Select(Box::new(select)), top))
    }

    fn parse_select(&mut self) -> Result<(Select, Option<Expr>), ParseError> {
        self.expect_keyword(Keyword::SELECT)?;
        let distinct = if self.eat_keyword(Keyword::DISTINCT) {
            true
        } else {
            self.eat_keyword(Keyword::ALL);
            false
        };

        let top = if self.at_top() {
            self.advance();
            Some(self.parse_top()?)
        } else {
            None
        };

        let mut projection = vec![self.parse_select_item()?];
        while self.eat(&TokenKind::Comma) {
            projection.push(self.parse_select_item()?);
        }

        let mut from = if self.eat_keyword(Keyword::FROM) {
            self.parse_from()?
        } else {
            Vec::new()
        };
        if self.is_dummy_table(&from) {
            from.clear();
        }

        let selection = if self.eat_keyword(Keyword::WHERE) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let group_by = if self.eat_keyword(Keyword::GROUP) {
            self.expect_keyword(Keyword::BY)?;
            self.parse_expr_list()?
        } else {
            Vec::new()
        };

        let having = if self.eat_keyword(Keyword::HAVING) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok((
            Select {
                distinct,
                projection,
                from,
                selection,
                group_by,
                having,
            },
            top,
        ))
    }

    /// `TOP n` or `TOP (expr)`.
    /// `TOP n` is SQL Server syntax; elsewhere `top` is an ordinary name.
    fn at_top(&self) -> bool {
        if !matches!(self.dialect, None | Some(Dialect::SqlServer))
            || !self.check_keyword(Keyword::TOP)
        {
            return false;
        }
        matches!(
            self.peek_nth(1).kind,
            TokenKind::Number | TokenKind::NamedParameter | TokenKind::LParen
        )
    }

    fn parse_top(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::LParen) {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(expr);
        }
        match self.peek().kind {
            TokenKind::Number | TokenKind::NamedParameter => self.parse_primary(),
            _ => Err(self.expected("row count after TOP")),
        }
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, ParseError> {
        if self.eat(&TokenKind::Star) {
            return Ok(SelectItem::Wildcard);
        }
        if self.peek().is_identifier_like()
            && self.peek_nth(1).kind == TokenKind::Dot
            && self.peek_nth(2).kind == TokenKind::Star
        {
            let qualifier = self.advance().into_ident();
            self.advance();
            self.advance();
            return Ok(SelectItem::QualifiedWildcard(qualifier));
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    /// Oracle and DB2 need a dummy table for FROM-less selects; it is not part of the tree.
    fn is_dummy_table(&self, from: &[TableWithJoins]) -> bool {
        let [only] = from else {
            return false;
        };
        let TableFactor::Table { name, alias: None } = &only.relation else {
            return false;
        };
        if !only.joins.is_empty() {
            return false;
        }
        match self.dialect {
            Some(Dialect::Oracle) => {
                name.schema.is_none() && name.name.eq_ignore_ascii_case("DUAL")
            }
            Some(Dialect::Db2) => {
                name.schema
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case("SYSIBM"))
                    && name.name.eq_ignore_ascii_case("SYSDUMMY1")
            }
            _ => false,
        }
    }
}

fn with_top(body: SetExpr, top: Option<Expr>) -> SetExpr {
    match top {
        None => body,
        Some(count) => SetExpr::Query(Box::new(Query {
            body,
            order_by: Vec::new(),
            limit: Some(Limit {
                count: Some(count),
                offset: None,
            }),
        })),
    }
}
