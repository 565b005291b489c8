//! FROM, JOIN, ORDER BY and paging clauses.

use super::Parser;
use crate::ast::*;
use crate::error::ParseError;
use crate::parser::tokens::{Keyword, TokenKind};

/// MySQL's documented "no limit" row count, used for offset-only paging.
pub const MYSQL_NO_LIMIT: &str = "18446744073709551615";

/// Alias of the derived table inside the Oracle ROWNUM paging wrapper.
pub const ROWNUM_TABLE_ALIAS: &str = "q__";
/// Alias of the row-number column inside the Oracle ROWNUM paging wrapper.
pub const ROWNUM_COLUMN_ALIAS: &str = "rn__";

impl Parser<'_> {
    pub(crate) fn parse_from(&mut self) -> Result<Vec<TableWithJoins>, ParseError> {
        let mut items = vec![self.parse_table_with_joins()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_table_with_joins()?);
        }
        Ok(items)
    }

    fn parse_table_with_joins(&mut self) -> Result<TableWithJoins, ParseError> {
        let relation = self.parse_table_factor()?;
        let mut joins = Vec::new();
        while let Some(kind) = self.parse_join_kind()? {
            let relation = self.parse_table_factor()?;
            let constraint = if kind == JoinKind::Cross {
                JoinConstraint::None
            } else if self.eat_keyword(Keyword::ON) {
                JoinConstraint::On(self.parse_expr()?)
            } else if self.eat_keyword(Keyword::USING) {
                self.expect(TokenKind::LParen, "'('")?;
                let mut columns = vec![self.parse_identifier("column name")?];
                while self.eat(&TokenKind::Comma) {
                    columns.push(self.parse_identifier("column name")?);
                }
                self.expect(TokenKind::RParen, "')'")?;
                JoinConstraint::Using(columns)
            } else {
                return Err(ParseError::Syntax {
                    position: self.peek().position,
                    expected: vec!["ON".into(), "USING".into()],
                    found: self.peek().describe(),
                });
            };
            joins.push(Join {
                relation,
                kind,
                constraint,
            });
        }
        Ok(TableWithJoins { relation, joins })
    }

    fn parse_join_kind(&mut self) -> Result<Option<JoinKind>, ParseError> {
        let kind = match self.peek().kind {
            TokenKind::Keyword(Keyword::JOIN) => JoinKind::Inner,
            TokenKind::Keyword(Keyword::INNER) => {
                self.advance();
                JoinKind::Inner
            }
            TokenKind::Keyword(Keyword::LEFT) => {
                self.advance();
                self.eat_keyword(Keyword::OUTER);
                JoinKind::Left
            }
            TokenKind::Keyword(Keyword::RIGHT) => {
                self.advance();
                self.eat_keyword(Keyword::OUTER);
                JoinKind::Right
            }
            TokenKind::Keyword(Keyword::FULL) => {
                self.advance();
                self.eat_keyword(Keyword::OUTER);
                JoinKind::Full
            }
            TokenKind::Keyword(Keyword::CROSS) => {
                self.advance();
                JoinKind::Cross
            }
            _ => return Ok(None),
        };
        self.expect_keyword(Keyword::JOIN)?;
        Ok(Some(kind))
    }

    fn parse_table_factor(&mut self) -> Result<TableFactor, ParseError> {
        if self.eat(&TokenKind::LParen) {
            let subquery = self.nested(|p| p.parse_query())?;
            self.expect(TokenKind::RParen, "')'")?;
            let alias = self.parse_optional_alias()?;
            return Ok(TableFactor::Derived {
                subquery: Box::new(subquery),
                alias,
            });
        }
        if self.peek().kind == TokenKind::ModuleReference {
            let name = self.advance().lexeme;
            let alias = self.parse_optional_alias()?;
            return Ok(TableFactor::Module { name, alias });
        }
        let name = self.parse_table_name()?;
        let alias = self.parse_optional_alias()?;
        Ok(TableFactor::Table { name, alias })
    }

    /// `table` or `schema.table`.
    pub(crate) fn parse_table_name(&mut self) -> Result<TableName, ParseError> {
        let first = self.parse_identifier("table name")?;
        if self.eat(&TokenKind::Dot) {
            return Ok(TableName {
                schema: Some(first),
                name: self.parse_identifier("table name")?,
            });
        }
        Ok(TableName::new(first))
    }

    pub(crate) fn parse_order_by_list(&mut self) -> Result<Vec<OrderByExpr>, ParseError> {
        let mut items = vec![self.parse_order_by_expr()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_order_by_expr()?);
        }
        Ok(items)
    }

    fn parse_order_by_expr(&mut self) -> Result<OrderByExpr, ParseError> {
        let expr = self.parse_expr()?;
        let asc = if self.eat_keyword(Keyword::ASC) {
            Some(true)
        } else if self.eat_keyword(Keyword::DESC) {
            Some(false)
        } else {
            None
        };
        let nulls_first = if self.eat_keyword(Keyword::NULLS) {
            if self.eat_keyword(Keyword::FIRST) {
                Some(true)
            } else {
                self.expect_keyword(Keyword::LAST)?;
                Some(false)
            }
        } else {
            None
        };
        Ok(OrderByExpr {
            expr,
            asc,
            nulls_first,
        })
    }

    /// Every spelling of the paging window:
    /// `LIMIT n [OFFSET m]`, `LIMIT m, n`, `OFFSET m [ROWS] [FETCH ...]`, `FETCH FIRST n ROWS ONLY`.
    pub(crate) fn parse_paging(&mut self) -> Result<Option<Limit>, ParseError> {
        let mut count = None;
        let mut offset = None;

        if self.eat_keyword(Keyword::LIMIT) {
            let first = self.parse_limit_count()?;
            if self.eat(&TokenKind::Comma) {
                offset = match first {
                    Some(expr) => Some(expr),
                    None => return Err(self.expected("row count")),
                };
                count = self.parse_limit_count()?;
            } else {
                count = first;
                if self.eat_keyword(Keyword::OFFSET) {
                    offset = Some(self.parse_expr()?);
                    self.eat_rows();
                }
            }
        } else if self.eat_keyword(Keyword::OFFSET) {
            offset = Some(self.parse_expr()?);
            self.eat_rows();
            if self.eat_keyword(Keyword::FETCH) {
                count = Some(self.parse_fetch_count()?);
            }
        } else if self.eat_keyword(Keyword::FETCH) {
            count = Some(self.parse_fetch_count()?);
        }

        if count.is_none() && offset.is_none() {
            return Ok(None);
        }
        Ok(Some(Limit { count, offset }))
    }

    /// Row count after LIMIT; `ALL` and the MySQL sentinel mean no limit.
    fn parse_limit_count(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.eat_keyword(Keyword::ALL) {
            return Ok(None);
        }
        if self.peek().kind == TokenKind::Number && self.peek().lexeme == MYSQL_NO_LIMIT {
            self.advance();
            return Ok(None);
        }
        self.parse_expr().map(Some)
    }

    /// `{FIRST | NEXT} n {ROW | ROWS} ONLY`
    fn parse_fetch_count(&mut self) -> Result<Expr, ParseError> {
        if !self.eat_keyword(Keyword::FIRST) {
            self.expect_keyword(Keyword::NEXT)?;
        }
        let count = self.parse_expr()?;
        if !self.eat_rows() {
            return Err(self.expected("ROWS"));
        }
        self.expect_keyword(Keyword::ONLY)?;
        Ok(count)
    }

    fn eat_rows(&mut self) -> bool {
        self.eat_keyword(Keyword::ROWS) || self.eat_keyword(Keyword::ROW)
    }
}

/// Fold the Oracle ROWNUM paging wrapper back into a logical paging window.
///
/// Recognizes the two shapes the Oracle renderer emits:
///
/// ```text
/// SELECT * FROM (<query>) q__ WHERE ROWNUM <= <count>
/// SELECT * FROM (SELECT q__.*, ROWNUM rn__ FROM (<query>) q__ [WHERE ROWNUM <= <offset> + <count>]) WHERE rn__ > <offset>
/// ```
///
/// Anything else, including a hand-written `ROWNUM` filter over an
/// unaliased derived table, is returned untouched.
pub(crate) fn unwrap_rownum(query: Query) -> Query {
    match match_rownum(&query) {
        Some(unwrapped) => unwrapped,
        None => query,
    }
}

fn match_rownum(query: &Query) -> Option<Query> {
    if !query.order_by.is_empty() || query.limit.is_some() {
        return None;
    }
    if let Some(unwrapped) = match_rownum_count(&query.body) {
        return Some(unwrapped);
    }
    let (sub, filter) = wrapper_parts(&query.body, None)?;
    let Some(Expr::Binary { left, op, right }) = filter else {
        return None;
    };

    if *op == BinaryOp::Gt && is_column(left, ROWNUM_COLUMN_ALIAS) {
        let offset = (**right).clone();
        if !sub.order_by.is_empty() || sub.limit.is_some() {
            return None;
        }
        let SetExpr::Select(mid) = &sub.body else {
            return None;
        };
        let expected_projection = [
            SelectItem::QualifiedWildcard(ROWNUM_TABLE_ALIAS.into()),
            SelectItem::Expr {
                expr: Expr::column("ROWNUM"),
                alias: Some(ROWNUM_COLUMN_ALIAS.into()),
            },
        ];
        if !same_projection(&mid.projection, &expected_projection) {
            return None;
        }
        let (inner, count_filter) = wrapper_parts(&sub.body, Some(ROWNUM_TABLE_ALIAS))?;
        if inner.limit.is_some() {
            return None;
        }
        let count = match count_filter {
            None => None,
            Some(Expr::Binary {
                left,
                op: BinaryOp::LtEq,
                right,
            }) if is_column(left, "ROWNUM") => match &**right {
                Expr::Binary {
                    left: off,
                    op: BinaryOp::Plus,
                    right: count,
                } if **off == offset => Some((**count).clone()),
                _ => return None,
            },
            Some(_) => return None,
        };
        let mut unwrapped = inner.clone();
        unwrapped.limit = Some(Limit {
            count,
            offset: Some(offset),
        });
        return Some(unwrapped);
    }
    None
}

/// For `SELECT <..> FROM (<sub>) [alias] [WHERE <filter>]`, return `sub` and the filter.
///
/// With `alias == None` the projection must be a bare `*` and the filter is required.
fn wrapper_parts<'q>(
    body: &'q SetExpr,
    alias: Option<&str>,
) -> Option<(&'q Query, Option<&'q Expr>)> {
    let SetExpr::Select(select) = body else {
        return None;
    };
    if select.distinct || !select.group_by.is_empty() || select.having.is_some() {
        return None;
    }
    let [from] = select.from.as_slice() else {
        return None;
    };
    if !from.joins.is_empty() {
        return None;
    }
    let TableFactor::Derived {
        subquery,
        alias: sub_alias,
    } = &from.relation
    else {
        return None;
    };
    match alias {
        None => {
            if sub_alias.is_some() || select.projection != [SelectItem::Wildcard] {
                return None;
            }
            let filter = select.selection.as_ref()?;
            Some((&**subquery, Some(filter)))
        }
        Some(expected) => {
            if !sub_alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(expected))
            {
                return None;
            }
            Some((&**subquery, select.selection.as_ref()))
        }
    }
}

/// `SELECT * FROM (<query>) q__ WHERE ROWNUM <= <count>`
fn match_rownum_count(body: &SetExpr) -> Option<Query> {
    let SetExpr::Select(select) = body else {
        return None;
    };
    if select.projection != [SelectItem::Wildcard] {
        return None;
    }
    let (sub, filter) = wrapper_parts(body, Some(ROWNUM_TABLE_ALIAS))?;
    let Some(Expr::Binary {
        left,
        op: BinaryOp::LtEq,
        right,
    }) = filter
    else {
        return None;
    };
    if !is_column(left, "ROWNUM") || sub.limit.is_some() {
        return None;
    }
    let mut inner = sub.clone();
    inner.limit = Some(Limit {
        count: Some((**right).clone()),
        offset: None,
    });
    Some(inner)
}

fn is_column(expr: &Expr, name: &str) -> bool {
    matches!(expr, Expr::Column { qualifier: None, name: n } if n.eq_ignore_ascii_case(name))
}

fn same_projection(actual: &[SelectItem], expected: &[SelectItem]) -> bool {
    actual.len() == expected.len()
        && actual.iter().zip(expected).all(|(a, e)| match (a, e) {
            (SelectItem::QualifiedWildcard(a), SelectItem::QualifiedWildcard(e)) => {
                a.eq_ignore_ascii_case(e)
            }
            (
                SelectItem::Expr {
                    expr: ea,
                    alias: Some(aa),
                },
                SelectItem::Expr {
                    expr: ee,
                    alias: Some(ae),
                },
            ) => aa.eq_ignore_ascii_case(ae) && matches!(ee, Expr::Column { name, .. } if is_column(ea, name)),
            _ => false,
        })
}
