//! SELECT SQL generation, including each backend's paging strategy.

use super::Renderer;
use crate::ast::*;
use crate::error::DialectError;
use crate::parser::grammar::clauses::{MYSQL_NO_LIMIT, ROWNUM_COLUMN_ALIAS, ROWNUM_TABLE_ALIAS};
use crate::transpiler::Construct;
use crate::transpiler::traits::PagingStyle;

impl Renderer<'_> {
    pub fn query(&mut self, query: &Query) -> Result<String, DialectError> {
        let limit = match &query.limit {
            Some(limit) if limit.count.is_some() || limit.offset.is_some() => limit,
            _ => return self.ordered(query),
        };

        match self.generator.paging() {
            PagingStyle::RowNum => {
                let wrapped = rownum_wrapper(query, limit);
                self.query(&wrapped)
            }
            PagingStyle::TopOrFetchNext => self.top_or_fetch_next(query, limit),
            PagingStyle::LimitOffset { offset_rows } => {
                let mut sql = self.ordered(query)?;
                if let Some(count) = &limit.count {
                    sql.push_str(&format!(" LIMIT {}", self.expr(count)?));
                }
                if let Some(offset) = &limit.offset {
                    sql.push_str(&format!(" OFFSET {}", self.expr(offset)?));
                    if offset_rows && limit.count.is_none() {
                        sql.push_str(" ROWS");
                    }
                }
                Ok(sql)
            }
            PagingStyle::MySqlLimit => {
                let mut sql = self.ordered(query)?;
                let count = match &limit.count {
                    Some(count) => self.expr(count)?,
                    None => MYSQL_NO_LIMIT.to_string(),
                };
                sql.push_str(&format!(" LIMIT {}", count));
                if let Some(offset) = &limit.offset {
                    sql.push_str(&format!(" OFFSET {}", self.expr(offset)?));
                }
                Ok(sql)
            }
            PagingStyle::FetchFirst => {
                let mut sql = self.ordered(query)?;
                if let Some(offset) = &limit.offset {
                    sql.push_str(&format!(" OFFSET {} ROWS", self.expr(offset)?));
                }
                if let Some(count) = &limit.count {
                    sql.push_str(&format!(" FETCH FIRST {} ROWS ONLY", self.expr(count)?));
                }
                Ok(sql)
            }
        }
    }

    /// SQL Server: `SELECT TOP (n)` for a plain limit, `OFFSET .. FETCH NEXT` otherwise.
    fn top_or_fetch_next(&mut self, query: &Query, limit: &Limit) -> Result<String, DialectError> {
        match (&limit.offset, &limit.count) {
            (None, Some(count)) => {
                let SetExpr::Select(select) = &query.body else {
                    self.require(Construct::LimitOnSetOperation)?;
                    return self.ordered(query);
                };
                let mut sql = self.select(select, Some(count))?;
                sql.push_str(&self.order_by(&query.order_by)?);
                Ok(sql)
            }
            (Some(offset), count) => {
                if query.order_by.is_empty() {
                    self.require(Construct::PagingWithoutOrder)?;
                }
                let mut sql = self.ordered(query)?;
                sql.push_str(&format!(" OFFSET {} ROWS", self.expr(offset)?));
                if let Some(count) = count {
                    sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", self.expr(count)?));
                }
                Ok(sql)
            }
            (None, None) => self.ordered(query),
        }
    }

    /// Body and ORDER BY, without paging.
    fn ordered(&mut self, query: &Query) -> Result<String, DialectError> {
        let mut sql = self.set_expr(&query.body)?;
        sql.push_str(&self.order_by(&query.order_by)?);
        Ok(sql)
    }

    fn order_by(&mut self, items: &[OrderByExpr]) -> Result<String, DialectError> {
        if items.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let mut part = self.expr(&item.expr)?;
            match item.asc {
                Some(true) => part.push_str(" ASC"),
                Some(false) => part.push_str(" DESC"),
                None => {}
            }
            if let Some(first) = item.nulls_first {
                self.require(Construct::NullsOrdering)?;
                part.push_str(if first { " NULLS FIRST" } else { " NULLS LAST" });
            }
            parts.push(part);
        }
        Ok(format!(" ORDER BY {}", parts.join(", ")))
    }

    fn set_expr(&mut self, body: &SetExpr) -> Result<String, DialectError> {
        match body {
            SetExpr::Select(select) => self.select(select, None),
            SetExpr::Query(query) => Ok(format!("({})", self.query(query)?)),
            SetExpr::SetOperation {
                op,
                all,
                left,
                right,
            } => {
                match op {
                    SetOperator::Intersect => self.require(Construct::Intersect)?,
                    SetOperator::Except => self.require(Construct::Except)?,
                    SetOperator::Union => {}
                }
                let p = op.precedence();
                let left = self.set_operand(left, |child| child < p)?;
                let right = self.set_operand(right, |child| child <= p)?;
                let all = if *all { " ALL" } else { "" };
                Ok(format!(
                    "{} {}{} {}",
                    left,
                    self.generator.set_operator(*op),
                    all,
                    right
                ))
            }
        }
    }

    fn set_operand(
        &mut self,
        operand: &SetExpr,
        needs_parens: impl Fn(u8) -> bool,
    ) -> Result<String, DialectError> {
        match operand {
            SetExpr::SetOperation { op, .. } if needs_parens(op.precedence()) => {
                Ok(format!("({})", self.set_expr(operand)?))
            }
            _ => self.set_expr(operand),
        }
    }

    pub(crate) fn select(
        &mut self,
        select: &Select,
        top: Option<&Expr>,
    ) -> Result<String, DialectError> {
        let mut sql = String::from("SELECT ");
        if select.distinct {
            sql.push_str("DISTINCT ");
        }
        if let Some(top) = top {
            sql.push_str(&format!("TOP ({}) ", self.expr(top)?));
        }
        sql.push_str(&self.select_items(&select.projection)?);

        if select.from.is_empty() {
            if let Some(dummy) = self.generator.dummy_table() {
                sql.push_str(" FROM ");
                sql.push_str(dummy);
            }
        } else {
            let mut tables = Vec::with_capacity(select.from.len());
            for twj in &select.from {
                tables.push(self.table_with_joins(twj)?);
            }
            sql.push_str(" FROM ");
            sql.push_str(&tables.join(", "));
        }

        if let Some(selection) = &select.selection {
            sql.push_str(&format!(" WHERE {}", self.expr(selection)?));
        }
        if !select.group_by.is_empty() {
            let mut groups = Vec::with_capacity(select.group_by.len());
            for e in &select.group_by {
                groups.push(self.expr(e)?);
            }
            sql.push_str(&format!(" GROUP BY {}", groups.join(", ")));
        }
        if let Some(having) = &select.having {
            sql.push_str(&format!(" HAVING {}", self.expr(having)?));
        }
        Ok(sql)
    }

    fn table_with_joins(&mut self, twj: &TableWithJoins) -> Result<String, DialectError> {
        let mut sql = self.table_factor(&twj.relation)?;
        for join in &twj.joins {
            let kind = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Right => "RIGHT JOIN",
                JoinKind::Full => {
                    self.require(Construct::FullOuterJoin)?;
                    "FULL JOIN"
                }
                JoinKind::Cross => "CROSS JOIN",
            };
            sql.push_str(&format!(" {} {}", kind, self.table_factor(&join.relation)?));
            match &join.constraint {
                JoinConstraint::On(e) => sql.push_str(&format!(" ON {}", self.expr(e)?)),
                JoinConstraint::Using(columns) => {
                    let cols: Vec<String> = columns.iter().map(|c| self.ident(c)).collect();
                    sql.push_str(&format!(" USING ({})", cols.join(", ")));
                }
                JoinConstraint::None => {}
            }
        }
        Ok(sql)
    }

    fn table_factor(&mut self, factor: &TableFactor) -> Result<String, DialectError> {
        let (mut sql, alias) = match factor {
            TableFactor::Table { name, alias } => (self.table_name(name), alias),
            TableFactor::Derived { subquery, alias } => {
                (format!("({})", self.query(subquery)?), alias)
            }
            TableFactor::Module { name, alias } => {
                // backends never see a reference; only the neutral text keeps it
                if let Some(dialect) = self.generator.dialect() {
                    return Err(DialectError::Unsupported {
                        construct: Construct::ModuleReference,
                        dialect,
                    });
                }
                (format!("#{}", name), alias)
            }
        };
        if let Some(alias) = alias {
            sql.push(' ');
            sql.push_str(&self.ident(alias));
        }
        Ok(sql)
    }
}

/// Oracle paging: number the ordered rows with ROWNUM in nested selects.
fn rownum_wrapper(query: &Query, limit: &Limit) -> Query {
    let inner = Query {
        body: query.body.clone(),
        order_by: query.order_by.clone(),
        limit: None,
    };
    let rownum = || Expr::column("ROWNUM");
    let derived = |subquery: Query, alias: Option<&str>| TableWithJoins {
        relation: TableFactor::Derived {
            subquery: Box::new(subquery),
            alias: alias.map(Ident::from),
        },
        joins: Vec::new(),
    };

    let Some(offset) = &limit.offset else {
        let count = limit.count.clone().unwrap_or(Expr::Literal(Literal::Null));
        return Query::new(SetExpr::Select(Box::new(Select {
            projection: vec![SelectItem::Wildcard],
            from: vec![derived(inner, Some(ROWNUM_TABLE_ALIAS))],
            selection: Some(Expr::binary(rownum(), BinaryOp::LtEq, count)),
            ..Default::default()
        })));
    };

    let numbered = Select {
        projection: vec![
            SelectItem::QualifiedWildcard(ROWNUM_TABLE_ALIAS.into()),
            SelectItem::Expr {
                expr: rownum(),
                alias: Some(ROWNUM_COLUMN_ALIAS.into()),
            },
        ],
        from: vec![derived(inner, Some(ROWNUM_TABLE_ALIAS))],
        selection: limit.count.as_ref().map(|count| {
            Expr::binary(
                rownum(),
                BinaryOp::LtEq,
                Expr::binary(offset.clone(), BinaryOp::Plus, count.clone()),
            )
        }),
        ..Default::default()
    };
    Query::new(SetExpr::Select(Box::new(Select {
        projection: vec![SelectItem::Wildcard],
        from: vec![derived(Query::new(SetExpr::Select(Box::new(numbered))), None)],
        selection: Some(Expr::binary(
            Expr::column(ROWNUM_COLUMN_ALIAS),
            BinaryOp::Gt,
            offset.clone(),
        )),
        ..Default::default()
    })))
}
