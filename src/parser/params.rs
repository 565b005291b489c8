//! Named parameter extraction.
//!
//! Parameters with the same name (compared case-insensitively) are one
//! logical parameter; every occurrence is recorded so the executor can bind
//! the same value at each placeholder.

use crate::ast::*;
use crate::parser::tokens::Position;
use serde::{Deserialize, Serialize};

/// One reference to a parameter in the statement text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamOccurrence {
    pub name: String,
    /// Index among all parameter references, in textual order.
    pub ordinal: usize,
    pub position: Position,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub names: Vec<String>,
    pub occurrences: Vec<ParamOccurrence>,
}

/// Collect parameters in first-occurrence order.
pub fn extract(statement: &Statement) -> Extracted {
    let mut found: Vec<&Param> = Vec::new();
    visit_statement(statement, &mut |p| found.push(p));
    // Traversal follows clause order; positions restore the exact textual
    // order (TOP precedes the select list, for instance). Synthesized trees
    // have no positions and keep traversal order.
    found.sort_by_key(|p| p.position.offset);

    let mut extracted = Extracted::default();
    for (ordinal, param) in found.into_iter().enumerate() {
        if !extracted
            .names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(&param.name))
        {
            extracted.names.push(param.name.clone());
        }
        extracted.occurrences.push(ParamOccurrence {
            name: param.name.clone(),
            ordinal,
            position: param.position,
        });
    }
    extracted
}

/// Visit every parameter reference in the statement.
pub fn visit_statement<'a>(statement: &'a Statement, f: &mut dyn FnMut(&'a Param)) {
    match statement {
        Statement::Query(q) => visit_query(q, f),
        Statement::Insert(insert) => {
            match &insert.source {
                InsertSource::Values(rows) => rows.iter().flatten().for_each(|e| visit_expr(e, f)),
                InsertSource::Query(q) => visit_query(q, f),
            }
            visit_items(&insert.returning, f);
        }
        Statement::Update(update) => {
            for a in &update.assignments {
                visit_expr(&a.value, f);
            }
            if let Some(e) = &update.selection {
                visit_expr(e, f);
            }
            visit_items(&update.returning, f);
        }
        Statement::Delete(delete) => {
            if let Some(e) = &delete.selection {
                visit_expr(e, f);
            }
            visit_items(&delete.returning, f);
        }
    }
}

pub fn visit_query<'a>(query: &'a Query, f: &mut dyn FnMut(&'a Param)) {
    visit_set_expr(&query.body, f);
    for o in &query.order_by {
        visit_expr(&o.expr, f);
    }
    if let Some(limit) = &query.limit {
        if let Some(c) = &limit.count {
            visit_expr(c, f);
        }
        if let Some(o) = &limit.offset {
            visit_expr(o, f);
        }
    }
}

fn visit_set_expr<'a>(body: &'a SetExpr, f: &mut dyn FnMut(&'a Param)) {
    match body {
        SetExpr::Select(s) => visit_select(s, f),
        SetExpr::SetOperation { left, right, .. } => {
            visit_set_expr(left, f);
            visit_set_expr(right, f);
        }
        SetExpr::Query(q) => visit_query(q, f),
    }
}

fn visit_select<'a>(select: &'a Select, f: &mut dyn FnMut(&'a Param)) {
    visit_items(&select.projection, f);
    for twj in &select.from {
        visit_factor(&twj.relation, f);
        for join in &twj.joins {
            visit_factor(&join.relation, f);
            if let JoinConstraint::On(e) = &join.constraint {
                visit_expr(e, f);
            }
        }
    }
    if let Some(e) = &select.selection {
        visit_expr(e, f);
    }
    select.group_by.iter().for_each(|e| visit_expr(e, f));
    if let Some(e) = &select.having {
        visit_expr(e, f);
    }
}

fn visit_factor<'a>(factor: &'a TableFactor, f: &mut dyn FnMut(&'a Param)) {
    if let TableFactor::Derived { subquery, .. } = factor {
        visit_query(subquery, f);
    }
}

fn visit_items<'a>(items: &'a [SelectItem], f: &mut dyn FnMut(&'a Param)) {
    for item in items {
        if let SelectItem::Expr { expr, .. } = item {
            visit_expr(expr, f);
        }
    }
}

pub fn visit_expr<'a>(expr: &'a Expr, f: &mut dyn FnMut(&'a Param)) {
    match expr {
        Expr::Parameter(p) => f(p),
        Expr::Literal(_) | Expr::Column { .. } => {}
        Expr::Binary { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } => {
            visit_expr(expr, f)
        }
        Expr::Function(func) => func.args.iter().for_each(|a| visit_expr(a, f)),
        Expr::Subquery(q) | Expr::Exists(q) => visit_query(q, f),
        Expr::InList { expr, list, .. } => {
            visit_expr(expr, f);
            list.iter().for_each(|e| visit_expr(e, f));
        }
        Expr::InSubquery { expr, subquery, .. } => {
            visit_expr(expr, f);
            visit_query(subquery, f);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            visit_expr(expr, f);
            visit_expr(low, f);
            visit_expr(high, f);
        }
        Expr::Like {
            expr,
            pattern,
            escape,
            ..
        } => {
            visit_expr(expr, f);
            visit_expr(pattern, f);
            if let Some(e) = escape {
                visit_expr(e, f);
            }
        }
        Expr::Case {
            operand,
            whens,
            else_result,
        } => {
            if let Some(o) = operand {
                visit_expr(o, f);
            }
            for w in whens {
                visit_expr(&w.condition, f);
                visit_expr(&w.result, f);
            }
            if let Some(e) = else_result {
                visit_expr(e, f);
            }
        }
    }
}
