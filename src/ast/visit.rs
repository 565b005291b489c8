//! Mutable traversal of a statement tree.

use crate::ast::*;

/// A node handed to a [`walk_mut`] callback.
pub enum NodeMut<'a> {
    /// Visited before the factor's subquery, so a replacement is walked too.
    Factor(&'a mut TableFactor),
    Param(&'a mut Param),
}

type Visit<'v, E> = dyn FnMut(NodeMut<'_>) -> Result<(), E> + 'v;

/// Visit every table factor and parameter reference, descending into subqueries.
pub fn walk_mut<E>(statement: &mut Statement, visit: &mut Visit<'_, E>) -> Result<(), E> {
    match statement {
        Statement::Query(q) => walk_query_mut(q, visit),
        Statement::Insert(insert) => {
            match &mut insert.source {
                InsertSource::Values(rows) => {
                    for e in rows.iter_mut().flatten() {
                        expr(e, visit)?;
                    }
                }
                InsertSource::Query(q) => walk_query_mut(q, visit)?,
            }
            items(&mut insert.returning, visit)
        }
        Statement::Update(update) => {
            for a in &mut update.assignments {
                expr(&mut a.value, visit)?;
            }
            if let Some(e) = &mut update.selection {
                expr(e, visit)?;
            }
            items(&mut update.returning, visit)
        }
        Statement::Delete(delete) => {
            if let Some(e) = &mut delete.selection {
                expr(e, visit)?;
            }
            items(&mut delete.returning, visit)
        }
    }
}

pub fn walk_query_mut<E>(query: &mut Query, visit: &mut Visit<'_, E>) -> Result<(), E> {
    set_expr(&mut query.body, visit)?;
    for o in &mut query.order_by {
        expr(&mut o.expr, visit)?;
    }
    if let Some(limit) = &mut query.limit {
        for e in [&mut limit.count, &mut limit.offset].into_iter().flatten() {
            expr(e, visit)?;
        }
    }
    Ok(())
}

fn set_expr<E>(body: &mut SetExpr, visit: &mut Visit<'_, E>) -> Result<(), E> {
    match body {
        SetExpr::Select(s) => select(s, visit),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr(left, visit)?;
            set_expr(right, visit)
        }
        SetExpr::Query(q) => walk_query_mut(q, visit),
    }
}

fn select<E>(select: &mut Select, visit: &mut Visit<'_, E>) -> Result<(), E> {
    items(&mut select.projection, visit)?;
    for twj in &mut select.from {
        factor(&mut twj.relation, visit)?;
        for join in &mut twj.joins {
            factor(&mut join.relation, visit)?;
            if let JoinConstraint::On(e) = &mut join.constraint {
                expr(e, visit)?;
            }
        }
    }
    if let Some(e) = &mut select.selection {
        expr(e, visit)?;
    }
    for e in &mut select.group_by {
        expr(e, visit)?;
    }
    if let Some(e) = &mut select.having {
        expr(e, visit)?;
    }
    Ok(())
}

fn factor<E>(factor: &mut TableFactor, visit: &mut Visit<'_, E>) -> Result<(), E> {
    visit(NodeMut::Factor(&mut *factor))?;
    if let TableFactor::Derived { subquery, .. } = factor {
        walk_query_mut(subquery, visit)?;
    }
    Ok(())
}

fn items<E>(items: &mut [SelectItem], visit: &mut Visit<'_, E>) -> Result<(), E> {
    for item in items {
        if let SelectItem::Expr { expr: e, .. } = item {
            expr(e, visit)?;
        }
    }
    Ok(())
}

fn expr<E>(e: &mut Expr, visit: &mut Visit<'_, E>) -> Result<(), E> {
    match e {
        Expr::Parameter(p) => visit(NodeMut::Param(p)),
        Expr::Literal(_) | Expr::Column { .. } => Ok(()),
        Expr::Binary { left, right, .. } => {
            expr(left, visit)?;
            expr(right, visit)
        }
        Expr::Unary { expr: inner, .. }
        | Expr::IsNull { expr: inner, .. }
        | Expr::Cast { expr: inner, .. } => expr(inner, visit),
        Expr::Function(f) => {
            for a in &mut f.args {
                expr(a, visit)?;
            }
            Ok(())
        }
        Expr::Subquery(q) | Expr::Exists(q) => walk_query_mut(q, visit),
        Expr::InList { expr: inner, list, .. } => {
            expr(inner, visit)?;
            for item in list {
                expr(item, visit)?;
            }
            Ok(())
        }
        Expr::InSubquery {
            expr: inner,
            subquery,
            ..
        } => {
            expr(inner, visit)?;
            walk_query_mut(subquery, visit)
        }
        Expr::Between {
            expr: inner,
            low,
            high,
            ..
        } => {
            expr(inner, visit)?;
            expr(low, visit)?;
            expr(high, visit)
        }
        Expr::Like {
            expr: inner,
            pattern,
            escape,
            ..
        } => {
            expr(inner, visit)?;
            expr(pattern, visit)?;
            match escape {
                Some(esc) => expr(esc, visit),
                None => Ok(()),
            }
        }
        Expr::Case {
            operand,
            whens,
            else_result,
        } => {
            if let Some(o) = operand {
                expr(o, visit)?;
            }
            for w in whens {
                expr(&mut w.condition, visit)?;
                expr(&mut w.result, visit)?;
            }
            match else_result {
                Some(e) => expr(e, visit),
                None => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_walk_reaches_nested_parameters() {
        let mut statement = parse(
            "SELECT a FROM (SELECT a FROM t WHERE b = :x) d \
             WHERE EXISTS (SELECT 1 FROM u WHERE c IN (:y, :z)) LIMIT :n",
        )
        .unwrap()
        .statement;
        let mut seen = Vec::new();
        let mut factors = 0;
        walk_mut(&mut statement, &mut |node| {
            match node {
                NodeMut::Param(p) => {
                    seen.push(p.name.clone());
                    p.name = p.name.to_uppercase();
                }
                NodeMut::Factor(_) => factors += 1,
            }
            Ok::<(), ()>(())
        })
        .unwrap();
        assert_eq!(seen, vec!["x", "y", "z", "n"]);
        assert_eq!(factors, 3);
        assert!(statement.to_string().contains(":X"));
    }
}
