//! Expression typing and parameter evidence.

use super::functions::{self, ArgType, Nullability, Returns};
use super::scope::Scope;
use super::{Resolver, Typed};
use crate::ast::*;
use crate::error::ResolutionError;
use crate::types::LogicalType;

impl Resolver<'_> {
    pub(super) fn expr(&mut self, expr: &Expr, scope: &Scope<'_>) -> Result<Typed, ResolutionError> {
        Ok(match expr {
            Expr::Literal(lit) => match lit {
                Literal::Integer(_) => Typed::known(LogicalType::Integer, false),
                Literal::Decimal(_) => Typed::known(LogicalType::Decimal(None), false),
                Literal::String(_) => Typed::known(LogicalType::Text, false),
                Literal::Boolean(_) => Typed::known(LogicalType::Boolean, false),
                Literal::Null => Typed::unknown(),
            },
            Expr::Column { qualifier, name } => {
                let column = scope.lookup(qualifier.as_deref(), name)?;
                Typed {
                    logical: Some(column.logical),
                    nullable: column.nullable,
                    origin: column.origin.clone(),
                }
            }
            Expr::Parameter(_) => Typed::unknown(),
            Expr::Binary { left, op, right } => self.binary(left, *op, right, scope)?,
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => {
                    let operand = self.condition(expr, scope)?;
                    Typed::known(LogicalType::Boolean, operand.nullable)
                }
                UnaryOp::Minus | UnaryOp::Plus => {
                    let operand = self.expr(expr, scope)?;
                    if let Some(t) = operand.logical.filter(|t| !t.is_numeric()) {
                        return Err(ResolutionError::TypeMismatch {
                            context: "unary sign".to_string(),
                            left: t,
                            right: LogicalType::Decimal(None),
                        });
                    }
                    Typed {
                        origin: super::ColumnOrigin::Computed,
                        ..operand
                    }
                }
            },
            Expr::Function(f) => self.function(f, scope)?,
            Expr::Subquery(query) => {
                let columns = self.query(query, Some(scope))?;
                let [column] = columns.as_slice() else {
                    return Err(ResolutionError::InvalidSubquery(format!(
                        "scalar subquery returns {} columns",
                        columns.len()
                    )));
                };
                Typed::known(column.logical, true)
            }
            Expr::Exists(query) => {
                self.query(query, Some(scope))?;
                Typed::known(LogicalType::Boolean, false)
            }
            Expr::InList { expr, list, .. } => {
                let operand = self.expr(expr, scope)?;
                let mut nullable = operand.nullable;
                for item in list {
                    let typed = self.expr(item, scope)?;
                    self.infer(item, &operand);
                    self.infer(expr, &typed);
                    check(&operand, &typed, "IN list")?;
                    nullable |= typed.nullable;
                }
                Typed::known(LogicalType::Boolean, nullable)
            }
            Expr::InSubquery { expr, subquery, .. } => {
                let operand = self.expr(expr, scope)?;
                let columns = self.query(subquery, Some(scope))?;
                let [column] = columns.as_slice() else {
                    return Err(ResolutionError::InvalidSubquery(format!(
                        "IN subquery returns {} columns",
                        columns.len()
                    )));
                };
                let peer = Typed::known(column.logical, column.nullable);
                self.infer(expr, &peer);
                check(&operand, &peer, "IN subquery")?;
                Typed::known(LogicalType::Boolean, operand.nullable || peer.nullable)
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                let (operand, low) = self.compare(expr, low, scope, "BETWEEN")?;
                let (_, high) = self.compare(expr, high, scope, "BETWEEN")?;
                Typed::known(
                    LogicalType::Boolean,
                    operand.nullable || low.nullable || high.nullable,
                )
            }
            Expr::Like {
                expr,
                pattern,
                escape,
                ..
            } => {
                let operand = self.expr(expr, scope)?;
                let pattern_type = self.expr(pattern, scope)?;
                let text = Typed::known(LogicalType::Text, operand.nullable);
                self.infer(pattern, &text);
                self.infer(expr, &Typed::known(LogicalType::Text, pattern_type.nullable));
                check(&operand, &text, "LIKE")?;
                check(&pattern_type, &text, "LIKE pattern")?;
                if let Some(escape) = escape {
                    self.expect(escape, LogicalType::Text, false, scope, "ESCAPE")?;
                }
                Typed::known(LogicalType::Boolean, operand.nullable || pattern_type.nullable)
            }
            Expr::IsNull { expr, .. } => {
                self.expr(expr, scope)?;
                Typed::known(LogicalType::Boolean, false)
            }
            Expr::Case {
                operand,
                whens,
                else_result,
            } => self.case(operand.as_deref(), whens, else_result.as_deref(), scope)?,
            Expr::Cast { expr, target } => {
                let operand = self.expr(expr, scope)?;
                self.infer(expr, &Typed::known(*target, true));
                Typed::known(*target, operand.nullable)
            }
        })
    }

    /// Type a boolean context (WHERE, HAVING, ON, NOT, AND/OR operands).
    pub(super) fn condition(&mut self, expr: &Expr, scope: &Scope<'_>) -> Result<Typed, ResolutionError> {
        self.expect(expr, LogicalType::Boolean, false, scope, "condition")
    }

    pub(super) fn expect(
        &mut self,
        expr: &Expr,
        logical: LogicalType,
        nullable: bool,
        scope: &Scope<'_>,
        context: &str,
    ) -> Result<Typed, ResolutionError> {
        self.expect_typed(expr, &Typed::known(logical, nullable), scope, context)
    }

    /// Type `expr` where a value like `target` is required.
    pub(super) fn expect_typed(
        &mut self,
        expr: &Expr,
        target: &Typed,
        scope: &Scope<'_>,
        context: &str,
    ) -> Result<Typed, ResolutionError> {
        let typed = self.expr(expr, scope)?;
        self.infer(expr, target);
        check(&typed, target, context)?;
        Ok(typed)
    }

    /// A parameter standing where `peer` stands takes its type.
    pub(super) fn infer(&mut self, expr: &Expr, peer: &Typed) {
        if let (Expr::Parameter(param), Some(logical)) = (expr, peer.logical) {
            self.record(&param.name, logical, peer.nullable);
        }
    }

    fn compare(
        &mut self,
        left: &Expr,
        right: &Expr,
        scope: &Scope<'_>,
        context: &str,
    ) -> Result<(Typed, Typed), ResolutionError> {
        let l = self.expr(left, scope)?;
        let r = self.expr(right, scope)?;
        self.infer(left, &r);
        self.infer(right, &l);
        check(&l, &r, context)?;
        Ok((l, r))
    }

    fn binary(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        scope: &Scope<'_>,
    ) -> Result<Typed, ResolutionError> {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let l = self.condition(left, scope)?;
                let r = self.condition(right, scope)?;
                Ok(Typed::known(LogicalType::Boolean, l.nullable || r.nullable))
            }
            op if op.is_comparison() => {
                let context = format!("comparison '{}'", op);
                let (l, r) = self.compare(left, right, scope, &context)?;
                Ok(Typed::known(LogicalType::Boolean, l.nullable || r.nullable))
            }
            BinaryOp::Concat => {
                let l = self.expr(left, scope)?;
                let r = self.expr(right, scope)?;
                self.infer(left, &Typed::known(LogicalType::Text, r.nullable));
                self.infer(right, &Typed::known(LogicalType::Text, l.nullable));
                Ok(Typed::known(LogicalType::Text, l.nullable || r.nullable))
            }
            _ => {
                let l = self.expr(left, scope)?;
                let r = self.expr(right, scope)?;
                self.infer(left, &arithmetic_peer(&r));
                self.infer(right, &arithmetic_peer(&l));
                let nullable = l.nullable || r.nullable;
                let logical = match (l.logical, r.logical) {
                    (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => a.unify(&b),
                    (Some(a), Some(b)) if a.is_temporal() && b.is_numeric() => Some(a),
                    (Some(a), Some(b)) => {
                        return Err(ResolutionError::TypeMismatch {
                            context: format!("arithmetic '{}'", op),
                            left: a,
                            right: b,
                        });
                    }
                    (Some(t), None) | (None, Some(t)) => Some(t),
                    (None, None) => None,
                };
                Ok(Typed {
                    logical,
                    nullable,
                    origin: super::ColumnOrigin::Computed,
                })
            }
        }
    }

    fn function(&mut self, f: &Function, scope: &Scope<'_>) -> Result<Typed, ResolutionError> {
        let mut args = Vec::with_capacity(f.args.len());
        for arg in &f.args {
            args.push(self.expr(arg, scope)?);
        }
        let Some(signature) = functions::lookup(&f.name) else {
            tracing::debug!(function = %f.name, "opaque function, result is untyped");
            return Ok(Typed::unknown());
        };
        if f.star {
            return Ok(Typed::known(LogicalType::Integer, false));
        }

        let context = format!("{}()", f.name);
        let mut peer: Option<LogicalType> = None;
        for (index, (arg, typed)) in f.args.iter().zip(&args).enumerate() {
            match signature.arg(index) {
                Some(ArgType::Exact(expected)) => {
                    let target = Typed::known(expected, true);
                    self.infer(arg, &target);
                    check(typed, &target, &context)?;
                }
                Some(ArgType::Numeric) => {
                    if let Some(t) = typed.logical.filter(|t| !t.is_numeric()) {
                        return Err(ResolutionError::TypeMismatch {
                            context,
                            left: t,
                            right: LogicalType::Decimal(None),
                        });
                    }
                    self.infer(arg, &Typed::known(LogicalType::Decimal(None), true));
                }
                Some(ArgType::Peer) => {
                    if let Some(t) = typed.logical {
                        peer = Some(match peer {
                            None => t,
                            Some(p) => p.unify(&t).ok_or(ResolutionError::TypeMismatch {
                                context: context.clone(),
                                left: p,
                                right: t,
                            })?,
                        });
                    }
                }
                Some(ArgType::Any) | None => {}
            }
        }
        if let Some(peer) = peer {
            for (index, arg) in f.args.iter().enumerate() {
                if signature.arg(index) == Some(ArgType::Peer) {
                    self.infer(arg, &Typed::known(peer, true));
                }
            }
        }

        let logical = match signature.returns {
            Returns::Fixed(t) => Some(t),
            Returns::Peer => peer,
            Returns::Widened => {
                if args.iter().all(|a| a.logical == Some(LogicalType::Integer)) {
                    Some(LogicalType::Integer)
                } else {
                    Some(LogicalType::Decimal(None))
                }
            }
        };
        let nullable = match signature.nullable {
            Nullability::Never => false,
            Nullability::Always => true,
            Nullability::Propagate => args.iter().any(|a| a.nullable),
            Nullability::AllArgs => args.iter().all(|a| a.nullable),
        };
        Ok(Typed {
            logical,
            nullable,
            origin: super::ColumnOrigin::Computed,
        })
    }

    fn case(
        &mut self,
        operand: Option<&Expr>,
        whens: &[WhenClause],
        else_result: Option<&Expr>,
        scope: &Scope<'_>,
    ) -> Result<Typed, ResolutionError> {
        for when in whens {
            match operand {
                Some(operand) => {
                    self.compare(operand, &when.condition, scope, "CASE")?;
                }
                None => {
                    self.condition(&when.condition, scope)?;
                }
            }
        }

        let results: Vec<&Expr> = whens
            .iter()
            .map(|w| &w.result)
            .chain(else_result)
            .collect();
        let mut logical: Option<LogicalType> = None;
        let mut nullable = else_result.is_none();
        for result in &results {
            let t = self.expr(result, scope)?;
            nullable |= t.nullable;
            if let Some(r) = t.logical {
                logical = Some(match logical {
                    None => r,
                    Some(l) => l.unify(&r).ok_or(ResolutionError::TypeMismatch {
                        context: "CASE results".to_string(),
                        left: l,
                        right: r,
                    })?,
                });
            }
        }
        if let Some(l) = logical {
            for result in results {
                self.infer(result, &Typed::known(l, true));
            }
        }
        Ok(Typed {
            logical,
            nullable,
            origin: super::ColumnOrigin::Computed,
        })
    }
}

/// What a parameter next to `peer` in arithmetic must be.
fn arithmetic_peer(peer: &Typed) -> Typed {
    match peer.logical {
        Some(t) if t.is_temporal() => Typed::known(LogicalType::Integer, peer.nullable),
        _ => peer.clone(),
    }
}

fn check(actual: &Typed, expected: &Typed, context: &str) -> Result<(), ResolutionError> {
    match (actual.logical, expected.logical) {
        (Some(a), Some(e)) if !a.is_compatible(&e) => Err(ResolutionError::TypeMismatch {
            context: context.to_string(),
            left: a,
            right: e,
        }),
        _ => Ok(()),
    }
}
