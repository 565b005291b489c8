//! Expression rendering with minimal parentheses.
//!
//! A child is parenthesized only when the parser would otherwise attach it
//! differently, so rendered text parses back into the same tree.

use super::Renderer;
use crate::ast::*;
use crate::error::DialectError;
use crate::transpiler::Construct;
use crate::transpiler::traits::ConcatStyle;
use crate::types::LogicalType;

impl Renderer<'_> {
    pub fn expr(&mut self, expr: &Expr) -> Result<String, DialectError> {
        match expr {
            Expr::Literal(lit) => self.literal(lit),
            Expr::Column { qualifier, name } => Ok(match qualifier {
                Some(q) => format!("{}.{}", self.ident(q), self.ident(name)),
                None => self.ident(name),
            }),
            Expr::Parameter(p) => Ok(self.parameter(&p.name)),
            Expr::Binary { left, op, right } => self.binary(left, *op, right),
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => {
                    let operand = self.wrapped(expr, expr.precedence() < precedence::NOT)?;
                    Ok(format!("NOT {}", operand))
                }
                UnaryOp::Minus | UnaryOp::Plus => {
                    let sign = if *op == UnaryOp::Minus { "-" } else { "+" };
                    let operand = self.wrapped(expr, expr.precedence() <= precedence::UNARY)?;
                    Ok(format!("{}{}", sign, operand))
                }
            },
            Expr::Function(f) => self.function(f),
            Expr::Subquery(q) => Ok(format!("({})", self.query(q)?)),
            Expr::Exists(q) => Ok(format!("EXISTS ({})", self.query(q)?)),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let operand = self.predicate_operand(expr)?;
                let items = self.expr_list(list)?;
                Ok(format!("{} {}IN ({})", operand, not(*negated), items))
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let operand = self.predicate_operand(expr)?;
                let query = self.query(subquery)?;
                Ok(format!("{} {}IN ({})", operand, not(*negated), query))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let operand = self.predicate_operand(expr)?;
                let low = self.predicate_argument(low)?;
                let high = self.predicate_argument(high)?;
                Ok(format!(
                    "{} {}BETWEEN {} AND {}",
                    operand,
                    not(*negated),
                    low,
                    high
                ))
            }
            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                let operand = self.predicate_operand(expr)?;
                let mut sql = format!(
                    "{} {}LIKE {}",
                    operand,
                    not(*negated),
                    self.predicate_argument(pattern)?
                );
                if let Some(escape) = escape {
                    sql.push_str(&format!(" ESCAPE {}", self.predicate_argument(escape)?));
                }
                Ok(sql)
            }
            Expr::IsNull { expr, negated } => {
                let operand = self.predicate_operand(expr)?;
                Ok(format!("{} IS {}NULL", operand, not(*negated)))
            }
            Expr::Case {
                operand,
                whens,
                else_result,
            } => {
                let mut sql = String::from("CASE");
                if let Some(operand) = operand {
                    sql.push_str(&format!(" {}", self.expr(operand)?));
                }
                for when in whens {
                    sql.push_str(&format!(" WHEN {}", self.expr(&when.condition)?));
                    sql.push_str(&format!(" THEN {}", self.expr(&when.result)?));
                }
                if let Some(e) = else_result {
                    sql.push_str(&format!(" ELSE {}", self.expr(e)?));
                }
                sql.push_str(" END");
                Ok(sql)
            }
            Expr::Cast { expr, target } => {
                if *target == LogicalType::Geometry {
                    self.require(Construct::Geometry)?;
                }
                self.require(Construct::CastTo(*target))?;
                let operand = self.expr(expr)?;
                let type_name = self.generator.type_name(target).ok_or(
                    DialectError::Unsupported {
                        construct: Construct::CastTo(*target),
                        dialect: self.generator.dialect().unwrap_or_default(),
                    },
                )?;
                Ok(format!("CAST({} AS {})", operand, type_name))
            }
        }
    }

    fn literal(&self, lit: &Literal) -> Result<String, DialectError> {
        Ok(match lit {
            Literal::Integer(n) => n.to_string(),
            // keep a fractional part so the value reads back as a decimal
            Literal::Decimal(d) if d.scale() == 0 => format!("{}.0", d),
            Literal::Decimal(d) => d.to_string(),
            Literal::String(s) => self.generator.string_literal(s),
            Literal::Boolean(b) => {
                self.require(Construct::BooleanLiteral)?;
                self.generator.bool_literal(*b)
            }
            Literal::Null => "NULL".to_string(),
        })
    }

    fn binary(&mut self, left: &Expr, op: BinaryOp, right: &Expr) -> Result<String, DialectError> {
        if op == BinaryOp::Concat && self.generator.concat_style() == ConcatStyle::Function {
            let l = self.expr(left)?;
            let r = self.expr(right)?;
            return Ok(format!("CONCAT({}, {})", l, r));
        }
        let p = op.precedence();
        let l = self.wrapped(left, left.precedence() < p)?;
        let r = self.wrapped(right, right.precedence() <= p)?;
        Ok(format!("{} {} {}", l, op, r))
    }

    fn function(&mut self, f: &Function) -> Result<String, DialectError> {
        let name = self.generator.function_name(&f.name);
        if f.niladic {
            return Ok(name);
        }
        if f.star {
            return Ok(format!("{}(*)", name));
        }
        let args = self.expr_list(&f.args)?;
        let distinct = if f.distinct { "DISTINCT " } else { "" };
        Ok(format!("{}({}{})", name, distinct, args))
    }

    pub(crate) fn expr_list(&mut self, exprs: &[Expr]) -> Result<String, DialectError> {
        let mut parts = Vec::with_capacity(exprs.len());
        for e in exprs {
            parts.push(self.expr(e)?);
        }
        Ok(parts.join(", "))
    }

    fn wrapped(&mut self, expr: &Expr, parens: bool) -> Result<String, DialectError> {
        let sql = self.expr(expr)?;
        Ok(if parens { format!("({})", sql) } else { sql })
    }

    /// Left side of IS/IN/LIKE/BETWEEN.
    fn predicate_operand(&mut self, expr: &Expr) -> Result<String, DialectError> {
        self.wrapped(expr, expr.precedence() < precedence::COMPARISON)
    }

    /// LIKE pattern, ESCAPE character and BETWEEN bounds.
    fn predicate_argument(&mut self, expr: &Expr) -> Result<String, DialectError> {
        self.wrapped(expr, expr.precedence() <= precedence::COMPARISON)
    }
}

fn not(negated: bool) -> &'static str {
    if negated { "NOT " } else { "" }
}
