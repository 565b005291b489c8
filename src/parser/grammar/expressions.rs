//! Pratt parser for expressions.
//!
//! Binding powers (low to high): OR, AND, NOT, comparison and the
//! IS/IN/LIKE/BETWEEN predicates, `||`, `+ -`, `* / %`, unary sign, `::`.

use super::Parser;
use crate::ast::*;
use crate::error::ParseError;
use crate::parser::tokens::{Keyword, TokenKind};
use crate::transpiler::types::{TypeArg, parse_type_name};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Words that extend a multi-word type name such as `DOUBLE PRECISION`.
const TYPE_NAME_CONTINUATIONS: &[&str] = &[
    "PRECISION", "VARYING", "WITH", "WITHOUT", "LOCAL", "TIME", "ZONE", "LARGE", "OBJECT",
    "VARCHAR", "VARBINARY", "RAW", "FOR", "BIT", "DATA",
];

/// Functions written without parentheses.
const NILADIC_FUNCTIONS: &[&str] = &["CURRENT_DATE", "CURRENT_TIMESTAMP", "CURRENT_TIME"];

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Keyword(Keyword::OR) => BinaryOp::Or,
        TokenKind::Keyword(Keyword::AND) => BinaryOp::And,
        TokenKind::Eq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::NotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::Concat => BinaryOp::Concat,
        TokenKind::Plus => BinaryOp::Plus,
        TokenKind::Minus => BinaryOp::Minus,
        TokenKind::Star => BinaryOp::Multiply,
        TokenKind::Slash => BinaryOp::Divide,
        TokenKind::Percent => BinaryOp::Modulo,
        _ => return None,
    })
}

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_expr_bp(0)
    }

    pub(crate) fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    pub(crate) fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;
        loop {
            if let Some(op) = binary_op(&self.peek().kind) {
                let bp = op.precedence();
                if bp < min_bp {
                    break;
                }
                self.advance();
                let rhs = self.parse_expr_bp(bp + 1)?;
                lhs = Expr::binary(lhs, op, rhs);
                continue;
            }

            match self.peek().kind {
                TokenKind::DoubleColon if precedence::CAST >= min_bp => {
                    self.advance();
                    let target = self.parse_type()?;
                    lhs = Expr::Cast {
                        expr: Box::new(lhs),
                        target,
                    };
                }
                TokenKind::Keyword(Keyword::IS) if precedence::COMPARISON >= min_bp => {
                    self.advance();
                    let negated = self.eat_keyword(Keyword::NOT);
                    self.expect_keyword(Keyword::NULL)?;
                    lhs = Expr::IsNull {
                        expr: Box::new(lhs),
                        negated,
                    };
                }
                TokenKind::Keyword(Keyword::NOT)
                    if precedence::COMPARISON >= min_bp && self.predicate_follows(1) =>
                {
                    self.advance();
                    lhs = self.parse_predicate(lhs, true)?;
                }
                TokenKind::Keyword(Keyword::IN | Keyword::LIKE | Keyword::BETWEEN)
                    if precedence::COMPARISON >= min_bp =>
                {
                    lhs = self.parse_predicate(lhs, false)?;
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn predicate_follows(&self, n: usize) -> bool {
        matches!(
            self.peek_nth(n).kind,
            TokenKind::Keyword(Keyword::IN | Keyword::LIKE | Keyword::BETWEEN)
        )
    }

    /// `IN (...)`, `LIKE pattern [ESCAPE e]` or `BETWEEN low AND high`.
    fn parse_predicate(&mut self, lhs: Expr, negated: bool) -> Result<Expr, ParseError> {
        let operand_bp = precedence::COMPARISON + 1;
        let expr = Box::new(lhs);
        if self.eat_keyword(Keyword::IN) {
            self.expect(TokenKind::LParen, "'('")?;
            if self.check_keyword(Keyword::SELECT) {
                let subquery = self.nested(|p| p.parse_query())?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(Expr::InSubquery {
                    expr,
                    subquery: Box::new(subquery),
                    negated,
                });
            }
            let list = self.nested(|p| p.parse_expr_list())?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::InList {
                expr,
                list,
                negated,
            });
        }
        if self.eat_keyword(Keyword::LIKE) {
            let pattern = Box::new(self.parse_expr_bp(operand_bp)?);
            let escape = if self.eat_keyword(Keyword::ESCAPE) {
                Some(Box::new(self.parse_expr_bp(operand_bp)?))
            } else {
                None
            };
            return Ok(Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            });
        }
        self.expect_keyword(Keyword::BETWEEN)?;
        let low = Box::new(self.parse_expr_bp(operand_bp)?);
        self.expect_keyword(Keyword::AND)?;
        let high = Box::new(self.parse_expr_bp(operand_bp)?);
        Ok(Expr::Between {
            expr,
            low,
            high,
            negated,
        })
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Keyword(Keyword::NOT) => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.parse_primary(),
        };
        let bp = match op {
            UnaryOp::Not => precedence::NOT,
            _ => precedence::UNARY,
        };
        self.nested(|p| {
            p.advance();
            let expr = p.parse_expr_bp(bp)?;
            Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            })
        })
    }

    pub(crate) fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Number => {
                self.advance();
                parse_number(&tok.lexeme)
                    .map(Expr::Literal)
                    .ok_or_else(|| ParseError::expected(tok.position, "number", tok.describe()))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Literal(Literal::String(tok.lexeme)))
            }
            TokenKind::Keyword(Keyword::TRUE) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::Keyword(Keyword::FALSE) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::Keyword(Keyword::NULL) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::NamedParameter => {
                self.advance();
                Ok(Expr::Parameter(Param {
                    name: tok.lexeme,
                    position: tok.position,
                }))
            }
            TokenKind::Placeholder => Err(self.expected("named parameter (:name)")),
            TokenKind::LParen => self.nested(|p| {
                p.advance();
                if p.check_keyword(Keyword::SELECT) {
                    let query = p.parse_query()?;
                    p.expect(TokenKind::RParen, "')'")?;
                    return Ok(Expr::Subquery(Box::new(query)));
                }
                let expr = p.parse_expr()?;
                p.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }),
            TokenKind::Keyword(Keyword::EXISTS) => {
                self.advance();
                self.expect(TokenKind::LParen, "'('")?;
                let query = self.nested(|p| p.parse_query())?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Expr::Exists(Box::new(query)))
            }
            TokenKind::Keyword(Keyword::CASE) => self.nested(|p| p.parse_case()),
            TokenKind::Keyword(Keyword::CAST) => {
                self.advance();
                self.expect(TokenKind::LParen, "'('")?;
                let expr = self.nested(|p| p.parse_expr())?;
                self.expect_keyword(Keyword::AS)?;
                let target = self.parse_type()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Expr::Cast {
                    expr: Box::new(expr),
                    target,
                })
            }
            TokenKind::Keyword(Keyword::LEFT | Keyword::RIGHT)
                if self.peek_nth(1).kind == TokenKind::LParen =>
            {
                self.advance();
                self.parse_function(tok.lexeme)
            }
            _ if tok.is_identifier_like() => {
                self.advance();
                if self.peek().kind == TokenKind::LParen {
                    return self.parse_function(tok.lexeme);
                }
                if self.eat(&TokenKind::Dot) {
                    let name = self.parse_identifier("column name")?;
                    return Ok(Expr::qualified(tok.into_ident(), name));
                }
                let upper = tok.lexeme.to_ascii_uppercase();
                if tok.kind == TokenKind::Identifier && NILADIC_FUNCTIONS.contains(&upper.as_str())
                {
                    let mut function = Function::new(upper, Vec::new());
                    function.niladic = true;
                    return Ok(Expr::Function(function));
                }
                Ok(Expr::column(tok.into_ident()))
            }
            _ => Err(self.expected("expression")),
        }
    }

    /// Function call after its name; the current token is `(`.
    fn parse_function(&mut self, name: String) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut function = Function::new(name, Vec::new());
        if self.eat(&TokenKind::Star) {
            function.star = true;
        } else if self.peek().kind != TokenKind::RParen {
            function.distinct = self.eat_keyword(Keyword::DISTINCT);
            if !function.distinct {
                self.eat_keyword(Keyword::ALL);
            }
            function.args = self.nested(|p| p.parse_expr_list())?;
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(normalize_function(function))
    }

    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword(Keyword::CASE)?;
        let operand = if self.check_keyword(Keyword::WHEN) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut whens = Vec::new();
        while self.eat_keyword(Keyword::WHEN) {
            let condition = self.parse_expr()?;
            self.expect_keyword(Keyword::THEN)?;
            let result = self.parse_expr()?;
            whens.push(WhenClause { condition, result });
        }
        if whens.is_empty() {
            return Err(self.expected("WHEN"));
        }
        let else_result = if self.eat_keyword(Keyword::ELSE) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::END)?;
        Ok(Expr::Case {
            operand,
            whens,
            else_result,
        })
    }

    /// Native type name with optional arguments, e.g. `DECIMAL(10, 2)` or
    /// `TIMESTAMP WITH TIME ZONE`, mapped to a logical type.
    pub(crate) fn parse_type(&mut self) -> Result<crate::types::LogicalType, ParseError> {
        let start = self.peek().clone();
        let mut words = Vec::new();
        let mut args = Vec::new();
        loop {
            let tok = self.peek();
            let continues = words.is_empty()
                || TYPE_NAME_CONTINUATIONS.contains(&tok.lexeme.to_ascii_uppercase().as_str());
            if matches!(tok.kind, TokenKind::Identifier | TokenKind::Keyword(_))
                && tok.is_identifier_like()
                && continues
            {
                words.push(self.advance().lexeme.to_ascii_uppercase());
            } else if tok.kind == TokenKind::LParen && !words.is_empty() && args.is_empty() {
                self.advance();
                loop {
                    let arg = self.advance();
                    match arg.kind {
                        TokenKind::Number => match arg.lexeme.parse() {
                            Ok(n) => args.push(TypeArg::Number(n)),
                            Err(_) => {
                                return Err(ParseError::expected(
                                    arg.position,
                                    "type length",
                                    arg.describe(),
                                ));
                            }
                        },
                        TokenKind::Identifier if arg.lexeme.eq_ignore_ascii_case("MAX") => {
                            args.push(TypeArg::Max)
                        }
                        _ => {
                            return Err(ParseError::expected(
                                arg.position,
                                "type length",
                                arg.describe(),
                            ));
                        }
                    }
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')'")?;
            } else {
                break;
            }
        }
        if words.is_empty() {
            return Err(ParseError::expected(start.position, "type name", start.describe()));
        }
        let name = words.join(" ");
        parse_type_name(self.dialect, &name, &args)
            .ok_or_else(|| ParseError::expected(start.position, "known type name", name))
    }
}

fn parse_number(text: &str) -> Option<Literal> {
    if text.contains(['.', 'e', 'E']) {
        return Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
            .map(Literal::Decimal);
    }
    match text.parse::<i64>() {
        Ok(n) => Some(Literal::Integer(n)),
        Err(_) => Decimal::from_str(text).ok().map(Literal::Decimal),
    }
}

/// Spellings that mean the same function in every dialect collapse to one name.
fn normalize_function(mut function: Function) -> Expr {
    match function.name.clone().as_str() {
        "LEN" => function.name = "LENGTH".into(),
        "SUBSTR" => function.name = "SUBSTRING".into(),
        "CONCAT" if !function.distinct => match <[Expr; 2]>::try_from(function.args) {
            Ok([left, right]) => return Expr::binary(left, BinaryOp::Concat, right),
            Err(args) => function.args = args,
        },
        _ => {}
    }
    Expr::Function(function)
}
