use crate::ast::{Ident, Query};
use crate::parser::tokens::Position;
use crate::types::LogicalType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal value written in the statement text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Boolean(bool),
    Null,
}

/// Reference to a `:name` parameter.
///
/// The source position is kept for diagnostics and ordering but does not
/// take part in equality, so structurally equal trees compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub position: Position,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Position::default(),
        }
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Concat,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    /// Binding power, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => {
                precedence::COMPARISON
            }
            Self::Concat => 5,
            Self::Plus | Self::Minus => 6,
            Self::Multiply | Self::Divide | Self::Modulo => 7,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == precedence::COMPARISON
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Plus | Self::Minus | Self::Multiply | Self::Divide | Self::Modulo
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Or => "OR",
            Self::And => "AND",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Concat => "||",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

/// Binding powers shared by the parser and the renderer.
pub mod precedence {
    pub const NOT: u8 = 3;
    pub const COMPARISON: u8 = 4;
    pub const UNARY: u8 = 8;
    pub const CAST: u8 = 9;
    pub const ATOM: u8 = 10;
}

/// Function call. Names are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
    /// `COUNT(*)`
    pub star: bool,
    /// Written without parentheses, like `CURRENT_DATE`.
    pub niladic: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            args,
            distinct: false,
            star: false,
            niladic: false,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.name.as_str(),
            "COUNT" | "SUM" | "AVG" | "MIN" | "MAX"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    Column {
        qualifier: Option<Ident>,
        name: Ident,
    },
    Parameter(Param),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Function(Function),
    /// Scalar subquery.
    Subquery(Box<Query>),
    Exists(Box<Query>),
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Case {
        operand: Option<Box<Expr>>,
        whens: Vec<WhenClause>,
        else_result: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        target: LogicalType,
    },
}

impl Expr {
    pub fn column(name: impl Into<Ident>) -> Self {
        Self::Column {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn qualified(qualifier: impl Into<Ident>, name: impl Into<Ident>) -> Self {
        Self::Column {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }

    pub fn param(name: impl Into<String>) -> Self {
        Self::Parameter(Param::new(name))
    }

    pub fn integer(n: i64) -> Self {
        Self::Literal(Literal::Integer(n))
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Self::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Binding power of the node's outermost operator.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Binary { op, .. } => op.precedence(),
            Self::Unary { op: UnaryOp::Not, .. } => precedence::NOT,
            Self::Unary { .. } => precedence::UNARY,
            Self::Literal(Literal::Integer(n)) if *n < 0 => precedence::UNARY,
            Self::Literal(Literal::Decimal(d)) if d.is_sign_negative() => precedence::UNARY,
            Self::InList { .. }
            | Self::InSubquery { .. }
            | Self::Between { .. }
            | Self::Like { .. }
            | Self::IsNull { .. } => precedence::COMPARISON,
            _ => precedence::ATOM,
        }
    }

    /// Whether the expression contains an aggregate call outside any subquery.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk_shallow(&mut |e| {
            if let Expr::Function(f) = e {
                found |= f.is_aggregate();
            }
        });
        found
    }

    /// Visit this node and its descendants, not descending into subqueries.
    pub fn walk_shallow(&self, visit: &mut dyn FnMut(&Expr)) {
        visit(self);
        match self {
            Self::Binary { left, right, .. } => {
                left.walk_shallow(visit);
                right.walk_shallow(visit);
            }
            Self::Unary { expr, .. } | Self::IsNull { expr, .. } | Self::Cast { expr, .. } => {
                expr.walk_shallow(visit)
            }
            Self::Function(f) => f.args.iter().for_each(|a| a.walk_shallow(visit)),
            Self::InList { expr, list, .. } => {
                expr.walk_shallow(visit);
                list.iter().for_each(|e| e.walk_shallow(visit));
            }
            Self::InSubquery { expr, .. } => expr.walk_shallow(visit),
            Self::Between {
                expr, low, high, ..
            } => {
                expr.walk_shallow(visit);
                low.walk_shallow(visit);
                high.walk_shallow(visit);
            }
            Self::Like {
                expr,
                pattern,
                escape,
                ..
            } => {
                expr.walk_shallow(visit);
                pattern.walk_shallow(visit);
                if let Some(e) = escape {
                    e.walk_shallow(visit);
                }
            }
            Self::Case {
                operand,
                whens,
                else_result,
            } => {
                if let Some(o) = operand {
                    o.walk_shallow(visit);
                }
                for w in whens {
                    w.condition.walk_shallow(visit);
                    w.result.walk_shallow(visit);
                }
                if let Some(e) = else_result {
                    e.walk_shallow(visit);
                }
            }
            Self::Literal(_)
            | Self::Column { .. }
            | Self::Parameter(_)
            | Self::Subquery(_)
            | Self::Exists(_) => {}
        }
    }
}

impl From<Literal> for Expr {
    fn from(lit: Literal) -> Self {
        Expr::Literal(lit)
    }
}
