use crate::ast::{Expr, Ident};
use serde::{Deserialize, Serialize};

/// A complete query: body plus ordering and the logical paging window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub body: SetExpr,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Limit>,
}

impl Query {
    pub fn new(body: SetExpr) -> Self {
        Self {
            body,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// The leftmost SELECT of the body, which names the output columns.
    pub fn first_select(&self) -> &Select {
        self.body.first_select()
    }
}

/// Logical `(offset, count)` pair, whatever syntax it was written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub count: Option<Expr>,
    pub offset: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetExpr {
    Select(Box<Select>),
    SetOperation {
        op: SetOperator,
        all: bool,
        left: Box<SetExpr>,
        right: Box<SetExpr>,
    },
    /// Parenthesized query carrying its own ORDER BY or paging.
    Query(Box<Query>),
}

impl SetExpr {
    pub fn first_select(&self) -> &Select {
        match self {
            Self::Select(s) => s,
            Self::SetOperation { left, .. } => left.first_select(),
            Self::Query(q) => q.first_select(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

impl SetOperator {
    /// INTERSECT binds tighter than UNION and EXCEPT.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Union | Self::Except => 1,
            Self::Intersect => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub from: Vec<TableWithJoins>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

impl Select {
    /// Whether the select groups or aggregates its rows.
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty()
            || self.having.is_some()
            || self.projection.iter().any(|item| match item {
                SelectItem::Expr { expr, .. } => expr.contains_aggregate(),
                _ => false,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Wildcard,
    QualifiedWildcard(Ident),
    Expr { expr: Expr, alias: Option<Ident> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableName {
    pub schema: Option<Ident>,
    pub name: Ident,
}

impl TableName {
    pub fn new(name: impl Into<Ident>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }
}

/// `"schema.table"` or `"table"`.
impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        match name.split_once('.') {
            Some((schema, table)) => TableName {
                schema: Some(schema.into()),
                name: table.into(),
            },
            None => TableName::new(name),
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableFactor {
    Table {
        name: TableName,
        alias: Option<Ident>,
    },
    Derived {
        subquery: Box<Query>,
        alias: Option<Ident>,
    },
    /// `#name`: another data module, replaced by its query when modules are linked.
    Module {
        name: String,
        alias: Option<Ident>,
    },
}

impl TableFactor {
    pub fn table(name: impl Into<Ident>) -> Self {
        Self::Table {
            name: TableName::new(name),
            alias: None,
        }
    }

    /// Name the relation is visible under in its scope.
    pub fn visible_name(&self) -> Option<&str> {
        match self {
            Self::Table { name, alias } => Some(alias.as_deref().unwrap_or(name.name.as_str())),
            Self::Derived { alias, .. } | Self::Module { alias, .. } => alias.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableWithJoins {
    pub relation: TableFactor,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub relation: TableFactor,
    pub kind: JoinKind,
    pub constraint: JoinConstraint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<Ident>),
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByExpr {
    pub expr: Expr,
    /// `None` when no direction was written.
    pub asc: Option<bool>,
    pub nulls_first: Option<bool>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            asc: None,
            nulls_first: None,
        }
    }
}
