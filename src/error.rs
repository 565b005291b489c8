//! Error types for polysql.
//!
//! Every pipeline stage has its own error enum. Lexer, parser, resolver,
//! dialect and generator failures are deterministic and never retried;
//! only [`ExecutionError::ConnectionLost`] and [`ExecutionError::Timeout`]
//! are candidates for a caller-directed retry.

use crate::parser::tokens::Position;
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;
use thiserror::Error;

/// Invalid character sequence in the statement text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lex error at {position}: {message} (found {unexpected:?})")]
pub struct LexError {
    pub position: Position,
    pub unexpected: char,
    pub message: String,
}

impl LexError {
    pub fn new(position: Position, unexpected: char, message: impl Into<String>) -> Self {
        Self {
            position,
            unexpected,
            message: message.into(),
        }
    }
}

/// Failure to build an AST from the token stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parse error at {position}: expected {}, found {found}", expected.join(" or "))]
    Syntax {
        position: Position,
        expected: Vec<String>,
        found: String,
    },

    #[error("Parse error at {position}: nesting deeper than {limit} levels")]
    NestingTooDeep { position: Position, limit: usize },

    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ParseError {
    /// Create a syntax error expecting a single construct.
    pub fn expected(position: Position, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            expected: vec![expected.into()],
            found: found.into(),
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Self::Syntax { position, .. } | Self::NestingTooDeep { position, .. } => *position,
            Self::Lex(err) => err.position,
        }
    }
}

/// Failure to derive column or parameter metadata from the catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("Unknown table '{table}'{}", suggestion_suffix(suggestion))]
    UnknownTable {
        table: String,
        suggestion: Option<String>,
    },

    #[error("Unknown column '{column}'{}", suggestion_suffix(suggestion))]
    UnknownColumn {
        column: String,
        suggestion: Option<String>,
    },

    #[error("Column '{column}' is ambiguous: present in {}", tables.join(", "))]
    AmbiguousColumn { column: String, tables: Vec<String> },

    #[error("Type mismatch in {context}: {left} is not compatible with {right}")]
    TypeMismatch {
        context: String,
        left: LogicalType,
        right: LogicalType,
    },

    #[error("No type evidence for parameter ':{parameter}' at {position}")]
    UnresolvedParameterType {
        parameter: String,
        position: Position,
    },

    #[error("Invalid subquery: {0}")]
    InvalidSubquery(String),

    #[error("Set operation operands have {left} and {right} columns")]
    SetOperationArity { left: usize, right: usize },

    #[error("INSERT INTO {table} gives {values} values for {columns} columns")]
    ValuesArity {
        table: String,
        values: usize,
        columns: usize,
    },

    #[error("Invalid option for parameter ':{parameter}': {message}")]
    InvalidParameterOption { parameter: String, message: String },

    #[error("Invalid option for field '{field}': {message}")]
    InvalidFieldOption { field: String, message: String },

    #[error("Data module reference '#{module}' has not been linked")]
    UnlinkedModule { module: String },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'?", s),
        None => String::new(),
    }
}

impl ResolutionError {
    /// Identifier the error points at, when there is one.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::UnknownTable { table, .. } => Some(table),
            Self::UnknownColumn { column, .. } | Self::AmbiguousColumn { column, .. } => {
                Some(column)
            }
            Self::UnresolvedParameterType { parameter, .. }
            | Self::InvalidParameterOption { parameter, .. } => Some(parameter),
            Self::InvalidFieldOption { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Rendering failure for a construct the target backend cannot express.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DialectError {
    #[error("{construct} is not supported by {dialect}")]
    Unsupported { construct: Construct, dialect: Dialect },
}

/// Failure while executing a data module.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Missing value for parameter ':{name}'")]
    MissingParameter { name: String },

    #[error("Parameter ':{name}' expects {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: LogicalType,
        actual: String,
    },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },

    #[error("Backend error: {raw}")]
    Backend { raw: String },

    #[error("Connection pool error: {message}")]
    Pool { message: String },

    #[error("Data module '{module}' has not been resolved")]
    Unresolved { module: String },

    #[error("Data module '{module}' has no {operation} template")]
    NoTemplate { module: String, operation: String },

    #[error("Data module '{module}' has no page size")]
    NotPaged { module: String },

    #[error("Cannot order by unknown column '{column}'")]
    UnknownOrderColumn { column: String },

    #[error("Paging and ordering apply to queries only")]
    NotAQuery,

    #[error(transparent)]
    Dialect(#[from] DialectError),
}

impl ExecutionError {
    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. } | Self::Timeout { .. })
    }
}

/// Failure while emitting generated artifacts.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Modules {} all map to output '{identifier}'", modules.join(", "))]
    AmbiguousModuleName {
        identifier: String,
        modules: Vec<String>,
    },

    #[error("Data module '{module}' has no resolved metadata")]
    UnresolvedMetadata { module: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to inline one data module into another.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    #[error("Unknown data module '#{module}'{}", suggestion_suffix(suggestion))]
    UnknownModule {
        module: String,
        suggestion: Option<String>,
    },

    #[error("Data module '#{module}' is not a query and cannot be used as a table")]
    NotAQuery { module: String },

    #[error("Cyclic data module reference: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Umbrella error for callers driving the whole pipeline.
#[derive(Debug, Error)]
pub enum PolyError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Dialect(#[from] DialectError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("In module '{module}': {source}")]
    Module {
        module: String,
        #[source]
        source: Box<PolyError>,
    },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PolyError {
    /// Attach the name of the data module the error came from.
    pub fn in_module(module: impl Into<String>, err: impl Into<PolyError>) -> Self {
        Self::Module {
            module: module.into(),
            source: Box::new(err.into()),
        }
    }
}

/// Result type alias for polysql operations.
pub type PolyResult<T> = Result<T, PolyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = ParseError::Syntax {
            position: Position::new(1, 14, 13),
            expected: vec!["table name".into(), "'('".into()],
            found: "end of input".into(),
        };
        assert_eq!(
            err.to_string(),
            "Parse error at line 1, column 14: expected table name or '(', found end of input"
        );
    }

    #[test]
    fn test_unknown_column_suggestion() {
        let err = ResolutionError::UnknownColumn {
            column: "nmae".into(),
            suggestion: Some("name".into()),
        };
        assert_eq!(err.to_string(), "Unknown column 'nmae'. Did you mean 'name'?");
        assert_eq!(err.identifier(), Some("nmae"));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ExecutionError::Timeout { message: "x".into() }.is_retryable());
        assert!(ExecutionError::ConnectionLost { message: "x".into() }.is_retryable());
        assert!(!ExecutionError::ConstraintViolation { message: "x".into() }.is_retryable());
        assert!(
            !ExecutionError::TypeMismatch {
                name: "id".into(),
                expected: LogicalType::Integer,
                actual: "Text".into(),
            }
            .is_retryable()
        );
    }
}
