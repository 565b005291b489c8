//! Token types produced by the lexer.

use crate::ast::Ident;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location in the statement text. Line and column are 1-based and count
/// characters; `offset` is the 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Position after consuming `text`.
    pub fn advance(self, text: &str) -> Self {
        let mut next = self;
        for c in text.chars() {
            if c == '\n' {
                next.line += 1;
                next.column = 1;
            } else {
                next.column += 1;
            }
        }
        next.offset += text.len();
        next
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

macro_rules! keywords {
    (reserved: [$($r:ident),* $(,)?], unreserved: [$($u:ident),* $(,)?]) => {
        /// SQL keywords known to the grammar.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($r,)*
            $($u,)*
        }

        impl Keyword {
            pub fn lookup(word: &str) -> Option<Keyword> {
                let upper = word.to_ascii_uppercase();
                match upper.as_str() {
                    $(stringify!($r) => Some(Keyword::$r),)*
                    $(stringify!($u) => Some(Keyword::$u),)*
                    _ => None,
                }
            }

            /// Reserved keywords cannot be used as bare identifiers or aliases.
            pub fn is_reserved(&self) -> bool {
                match self {
                    $(Keyword::$r => true,)*
                    $(Keyword::$u => false,)*
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Keyword::$r => stringify!($r),)*
                    $(Keyword::$u => stringify!($u),)*
                }
            }
        }
    };
}

keywords! {
    reserved: [
        SELECT, FROM, WHERE, AND, OR, NOT, AS, ON, JOIN, INNER, LEFT, RIGHT, FULL,
        OUTER, CROSS, USING, GROUP, BY, HAVING, ORDER, ASC, DESC, LIMIT, OFFSET,
        FETCH, UNION, INTERSECT, EXCEPT, MINUS, ALL, DISTINCT, INSERT, INTO,
        VALUES, UPDATE, SET, DELETE, RETURNING, NULL, TRUE, FALSE, IS, IN, LIKE,
        ESCAPE, BETWEEN, EXISTS, CASE, WHEN, THEN, ELSE, END, CAST,
    ],
    unreserved: [FIRST, LAST, NEXT, ROW, ROWS, ONLY, NULLS, TOP]
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier,
    QuotedIdentifier,
    String,
    Number,
    /// `:name`; the lexeme holds the name without the colon.
    NamedParameter,
    /// Positional placeholder (`?`, `$1`, `:1`). Recognized but not accepted by the grammar.
    Placeholder,
    /// `#reports/pets`; the lexeme holds the module name without the `#`.
    ModuleReference,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Concat,
    LParen,
    RParen,
    Comma,
    Dot,
    Semicolon,
    DoubleColon,
    Eof,
}

/// A lexed token. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier text, decoded string content, number text, or operator text.
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }

    /// The token as a name, remembering whether it was quoted.
    pub fn into_ident(self) -> Ident {
        if self.kind == TokenKind::QuotedIdentifier {
            Ident::quoted(self.lexeme)
        } else {
            Ident::new(self.lexeme)
        }
    }

    /// Whether the token can name a table, column or alias.
    pub fn is_identifier_like(&self) -> bool {
        match &self.kind {
            TokenKind::Identifier | TokenKind::QuotedIdentifier => true,
            TokenKind::Keyword(kw) => !kw.is_reserved(),
            _ => false,
        }
    }

    /// Human readable description for error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Keyword(kw) => format!("keyword {}", kw),
            TokenKind::Identifier | TokenKind::QuotedIdentifier => {
                format!("identifier '{}'", self.lexeme)
            }
            TokenKind::String => format!("string '{}'", self.lexeme),
            TokenKind::Number => format!("number {}", self.lexeme),
            TokenKind::NamedParameter => format!("parameter :{}", self.lexeme),
            TokenKind::Placeholder => format!("positional placeholder '{}'", self.lexeme),
            TokenKind::ModuleReference => format!("module reference #{}", self.lexeme),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(Keyword::lookup("select"), Some(Keyword::SELECT));
        assert_eq!(Keyword::lookup("Rows"), Some(Keyword::ROWS));
        assert_eq!(Keyword::lookup("pets"), None);
        assert!(Keyword::LIMIT.is_reserved());
        assert!(!Keyword::TOP.is_reserved());
    }

    #[test]
    fn test_position_advance() {
        let p = Position::default().advance("ab\ncd");
        assert_eq!(p, Position::new(2, 3, 5));
    }
}
