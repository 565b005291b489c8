//! Token cursor helpers shared by the grammar.

use super::Parser;
use crate::ast::Ident;
use crate::error::ParseError;
use crate::parser::tokens::{Keyword, Token, TokenKind};

impl Parser<'_> {
    pub(crate) fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    /// Token `n` positions ahead; the `Eof` token repeats past the end.
    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn check_keyword(&self, kw: Keyword) -> bool {
        self.peek().is_keyword(kw)
    }

    pub(crate) fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_keyword(&mut self, kw: Keyword) -> Result<Token, ParseError> {
        if self.check_keyword(kw) {
            Ok(self.advance())
        } else {
            Err(self.expected(kw.as_str()))
        }
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.expected(what))
        }
    }

    /// Syntax error at the current token.
    pub(crate) fn expected(&self, what: &str) -> ParseError {
        ParseError::expected(self.peek().position, what, self.peek().describe())
    }

    /// Identifier, quoted identifier, or non-reserved keyword.
    pub(crate) fn parse_identifier(&mut self, what: &str) -> Result<Ident, ParseError> {
        if self.peek().is_identifier_like() {
            Ok(self.advance().into_ident())
        } else {
            Err(self.expected(what))
        }
    }

    /// Optional alias: `AS name` or a bare identifier.
    pub(crate) fn parse_optional_alias(&mut self) -> Result<Option<Ident>, ParseError> {
        if self.eat_keyword(Keyword::AS) {
            return self.parse_identifier("alias").map(Some);
        }
        if self.peek().is_identifier_like() {
            return Ok(Some(self.advance().into_ident()));
        }
        Ok(None)
    }

    /// Run `f` one nesting level deeper, failing past the configured limit.
    pub(crate) fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            let position = self.peek().position;
            self.depth -= 1;
            return Err(ParseError::NestingTooDeep {
                position,
                limit: self.config.max_depth,
            });
        }
        let result = f(self);
        self.depth -= 1;
        result
    }
}
