//! SQL tokenizer built from nom recognizers.
//!
//! The [`Lexer`] is a lazy iterator: each call to `next` recognizes one
//! token, skipping whitespace and comments while keeping line and column
//! tracking intact. It yields exactly one [`TokenKind::Eof`] token and can be
//! restarted from the beginning.

use crate::error::LexError;
use crate::parser::tokens::{Keyword, Position, Token, TokenKind};
use crate::transpiler::Dialect;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while, take_while1},
    character::complete::{anychar, char, digit0, digit1, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    multi::fold_many0,
    sequence::{delimited, pair, preceded, tuple},
};

/// Which quoting characters the lexer accepts for identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteStyle {
    pub backtick: bool,
    pub brackets: bool,
    /// MySQL treats `\` inside string literals as an escape character.
    pub backslash_escapes: bool,
}

impl QuoteStyle {
    /// Accepts every quoting style; used by the dialect-neutral grammar.
    pub const GENERIC: QuoteStyle = QuoteStyle {
        backtick: true,
        brackets: true,
        backslash_escapes: false,
    };

    pub fn for_dialect(dialect: Option<Dialect>) -> Self {
        match dialect {
            None => Self::GENERIC,
            Some(Dialect::MySql) => QuoteStyle {
                backtick: true,
                brackets: false,
                backslash_escapes: true,
            },
            Some(Dialect::SqlServer) => QuoteStyle {
                backtick: false,
                brackets: true,
                backslash_escapes: false,
            },
            Some(_) => QuoteStyle {
                backtick: false,
                brackets: false,
                backslash_escapes: false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    rest: &'a str,
    position: Position,
    style: QuoteStyle,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_style(source, QuoteStyle::GENERIC)
    }

    pub fn with_style(source: &'a str, style: QuoteStyle) -> Self {
        Self {
            source,
            rest: source,
            position: Position::default(),
            style,
            finished: false,
        }
    }

    /// Rewind to the start of the source text.
    pub fn restart(&mut self) {
        self.rest = self.source;
        self.position = Position::default();
        self.finished = false;
    }

    fn consume(&mut self, len: usize) {
        let (taken, rest) = self.rest.split_at(len);
        self.position = self.position.advance(taken);
        self.rest = rest;
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            let before = self.rest.len();
            if let Ok((rest, _)) = trivia(self.rest) {
                let len = self.rest.len() - rest.len();
                self.consume(len);
            }
            if self.rest.starts_with("/*") {
                return Err(LexError::new(self.position, '/', "unterminated block comment"));
            }
            if self.rest.len() == before {
                return Ok(());
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        let start = self.position;
        if self.rest.is_empty() {
            return Ok(Token::new(TokenKind::Eof, "", start));
        }
        match token(self.rest, self.style) {
            Ok((rest, (kind, lexeme))) => {
                let len = self.rest.len() - rest.len();
                self.consume(len);
                Ok(Token::new(kind, lexeme, start))
            }
            Err(_) => Err(self.failure(start)),
        }
    }

    fn failure(&self, position: Position) -> LexError {
        let c = self.rest.chars().next().unwrap_or('\0');
        let message = match c {
            '\'' => "unterminated string literal",
            '"' | '`' | '[' => "unterminated quoted identifier",
            ':' => "expected parameter name after ':'",
            '#' => "expected module name after '#'",
            _ => "unexpected character",
        };
        LexError::new(position, c, message)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(tok) if tok.kind == TokenKind::Eof => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

/// Tokenize the whole input, ending with the `Eof` token.
pub fn tokenize(source: &str, style: QuoteStyle) -> Result<Vec<Token>, LexError> {
    Lexer::with_style(source, style).collect()
}

fn trivia(input: &str) -> IResult<&str, ()> {
    value(
        (),
        nom::multi::many1_count(alt((
            value((), take_while1(|c: char| c.is_whitespace())),
            value((), pair(tag("--"), take_while(|c: char| c != '\n'))),
            value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ))),
    )(input)
}

fn token(input: &str, style: QuoteStyle) -> IResult<&str, (TokenKind, String)> {
    alt((
        |i| string_literal(i, style.backslash_escapes),
        number,
        parameter,
        module_reference,
        |i| quoted_identifier(i, style),
        word,
        operator,
    ))(input)
}

fn string_literal(input: &str, backslash_escapes: bool) -> IResult<&str, (TokenKind, String)> {
    let stop = if backslash_escapes { "'\\" } else { "'" };
    map(
        delimited(
            char('\''),
            fold_many0(
                alt((
                    map(is_not(stop), str::to_string),
                    value("'".to_string(), tag("''")),
                    map(
                        preceded(char('\\'), anychar),
                        |c| match c {
                            'n' => "\n".to_string(),
                            't' => "\t".to_string(),
                            'r' => "\r".to_string(),
                            '0' => "\0".to_string(),
                            other => other.to_string(),
                        },
                    ),
                )),
                String::new,
                |mut acc, part| {
                    acc.push_str(&part);
                    acc
                },
            ),
            char('\''),
        ),
        |s| (TokenKind::String, s),
    )(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn number(input: &str) -> IResult<&str, (TokenKind, String)> {
    map(
        alt((
            recognize(tuple((
                digit1,
                opt(pair(char('.'), digit0)),
                opt(exponent),
            ))),
            recognize(tuple((char('.'), digit1, opt(exponent)))),
        )),
        |s: &str| (TokenKind::Number, s.to_string()),
    )(input)
}

fn parameter_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn parameter(input: &str) -> IResult<&str, (TokenKind, String)> {
    alt((
        map(tag("::"), |s: &str| (TokenKind::DoubleColon, s.to_string())),
        map(preceded(char(':'), parameter_name), |name: &str| {
            (TokenKind::NamedParameter, name.to_string())
        }),
        map(recognize(pair(one_of(":$"), digit1)), |s: &str| {
            (TokenKind::Placeholder, s.to_string())
        }),
        map(tag("?"), |s: &str| (TokenKind::Placeholder, s.to_string())),
    ))(input)
}

/// `#name` or `#dir/name`, naming another data module.
fn module_reference(input: &str) -> IResult<&str, (TokenKind, String)> {
    map(
        preceded(
            char('#'),
            recognize(pair(
                parameter_name,
                nom::multi::many0_count(pair(char('/'), parameter_name)),
            )),
        ),
        |name: &str| (TokenKind::ModuleReference, name.to_string()),
    )(input)
}

fn quoted(open: char, close: char) -> impl FnMut(&str) -> IResult<&str, String> {
    let close_str = close.to_string();
    let doubled = format!("{}{}", close, close);
    move |input| {
        delimited(
            char(open),
            fold_many0(
                alt((
                    map(is_not(close_str.as_str()), str::to_string),
                    map(tag(doubled.as_str()), |_| close.to_string()),
                )),
                String::new,
                |mut acc, part| {
                    acc.push_str(&part);
                    acc
                },
            ),
            char(close),
        )(input)
    }
}

fn quoted_identifier(input: &str, style: QuoteStyle) -> IResult<&str, (TokenKind, String)> {
    let first = input.chars().next();
    let result = match first {
        Some('"') => quoted('"', '"')(input),
        Some('`') if style.backtick => quoted('`', '`')(input),
        Some('[') if style.brackets => quoted('[', ']')(input),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        ))),
    };
    result.map(|(rest, name)| (rest, (TokenKind::QuotedIdentifier, name)))
}

fn word(input: &str) -> IResult<&str, (TokenKind, String)> {
    map(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
        )),
        |w: &str| match Keyword::lookup(w) {
            Some(kw) => (TokenKind::Keyword(kw), w.to_string()),
            None => (TokenKind::Identifier, w.to_string()),
        },
    )(input)
}

fn operator(input: &str) -> IResult<&str, (TokenKind, String)> {
    let two = alt((
        map(tag("<>"), |_| TokenKind::NotEq),
        map(tag("!="), |_| TokenKind::NotEq),
        map(tag("<="), |_| TokenKind::LtEq),
        map(tag(">="), |_| TokenKind::GtEq),
        map(tag("||"), |_| TokenKind::Concat),
    ));
    let one = map(one_of("=<>+-*/%(),.;"), |c| match c {
        '=' => TokenKind::Eq,
        '<' => TokenKind::Lt,
        '>' => TokenKind::Gt,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        '%' => TokenKind::Percent,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        _ => TokenKind::Semicolon,
    });
    let (rest, kind) = alt((two, one))(input)?;
    let text = &input[..input.len() - rest.len()];
    Ok((rest, (kind, text.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql, QuoteStyle::GENERIC)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_named_parameter_token() {
        let tokens = tokenize("owner_id = :ownerId", QuoteStyle::GENERIC).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::NamedParameter);
        assert_eq!(tokens[2].lexeme, "ownerId");
        assert_eq!(tokens[2].position, Position::new(1, 12, 11));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_positional_placeholders_are_distinct() {
        assert_eq!(
            kinds("? :1 $2"),
            vec![
                TokenKind::Placeholder,
                TokenKind::Placeholder,
                TokenKind::Placeholder,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_double_colon_cast() {
        assert_eq!(
            kinds("a::int"),
            vec![
                TokenKind::Identifier,
                TokenKind::DoubleColon,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_keep_positions() {
        let tokens = tokenize("-- header\nSELECT /* x\n y */ a", QuoteStyle::GENERIC).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::SELECT));
        assert_eq!(tokens[0].position, Position::new(2, 1, 10));
        assert_eq!(tokens[1].lexeme, "a");
        assert_eq!(tokens[1].position.line, 3);
        assert_eq!(tokens[1].position.column, 7);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize("'it''s'", QuoteStyle::GENERIC).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "it's");

        let mysql = QuoteStyle::for_dialect(Some(Dialect::MySql));
        let tokens = tokenize(r"'a\\b\'c'", mysql).unwrap();
        assert_eq!(tokens[0].lexeme, r"a\b'c");
    }

    #[test]
    fn test_quoted_identifiers() {
        let tokens = tokenize(r#""Order ""Lines""" [x y] `z`"#, QuoteStyle::GENERIC).unwrap();
        assert_eq!(tokens[0].lexeme, r#"Order "Lines""#);
        assert_eq!(tokens[1].lexeme, "x y");
        assert_eq!(tokens[2].lexeme, "z");
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::QuotedIdentifier));
    }

    #[test]
    fn test_module_reference() {
        let tokens = tokenize("FROM #reports/pets_by_owner p", QuoteStyle::GENERIC).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::ModuleReference);
        assert_eq!(tokens[1].lexeme, "reports/pets_by_owner");
        assert_eq!(tokens[2].lexeme, "p");

        let err = tokenize("FROM # pets", QuoteStyle::GENERIC).unwrap_err();
        assert_eq!(err.message, "expected module name after '#'");
    }

    #[test]
    fn test_backtick_rejected_outside_mysql() {
        let pg = QuoteStyle::for_dialect(Some(Dialect::PostgreSql));
        let err = tokenize("`a`", pg).unwrap_err();
        assert_eq!(err.unexpected, '`');
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("SELECT 'abc", QuoteStyle::GENERIC).unwrap_err();
        assert_eq!(err.position, Position::new(1, 8, 7));
        assert_eq!(err.unexpected, '\'');
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn test_unterminated_comment() {
        let err = tokenize("SELECT /* open", QuoteStyle::GENERIC).unwrap_err();
        assert_eq!(err.message, "unterminated block comment");
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("1 2.50 .5 1e3", QuoteStyle::GENERIC).unwrap();
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["1", "2.50", ".5", "1e3", ""]);
    }

    #[test]
    fn test_lexer_is_restartable() {
        let mut lexer = Lexer::new("SELECT 1");
        let first: Vec<_> = lexer.by_ref().collect();
        assert!(lexer.next().is_none());
        lexer.restart();
        let second: Vec<_> = lexer.collect();
        assert_eq!(first, second);
        assert_eq!(second.len(), 3);
    }
}
