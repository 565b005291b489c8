//! Generator trait and identifier quoting.

use crate::ast::{Ident, SetOperator};
use crate::parser::tokens::Keyword;
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;

/// Words quoted even though the grammar accepts them bare, because some
/// backend reserves them.
pub const RESERVED_WORDS: &[&str] = &[
    "user",
    "table",
    "index",
    "key",
    "primary",
    "foreign",
    "references",
    "default",
    "constraint",
    "check",
    "create",
    "alter",
    "drop",
    "grant",
    "level",
    "size",
    "uid",
    "comment",
    "current_date",
    "current_time",
    "current_timestamp",
];

/// Whether `name` can be written without quotes in every grammar.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && Keyword::lookup(name).is_none()
        && !RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str())
}

/// Quote an identifier with `open`/`close` when it is not plain, doubling
/// any embedded closing character.
pub fn escape_identifier(name: &str, open: char, close: char) -> String {
    if is_plain_identifier(name) {
        return name.to_string();
    }
    delimit_identifier(name, open, close)
}

/// Always quote, doubling any embedded closing character.
pub fn delimit_identifier(name: &str, open: char, close: char) -> String {
    let doubled: String = [close, close].iter().collect();
    format!(
        "{}{}{}",
        open,
        name.replace(close, &doubled),
        close
    )
}

/// How a backend spells the logical paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingStyle {
    /// `LIMIT n OFFSET m`; offset-only is `OFFSET m` or `OFFSET m ROWS`.
    LimitOffset { offset_rows: bool },
    /// `LIMIT n OFFSET m`; offset-only needs the maximum row count.
    MySqlLimit,
    /// `SELECT TOP (n)` or `OFFSET m ROWS FETCH NEXT n ROWS ONLY`.
    TopOrFetchNext,
    /// Nested selects filtering on `ROWNUM`.
    RowNum,
    /// `OFFSET m ROWS FETCH FIRST n ROWS ONLY`.
    FetchFirst,
}

/// How `a || b` is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStyle {
    Operator,
    Function,
}

/// Dialect-specific SQL generation.
pub trait SqlGenerator: Send + Sync {
    /// Backend this generator targets; `None` for the neutral form.
    fn dialect(&self) -> Option<Dialect>;

    /// Opening and closing identifier quote characters.
    fn delimiters(&self) -> (char, char) {
        ('"', '"')
    }

    /// Quote an identifier (table, column or alias) when needed. Names
    /// written quoted stay quoted so their case survives folding.
    fn quote_identifier(&self, ident: &Ident) -> String {
        let (open, close) = self.delimiters();
        if ident.quoted {
            delimit_identifier(&ident.value, open, close)
        } else {
            escape_identifier(&ident.value, open, close)
        }
    }

    /// Bind marker for the 1-based placeholder `index`.
    fn placeholder(&self, index: usize) -> String;

    fn supports(&self, construct: Construct) -> bool;

    /// Native name for a CAST target, `None` when the backend has no such type.
    fn type_name(&self, ty: &LogicalType) -> Option<String>;

    fn paging(&self) -> PagingStyle;

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Operator
    }

    /// Backend spelling of a normalized function name.
    fn function_name(&self, name: &str) -> String {
        name.to_string()
    }

    /// Table to select from when a query has no FROM clause.
    fn dummy_table(&self) -> Option<&'static str> {
        None
    }

    fn set_operator(&self, op: SetOperator) -> &'static str {
        match op {
            SetOperator::Union => "UNION",
            SetOperator::Intersect => "INTERSECT",
            SetOperator::Except => "EXCEPT",
        }
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn bool_literal(&self, value: bool) -> String {
        if value { "TRUE".into() } else { "FALSE".into() }
    }
}

/// Type names shared by the standard-leaning backends.
pub(crate) fn standard_type_name(ty: &LogicalType) -> String {
    match ty {
        LogicalType::Integer => "BIGINT".into(),
        LogicalType::Decimal(Some((p, s))) => format!("DECIMAL({}, {})", p, s),
        LogicalType::Decimal(None) => "DECIMAL".into(),
        LogicalType::Text => "VARCHAR".into(),
        LogicalType::Boolean => "BOOLEAN".into(),
        LogicalType::Date => "DATE".into(),
        LogicalType::Timestamp => "TIMESTAMP".into(),
        LogicalType::Binary => "VARBINARY".into(),
        LogicalType::Geometry => "GEOMETRY".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("owner_id", '"', '"'), "owner_id");
        assert_eq!(escape_identifier("order", '"', '"'), "\"order\"");
        assert_eq!(escape_identifier("User", '`', '`'), "`User`");
        assert_eq!(escape_identifier("my table", '[', ']'), "[my table]");
        assert_eq!(escape_identifier("a]b", '[', ']'), "[a]]b]");
        assert_eq!(escape_identifier("1st", '"', '"'), "\"1st\"");
        assert_eq!(escape_identifier("top", '"', '"'), "\"top\"");
    }

    struct Brackets;

    impl SqlGenerator for Brackets {
        fn dialect(&self) -> Option<Dialect> {
            None
        }
        fn delimiters(&self) -> (char, char) {
            ('[', ']')
        }
        fn placeholder(&self, index: usize) -> String {
            format!("@p{}", index)
        }
        fn supports(&self, _construct: Construct) -> bool {
            true
        }
        fn type_name(&self, _ty: &LogicalType) -> Option<String> {
            None
        }
        fn paging(&self) -> PagingStyle {
            PagingStyle::FetchFirst
        }
    }

    #[test]
    fn test_quoted_identifiers_stay_quoted() {
        assert_eq!(Brackets.quote_identifier(&Ident::new("Name")), "Name");
        assert_eq!(Brackets.quote_identifier(&Ident::quoted("Name")), "[Name]");
        assert_eq!(Brackets.quote_identifier(&Ident::quoted("a]b")), "[a]]b]");
    }
}
