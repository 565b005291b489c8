use crate::transpiler::traits::{ConcatStyle, PagingStyle, SqlGenerator};
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;

/// MySQL Generator.
pub struct MysqlGenerator;

impl SqlGenerator for MysqlGenerator {
    fn dialect(&self) -> Option<Dialect> {
        Some(Dialect::MySql)
    }

    fn delimiters(&self) -> (char, char) {
        ('`', '`')
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports(&self, construct: Construct) -> bool {
        !matches!(
            construct,
            Construct::Returning
                | Construct::Merge
                | Construct::FullOuterJoin
                | Construct::Intersect
                | Construct::Except
                | Construct::NullsOrdering
                | Construct::CastTo(LogicalType::Boolean | LogicalType::Geometry)
        )
    }

    // CAST accepts only a handful of target names
    fn type_name(&self, ty: &LogicalType) -> Option<String> {
        Some(match ty {
            LogicalType::Integer => "SIGNED".into(),
            LogicalType::Decimal(Some((p, s))) => format!("DECIMAL({}, {})", p, s),
            LogicalType::Decimal(None) => "DECIMAL".into(),
            LogicalType::Text => "CHAR".into(),
            LogicalType::Date => "DATE".into(),
            LogicalType::Timestamp => "DATETIME".into(),
            LogicalType::Binary => "BINARY".into(),
            LogicalType::Boolean | LogicalType::Geometry => return None,
        })
    }

    fn paging(&self) -> PagingStyle {
        PagingStyle::MySqlLimit
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Function
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }
}
