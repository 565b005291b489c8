use crate::transpiler::traits::{ConcatStyle, PagingStyle, SqlGenerator};
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;

pub struct SqlServerGenerator;

impl SqlGenerator for SqlServerGenerator {
    fn dialect(&self) -> Option<Dialect> {
        Some(Dialect::SqlServer)
    }

    fn delimiters(&self) -> (char, char) {
        ('[', ']')
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    fn supports(&self, construct: Construct) -> bool {
        !matches!(
            construct,
            Construct::BooleanLiteral
                | Construct::Returning
                | Construct::NullsOrdering
                | Construct::PagingWithoutOrder
                | Construct::LimitOnSetOperation
        )
    }

    fn type_name(&self, ty: &LogicalType) -> Option<String> {
        Some(match ty {
            LogicalType::Integer => "BIGINT".into(),
            LogicalType::Decimal(Some((p, s))) => format!("DECIMAL({}, {})", p, s),
            LogicalType::Decimal(None) => "DECIMAL".into(),
            LogicalType::Text => "NVARCHAR(MAX)".into(),
            LogicalType::Boolean => "BIT".into(),
            LogicalType::Date => "DATE".into(),
            LogicalType::Timestamp => "DATETIME2".into(),
            LogicalType::Binary => "VARBINARY(MAX)".into(),
            LogicalType::Geometry => "GEOMETRY".into(),
        })
    }

    fn paging(&self) -> PagingStyle {
        PagingStyle::TopOrFetchNext
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Function
    }

    fn function_name(&self, name: &str) -> String {
        match name {
            "LENGTH" => "LEN".into(),
            other => other.to_string(),
        }
    }
}
