use crate::ast::SetOperator;
use crate::transpiler::traits::{PagingStyle, SqlGenerator};
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;

pub struct OracleGenerator;

impl SqlGenerator for OracleGenerator {
    fn dialect(&self) -> Option<Dialect> {
        Some(Dialect::Oracle)
    }

    // Oracle uses :1, :2, etc. (1-based index)
    fn placeholder(&self, index: usize) -> String {
        format!(":{}", index)
    }

    fn supports(&self, construct: Construct) -> bool {
        // no BOOLEAN in Oracle SQL, only in PL/SQL
        !matches!(
            construct,
            Construct::BooleanLiteral
                | Construct::Returning
                | Construct::CastTo(LogicalType::Boolean)
        )
    }

    fn type_name(&self, ty: &LogicalType) -> Option<String> {
        Some(match ty {
            LogicalType::Integer => "NUMBER(19)".into(),
            LogicalType::Decimal(Some((p, s))) => format!("NUMBER({}, {})", p, s),
            LogicalType::Decimal(None) => "NUMBER".into(),
            LogicalType::Text => "VARCHAR2(4000)".into(),
            LogicalType::Boolean => return None,
            LogicalType::Date => "DATE".into(),
            LogicalType::Timestamp => "TIMESTAMP".into(),
            LogicalType::Binary => "BLOB".into(),
            LogicalType::Geometry => "SDO_GEOMETRY".into(),
        })
    }

    fn paging(&self) -> PagingStyle {
        PagingStyle::RowNum
    }

    fn function_name(&self, name: &str) -> String {
        match name {
            "SUBSTRING" => "SUBSTR".into(),
            other => other.to_string(),
        }
    }

    fn dummy_table(&self) -> Option<&'static str> {
        Some("DUAL")
    }

    fn set_operator(&self, op: SetOperator) -> &'static str {
        match op {
            SetOperator::Union => "UNION",
            SetOperator::Intersect => "INTERSECT",
            SetOperator::Except => "MINUS",
        }
    }
}
