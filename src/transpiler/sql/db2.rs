use crate::transpiler::traits::{PagingStyle, SqlGenerator};
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;

pub struct Db2Generator;

impl SqlGenerator for Db2Generator {
    fn dialect(&self) -> Option<Dialect> {
        Some(Dialect::Db2)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports(&self, construct: Construct) -> bool {
        !matches!(
            construct,
            Construct::Returning | Construct::Geometry | Construct::CastTo(LogicalType::Geometry)
        )
    }

    fn type_name(&self, ty: &LogicalType) -> Option<String> {
        Some(match ty {
            LogicalType::Integer => "BIGINT".into(),
            LogicalType::Decimal(Some((p, s))) => format!("DECIMAL({}, {})", p, s),
            LogicalType::Decimal(None) => "DECIMAL".into(),
            LogicalType::Text => "VARCHAR(32672)".into(),
            LogicalType::Boolean => "BOOLEAN".into(),
            LogicalType::Date => "DATE".into(),
            LogicalType::Timestamp => "TIMESTAMP".into(),
            LogicalType::Binary => "BLOB".into(),
            LogicalType::Geometry => return None,
        })
    }

    fn paging(&self) -> PagingStyle {
        PagingStyle::FetchFirst
    }

    fn dummy_table(&self) -> Option<&'static str> {
        Some("SYSIBM.SYSDUMMY1")
    }
}
