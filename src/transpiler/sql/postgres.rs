use crate::transpiler::traits::{PagingStyle, SqlGenerator, standard_type_name};
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;

pub struct PostgresGenerator;

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Option<Dialect> {
        Some(Dialect::PostgreSql)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn supports(&self, _construct: Construct) -> bool {
        true
    }

    fn type_name(&self, ty: &LogicalType) -> Option<String> {
        Some(match ty {
            LogicalType::Text => "TEXT".into(),
            LogicalType::Binary => "BYTEA".into(),
            other => standard_type_name(other),
        })
    }

    fn paging(&self) -> PagingStyle {
        PagingStyle::LimitOffset { offset_rows: false }
    }
}
