use crate::transpiler::traits::{PagingStyle, SqlGenerator, standard_type_name};
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;

pub struct H2Generator;

impl SqlGenerator for H2Generator {
    fn dialect(&self) -> Option<Dialect> {
        Some(Dialect::H2)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports(&self, construct: Construct) -> bool {
        !matches!(construct, Construct::Returning)
    }

    fn type_name(&self, ty: &LogicalType) -> Option<String> {
        Some(standard_type_name(ty))
    }

    fn paging(&self) -> PagingStyle {
        PagingStyle::LimitOffset { offset_rows: true }
    }
}
