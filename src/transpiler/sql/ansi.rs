use crate::transpiler::traits::{PagingStyle, SqlGenerator, standard_type_name};
use crate::transpiler::{Construct, Dialect};
use crate::types::LogicalType;

/// Dialect-neutral form used for display and synthesized statement text.
///
/// Accepts every construct and re-parses under the generic grammar.
pub struct AnsiGenerator;

impl SqlGenerator for AnsiGenerator {
    fn dialect(&self) -> Option<Dialect> {
        None
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports(&self, _construct: Construct) -> bool {
        true
    }

    fn type_name(&self, ty: &LogicalType) -> Option<String> {
        Some(standard_type_name(ty))
    }

    fn paging(&self) -> PagingStyle {
        PagingStyle::LimitOffset { offset_rows: false }
    }
}
