//! INSERT/UPDATE/DELETE templates for an updatable module's base table.
//!
//! Templates are built as trees, one parameter per column, named after the
//! column. Their metadata comes straight from the catalog.

use crate::ast::*;
use crate::catalog::{ColumnInfo, TableInfo};
use crate::parser::ParsedStatement;
use crate::resolver::ParameterMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudOp {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for CrudOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// One synthesized statement and the metadata of its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrudStatement {
    pub parsed: ParsedStatement,
    pub parameters: Vec<ParameterMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrudTemplates {
    pub table: String,
    pub insert: CrudStatement,
    /// Absent when every column belongs to the key.
    pub update: Option<CrudStatement>,
    pub delete: CrudStatement,
}

impl CrudTemplates {
    /// Build the templates; `None` when the table has no primary key.
    pub fn for_table(table: &TableInfo) -> Option<Self> {
        let key = table.primary_key();
        if key.is_empty() {
            return None;
        }
        let non_key: Vec<&ColumnInfo> = table.columns.iter().filter(|c| !c.primary_key).collect();
        let name = TableName {
            schema: table.schema.as_deref().map(Ident::from),
            name: Ident::from(&table.name),
        };

        let insert = Statement::Insert(Insert {
            table: name.clone(),
            columns: table.columns.iter().map(|c| Ident::from(&c.name)).collect(),
            source: InsertSource::Values(vec![
                table.columns.iter().map(|c| Expr::param(param_name(&c.name))).collect(),
            ]),
            returning: Vec::new(),
        });

        let update = (!non_key.is_empty()).then(|| {
            Statement::Update(Update {
                table: name.clone(),
                alias: None,
                assignments: non_key
                    .iter()
                    .map(|c| Assignment {
                        column: Ident::from(&c.name),
                        value: Expr::param(param_name(&c.name)),
                    })
                    .collect(),
                selection: Some(key_predicate(&key)),
                returning: Vec::new(),
            })
        });

        let delete = Statement::Delete(Delete {
            table: name,
            alias: None,
            selection: Some(key_predicate(&key)),
            returning: Vec::new(),
        });

        Some(Self {
            table: table.name.clone(),
            insert: crud_statement(insert, table),
            update: update.map(|u| crud_statement(u, table)),
            delete: crud_statement(delete, table),
        })
    }

    pub fn get(&self, op: CrudOp) -> Option<&CrudStatement> {
        match op {
            CrudOp::Insert => Some(&self.insert),
            CrudOp::Update => self.update.as_ref(),
            CrudOp::Delete => Some(&self.delete),
        }
    }
}

/// Parameter name for a column; characters a parameter cannot hold become `_`.
pub fn param_name(column: &str) -> String {
    let mut name: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn key_predicate(key: &[&ColumnInfo]) -> Expr {
    let mut terms = key.iter().map(|c| {
        Expr::binary(
            Expr::column(c.name.clone()),
            BinaryOp::Eq,
            Expr::param(param_name(&c.name)),
        )
    });
    let first = terms.next().unwrap_or(Expr::Literal(Literal::Boolean(false)));
    terms.fold(first, |acc, term| Expr::binary(acc, BinaryOp::And, term))
}

fn crud_statement(statement: Statement, table: &TableInfo) -> CrudStatement {
    let parsed = ParsedStatement::synthesized(statement);
    let parameters = parsed
        .parameters
        .iter()
        .filter_map(|name| {
            let column = table
                .columns
                .iter()
                .find(|c| param_name(&c.name).eq_ignore_ascii_case(name))?;
            Some(ParameterMetadata {
                name: name.clone(),
                logical: column.logical,
                nullable: column.nullable,
                occurrences: parsed.occurrences_of(name).map(|o| o.ordinal).collect(),
                low_confidence: false,
                description: None,
                default: None,
            })
        })
        .collect();
    CrudStatement { parsed, parameters }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogSnapshot};
    use crate::types::LogicalType;
    use pretty_assertions::assert_eq;

    fn pets() -> CatalogSnapshot {
        CatalogSnapshot::new(None).with_table(
            "pets",
            &[
                ("id", "INTEGER", false),
                ("name", "VARCHAR(100)", true),
                ("owner id", "INTEGER", false),
            ],
            &["id"],
        )
    }

    #[test]
    fn test_templates_for_pets() {
        let catalog = pets();
        let table = catalog.table(&"pets".into()).unwrap();
        let crud = CrudTemplates::for_table(table).unwrap();

        assert_eq!(
            crud.insert.parsed.source,
            "INSERT INTO pets (id, name, \"owner id\") VALUES (:id, :name, :owner_id)"
        );
        assert_eq!(
            crud.update.as_ref().unwrap().parsed.source,
            "UPDATE pets SET name = :name, \"owner id\" = :owner_id WHERE id = :id"
        );
        assert_eq!(crud.delete.parsed.source, "DELETE FROM pets WHERE id = :id");

        let names: Vec<_> = crud.insert.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "owner_id"]);
        let id = &crud.delete.parameters[0];
        assert_eq!(id.logical, LogicalType::Integer);
        assert!(!id.nullable);
        assert!(crud.insert.parameters[1].nullable);
    }

    #[test]
    fn test_composite_key_only_table() {
        let catalog = CatalogSnapshot::new(None).with_table(
            "pet_tags",
            &[("pet_id", "INTEGER", false), ("tag_id", "INTEGER", false)],
            &["pet_id", "tag_id"],
        );
        let crud = CrudTemplates::for_table(catalog.table(&"pet_tags".into()).unwrap()).unwrap();
        assert!(crud.update.is_none());
        assert!(crud.get(CrudOp::Update).is_none());
        assert_eq!(
            crud.delete.parsed.source,
            "DELETE FROM pet_tags WHERE pet_id = :pet_id AND tag_id = :tag_id"
        );
    }

    #[test]
    fn test_no_key_no_templates() {
        let catalog = CatalogSnapshot::new(None).with_table("log", &[("line", "TEXT", true)], &[]);
        assert!(CrudTemplates::for_table(catalog.table(&"log".into()).unwrap()).is_none());
    }

    #[test]
    fn test_param_name() {
        assert_eq!(param_name("owner_id"), "owner_id");
        assert_eq!(param_name("Owner Name"), "Owner_Name");
        assert_eq!(param_name("1st"), "_1st");
    }
}
