//! Name scopes for column resolution.
//!
//! Every SELECT gets its own [`Scope`] holding the relations of its FROM
//! clause. A scope borrows its enclosing scope, so correlated subqueries see
//! outer columns without the tree pointing back at its parents.

use super::ColumnOrigin;
use crate::catalog::{TableInfo, did_you_mean};
use crate::error::ResolutionError;
use crate::types::LogicalType;

#[derive(Debug, Clone, PartialEq)]
pub struct RelationColumn {
    pub name: String,
    pub logical: LogicalType,
    pub nullable: bool,
    pub origin: ColumnOrigin,
}

/// A table or derived table visible in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// Alias or table name; `None` for an unaliased derived table.
    pub name: Option<String>,
    pub columns: Vec<RelationColumn>,
}

impl Relation {
    pub fn from_table(table: &TableInfo, alias: Option<&str>) -> Self {
        Self {
            name: Some(alias.unwrap_or(&table.name).to_string()),
            columns: table
                .columns
                .iter()
                .map(|c| RelationColumn {
                    name: c.name.clone(),
                    logical: c.logical,
                    nullable: c.nullable,
                    origin: ColumnOrigin::Table {
                        table: table.name.clone(),
                        column: c.name.clone(),
                    },
                })
                .collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&RelationColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Outer joins can produce rows without a match on this side.
    pub fn make_nullable(&mut self) {
        for column in &mut self.columns {
            column.nullable = true;
        }
    }

    fn is_named(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    }

    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| "<derived>".to_string())
    }
}

#[derive(Debug, Default)]
pub struct Scope<'p> {
    relations: Vec<Relation>,
    /// Columns merged by `JOIN .. USING`, unambiguous although present twice.
    using: Vec<String>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(parent: &'p Scope<'p>) -> Self {
        Self {
            relations: Vec::new(),
            using: Vec::new(),
            parent: Some(parent),
        }
    }

    /// Scope for a nested query: a child of `parent` when there is one.
    pub fn nested(parent: Option<&'p Scope<'p>>) -> Self {
        Self {
            relations: Vec::new(),
            using: Vec::new(),
            parent,
        }
    }

    pub fn parent(&self) -> Option<&'p Scope<'p>> {
        self.parent
    }

    pub fn push(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relations_mut(&mut self) -> &mut [Relation] {
        &mut self.relations
    }

    pub fn add_using(&mut self, column: &str) {
        self.using.push(column.to_ascii_lowercase());
    }

    /// Relation with this visible name in the current scope only.
    pub fn local_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.is_named(name))
    }

    /// Resolve `qualifier.name` or a bare `name`, innermost scope first.
    pub fn lookup(
        &self,
        qualifier: Option<&str>,
        name: &str,
    ) -> Result<&RelationColumn, ResolutionError> {
        match qualifier {
            Some(q) => self.lookup_qualified(q, name),
            None => self.lookup_bare(name),
        }
    }

    fn lookup_qualified(
        &self,
        qualifier: &str,
        name: &str,
    ) -> Result<&RelationColumn, ResolutionError> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(relation) = current.local_relation(qualifier) {
                return relation.column(name).ok_or_else(|| {
                    let candidates: Vec<&str> =
                        relation.columns.iter().map(|c| c.name.as_str()).collect();
                    ResolutionError::UnknownColumn {
                        column: format!("{}.{}", qualifier, name),
                        suggestion: did_you_mean(name, &candidates),
                    }
                });
            }
            scope = current.parent;
        }
        let visible: Vec<String> = self
            .chain()
            .flat_map(|s| s.relations.iter())
            .filter_map(|r| r.name.clone())
            .collect();
        Err(ResolutionError::UnknownTable {
            table: qualifier.to_string(),
            suggestion: did_you_mean(qualifier, &visible),
        })
    }

    fn lookup_bare(&self, name: &str) -> Result<&RelationColumn, ResolutionError> {
        for scope in self.chain() {
            let matches: Vec<(&Relation, &RelationColumn)> = scope
                .relations
                .iter()
                .filter_map(|r| r.column(name).map(|c| (r, c)))
                .collect();
            match matches.as_slice() {
                [] => continue,
                [(_, column)] => return Ok(column),
                [(_, first), ..] if scope.using.contains(&name.to_ascii_lowercase()) => {
                    return Ok(first);
                }
                several => {
                    return Err(ResolutionError::AmbiguousColumn {
                        column: name.to_string(),
                        tables: several.iter().map(|(r, _)| r.display_name()).collect(),
                    });
                }
            }
        }
        let visible: Vec<&str> = self
            .chain()
            .flat_map(|s| s.relations.iter())
            .flat_map(|r| r.columns.iter().map(|c| c.name.as_str()))
            .collect();
        Err(ResolutionError::UnknownColumn {
            column: name.to_string(),
            suggestion: did_you_mean(name, &visible),
        })
    }

    fn chain(&self) -> impl Iterator<Item = &Scope<'_>> {
        let mut next: Option<&Scope<'_>> = Some(self);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent;
            Some(current)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(name: &str, columns: &[(&str, LogicalType)]) -> Relation {
        Relation {
            name: Some(name.to_string()),
            columns: columns
                .iter()
                .map(|(c, t)| RelationColumn {
                    name: c.to_string(),
                    logical: *t,
                    nullable: false,
                    origin: ColumnOrigin::Table {
                        table: name.to_string(),
                        column: c.to_string(),
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut outer = Scope::root();
        outer.push(relation("owners", &[("id", LogicalType::Integer), ("name", LogicalType::Text)]));
        let mut inner = Scope::child(&outer);
        inner.push(relation("pets", &[("id", LogicalType::Integer), ("owner_id", LogicalType::Integer)]));

        let id = inner.lookup(None, "id").unwrap();
        assert_eq!(
            id.origin,
            ColumnOrigin::Table {
                table: "pets".into(),
                column: "id".into()
            }
        );
        assert_eq!(inner.lookup(None, "name").unwrap().logical, LogicalType::Text);
        assert!(inner.lookup(Some("owners"), "id").is_ok());
    }

    #[test]
    fn test_ambiguous_and_unknown() {
        let mut scope = Scope::root();
        scope.push(relation("pets", &[("id", LogicalType::Integer)]));
        scope.push(relation("owners", &[("id", LogicalType::Integer)]));

        assert_eq!(
            scope.lookup(None, "id").unwrap_err(),
            ResolutionError::AmbiguousColumn {
                column: "id".into(),
                tables: vec!["pets".into(), "owners".into()],
            }
        );
        assert_eq!(
            scope.lookup(Some("pest"), "id").unwrap_err(),
            ResolutionError::UnknownTable {
                table: "pest".into(),
                suggestion: Some("pets".into()),
            }
        );

        scope.add_using("id");
        assert!(scope.lookup(None, "id").is_ok());
    }
}
