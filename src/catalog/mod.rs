//! Catalog snapshots: tables, columns and key hints used during resolution.
//!
//! A snapshot is loaded from JSON or introspected from a live database.
//!
//! ```
//! use polysql::catalog::{Catalog, CatalogSnapshot};
//!
//! let json = r#"{
//!     "dialect": "postgresql",
//!     "tables": [{
//!         "name": "pets",
//!         "columns": [
//!             { "name": "id", "type": "int4", "nullable": false },
//!             { "name": "name", "type": "text", "nullable": true }
//!         ],
//!         "primary_key": ["id"]
//!     }]
//! }"#;
//!
//! let catalog = CatalogSnapshot::from_json(json).unwrap();
//! assert!(catalog.table(&"pets".into()).is_some());
//! ```

pub mod introspect;

use crate::ast::TableName;
use crate::error::PolyError;
use crate::transpiler::Dialect;
use crate::transpiler::types::logical_from_native;
use crate::types::LogicalType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use strsim::levenshtein;

/// Read-only view of the tables visible to a statement.
///
/// Implementations must present one consistent snapshot for the duration of
/// a resolution call.
pub trait Catalog: Send + Sync {
    /// Backend the native type names come from.
    fn dialect(&self) -> Option<Dialect>;

    /// Look a table up, ignoring case. An unqualified name matches a table in any schema.
    fn table(&self, name: &TableName) -> Option<&TableInfo>;

    /// Every table name, for suggestions.
    fn table_names(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Type name as the backend reports it.
    pub native_type: String,
    pub logical: LogicalType,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub references: String,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Vec<&ColumnInfo> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn matches(&self, name: &TableName) -> bool {
        if !name.name.matches(&self.name) {
            return false;
        }
        match (&name.schema, &self.schema) {
            (Some(wanted), Some(actual)) => wanted.matches(actual),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// An immutable set of tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSnapshot {
    pub dialect: Option<Dialect>,
    pub tables: Vec<TableInfo>,
}

impl Catalog for CatalogSnapshot {
    fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    fn table(&self, name: &TableName) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.matches(name))
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }
}

/// On-disk snapshot layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    dialect: Option<Dialect>,
    tables: Vec<TableDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableDef {
    #[serde(default)]
    schema: Option<String>,
    name: String,
    columns: Vec<ColumnDef>,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnDef {
    name: String,
    #[serde(rename = "type", alias = "typ")]
    typ: String,
    #[serde(default = "nullable_by_default")]
    nullable: bool,
    #[serde(default)]
    primary_key: bool,
}

fn nullable_by_default() -> bool {
    true
}

impl CatalogSnapshot {
    pub fn new(dialect: Option<Dialect>) -> Self {
        Self {
            dialect,
            tables: Vec::new(),
        }
    }

    /// Add a table from `(name, native type, nullable)` triples; `primary_key` lists key columns.
    pub fn with_table(
        mut self,
        name: &str,
        columns: &[(&str, &str, bool)],
        primary_key: &[&str],
    ) -> Self {
        let TableName { schema, name } = TableName::from(name);
        let columns = columns
            .iter()
            .map(|(col, native, nullable)| ColumnInfo {
                name: col.to_string(),
                native_type: native.to_string(),
                logical: logical_from_native(self.dialect, native),
                nullable: *nullable,
                primary_key: primary_key.iter().any(|k| k.eq_ignore_ascii_case(col)),
            })
            .collect();
        self.tables.push(TableInfo {
            schema: schema.map(|s| s.value),
            name: name.value,
            columns,
            foreign_keys: Vec::new(),
        });
        self
    }

    pub fn from_json(json: &str) -> Result<Self, PolyError> {
        let file: SnapshotFile = serde_json::from_str(json)
            .map_err(|e| PolyError::Catalog(format!("invalid snapshot: {}", e)))?;
        Ok(Self::from_file(file))
    }

    pub fn load(path: &Path) -> Result<Self, PolyError> {
        let json = std::fs::read_to_string(path)?;
        let snapshot = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            tables = snapshot.tables.len(),
            "loaded catalog snapshot"
        );
        Ok(snapshot)
    }

    /// Serialize in the same layout [`CatalogSnapshot::from_json`] reads.
    pub fn to_json(&self) -> Result<String, PolyError> {
        let file = SnapshotFile {
            dialect: self.dialect,
            tables: self
                .tables
                .iter()
                .map(|t| TableDef {
                    schema: t.schema.clone(),
                    name: t.name.clone(),
                    columns: t
                        .columns
                        .iter()
                        .map(|c| ColumnDef {
                            name: c.name.clone(),
                            typ: c.native_type.clone(),
                            nullable: c.nullable,
                            primary_key: false,
                        })
                        .collect(),
                    primary_key: t.primary_key().iter().map(|c| c.name.clone()).collect(),
                    foreign_keys: t.foreign_keys.clone(),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&file).map_err(|e| PolyError::Catalog(e.to_string()))
    }

    /// Content fingerprint, used to tell whether a refreshed snapshot differs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for table in &self.tables {
            hasher.update(table.schema.as_deref().unwrap_or("").as_bytes());
            hasher.update(b".");
            hasher.update(table.name.as_bytes());
            for column in &table.columns {
                hasher.update(
                    format!(
                        "|{}:{}:{}:{}",
                        column.name, column.native_type, column.nullable, column.primary_key
                    )
                    .as_bytes(),
                );
            }
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    fn from_file(file: SnapshotFile) -> Self {
        let dialect = file.dialect;
        let tables = file
            .tables
            .into_iter()
            .map(|t| {
                let columns = t
                    .columns
                    .into_iter()
                    .map(|c| {
                        let primary_key = c.primary_key
                            || t.primary_key.iter().any(|k| k.eq_ignore_ascii_case(&c.name));
                        ColumnInfo {
                            logical: logical_from_native(dialect, &c.typ),
                            name: c.name,
                            native_type: c.typ,
                            nullable: c.nullable && !primary_key,
                            primary_key,
                        }
                    })
                    .collect();
                TableInfo {
                    schema: t.schema,
                    name: t.name,
                    columns,
                    foreign_keys: t.foreign_keys,
                }
            })
            .collect();
        Self { dialect, tables }
    }
}

/// Closest candidate within a length-dependent edit distance.
pub fn did_you_mean(input: &str, candidates: &[impl AsRef<str>]) -> Option<String> {
    let input = input.to_ascii_lowercase();
    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let dist = levenshtein(&input, &candidate.to_ascii_lowercase());
        if dist <= threshold && best.is_none_or(|(min, _)| dist < min) {
            best = Some((dist, candidate));
        }
    }
    best.map(|(_, c)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pets() -> CatalogSnapshot {
        CatalogSnapshot::from_json(
            r#"{
                "dialect": "postgresql",
                "tables": [{
                    "schema": "public",
                    "name": "pets",
                    "columns": [
                        { "name": "id", "type": "int8", "nullable": true },
                        { "name": "owner_id", "type": "integer", "nullable": false },
                        { "name": "name", "typ": "text" },
                        { "name": "weight", "type": "numeric(6,2)" }
                    ],
                    "primary_key": ["id"],
                    "foreign_keys": [
                        { "columns": ["owner_id"], "references": "owners", "referenced_columns": ["id"] }
                    ]
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_ignores_case_and_schema() {
        let catalog = pets();
        assert!(catalog.table(&"PETS".into()).is_some());
        assert!(catalog.table(&"public.pets".into()).is_some());
        assert!(catalog.table(&"other.pets".into()).is_none());
        let table = catalog.table(&"pets".into()).unwrap();
        assert_eq!(table.column("Owner_Id").unwrap().logical, LogicalType::Integer);
        assert_eq!(
            table.column("weight").unwrap().logical,
            LogicalType::Decimal(Some((6, 2)))
        );
    }

    #[test]
    fn test_primary_key_columns_are_not_null() {
        let catalog = pets();
        let table = catalog.table(&"pets".into()).unwrap();
        let id = table.column("id").unwrap();
        assert!(id.primary_key);
        assert!(!id.nullable);
        assert!(table.column("name").unwrap().nullable);
        assert_eq!(table.foreign_keys[0].references, "owners");
    }

    #[test]
    fn test_json_round_trip_and_fingerprint() {
        let catalog = pets();
        let again = CatalogSnapshot::from_json(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(again, catalog);
        assert_eq!(again.fingerprint(), catalog.fingerprint());

        let changed = CatalogSnapshot::new(catalog.dialect)
            .with_table("pets", &[("id", "int8", false)], &["id"]);
        assert_ne!(changed.fingerprint(), catalog.fingerprint());
    }

    #[test]
    fn test_did_you_mean() {
        let tables = ["pets", "owners", "visits"];
        assert_eq!(did_you_mean("pts", &tables), Some("pets".to_string()));
        assert_eq!(did_you_mean("ownrs", &tables), Some("owners".to_string()));
        assert_eq!(did_you_mean("xyzzy", &tables), None);
        assert_eq!(did_you_mean("id", &["ids"]), None);
    }
}
