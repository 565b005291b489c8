//! Live catalog snapshots read from a database's system views.
//!
//! PostgreSQL and MySQL are read through `information_schema`; SQLite
//! (used as the H2 stand-in) through its table pragmas.

use super::{CatalogSnapshot, ColumnInfo, ForeignKey, TableInfo};
use crate::error::PolyError;
use crate::transpiler::Dialect;
use crate::transpiler::types::logical_from_native;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::collections::BTreeMap;

const PG_COLUMNS: &str = "SELECT CAST(table_name AS VARCHAR), CAST(column_name AS VARCHAR), \
     CAST(udt_name AS VARCHAR), CAST(is_nullable AS VARCHAR), \
     CAST(numeric_precision AS INTEGER), CAST(numeric_scale AS INTEGER) \
     FROM information_schema.columns WHERE table_schema = $1 \
     ORDER BY table_name, ordinal_position";

const PG_KEYS: &str = "SELECT CAST(tc.table_name AS VARCHAR), CAST(kcu.column_name AS VARCHAR) \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
     ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
     WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1";

const PG_FOREIGN_KEYS: &str = "SELECT CAST(tc.constraint_name AS VARCHAR), \
     CAST(tc.table_name AS VARCHAR), CAST(kcu.column_name AS VARCHAR), \
     CAST(ccu.table_name AS VARCHAR), CAST(ccu.column_name AS VARCHAR) \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
     ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
     JOIN information_schema.constraint_column_usage ccu \
     ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
     WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1 \
     ORDER BY tc.constraint_name, kcu.ordinal_position";

const MYSQL_COLUMNS: &str = "SELECT CAST(TABLE_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR), \
     CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_KEY AS CHAR) \
     FROM information_schema.COLUMNS WHERE TABLE_SCHEMA = DATABASE() \
     ORDER BY TABLE_NAME, ORDINAL_POSITION";

const MYSQL_FOREIGN_KEYS: &str = "SELECT CAST(CONSTRAINT_NAME AS CHAR), CAST(TABLE_NAME AS CHAR), \
     CAST(COLUMN_NAME AS CHAR), CAST(REFERENCED_TABLE_NAME AS CHAR), \
     CAST(REFERENCED_COLUMN_NAME AS CHAR) \
     FROM information_schema.KEY_COLUMN_USAGE \
     WHERE TABLE_SCHEMA = DATABASE() AND REFERENCED_TABLE_NAME IS NOT NULL \
     ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION";

const SQLITE_TABLES: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// Connect to `url` and read every table of its default schema.
pub async fn introspect_url(url: &str) -> Result<CatalogSnapshot, PolyError> {
    let dialect = Dialect::from_url(url)
        .ok_or_else(|| PolyError::Catalog(format!("unsupported database URL '{}'", url)))?;
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect(url)
        .await
        .map_err(|e| PolyError::Catalog(format!("cannot connect: {}", e)))?;
    let sqlite = url.starts_with("sqlite:");
    let snapshot = introspect(&pool, dialect, sqlite).await;
    pool.close().await;
    snapshot
}

/// Read a snapshot over an existing pool. `sqlite` selects the pragma-based reader.
pub async fn introspect(
    pool: &AnyPool,
    dialect: Dialect,
    sqlite: bool,
) -> Result<CatalogSnapshot, PolyError> {
    let tables = match dialect {
        _ if sqlite => sqlite_tables(pool).await?,
        Dialect::PostgreSql => postgres_tables(pool, "public").await?,
        Dialect::MySql => mysql_tables(pool).await?,
        other => {
            return Err(PolyError::Catalog(format!(
                "live introspection is not available for {}",
                other
            )));
        }
    };
    tracing::info!(%dialect, tables = tables.len(), "introspected catalog");
    Ok(CatalogSnapshot {
        dialect: Some(dialect),
        tables,
    })
}

fn catalog_err(what: &str) -> impl Fn(sqlx::Error) -> PolyError + '_ {
    move |e| PolyError::Catalog(format!("failed to query {}: {}", what, e))
}

fn text(row: &AnyRow, index: usize) -> Result<String, PolyError> {
    row.try_get::<Option<String>, _>(index)
        .map(Option::unwrap_or_default)
        .map_err(|e| PolyError::Catalog(e.to_string()))
}

/// Tables keyed by name, columns in catalog order.
#[derive(Default)]
struct TableSet {
    tables: BTreeMap<String, TableInfo>,
}

impl TableSet {
    fn column(&mut self, dialect: Dialect, table: &str, column: ColumnInfo) {
        let mut column = column;
        column.logical = logical_from_native(Some(dialect), &column.native_type);
        self.entry(table).columns.push(column);
    }

    fn entry(&mut self, table: &str) -> &mut TableInfo {
        self.tables
            .entry(table.to_string())
            .or_insert_with(|| TableInfo {
                schema: None,
                name: table.to_string(),
                columns: Vec::new(),
                foreign_keys: Vec::new(),
            })
    }

    fn mark_key(&mut self, table: &str, column: &str) {
        if let Some(col) = self
            .tables
            .get_mut(table)
            .and_then(|t| t.columns.iter_mut().find(|c| c.name == column))
        {
            col.primary_key = true;
            col.nullable = false;
        }
    }

    /// Group `(constraint, table, column, referenced table, referenced column)` rows.
    fn foreign_keys(&mut self, rows: Vec<[String; 5]>) {
        let mut grouped: BTreeMap<(String, String), ForeignKey> = BTreeMap::new();
        for [constraint, table, column, references, referenced] in rows {
            let fk = grouped
                .entry((table, constraint))
                .or_insert_with(|| ForeignKey {
                    columns: Vec::new(),
                    references,
                    referenced_columns: Vec::new(),
                });
            fk.columns.push(column);
            fk.referenced_columns.push(referenced);
        }
        for ((table, _), fk) in grouped {
            if let Some(t) = self.tables.get_mut(&table) {
                t.foreign_keys.push(fk);
            }
        }
    }

    fn finish(self, schema: Option<&str>) -> Vec<TableInfo> {
        self.tables
            .into_values()
            .map(|mut t| {
                t.schema = schema.map(str::to_string);
                t
            })
            .collect()
    }
}

fn unresolved_column(name: String, native_type: String, nullable: bool) -> ColumnInfo {
    ColumnInfo {
        name,
        native_type,
        logical: crate::types::LogicalType::Text,
        nullable,
        primary_key: false,
    }
}

async fn postgres_tables(pool: &AnyPool, schema: &str) -> Result<Vec<TableInfo>, PolyError> {
    let mut set = TableSet::default();
    let rows = sqlx::query(PG_COLUMNS)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(catalog_err("columns"))?;
    for row in &rows {
        let table = text(row, 0)?;
        let udt = text(row, 2)?;
        let precision: Option<i32> = row.try_get(4).ok().flatten();
        let scale: Option<i32> = row.try_get(5).ok().flatten();
        let native = match (udt.as_str(), precision, scale) {
            ("numeric", Some(p), Some(s)) => format!("numeric({},{})", p, s),
            _ => udt,
        };
        let nullable = text(row, 3)? == "YES";
        set.column(
            Dialect::PostgreSql,
            &table,
            unresolved_column(text(row, 1)?, native, nullable),
        );
    }

    let keys = sqlx::query(PG_KEYS)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(catalog_err("primary keys"))?;
    for row in &keys {
        set.mark_key(&text(row, 0)?, &text(row, 1)?);
    }

    let fks = sqlx::query(PG_FOREIGN_KEYS)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(catalog_err("foreign keys"))?;
    set.foreign_keys(five_columns(&fks)?);
    Ok(set.finish(Some(schema)))
}

async fn mysql_tables(pool: &AnyPool) -> Result<Vec<TableInfo>, PolyError> {
    let mut set = TableSet::default();
    let rows = sqlx::query(MYSQL_COLUMNS)
        .fetch_all(pool)
        .await
        .map_err(catalog_err("columns"))?;
    let mut keys = Vec::new();
    for row in &rows {
        let table = text(row, 0)?;
        let column = text(row, 1)?;
        if text(row, 4)? == "PRI" {
            keys.push((table.clone(), column.clone()));
        }
        let nullable = text(row, 3)? == "YES";
        set.column(
            Dialect::MySql,
            &table,
            unresolved_column(column, text(row, 2)?, nullable),
        );
    }
    for (table, column) in keys {
        set.mark_key(&table, &column);
    }

    let fks = sqlx::query(MYSQL_FOREIGN_KEYS)
        .fetch_all(pool)
        .await
        .map_err(catalog_err("foreign keys"))?;
    set.foreign_keys(five_columns(&fks)?);
    Ok(set.finish(None))
}

async fn sqlite_tables(pool: &AnyPool) -> Result<Vec<TableInfo>, PolyError> {
    let mut set = TableSet::default();
    let names = sqlx::query(SQLITE_TABLES)
        .fetch_all(pool)
        .await
        .map_err(catalog_err("tables"))?;

    for name_row in &names {
        let table = text(name_row, 0)?;
        let columns = sqlx::query(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?) ORDER BY cid",
        )
        .bind(table.as_str())
        .fetch_all(pool)
        .await
        .map_err(catalog_err("columns"))?;
        for row in &columns {
            let not_null: i64 = row.try_get(2).unwrap_or(0);
            let pk: i64 = row.try_get(3).unwrap_or(0);
            let mut column = unresolved_column(text(row, 0)?, text(row, 1)?, not_null == 0);
            column.primary_key = pk > 0;
            column.nullable = column.nullable && !column.primary_key;
            set.column(Dialect::H2, &table, column);
        }

        let fks = sqlx::query(
            "SELECT id, \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?) ORDER BY id, seq",
        )
        .bind(table.as_str())
        .fetch_all(pool)
        .await
        .map_err(catalog_err("foreign keys"))?;
        let mut grouped = Vec::with_capacity(fks.len());
        for row in &fks {
            let id: i64 = row.try_get(0).unwrap_or(0);
            grouped.push([
                id.to_string(),
                table.clone(),
                text(row, 1)?,
                text(row, 2)?,
                text(row, 3)?,
            ]);
        }
        set.foreign_keys(grouped);
    }
    Ok(set.finish(None))
}

fn five_columns(rows: &[AnyRow]) -> Result<Vec<[String; 5]>, PolyError> {
    rows.iter()
        .map(|row| {
            Ok([
                text(row, 0)?,
                text(row, 1)?,
                text(row, 2)?,
                text(row, 3)?,
                text(row, 4)?,
            ])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::types::LogicalType;

    #[tokio::test]
    async fn test_introspect_sqlite() {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE owners (id INTEGER PRIMARY KEY, name VARCHAR(40) NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE pets (id INTEGER PRIMARY KEY, owner_id INTEGER NOT NULL \
             REFERENCES owners(id), name TEXT, weight DECIMAL(6,2))",
        )
        .execute(&pool)
        .await
        .unwrap();

        let snapshot = introspect(&pool, Dialect::H2, true).await.unwrap();
        assert_eq!(snapshot.table_names(), vec!["owners", "pets"]);

        let pets = snapshot.table(&"pets".into()).unwrap();
        assert!(pets.column("id").unwrap().primary_key);
        assert!(!pets.column("owner_id").unwrap().nullable);
        assert_eq!(pets.column("owner_id").unwrap().logical, LogicalType::Integer);
        assert!(pets.column("name").unwrap().nullable);
        assert_eq!(
            pets.column("weight").unwrap().logical,
            LogicalType::Decimal(Some((6, 2)))
        );
        assert_eq!(pets.foreign_keys.len(), 1);
        assert_eq!(pets.foreign_keys[0].references, "owners");
        assert_eq!(pets.foreign_keys[0].columns, vec!["owner_id"]);
    }
}
