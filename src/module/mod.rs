//! Data modules: one statement, its resolved metadata and, when the
//! statement maps onto a single keyed table, CRUD templates for it.
//!
//! A module is assembled once and then shared read-only (`Arc<DataModule>`)
//! by executors and the code generator.

pub mod crud;
pub mod link;
pub mod loader;
pub mod options;

use crate::ast::*;
use crate::catalog::{Catalog, TableInfo};
use crate::error::{PolyError, ResolutionError};
use crate::parser::{ParsedStatement, ParserConfig, params};
use crate::resolver::{ColumnMetadata, ParameterMetadata, Resolution, Resolver, ResolverConfig};
use crate::transpiler::Dialect;
use crate::types::Value;
use serde::Serialize;
use std::fmt;

pub use crud::{CrudOp, CrudStatement, CrudTemplates};
pub use link::link;
pub use loader::{load_dir, load_file};
pub use options::{FieldOptions, ModuleOptions, ParameterOptions};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataModule {
    pub name: String,
    pub parsed: ParsedStatement,
    pub options: ModuleOptions,
    state: ModuleState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ModuleState {
    Unresolved,
    Resolved(ResolvedModule),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedModule {
    pub resolution: Resolution,
    pub updatability: Updatability,
    pub crud: Option<CrudTemplates>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Updatability {
    Updatable { table: String, key: Vec<String> },
    ReadOnly { reason: ReadOnlyReason },
}

impl Updatability {
    pub fn is_updatable(&self) -> bool {
        matches!(self, Self::Updatable { .. })
    }
}

/// Why a module has no CRUD templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOnlyReason {
    MarkedReadOnly,
    NoBaseTable,
    MultipleTables,
    Joins,
    Aggregation,
    Distinct,
    SetOperation,
    UnmappedParameter { parameter: String },
    NoPrimaryKey { table: String },
    NotWritable { table: String },
}

impl fmt::Display for ReadOnlyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkedReadOnly => write!(f, "marked readonly"),
            Self::NoBaseTable => write!(f, "no base table"),
            Self::MultipleTables => write!(f, "more than one table in FROM"),
            Self::Joins => write!(f, "joins"),
            Self::Aggregation => write!(f, "aggregation"),
            Self::Distinct => write!(f, "DISTINCT"),
            Self::SetOperation => write!(f, "set operation"),
            Self::UnmappedParameter { parameter } => {
                write!(f, "parameter :{} is not compared with a column", parameter)
            }
            Self::NoPrimaryKey { table } => write!(f, "table {} has no primary key", table),
            Self::NotWritable { table } => write!(f, "table {} is not listed as writable", table),
        }
    }
}

impl DataModule {
    /// An unresolved module.
    pub fn new(name: impl Into<String>, parsed: ParsedStatement, options: ModuleOptions) -> Self {
        Self {
            name: name.into(),
            parsed,
            options,
            state: ModuleState::Unresolved,
        }
    }

    /// Parse `sql` into an unresolved module. Parse errors carry the module name.
    pub fn from_sql(
        name: impl Into<String>,
        sql: &str,
        dialect: Option<Dialect>,
        options: ModuleOptions,
        config: &ParserConfig,
    ) -> Result<Self, PolyError> {
        let name = name.into();
        let parsed = crate::parser::parse_with(sql, dialect, config)
            .map_err(|e| PolyError::in_module(name.clone(), e))?;
        Ok(Self::new(name, parsed, options))
    }

    /// Parse, resolve and classify in one step.
    pub fn assemble(
        name: impl Into<String>,
        parsed: ParsedStatement,
        options: ModuleOptions,
        catalog: &dyn Catalog,
        config: &ResolverConfig,
    ) -> Result<Self, ResolutionError> {
        let mut module = Self::new(name, parsed, options);
        module.resolve(catalog, config)?;
        Ok(module)
    }

    /// Resolve metadata and determine updatability. On error the previous state is kept.
    pub fn resolve(
        &mut self,
        catalog: &dyn Catalog,
        config: &ResolverConfig,
    ) -> Result<(), ResolutionError> {
        let resolved = self.resolve_state(catalog, config)?;
        match &resolved.updatability {
            Updatability::Updatable { table, .. } => {
                tracing::debug!(module = %self.name, table = %table, "module is updatable")
            }
            Updatability::ReadOnly { reason } => {
                tracing::debug!(module = %self.name, reason = %reason, "module is read-only")
            }
        }
        self.state = ModuleState::Resolved(resolved);
        Ok(())
    }

    /// Re-resolve against a new snapshot. Returns whether any metadata changed.
    pub fn refresh(
        &mut self,
        catalog: &dyn Catalog,
        config: &ResolverConfig,
    ) -> Result<bool, ResolutionError> {
        let resolved = self.resolve_state(catalog, config)?;
        let changed = match &self.state {
            ModuleState::Resolved(previous) => *previous != resolved,
            ModuleState::Unresolved => true,
        };
        if changed {
            tracing::info!(module = %self.name, "module metadata changed");
        }
        self.state = ModuleState::Resolved(resolved);
        Ok(changed)
    }

    pub fn state(&self) -> &ModuleState {
        &self.state
    }

    pub fn resolved(&self) -> Option<&ResolvedModule> {
        match &self.state {
            ModuleState::Resolved(r) => Some(r),
            ModuleState::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved().is_some()
    }

    pub fn columns(&self) -> Option<&[ColumnMetadata]> {
        self.resolved().map(|r| r.resolution.columns.as_slice())
    }

    pub fn parameters(&self) -> Option<&[ParameterMetadata]> {
        self.resolved().map(|r| r.resolution.parameters.as_slice())
    }

    pub fn crud(&self) -> Option<&CrudTemplates> {
        self.resolved().and_then(|r| r.crud.as_ref())
    }

    pub fn is_updatable(&self) -> bool {
        self.resolved()
            .is_some_and(|r| r.updatability.is_updatable())
    }

    fn resolve_state(
        &self,
        catalog: &dyn Catalog,
        config: &ResolverConfig,
    ) -> Result<ResolvedModule, ResolutionError> {
        let declared = self.options.declared_types()?;
        let resolver = declared
            .into_iter()
            .fold(Resolver::new(catalog, config), |r, (name, ty)| {
                r.declare(&name, ty)
            });
        let mut resolution = resolver.resolve(&self.parsed)?;
        self.annotate(&mut resolution)?;

        let updatability = updatability(&self.parsed.statement, &self.options, catalog);
        let crud = match &updatability {
            Updatability::Updatable { table, key } => catalog
                .table(&TableName::from(table.as_str()))
                .and_then(|info| CrudTemplates::for_table(&keyed(info, key))),
            Updatability::ReadOnly { .. } => None,
        };
        Ok(ResolvedModule {
            resolution,
            updatability,
            crud,
        })
    }

    /// Apply sidecar descriptions, defaults and field overrides.
    fn annotate(&self, resolution: &mut Resolution) -> Result<(), ResolutionError> {
        let field_types = self.options.field_types()?;
        for param in &mut resolution.parameters {
            let Some(options) = self.options.parameter(&param.name) else {
                continue;
            };
            param.description = options.description.clone();
            if let Some(json) = &options.default {
                let value = Value::from_json(json, &param.logical).map_err(|message| {
                    ResolutionError::InvalidParameterOption {
                        parameter: param.name.clone(),
                        message,
                    }
                })?;
                param.default = Some(value);
            }
        }
        for column in &mut resolution.columns {
            let Some(field) = self.options.field(&column.name) else {
                continue;
            };
            column.description = field.description.clone();
            if let Some((_, ty)) = field_types
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&column.name))
            {
                column.logical = *ty;
            }
            if let Some(nullable) = field.nullable {
                column.nullable = nullable;
            }
            column.key = field.key;
            column.reference = field.reference.clone();
        }
        Ok(())
    }
}

/// Classify a statement. Depends only on the tree, the options and the catalog.
pub fn updatability(
    statement: &Statement,
    options: &ModuleOptions,
    catalog: &dyn Catalog,
) -> Updatability {
    let read_only = |reason| Updatability::ReadOnly { reason };
    if options.readonly {
        return read_only(ReadOnlyReason::MarkedReadOnly);
    }
    let table = match statement {
        Statement::Query(query) => match base_table(query) {
            Ok(table) => table,
            Err(reason) => return read_only(reason),
        },
        Statement::Insert(insert) => &insert.table,
        Statement::Update(update) => {
            if let Some(name) = unmapped_parameter(update.selection.as_ref()) {
                return read_only(ReadOnlyReason::UnmappedParameter { parameter: name });
            }
            &update.table
        }
        Statement::Delete(delete) => {
            if let Some(name) = unmapped_parameter(delete.selection.as_ref()) {
                return read_only(ReadOnlyReason::UnmappedParameter { parameter: name });
            }
            &delete.table
        }
    };
    let Some(info) = catalog.table(table) else {
        return read_only(ReadOnlyReason::NoBaseTable);
    };
    let table = match &info.schema {
        Some(schema) => format!("{}.{}", schema, info.name),
        None => info.name.clone(),
    };
    if !options.may_write(&info.name, &table) {
        return read_only(ReadOnlyReason::NotWritable { table });
    }
    let mut key: Vec<String> = info.primary_key().iter().map(|c| c.name.clone()).collect();
    if key.is_empty() {
        key = options
            .key_fields()
            .into_iter()
            .filter_map(|field| info.column(field).map(|c| c.name.clone()))
            .collect();
    }
    if key.is_empty() {
        return read_only(ReadOnlyReason::NoPrimaryKey {
            table: info.name.clone(),
        });
    }
    Updatability::Updatable { table, key }
}

/// The table with exactly `key` as its primary key.
fn keyed(info: &TableInfo, key: &[String]) -> TableInfo {
    let mut info = info.clone();
    for column in &mut info.columns {
        column.primary_key = key.contains(&column.name);
    }
    info
}

fn base_table(query: &Query) -> Result<&TableName, ReadOnlyReason> {
    let SetExpr::Select(select) = &query.body else {
        return Err(ReadOnlyReason::SetOperation);
    };
    if select.distinct {
        return Err(ReadOnlyReason::Distinct);
    }
    if select.is_aggregate() {
        return Err(ReadOnlyReason::Aggregation);
    }
    let twj = match select.from.as_slice() {
        [] => return Err(ReadOnlyReason::NoBaseTable),
        [twj] => twj,
        _ => return Err(ReadOnlyReason::MultipleTables),
    };
    if !twj.joins.is_empty() {
        return Err(ReadOnlyReason::Joins);
    }
    match &twj.relation {
        TableFactor::Table { name, .. } => Ok(name),
        TableFactor::Derived { .. } | TableFactor::Module { .. } => {
            Err(ReadOnlyReason::NoBaseTable)
        }
    }
}

/// First parameter in a predicate that is not compared directly with a column.
fn unmapped_parameter(predicate: Option<&Expr>) -> Option<String> {
    let mut unmapped = Vec::new();
    if let Some(expr) = predicate {
        collect_unmapped(expr, &mut unmapped);
    }
    unmapped.into_iter().next()
}

fn collect_unmapped(expr: &Expr, out: &mut Vec<String>) {
    let is_column = |e: &Expr| matches!(e, Expr::Column { .. });
    let is_param = |e: &Expr| matches!(e, Expr::Parameter(_));
    match expr {
        Expr::Binary { left, op, right } if op.is_comparison() => {
            let direct = (is_column(left) && is_param(right))
                || (is_param(left) && is_column(right));
            if !direct {
                collect_unmapped(left, out);
                collect_unmapped(right, out);
            }
        }
        Expr::Binary {
            left,
            op: BinaryOp::And | BinaryOp::Or,
            right,
        } => {
            collect_unmapped(left, out);
            collect_unmapped(right, out);
        }
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => collect_unmapped(expr, out),
        Expr::InList { expr, list, .. } if is_column(expr) => {
            list.iter()
                .filter(|e| !is_param(e))
                .for_each(|e| collect_unmapped(e, out));
        }
        Expr::Between {
            expr, low, high, ..
        } if is_column(expr) => {
            for bound in [low, high] {
                if !is_param(bound) {
                    collect_unmapped(bound, out);
                }
            }
        }
        other => params::visit_expr(other, &mut |p| out.push(p.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::parser::parse;
    use crate::types::LogicalType;
    use pretty_assertions::assert_eq;

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(None)
            .with_table(
                "pets",
                &[
                    ("id", "INTEGER", false),
                    ("name", "VARCHAR(100)", true),
                    ("age", "INTEGER", true),
                    ("owner_id", "INTEGER", false),
                ],
                &["id"],
            )
            .with_table(
                "owners",
                &[("id", "INTEGER", false), ("name", "VARCHAR(100)", false)],
                &["id"],
            )
            .with_table("audit", &[("line", "TEXT", true)], &[])
    }

    fn assemble(sql: &str, options: ModuleOptions) -> DataModule {
        DataModule::assemble(
            "test",
            parse(sql).unwrap(),
            options,
            &catalog(),
            &ResolverConfig::default(),
        )
        .unwrap()
    }

    fn reason(sql: &str) -> Option<ReadOnlyReason> {
        match updatability(&parse(sql).unwrap().statement, &ModuleOptions::default(), &catalog()) {
            Updatability::Updatable { .. } => None,
            Updatability::ReadOnly { reason } => Some(reason),
        }
    }

    #[test]
    fn test_update_pets_is_updatable() {
        let module = assemble(
            "UPDATE pets SET name = :name WHERE id = :id",
            ModuleOptions::default(),
        );
        assert!(module.is_updatable());
        assert_eq!(
            module.resolved().unwrap().updatability,
            Updatability::Updatable {
                table: "pets".into(),
                key: vec!["id".into()],
            }
        );
        let crud = module.crud().unwrap();
        assert_eq!(crud.table, "pets");
        assert_eq!(
            crud.insert.parsed.source,
            "INSERT INTO pets (id, name, age, owner_id) VALUES (:id, :name, :age, :owner_id)"
        );
        assert_eq!(
            crud.update.as_ref().unwrap().parsed.source,
            "UPDATE pets SET name = :name, age = :age, owner_id = :owner_id WHERE id = :id"
        );
        assert_eq!(crud.delete.parsed.source, "DELETE FROM pets WHERE id = :id");
    }

    #[test]
    fn test_select_shapes() {
        assert_eq!(reason("SELECT * FROM pets WHERE owner_id = :o"), None);
        assert_eq!(reason("SELECT p.name FROM pets p"), None);
        assert_eq!(
            reason("SELECT p.name FROM pets p JOIN owners o ON o.id = p.owner_id"),
            Some(ReadOnlyReason::Joins)
        );
        assert_eq!(
            reason("SELECT * FROM pets, owners"),
            Some(ReadOnlyReason::MultipleTables)
        );
        assert_eq!(
            reason("SELECT owner_id, COUNT(*) FROM pets GROUP BY owner_id"),
            Some(ReadOnlyReason::Aggregation)
        );
        assert_eq!(
            reason("SELECT DISTINCT name FROM pets"),
            Some(ReadOnlyReason::Distinct)
        );
        assert_eq!(
            reason("SELECT id FROM pets UNION SELECT id FROM owners"),
            Some(ReadOnlyReason::SetOperation)
        );
        assert_eq!(
            reason("SELECT * FROM (SELECT * FROM pets) p"),
            Some(ReadOnlyReason::NoBaseTable)
        );
        assert_eq!(reason("SELECT 1"), Some(ReadOnlyReason::NoBaseTable));
        assert_eq!(
            reason("SELECT * FROM audit"),
            Some(ReadOnlyReason::NoPrimaryKey {
                table: "audit".into()
            })
        );
    }

    #[test]
    fn test_predicate_parameters_must_map_to_columns() {
        assert_eq!(reason("DELETE FROM pets WHERE id = :id"), None);
        assert_eq!(reason("DELETE FROM pets WHERE :id = id AND age > :min"), None);
        assert_eq!(reason("DELETE FROM pets WHERE id IN (:a, :b)"), None);
        assert_eq!(reason("DELETE FROM pets WHERE age BETWEEN :lo AND :hi"), None);
        assert_eq!(
            reason("DELETE FROM pets WHERE id = :id + 1"),
            Some(ReadOnlyReason::UnmappedParameter {
                parameter: "id".into()
            })
        );
        assert_eq!(
            reason("UPDATE pets SET age = 1 WHERE UPPER(name) = :name"),
            Some(ReadOnlyReason::UnmappedParameter {
                parameter: "name".into()
            })
        );
        // assignments are not predicates
        assert_eq!(reason("UPDATE pets SET age = :age + 1 WHERE id = :id"), None);
    }

    #[test]
    fn test_readonly_sidecar() {
        let options = ModuleOptions {
            readonly: true,
            ..Default::default()
        };
        let module = assemble("SELECT * FROM pets", options);
        assert!(!module.is_updatable());
        assert!(module.crud().is_none());
    }

    #[test]
    fn test_declared_key_makes_keyless_table_updatable() {
        let catalog = catalog().with_table(
            "visits",
            &[("code", "VARCHAR(10)", false), ("note", "TEXT", true)],
            &[],
        );
        let options = ModuleOptions::from_json(r#"{"fields": {"CODE": {"key": true}}}"#).unwrap();
        let module = DataModule::assemble(
            "visits",
            parse("SELECT code, note FROM visits").unwrap(),
            options,
            &catalog,
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(
            module.resolved().unwrap().updatability,
            Updatability::Updatable {
                table: "visits".into(),
                key: vec!["code".into()],
            }
        );
        assert!(module.columns().unwrap()[0].key);
        assert_eq!(
            module.crud().unwrap().delete.parsed.source,
            "DELETE FROM visits WHERE code = :code"
        );
    }

    #[test]
    fn test_writable_limits_crud_tables() {
        let options = ModuleOptions::from_json(r#"{"writable": ["owners"]}"#).unwrap();
        let module = assemble("SELECT * FROM pets", options);
        assert_eq!(
            module.resolved().unwrap().updatability,
            Updatability::ReadOnly {
                reason: ReadOnlyReason::NotWritable {
                    table: "pets".into()
                }
            }
        );
        assert!(module.crud().is_none());

        let options = ModuleOptions::from_json(r#"{"writable": ["PETS"]}"#).unwrap();
        assert!(assemble("SELECT * FROM pets", options).is_updatable());
    }

    #[test]
    fn test_verdict_is_stable() {
        let first = assemble("SELECT * FROM pets WHERE id = :id", ModuleOptions::default());
        let second = assemble("SELECT * FROM pets WHERE id = :id", ModuleOptions::default());
        assert_eq!(first.resolved(), second.resolved());
    }

    #[test]
    fn test_sidecar_types_descriptions_defaults() {
        let options = ModuleOptions::from_json(
            r#"{
                "parameters": {
                    "ownerId": { "description": "Owner key", "default": 3 },
                    "label": { "type": "Text", "default": "x" }
                },
                "fields": { "name": { "description": "Pet name" } }
            }"#,
        )
        .unwrap();
        let module = assemble(
            "SELECT name, :label AS label FROM pets WHERE owner_id = :ownerId",
            options,
        );
        let params = module.parameters().unwrap();
        assert_eq!(params[0].name, "label");
        assert_eq!(params[0].logical, LogicalType::Text);
        assert!(!params[0].low_confidence);
        assert_eq!(params[0].default, Some(Value::Text("x".into())));
        assert_eq!(params[1].description.as_deref(), Some("Owner key"));
        assert_eq!(params[1].default, Some(Value::Integer(3)));
        assert_eq!(
            module.columns().unwrap()[0].description.as_deref(),
            Some("Pet name")
        );
    }

    #[test]
    fn test_field_type_and_nullability_overrides() {
        let options = ModuleOptions::from_json(
            r#"{
                "fields": {
                    "name": { "nullable": false },
                    "age": { "type": "Decimal(5, 1)" },
                    "owner_id": { "reference": { "entity": "owners", "key": "id" } }
                }
            }"#,
        )
        .unwrap();
        let module = assemble("SELECT name, age, owner_id, id FROM pets", options);
        let columns = module.columns().unwrap();
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].logical, LogicalType::Decimal(Some((5, 1))));
        assert!(columns[1].nullable);
        assert_eq!(
            columns[2].reference,
            Some(crate::resolver::ColumnReference {
                entity: "owners".into(),
                key: Some("id".into()),
            })
        );
        assert!(!columns[3].key);
        assert_eq!(columns[3].logical, LogicalType::Integer);
    }

    #[test]
    fn test_bad_default_is_rejected() {
        let options = ModuleOptions::from_json(
            r#"{"parameters": {"ownerId": {"default": "three"}}}"#,
        )
        .unwrap();
        let err = DataModule::assemble(
            "pets",
            parse("SELECT name FROM pets WHERE owner_id = :ownerId").unwrap(),
            options,
            &catalog(),
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::InvalidParameterOption { ref parameter, .. } if parameter == "ownerId"
        ));
    }

    #[test]
    fn test_refresh_reports_changes() {
        let mut module = DataModule::new(
            "pets",
            parse("SELECT name FROM pets").unwrap(),
            ModuleOptions::default(),
        );
        assert!(!module.is_resolved());
        let config = ResolverConfig::default();
        assert!(module.refresh(&catalog(), &config).unwrap());
        assert!(!module.refresh(&catalog(), &config).unwrap());

        let widened = CatalogSnapshot::new(None).with_table(
            "pets",
            &[("id", "INTEGER", false), ("name", "VARCHAR(100)", false)],
            &["id"],
        );
        assert!(module.refresh(&widened, &config).unwrap());
        assert!(!module.columns().unwrap()[0].nullable);
    }

    #[test]
    fn test_failed_resolve_keeps_state() {
        let mut module = assemble("SELECT name FROM pets", ModuleOptions::default());
        let empty = CatalogSnapshot::new(None);
        assert!(module.resolve(&empty, &ResolverConfig::default()).is_err());
        assert!(module.is_resolved());
    }
}
