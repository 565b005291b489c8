//! Metadata resolution: result columns and parameters of a statement,
//! derived from a catalog snapshot.
//!
//! Resolution is a pure function of the parsed statement, the catalog and
//! the configuration. The tree is only read; metadata is returned separately.

pub mod functions;
pub mod scope;

mod expr;
#[cfg(test)]
mod tests;

use crate::ast::*;
use crate::catalog::{Catalog, ColumnInfo, TableInfo, did_you_mean};
use crate::error::ResolutionError;
use crate::parser::ParsedStatement;
use crate::types::{LogicalType, Value};
use scope::{Relation, Scope};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Where a result column comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnOrigin {
    Table { table: String, column: String },
    Computed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub logical: LogicalType,
    pub nullable: bool,
    pub origin: ColumnOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared part of the row's key by module options.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ColumnReference>,
}

/// The entity a column points at, as declared in module options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReference {
    pub entity: String,
    /// Referenced key column; the entity's own key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    pub name: String,
    pub logical: LogicalType,
    pub nullable: bool,
    /// Ordinals of every reference, in textual order.
    pub occurrences: Vec<usize>,
    /// The type is the configured fallback, not inferred.
    pub low_confidence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Resolved metadata of one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub columns: Vec<ColumnMetadata>,
    pub parameters: Vec<ParameterMetadata>,
    /// Non-fatal findings, such as parameters typed by the fallback.
    #[serde(serialize_with = "as_messages")]
    pub warnings: Vec<ResolutionError>,
}

impl Resolution {
    pub fn parameter(&self, name: &str) -> Option<&ParameterMetadata> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

fn as_messages<S: Serializer>(warnings: &[ResolutionError], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(warnings.iter().map(|w| w.to_string()))
}

fn fallback_type() -> LogicalType {
    LogicalType::Text
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Type given to parameters with no type evidence.
    #[serde(default = "fallback_type")]
    pub fallback_parameter_type: LogicalType,
    /// Fail instead of falling back.
    #[serde(default)]
    pub strict_parameter_types: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fallback_parameter_type: fallback_type(),
            strict_parameter_types: false,
        }
    }
}

/// Resolve with no declared parameter types.
pub fn resolve(
    parsed: &ParsedStatement,
    catalog: &dyn Catalog,
    config: &ResolverConfig,
) -> Result<Resolution, ResolutionError> {
    Resolver::new(catalog, config).resolve(parsed)
}

/// One piece of type evidence for a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Evidence {
    logical: LogicalType,
    nullable: bool,
}

/// Type of an expression while resolving.
#[derive(Debug, Clone, PartialEq)]
struct Typed {
    /// `None` for NULL, parameters and opaque functions.
    logical: Option<LogicalType>,
    nullable: bool,
    origin: ColumnOrigin,
}

impl Typed {
    fn known(logical: LogicalType, nullable: bool) -> Self {
        Self {
            logical: Some(logical),
            nullable,
            origin: ColumnOrigin::Computed,
        }
    }

    fn unknown() -> Self {
        Self {
            logical: None,
            nullable: true,
            origin: ColumnOrigin::Computed,
        }
    }

    fn of_column(column: &ColumnInfo) -> Self {
        Self::known(column.logical, column.nullable)
    }
}

pub struct Resolver<'c> {
    catalog: &'c dyn Catalog,
    config: &'c ResolverConfig,
    /// Types fixed by the module definition, keyed by lower-cased name.
    declared: BTreeMap<String, LogicalType>,
    evidence: BTreeMap<String, Vec<Evidence>>,
    warnings: Vec<ResolutionError>,
}

impl<'c> Resolver<'c> {
    pub fn new(catalog: &'c dyn Catalog, config: &'c ResolverConfig) -> Self {
        Self {
            catalog,
            config,
            declared: BTreeMap::new(),
            evidence: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Fix a parameter's type instead of inferring it.
    pub fn declare(mut self, name: &str, logical: LogicalType) -> Self {
        self.declared.insert(name.to_ascii_lowercase(), logical);
        self
    }

    pub fn resolve(mut self, parsed: &ParsedStatement) -> Result<Resolution, ResolutionError> {
        let columns = match &parsed.statement {
            Statement::Query(q) => self.query(q, None)?,
            Statement::Insert(insert) => self.insert(insert)?,
            Statement::Update(update) => self.update(update)?,
            Statement::Delete(delete) => self.delete(delete)?,
        };
        let parameters = self.parameters(parsed)?;
        tracing::debug!(
            kind = parsed.statement.kind(),
            columns = columns.len(),
            parameters = parameters.len(),
            warnings = self.warnings.len(),
            "resolved statement"
        );
        Ok(Resolution {
            columns,
            parameters,
            warnings: self.warnings,
        })
    }

    fn parameters(
        &mut self,
        parsed: &ParsedStatement,
    ) -> Result<Vec<ParameterMetadata>, ResolutionError> {
        let mut parameters = Vec::with_capacity(parsed.parameters.len());
        for name in &parsed.parameters {
            let key = name.to_ascii_lowercase();
            let evidence = self.evidence.get(&key).map(Vec::as_slice).unwrap_or(&[]);

            let mut inferred: Option<LogicalType> = None;
            for e in evidence {
                inferred = Some(match inferred {
                    None => e.logical,
                    Some(t) => t.unify(&e.logical).ok_or(ResolutionError::TypeMismatch {
                        context: format!("uses of parameter :{}", name),
                        left: t,
                        right: e.logical,
                    })?,
                });
            }
            let nullable = evidence.iter().all(|e| e.nullable);

            let (logical, low_confidence) = match (self.declared.get(&key), inferred) {
                (Some(declared), Some(inferred)) if !declared.is_compatible(&inferred) => {
                    return Err(ResolutionError::TypeMismatch {
                        context: format!("parameter :{}", name),
                        left: *declared,
                        right: inferred,
                    });
                }
                (Some(declared), _) => (*declared, false),
                (None, Some(inferred)) => (inferred, false),
                (None, None) => {
                    let position = parsed
                        .occurrences_of(name)
                        .next()
                        .map(|o| o.position)
                        .unwrap_or_default();
                    let err = ResolutionError::UnresolvedParameterType {
                        parameter: name.clone(),
                        position,
                    };
                    if self.config.strict_parameter_types {
                        return Err(err);
                    }
                    tracing::warn!(
                        parameter = %name,
                        fallback = %self.config.fallback_parameter_type,
                        "no type evidence for parameter"
                    );
                    self.warnings.push(err);
                    (self.config.fallback_parameter_type, true)
                }
            };

            parameters.push(ParameterMetadata {
                name: name.clone(),
                logical,
                nullable,
                occurrences: parsed.occurrences_of(name).map(|o| o.ordinal).collect(),
                low_confidence,
                description: None,
                default: None,
            });
        }
        Ok(parameters)
    }

    fn record(&mut self, name: &str, logical: LogicalType, nullable: bool) {
        self.evidence
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(Evidence { logical, nullable });
    }

    fn table(&self, name: &TableName) -> Result<&'c TableInfo, ResolutionError> {
        self.catalog
            .table(name)
            .ok_or_else(|| ResolutionError::UnknownTable {
                table: name.to_string(),
                suggestion: did_you_mean(&name.name, &self.catalog.table_names()),
            })
    }

    fn query(
        &mut self,
        query: &Query,
        parent: Option<&Scope<'_>>,
    ) -> Result<Vec<ColumnMetadata>, ResolutionError> {
        let columns = match &query.body {
            SetExpr::Select(select) => self.select(select, parent, &query.order_by)?,
            body => {
                let columns = self.set_expr(body, parent)?;
                // ORDER BY of a compound query sees only its output columns
                let mut scope = Scope::nested(parent);
                scope.push(output_relation(&columns));
                self.order_by(&query.order_by, &columns, &scope)?;
                columns
            }
        };
        if let Some(limit) = &query.limit {
            let scope = Scope::nested(parent);
            for e in [&limit.count, &limit.offset].into_iter().flatten() {
                self.expect(e, LogicalType::Integer, false, &scope, "paging")?;
            }
        }
        Ok(columns)
    }

    fn set_expr(
        &mut self,
        body: &SetExpr,
        parent: Option<&Scope<'_>>,
    ) -> Result<Vec<ColumnMetadata>, ResolutionError> {
        match body {
            SetExpr::Select(select) => self.select(select, parent, &[]),
            SetExpr::Query(query) => self.query(query, parent),
            SetExpr::SetOperation {
                op, left, right, ..
            } => {
                let left = self.set_expr(left, parent)?;
                let right = self.set_expr(right, parent)?;
                if left.len() != right.len() {
                    return Err(ResolutionError::SetOperationArity {
                        left: left.len(),
                        right: right.len(),
                    });
                }
                left.into_iter()
                    .zip(right)
                    .map(|(l, r)| {
                        let logical = l.logical.unify(&r.logical).ok_or_else(|| {
                            ResolutionError::TypeMismatch {
                                context: format!("{} column '{}'", set_operator_name(*op), l.name),
                                left: l.logical,
                                right: r.logical,
                            }
                        })?;
                        let origin = if l.origin == r.origin {
                            l.origin
                        } else {
                            ColumnOrigin::Computed
                        };
                        Ok(ColumnMetadata {
                            name: l.name,
                            logical,
                            nullable: l.nullable || r.nullable,
                            origin,
                            description: None,
                            key: false,
                            reference: None,
                        })
                    })
                    .collect()
            }
        }
    }

    fn select(
        &mut self,
        select: &Select,
        parent: Option<&Scope<'_>>,
        order_by: &[OrderByExpr],
    ) -> Result<Vec<ColumnMetadata>, ResolutionError> {
        let mut scope = Scope::nested(parent);
        for twj in &select.from {
            self.table_with_joins(twj, &mut scope)?;
        }
        if let Some(selection) = &select.selection {
            self.condition(selection, &scope)?;
        }
        for group in &select.group_by {
            self.expr(group, &scope)?;
        }
        if let Some(having) = &select.having {
            self.condition(having, &scope)?;
        }
        let columns = self.projection(&select.projection, &scope)?;
        self.order_by(order_by, &columns, &scope)?;
        Ok(columns)
    }

    fn order_by(
        &mut self,
        items: &[OrderByExpr],
        output: &[ColumnMetadata],
        scope: &Scope<'_>,
    ) -> Result<(), ResolutionError> {
        for item in items {
            let is_output_name = matches!(
                &item.expr,
                Expr::Column { qualifier: None, name }
                    if output.iter().any(|c| c.name.eq_ignore_ascii_case(name))
            );
            if !is_output_name {
                self.expr(&item.expr, scope)?;
            }
        }
        Ok(())
    }

    fn table_with_joins(
        &mut self,
        twj: &TableWithJoins,
        scope: &mut Scope<'_>,
    ) -> Result<(), ResolutionError> {
        let first = scope.relations().len();
        let relation = self.relation(&twj.relation, scope.parent())?;
        scope.push(relation);

        for join in &twj.joins {
            let mut relation = self.relation(&join.relation, scope.parent())?;
            match join.kind {
                JoinKind::Left => relation.make_nullable(),
                JoinKind::Right => scope.relations_mut()[first..]
                    .iter_mut()
                    .for_each(Relation::make_nullable),
                JoinKind::Full => {
                    relation.make_nullable();
                    scope.relations_mut()[first..]
                        .iter_mut()
                        .for_each(Relation::make_nullable);
                }
                JoinKind::Inner | JoinKind::Cross => {}
            }
            let joined_name = relation.name.clone();
            scope.push(relation);

            match &join.constraint {
                JoinConstraint::On(condition) => {
                    self.condition(condition, scope)?;
                }
                JoinConstraint::Using(columns) => {
                    for column in columns {
                        if let Some(name) = &joined_name {
                            scope.lookup(Some(name), column)?;
                        }
                        scope.add_using(column);
                    }
                }
                JoinConstraint::None => {}
            }
        }
        Ok(())
    }

    /// Relation for a FROM item. Derived tables see the enclosing scope, not their siblings.
    fn relation(
        &mut self,
        factor: &TableFactor,
        outer: Option<&Scope<'_>>,
    ) -> Result<Relation, ResolutionError> {
        match factor {
            TableFactor::Table { name, alias } => {
                Ok(Relation::from_table(self.table(name)?, alias.as_deref()))
            }
            TableFactor::Derived { subquery, alias } => {
                let columns = self.query(subquery, outer)?;
                let mut relation = output_relation(&columns);
                relation.name = alias.as_ref().map(|a| a.value.clone());
                Ok(relation)
            }
            TableFactor::Module { name, .. } => Err(ResolutionError::UnlinkedModule {
                module: name.clone(),
            }),
        }
    }

    fn projection(
        &mut self,
        items: &[SelectItem],
        scope: &Scope<'_>,
    ) -> Result<Vec<ColumnMetadata>, ResolutionError> {
        let mut columns = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match item {
                SelectItem::Wildcard => {
                    for relation in scope.relations() {
                        columns.extend(relation_columns(relation));
                    }
                }
                SelectItem::QualifiedWildcard(qualifier) => {
                    let relation = scope.local_relation(qualifier).ok_or_else(|| {
                        let names: Vec<String> =
                            scope.relations().iter().filter_map(|r| r.name.clone()).collect();
                        ResolutionError::UnknownTable {
                            table: qualifier.value.clone(),
                            suggestion: did_you_mean(qualifier, &names),
                        }
                    })?;
                    columns.extend(relation_columns(relation));
                }
                SelectItem::Expr { expr, alias } => {
                    let typed = self.expr(expr, scope)?;
                    let name = match (alias, expr) {
                        (Some(alias), _) => alias.value.clone(),
                        (None, Expr::Column { name, .. }) => name.value.clone(),
                        (None, Expr::Function(f)) => f.name.to_ascii_lowercase(),
                        (None, _) => format!("column{}", index + 1),
                    };
                    columns.push(ColumnMetadata {
                        name,
                        logical: typed.logical.unwrap_or(LogicalType::Text),
                        nullable: typed.nullable,
                        origin: typed.origin,
                        description: None,
                        key: false,
                        reference: None,
                    });
                }
            }
        }
        Ok(columns)
    }

    fn insert(&mut self, insert: &Insert) -> Result<Vec<ColumnMetadata>, ResolutionError> {
        let table = self.table(&insert.table)?;
        let targets: Vec<&ColumnInfo> = if insert.columns.is_empty() {
            table.columns.iter().collect()
        } else {
            insert
                .columns
                .iter()
                .map(|c| column_of(table, c))
                .collect::<Result<_, _>>()?
        };

        let empty = Scope::root();
        match &insert.source {
            InsertSource::Values(rows) => {
                for row in rows {
                    if row.len() != targets.len() {
                        return Err(ResolutionError::ValuesArity {
                            table: table.name.clone(),
                            values: row.len(),
                            columns: targets.len(),
                        });
                    }
                    for (value, target) in row.iter().zip(&targets) {
                        let context = format!("INSERT INTO {} ({})", table.name, target.name);
                        self.expect_typed(value, &Typed::of_column(target), &empty, &context)?;
                    }
                }
            }
            InsertSource::Query(query) => {
                let selected = self.query(query, None)?;
                if selected.len() != targets.len() {
                    return Err(ResolutionError::InvalidSubquery(format!(
                        "INSERT INTO {} selects {} columns for {} targets",
                        table.name,
                        selected.len(),
                        targets.len()
                    )));
                }
                for (item, target) in query.first_select().projection.iter().zip(&targets) {
                    if let SelectItem::Expr { expr, .. } = item {
                        self.infer(expr, &Typed::of_column(target));
                    }
                }
            }
        }

        let mut scope = Scope::root();
        scope.push(Relation::from_table(table, None));
        self.projection(&insert.returning, &scope)
    }

    fn update(&mut self, update: &Update) -> Result<Vec<ColumnMetadata>, ResolutionError> {
        let table = self.table(&update.table)?;
        let mut scope = Scope::root();
        scope.push(Relation::from_table(table, update.alias.as_deref()));

        for assignment in &update.assignments {
            let target = column_of(table, &assignment.column)?;
            let context = format!("SET {}", target.name);
            self.expect_typed(&assignment.value, &Typed::of_column(target), &scope, &context)?;
        }
        if let Some(selection) = &update.selection {
            self.condition(selection, &scope)?;
        }
        self.projection(&update.returning, &scope)
    }

    fn delete(&mut self, delete: &Delete) -> Result<Vec<ColumnMetadata>, ResolutionError> {
        let table = self.table(&delete.table)?;
        let mut scope = Scope::root();
        scope.push(Relation::from_table(table, delete.alias.as_deref()));
        if let Some(selection) = &delete.selection {
            self.condition(selection, &scope)?;
        }
        self.projection(&delete.returning, &scope)
    }
}

fn set_operator_name(op: SetOperator) -> &'static str {
    match op {
        SetOperator::Union => "UNION",
        SetOperator::Intersect => "INTERSECT",
        SetOperator::Except => "EXCEPT",
    }
}

fn column_of<'t>(table: &'t TableInfo, name: &str) -> Result<&'t ColumnInfo, ResolutionError> {
    table
        .column(name)
        .ok_or_else(|| ResolutionError::UnknownColumn {
            column: format!("{}.{}", table.name, name),
            suggestion: did_you_mean(name, &table.column_names()),
        })
}

fn relation_columns(relation: &Relation) -> impl Iterator<Item = ColumnMetadata> + '_ {
    relation.columns.iter().map(|c| ColumnMetadata {
        name: c.name.clone(),
        logical: c.logical,
        nullable: c.nullable,
        origin: c.origin.clone(),
        description: None,
        key: false,
        reference: None,
    })
}

/// Relation exposing a query's output columns.
fn output_relation(columns: &[ColumnMetadata]) -> Relation {
    Relation {
        name: None,
        columns: columns
            .iter()
            .map(|c| scope::RelationColumn {
                name: c.name.clone(),
                logical: c.logical,
                nullable: c.nullable,
                origin: c.origin.clone(),
            })
            .collect(),
    }
}
