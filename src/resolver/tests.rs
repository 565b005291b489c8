use super::*;
use crate::catalog::CatalogSnapshot;
use crate::parser::parse;
use crate::transpiler::Dialect;
use pretty_assertions::assert_eq;

fn clinic() -> CatalogSnapshot {
    CatalogSnapshot::new(Some(Dialect::PostgreSql))
        .with_table(
            "pets",
            &[
                ("id", "int8", false),
                ("owner_id", "integer", false),
                ("name", "text", true),
                ("age", "integer", true),
                ("born", "date", true),
            ],
            &["id"],
        )
        .with_table(
            "owners",
            &[
                ("id", "int8", false),
                ("name", "varchar(40)", false),
                ("city", "text", true),
            ],
            &["id"],
        )
        .with_table(
            "visits",
            &[
                ("id", "int8", false),
                ("pet_id", "int8", false),
                ("visit_date", "date", false),
                ("cost", "numeric(8,2)", true),
            ],
            &["id"],
        )
}

fn resolved(sql: &str) -> Resolution {
    resolve(&parse(sql).unwrap(), &clinic(), &ResolverConfig::default()).unwrap()
}

fn failure(sql: &str) -> ResolutionError {
    resolve(&parse(sql).unwrap(), &clinic(), &ResolverConfig::default()).unwrap_err()
}

fn table_origin(table: &str, column: &str) -> ColumnOrigin {
    ColumnOrigin::Table {
        table: table.into(),
        column: column.into(),
    }
}

#[test]
fn test_pets_by_owner() {
    let r = resolved("SELECT name, age FROM pets WHERE owner_id = :ownerId ORDER BY name");
    assert_eq!(
        r.parameters,
        vec![ParameterMetadata {
            name: "ownerId".into(),
            logical: LogicalType::Integer,
            nullable: false,
            occurrences: vec![0],
            low_confidence: false,
            description: None,
            default: None,
        }]
    );
    assert_eq!(
        r.columns,
        vec![
            ColumnMetadata {
                name: "name".into(),
                logical: LogicalType::Text,
                nullable: true,
                origin: table_origin("pets", "name"),
                description: None,
                key: false,
                reference: None,
            },
            ColumnMetadata {
                name: "age".into(),
                logical: LogicalType::Integer,
                nullable: true,
                origin: table_origin("pets", "age"),
                description: None,
                key: false,
                reference: None,
            },
        ]
    );
    assert!(r.warnings.is_empty());
}

#[test]
fn test_resolution_is_deterministic() {
    let sql = "SELECT p.name, o.city FROM pets p LEFT JOIN owners o ON o.id = p.owner_id \
               WHERE p.age BETWEEN :lo AND :hi";
    assert_eq!(resolved(sql), resolved(sql));
}

#[test]
fn test_wildcards_expand_in_catalog_order() {
    let r = resolved("SELECT o.*, p.name AS pet FROM owners o JOIN pets p ON p.owner_id = o.id");
    let names: Vec<&str> = r.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "city", "pet"]);
    assert_eq!(resolved("SELECT * FROM visits").columns.len(), 4);
}

#[test]
fn test_outer_join_makes_optional_side_nullable() {
    let r = resolved("SELECT o.name, p.owner_id FROM owners o LEFT JOIN pets p ON p.owner_id = o.id");
    assert!(!r.columns[0].nullable);
    assert!(r.columns[1].nullable);

    let r = resolved("SELECT o.name, p.owner_id FROM owners o RIGHT JOIN pets p ON p.owner_id = o.id");
    assert!(r.columns[0].nullable);
    assert!(!r.columns[1].nullable);
}

#[test]
fn test_computed_column_names_and_types() {
    let r = resolved(
        "SELECT COUNT(*), age + 1, UPPER(name), SUM(cost), name || '!' \
         FROM pets JOIN visits ON visits.pet_id = pets.id GROUP BY age, name",
    );
    let summary: Vec<(&str, LogicalType, bool)> = r
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.logical, c.nullable))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("count", LogicalType::Integer, false),
            ("column2", LogicalType::Integer, true),
            ("upper", LogicalType::Text, true),
            ("sum", LogicalType::Decimal(None), true),
            ("column5", LogicalType::Text, true),
        ]
    );
    assert!(r.columns.iter().all(|c| c.origin == ColumnOrigin::Computed));
}

#[test]
fn test_parameter_evidence_sites() {
    let r = resolved(
        "SELECT name FROM pets WHERE id IN (:a, :b) AND name LIKE :pattern \
         AND born BETWEEN :since AND :until ORDER BY name LIMIT :size OFFSET :start",
    );
    let types: Vec<(&str, LogicalType, bool)> = r
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.logical, p.nullable))
        .collect();
    assert_eq!(
        types,
        vec![
            ("a", LogicalType::Integer, false),
            ("b", LogicalType::Integer, false),
            ("pattern", LogicalType::Text, true),
            ("since", LogicalType::Date, true),
            ("until", LogicalType::Date, true),
            ("size", LogicalType::Integer, false),
            ("start", LogicalType::Integer, false),
        ]
    );
}

#[test]
fn test_repeated_parameter_is_one_entry() {
    let r = resolved("SELECT name FROM pets WHERE (:name IS NULL OR name = :name) AND owner_id = :owner");
    assert_eq!(r.parameters.len(), 2);
    let name = r.parameter("name").unwrap();
    assert_eq!(name.occurrences, vec![0, 1]);
    assert_eq!(name.logical, LogicalType::Text);
    assert!(name.nullable);
}

#[test]
fn test_dml_parameters_follow_target_columns() {
    let r = resolved("INSERT INTO pets (id, owner_id, name) VALUES (:id, :owner, :name)");
    assert!(r.columns.is_empty());
    assert!(!r.parameter("id").unwrap().nullable);
    assert!(r.parameter("name").unwrap().nullable);

    let r = resolved("UPDATE pets SET age = :age WHERE id = :id");
    assert_eq!(r.parameter("age").unwrap().logical, LogicalType::Integer);
    assert!(r.parameter("age").unwrap().nullable);
    assert!(!r.parameter("id").unwrap().nullable);

    let r = resolved("DELETE FROM visits WHERE visit_date < :before RETURNING id");
    assert_eq!(r.parameter("before").unwrap().logical, LogicalType::Date);
    assert_eq!(r.columns[0].origin, table_origin("visits", "id"));
}

#[test]
fn test_function_signatures_give_evidence() {
    let r = resolved("SELECT name FROM pets WHERE UPPER(name) = UPPER(:name) AND age > ABS(:delta)");
    assert_eq!(r.parameter("name").unwrap().logical, LogicalType::Text);
    assert_eq!(r.parameter("delta").unwrap().logical, LogicalType::Decimal(None));
}

#[test]
fn test_fallback_type_is_low_confidence() {
    let sql = "SELECT name FROM pets WHERE my_udf(:opaque) = 1";
    let parsed = parse(sql).unwrap();

    let r = resolve(&parsed, &clinic(), &ResolverConfig::default()).unwrap();
    let opaque = r.parameter("opaque").unwrap();
    assert_eq!(opaque.logical, LogicalType::Text);
    assert!(opaque.low_confidence);
    assert!(matches!(
        r.warnings.as_slice(),
        [ResolutionError::UnresolvedParameterType { parameter, .. }] if parameter == "opaque"
    ));

    let integer = ResolverConfig {
        fallback_parameter_type: LogicalType::Integer,
        strict_parameter_types: false,
    };
    let r = resolve(&parsed, &clinic(), &integer).unwrap();
    assert_eq!(r.parameter("opaque").unwrap().logical, LogicalType::Integer);

    let strict = ResolverConfig {
        strict_parameter_types: true,
        ..ResolverConfig::default()
    };
    let err = resolve(&parsed, &clinic(), &strict).unwrap_err();
    assert_eq!(
        err,
        ResolutionError::UnresolvedParameterType {
            parameter: "opaque".into(),
            position: parsed.occurrences[0].position,
        }
    );
}

#[test]
fn test_declared_type_overrides_inference() {
    let parsed = parse("SELECT name FROM pets WHERE my_udf(:opaque) = 1 AND age = :age").unwrap();
    let config = ResolverConfig::default();
    let r = Resolver::new(&clinic(), &config)
        .declare("OPAQUE", LogicalType::Integer)
        .resolve(&parsed)
        .unwrap();
    assert_eq!(r.parameter("opaque").unwrap().logical, LogicalType::Integer);
    assert!(!r.parameter("opaque").unwrap().low_confidence);
    assert!(r.warnings.is_empty());

    let err = Resolver::new(&clinic(), &config)
        .declare("age", LogicalType::Boolean)
        .resolve(&parsed)
        .unwrap_err();
    assert!(matches!(err, ResolutionError::TypeMismatch { .. }));
}

#[test]
fn test_unknown_names_suggest_alternatives() {
    assert_eq!(
        failure("SELECT nmae FROM pets"),
        ResolutionError::UnknownColumn {
            column: "nmae".into(),
            suggestion: Some("name".into()),
        }
    );
    assert_eq!(
        failure("SELECT name FROM pest"),
        ResolutionError::UnknownTable {
            table: "pest".into(),
            suggestion: Some("pets".into()),
        }
    );
    assert_eq!(
        failure("UPDATE pets SET nme = 'x'"),
        ResolutionError::UnknownColumn {
            column: "pets.nme".into(),
            suggestion: Some("name".into()),
        }
    );
}

#[test]
fn test_ambiguous_column() {
    assert_eq!(
        failure("SELECT name FROM pets JOIN owners ON owners.id = pets.owner_id"),
        ResolutionError::AmbiguousColumn {
            column: "name".into(),
            tables: vec!["pets".into(), "owners".into()],
        }
    );
}

#[test]
fn test_type_mismatches() {
    assert!(matches!(
        failure("SELECT name FROM pets WHERE age = 'old'"),
        ResolutionError::TypeMismatch { left: LogicalType::Integer, right: LogicalType::Text, .. }
    ));
    assert!(matches!(
        failure("SELECT name FROM pets WHERE owner_id = :x OR name = :x"),
        ResolutionError::TypeMismatch { .. }
    ));
}

#[test]
fn test_correlated_subquery_sees_outer_scope() {
    let r = resolved(
        "SELECT o.name FROM owners o WHERE EXISTS \
         (SELECT 1 FROM pets p WHERE p.owner_id = o.id AND p.age > :minAge)",
    );
    assert_eq!(r.parameter("minAge").unwrap().logical, LogicalType::Integer);

    let r = resolved(
        "SELECT name, (SELECT MAX(visit_date) FROM visits v WHERE v.pet_id = pets.id) AS last_visit FROM pets",
    );
    assert_eq!(r.columns[1].name, "last_visit");
    assert_eq!(r.columns[1].logical, LogicalType::Date);
    assert!(r.columns[1].nullable);
}

#[test]
fn test_derived_table_keeps_origin() {
    let r = resolved("SELECT x.n FROM (SELECT name AS n FROM owners) x");
    assert_eq!(r.columns[0].origin, table_origin("owners", "name"));
    assert!(!r.columns[0].nullable);
}

#[test]
fn test_set_operations() {
    let r = resolved("SELECT name FROM pets UNION SELECT name FROM owners ORDER BY name");
    assert_eq!(r.columns.len(), 1);
    assert!(r.columns[0].nullable);
    assert_eq!(
        failure("SELECT id, name FROM pets UNION SELECT id FROM owners"),
        ResolutionError::SetOperationArity { left: 2, right: 1 }
    );
}

#[test]
fn test_join_condition_types_parameters() {
    let r = resolved(
        "SELECT p.name FROM pets p JOIN owners o ON o.id = p.owner_id AND o.city = :city",
    );
    let city = r.parameter("city").unwrap();
    assert_eq!(city.logical, LogicalType::Text);
    assert!(!city.low_confidence);
}

#[test]
fn test_insert_values_arity() {
    assert_eq!(
        failure("INSERT INTO pets (id, name) VALUES (:a)"),
        ResolutionError::ValuesArity {
            table: "pets".into(),
            values: 1,
            columns: 2,
        }
    );
    assert_eq!(
        failure("INSERT INTO owners VALUES (1, 'Ann')"),
        ResolutionError::ValuesArity {
            table: "owners".into(),
            values: 2,
            columns: 3,
        }
    );
}
