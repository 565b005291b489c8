use crate::error::DialectError;
use crate::parser::parse;
use crate::transpiler::{Construct, Dialect, RenderMode, ToSql};
use crate::types::LogicalType;
use pretty_assertions::assert_eq;

fn render(sql: &str, dialect: Dialect) -> String {
    parse(sql)
        .unwrap()
        .statement
        .to_sql_with_dialect(dialect, RenderMode::Named)
        .unwrap()
        .sql
}

fn render_err(sql: &str, dialect: Dialect) -> DialectError {
    parse(sql)
        .unwrap()
        .statement
        .to_sql_with_dialect(dialect, RenderMode::Named)
        .unwrap_err()
}

const PAGED: &str = "SELECT name FROM pets ORDER BY name LIMIT 5 OFFSET 10";

#[test]
fn test_paging_per_dialect() {
    assert_eq!(
        render(PAGED, Dialect::H2),
        "SELECT name FROM pets ORDER BY name LIMIT 5 OFFSET 10"
    );
    assert_eq!(
        render(PAGED, Dialect::PostgreSql),
        "SELECT name FROM pets ORDER BY name LIMIT 5 OFFSET 10"
    );
    assert_eq!(
        render(PAGED, Dialect::MySql),
        "SELECT name FROM pets ORDER BY name LIMIT 5 OFFSET 10"
    );
    assert_eq!(
        render(PAGED, Dialect::SqlServer),
        "SELECT name FROM pets ORDER BY name OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    assert_eq!(
        render(PAGED, Dialect::Oracle),
        "SELECT * FROM (SELECT q__.*, ROWNUM AS rn__ FROM (SELECT name FROM pets ORDER BY name) q__ \
         WHERE ROWNUM <= 10 + 5) WHERE rn__ > 10"
    );
    assert_eq!(
        render(PAGED, Dialect::Db2),
        "SELECT name FROM pets ORDER BY name OFFSET 10 ROWS FETCH FIRST 5 ROWS ONLY"
    );
}

#[test]
fn test_limit_only() {
    let sql = "SELECT name FROM pets ORDER BY name LIMIT 3";
    assert_eq!(
        render(sql, Dialect::SqlServer),
        "SELECT TOP (3) name FROM pets ORDER BY name"
    );
    assert_eq!(
        render(sql, Dialect::Oracle),
        "SELECT * FROM (SELECT name FROM pets ORDER BY name) q__ WHERE ROWNUM <= 3"
    );
    assert_eq!(
        render(sql, Dialect::Db2),
        "SELECT name FROM pets ORDER BY name FETCH FIRST 3 ROWS ONLY"
    );
}

#[test]
fn test_offset_only() {
    let sql = "SELECT name FROM pets ORDER BY name OFFSET 4";
    assert_eq!(
        render(sql, Dialect::MySql),
        "SELECT name FROM pets ORDER BY name LIMIT 18446744073709551615 OFFSET 4"
    );
    assert_eq!(render(sql, Dialect::H2), "SELECT name FROM pets ORDER BY name OFFSET 4 ROWS");
    assert_eq!(render(sql, Dialect::PostgreSql), "SELECT name FROM pets ORDER BY name OFFSET 4");
    assert_eq!(
        render(sql, Dialect::SqlServer),
        "SELECT name FROM pets ORDER BY name OFFSET 4 ROWS"
    );
}

#[test]
fn test_sqlserver_offset_needs_order() {
    let err = render_err("SELECT name FROM pets LIMIT 5 OFFSET 10", Dialect::SqlServer);
    assert_eq!(
        err,
        DialectError::Unsupported {
            construct: Construct::PagingWithoutOrder,
            dialect: Dialect::SqlServer,
        }
    );
    assert_eq!(
        render("SELECT name FROM pets LIMIT 5 OFFSET 10", Dialect::Db2),
        "SELECT name FROM pets OFFSET 10 ROWS FETCH FIRST 5 ROWS ONLY"
    );
}

#[test]
fn test_positional_placeholders() {
    let stmt = parse("SELECT * FROM pets WHERE owner_id = :id OR vet_id = :id AND name = :name")
        .unwrap()
        .statement;
    let expected = [
        (Dialect::H2, "?", "?", "?"),
        (Dialect::PostgreSql, "$1", "$2", "$3"),
        (Dialect::MySql, "?", "?", "?"),
        (Dialect::SqlServer, "@p1", "@p2", "@p3"),
        (Dialect::Oracle, ":1", ":2", ":3"),
        (Dialect::Db2, "?", "?", "?"),
    ];
    for (dialect, a, b, c) in expected {
        let rendered = stmt
            .to_sql_with_dialect(dialect, RenderMode::Positional)
            .unwrap();
        assert!(rendered.sql.contains(&format!("owner_id = {}", a)), "{}", rendered.sql);
        assert!(rendered.sql.contains(&format!("vet_id = {}", b)), "{}", rendered.sql);
        assert!(rendered.sql.contains(&format!("name = {}", c)), "{}", rendered.sql);
        assert_eq!(rendered.parameters, vec!["id", "id", "name"]);
    }
}

#[test]
fn test_quoting_per_dialect() {
    let sql = r#"SELECT "order" FROM "Pet Table""#;
    assert_eq!(render(sql, Dialect::MySql), "SELECT `order` FROM `Pet Table`");
    assert_eq!(render(sql, Dialect::SqlServer), "SELECT [order] FROM [Pet Table]");
    assert_eq!(render(sql, Dialect::Oracle), r#"SELECT "order" FROM "Pet Table""#);
}

#[test]
fn test_function_spellings() {
    let sql = "SELECT LENGTH(name), SUBSTRING(name, 1, 2), name || 'x' FROM pets";
    assert_eq!(
        render(sql, Dialect::SqlServer),
        "SELECT LEN(name), SUBSTRING(name, 1, 2), CONCAT(name, 'x') FROM pets"
    );
    assert_eq!(
        render(sql, Dialect::Oracle),
        "SELECT LENGTH(name), SUBSTR(name, 1, 2), name || 'x' FROM pets"
    );
    assert_eq!(
        render(sql, Dialect::MySql),
        "SELECT LENGTH(name), SUBSTRING(name, 1, 2), CONCAT(name, 'x') FROM pets"
    );
}

#[test]
fn test_dummy_tables_and_minus() {
    assert_eq!(render("SELECT 1", Dialect::Oracle), "SELECT 1 FROM DUAL");
    assert_eq!(render("SELECT 1", Dialect::Db2), "SELECT 1 FROM SYSIBM.SYSDUMMY1");
    assert_eq!(render("SELECT 1", Dialect::H2), "SELECT 1");
    assert_eq!(
        render("SELECT a FROM t EXCEPT SELECT a FROM u", Dialect::Oracle),
        "SELECT a FROM t MINUS SELECT a FROM u"
    );
}

#[test]
fn test_unsupported_constructs() {
    assert_eq!(
        render_err("SELECT * FROM t WHERE active = TRUE", Dialect::SqlServer),
        DialectError::Unsupported {
            construct: Construct::BooleanLiteral,
            dialect: Dialect::SqlServer,
        }
    );
    assert_eq!(
        render_err("SELECT a FROM t INTERSECT SELECT a FROM u", Dialect::MySql),
        DialectError::Unsupported {
            construct: Construct::Intersect,
            dialect: Dialect::MySql,
        }
    );
    assert_eq!(
        render_err("DELETE FROM t WHERE id = 1 RETURNING id", Dialect::Oracle),
        DialectError::Unsupported {
            construct: Construct::Returning,
            dialect: Dialect::Oracle,
        }
    );
    assert_eq!(
        render_err("SELECT CAST(a AS BOOLEAN) FROM t", Dialect::Oracle),
        DialectError::Unsupported {
            construct: Construct::CastTo(LogicalType::Boolean),
            dialect: Dialect::Oracle,
        }
    );
    assert_eq!(
        render_err("SELECT a FROM t FULL JOIN u ON t.id = u.id", Dialect::MySql).to_string(),
        "FULL OUTER JOIN is not supported by MySQL"
    );
}

#[test]
fn test_cast_type_names() {
    let sql = "SELECT CAST(a AS VARCHAR), CAST(b AS TIMESTAMP) FROM t";
    assert_eq!(
        render(sql, Dialect::SqlServer),
        "SELECT CAST(a AS NVARCHAR(MAX)), CAST(b AS DATETIME2) FROM t"
    );
    assert_eq!(
        render(sql, Dialect::MySql),
        "SELECT CAST(a AS CHAR), CAST(b AS DATETIME) FROM t"
    );
    assert_eq!(
        render(sql, Dialect::Oracle),
        "SELECT CAST(a AS VARCHAR2(4000)), CAST(b AS TIMESTAMP) FROM t"
    );
}

#[test]
fn test_mysql_string_escapes() {
    assert_eq!(
        render(r"SELECT 'a\b''c' FROM t", Dialect::MySql),
        r"SELECT 'a\\b''c' FROM t"
    );
}
