//! Native type names to logical types, per backend.
//!
//! Used both for CAST targets in statement text and for the column types a
//! catalog reports.

use crate::transpiler::Dialect;
use crate::types::LogicalType;

/// Argument inside a type's parentheses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeArg {
    Number(u32),
    /// SQL Server `MAX`.
    Max,
}

/// Map a type name (upper-cased words joined by single spaces) and its
/// arguments to a logical type. `None` means the name is unknown to the
/// backend; with `dialect == None` every backend's names are accepted.
pub fn parse_type_name(
    dialect: Option<Dialect>,
    name: &str,
    args: &[TypeArg],
) -> Option<LogicalType> {
    let name = name.to_ascii_uppercase();
    if let Some(ty) = standard(&name, args) {
        return Some(ty);
    }
    match dialect {
        Some(d) => extension(d, &name, args),
        None => Dialect::ALL
            .iter()
            .find_map(|d| extension(*d, &name, args)),
    }
}

/// Logical type of a catalog column type such as `numeric(10,2)`,
/// `TIMESTAMP(6) WITH TIME ZONE` or `int unsigned`. Unknown names map to `Text`.
pub fn logical_from_native(dialect: Option<Dialect>, native: &str) -> LogicalType {
    let upper = native.trim().to_ascii_uppercase();
    let (mut name, args) = match (upper.find('('), upper.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let args = upper[open + 1..close]
                .split(',')
                .filter_map(|a| match a.trim() {
                    "MAX" => Some(TypeArg::Max),
                    n => n.parse().ok().map(TypeArg::Number),
                })
                .collect::<Vec<_>>();
            let rest = format!("{} {}", &upper[..open], &upper[close + 1..]);
            (rest, args)
        }
        _ => (upper.clone(), Vec::new()),
    };
    name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    for suffix in [" UNSIGNED", " IDENTITY", " ZEROFILL"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
        }
    }
    if let Some(unqualified) = name.strip_prefix("MDSYS.") {
        name = unqualified.to_string();
    }
    // MySQL reports booleans as tinyint(1).
    if dialect == Some(Dialect::MySql) && name == "TINYINT" && args == [TypeArg::Number(1)] {
        return LogicalType::Boolean;
    }
    parse_type_name(dialect, &name, &args).unwrap_or(LogicalType::Text)
}

fn decimal(args: &[TypeArg]) -> LogicalType {
    match args {
        [TypeArg::Number(p), TypeArg::Number(s)] => LogicalType::Decimal(Some((*p, *s))),
        [TypeArg::Number(p)] => LogicalType::Decimal(Some((*p, 0))),
        _ => LogicalType::Decimal(None),
    }
}

fn standard(name: &str, args: &[TypeArg]) -> Option<LogicalType> {
    Some(match name {
        "INTEGER" | "INT" | "SMALLINT" | "BIGINT" | "TINYINT" => LogicalType::Integer,
        "DECIMAL" | "NUMERIC" | "DEC" | "NUM" => decimal(args),
        "FLOAT" | "REAL" | "DOUBLE" | "DOUBLE PRECISION" => LogicalType::Decimal(None),
        "CHAR" | "CHARACTER" | "VARCHAR" | "CHAR VARYING" | "CHARACTER VARYING" | "NCHAR"
        | "NATIONAL CHARACTER" | "CLOB" | "CHAR LARGE OBJECT" | "CHARACTER LARGE OBJECT"
        | "TEXT" | "TIME" => LogicalType::Text,
        "BOOLEAN" => LogicalType::Boolean,
        "DATE" => LogicalType::Date,
        "TIMESTAMP"
        | "TIMESTAMP WITH TIME ZONE"
        | "TIMESTAMP WITHOUT TIME ZONE"
        | "TIMESTAMP WITH LOCAL TIME ZONE" => LogicalType::Timestamp,
        "BINARY" | "VARBINARY" | "BLOB" | "BINARY LARGE OBJECT" => LogicalType::Binary,
        _ => return None,
    })
}

fn extension(dialect: Dialect, name: &str, args: &[TypeArg]) -> Option<LogicalType> {
    use LogicalType::*;
    Some(match dialect {
        Dialect::H2 => match name {
            "IDENTITY" => Integer,
            "LONGVARCHAR" | "VARCHAR_IGNORECASE" | "UUID" => Text,
            "LONGVARBINARY" => Binary,
            "GEOMETRY" => Geometry,
            _ => return None,
        },
        Dialect::PostgreSql => match name {
            "INT2" | "INT4" | "INT8" | "SERIAL" | "BIGSERIAL" | "SMALLSERIAL" => Integer,
            "FLOAT4" | "FLOAT8" => Decimal(None),
            "MONEY" => Decimal(None),
            "BPCHAR" | "NAME" | "CITEXT" | "JSON" | "JSONB" | "XML" | "UUID"
            | "TIME WITHOUT TIME ZONE" | "TIME WITH TIME ZONE" | "TIMETZ" | "INTERVAL" => Text,
            "BOOL" => Boolean,
            "TIMESTAMPTZ" => Timestamp,
            "BYTEA" => Binary,
            "GEOMETRY" | "GEOGRAPHY" | "POINT" | "LINE" | "POLYGON" | "PATH" | "BOX"
            | "CIRCLE" => Geometry,
            _ => return None,
        },
        Dialect::MySql => match name {
            "SIGNED" | "SIGNED INTEGER" | "MEDIUMINT" | "SERIAL" | "YEAR" => Integer,
            "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "LONG VARCHAR" | "ENUM" | "SET"
            | "JSON" => Text,
            "BOOL" | "BIT" => Boolean,
            "DATETIME" => Timestamp,
            "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "LONG VARBINARY" => Binary,
            "GEOMETRY" | "POINT" | "LINESTRING" | "POLYGON" | "MULTIPOINT"
            | "MULTILINESTRING" | "MULTIPOLYGON" | "GEOMETRYCOLLECTION" => Geometry,
            _ => return None,
        },
        Dialect::SqlServer => match name {
            "MONEY" | "SMALLMONEY" => Decimal(None),
            "NVARCHAR" | "NTEXT" | "UNIQUEIDENTIFIER" | "SYSNAME" | "XML" => Text,
            "BIT" => Boolean,
            "DATETIME" | "DATETIME2" | "SMALLDATETIME" | "DATETIMEOFFSET" => Timestamp,
            "IMAGE" => Binary,
            "GEOMETRY" | "GEOGRAPHY" => Geometry,
            _ => return None,
        },
        Dialect::Oracle => match name {
            // NUMBER(p) has no fractional digits
            "NUMBER" => match args {
                [TypeArg::Number(_)] => Integer,
                _ => decimal(args),
            },
            "BINARY_FLOAT" | "BINARY_DOUBLE" => Decimal(None),
            "VARCHAR2" | "NVARCHAR2" | "NCLOB" | "LONG" => Text,
            "RAW" | "LONG RAW" => Binary,
            "SDO_GEOMETRY" | "CURVE" | "SURFACE" | "POINT" | "LINESTRING" | "POLYGON"
            | "GEOMETRY" => Geometry,
            _ => return None,
        },
        Dialect::Db2 => match name {
            "DECFLOAT" => Decimal(None),
            "LONG VARCHAR" | "GRAPHIC" | "VARGRAPHIC" | "DBCLOB" | "XML" => Text,
            "LONG VARCHAR FOR BIT DATA" | "VARCHAR FOR BIT DATA" | "CHAR FOR BIT DATA" => Binary,
            _ => return None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_names_in_every_dialect() {
        for d in Dialect::ALL {
            assert_eq!(
                parse_type_name(Some(d), "INTEGER", &[]),
                Some(LogicalType::Integer)
            );
            assert_eq!(
                parse_type_name(Some(d), "DECIMAL", &[TypeArg::Number(10), TypeArg::Number(2)]),
                Some(LogicalType::Decimal(Some((10, 2))))
            );
        }
    }

    #[test]
    fn test_oracle_number() {
        let oracle = Some(Dialect::Oracle);
        assert_eq!(
            parse_type_name(oracle, "NUMBER", &[TypeArg::Number(19)]),
            Some(LogicalType::Integer)
        );
        assert_eq!(
            parse_type_name(oracle, "NUMBER", &[]),
            Some(LogicalType::Decimal(None))
        );
        assert_eq!(parse_type_name(Some(Dialect::H2), "NUMBER", &[]), None);
    }

    #[test]
    fn test_generic_accepts_every_dialect() {
        assert_eq!(parse_type_name(None, "BYTEA", &[]), Some(LogicalType::Binary));
        assert_eq!(parse_type_name(None, "DATETIME2", &[]), Some(LogicalType::Timestamp));
        assert_eq!(parse_type_name(None, "WIDGET", &[]), None);
    }

    #[test]
    fn test_native_catalog_types() {
        let pg = Some(Dialect::PostgreSql);
        assert_eq!(logical_from_native(pg, "int4"), LogicalType::Integer);
        assert_eq!(
            logical_from_native(pg, "numeric(10,2)"),
            LogicalType::Decimal(Some((10, 2)))
        );
        assert_eq!(
            logical_from_native(pg, "timestamp without time zone"),
            LogicalType::Timestamp
        );
        assert_eq!(logical_from_native(pg, "character varying"), LogicalType::Text);
        assert_eq!(
            logical_from_native(Some(Dialect::Oracle), "TIMESTAMP(6) WITH LOCAL TIME ZONE"),
            LogicalType::Timestamp
        );
        assert_eq!(
            logical_from_native(Some(Dialect::Oracle), "MDSYS.SDO_GEOMETRY"),
            LogicalType::Geometry
        );
        assert_eq!(
            logical_from_native(Some(Dialect::MySql), "tinyint(1)"),
            LogicalType::Boolean
        );
        assert_eq!(
            logical_from_native(Some(Dialect::MySql), "bigint(20) unsigned"),
            LogicalType::Integer
        );
        assert_eq!(
            logical_from_native(Some(Dialect::SqlServer), "int identity"),
            LogicalType::Integer
        );
        assert_eq!(logical_from_native(pg, "tsvector"), LogicalType::Text);
    }
}
