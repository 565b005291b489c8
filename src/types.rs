//! Logical type system shared by every backend.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend-independent column and parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    Integer,
    /// Exact numeric with optional `(precision, scale)`. Floating types map to `Decimal(None)`.
    Decimal(Option<(u32, u32)>),
    Text,
    Boolean,
    Date,
    Timestamp,
    Binary,
    Geometry,
}

impl LogicalType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal(_))
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }

    /// Whether values of the two types can be compared or assigned.
    pub fn is_compatible(&self, other: &LogicalType) -> bool {
        use LogicalType::*;
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) if a.is_temporal() && b.is_temporal() => true,
            // date and timestamp literals are written as strings
            (Text, b) | (b, Text) if b.is_temporal() => true,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    /// Common type of two compatible types, widening numerics.
    pub fn unify(&self, other: &LogicalType) -> Option<LogicalType> {
        use LogicalType::*;
        if self == other {
            return Some(*self);
        }
        match (self, other) {
            (Integer, Decimal(d)) | (Decimal(d), Integer) => Some(Decimal(*d)),
            (Decimal(_), Decimal(_)) => Some(Decimal(None)),
            (Date, Timestamp) | (Timestamp, Date) => Some(Timestamp),
            (Text, t) | (t, Text) if t.is_temporal() => Some(*t),
            _ => None,
        }
    }

    /// Short name used in generated artifacts and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::Text => "Text",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::Timestamp => "Timestamp",
            Self::Binary => "Binary",
            Self::Geometry => "Geometry",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal(Some((p, s))) => write!(f, "Decimal({}, {})", p, s),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for LogicalType {
    type Err = String;

    /// Parse names like `Integer`, `text` or `Decimal(10, 2)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (head, args) = match s.find('(') {
            Some(open) if s.ends_with(')') => (&s[..open], Some(&s[open + 1..s.len() - 1])),
            _ => (s, None),
        };
        match head.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "bigint" => Ok(Self::Integer),
            "decimal" | "number" | "numeric" => match args {
                None => Ok(Self::Decimal(None)),
                Some(args) => {
                    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
                    match parts.as_slice() {
                        [precision, scale] => {
                            let p = precision
                                .parse()
                                .map_err(|_| format!("bad precision in '{}'", s))?;
                            let sc = scale.parse().map_err(|_| format!("bad scale in '{}'", s))?;
                            Ok(Self::Decimal(Some((p, sc))))
                        }
                        _ => Err(format!("expected Decimal(p, s), got '{}'", s)),
                    }
                }
            },
            "text" | "string" => Ok(Self::Text),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            "binary" | "blob" => Ok(Self::Binary),
            "geometry" => Ok(Self::Geometry),
            _ => Err(format!("unknown logical type '{}'", s)),
        }
    }
}

/// Runtime value in the logical type system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Binary(Vec<u8>),
    /// Geometry as well-known text.
    Geometry(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Logical type of the value, `None` for NULL.
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(LogicalType::Boolean),
            Self::Integer(_) => Some(LogicalType::Integer),
            Self::Decimal(_) => Some(LogicalType::Decimal(None)),
            Self::Text(_) => Some(LogicalType::Text),
            Self::Date(_) => Some(LogicalType::Date),
            Self::Timestamp(_) => Some(LogicalType::Timestamp),
            Self::Binary(_) => Some(LogicalType::Binary),
            Self::Geometry(_) => Some(LogicalType::Geometry),
        }
    }

    /// Whether this value may be bound where `expected` is required. NULL fits anywhere.
    pub fn fits(&self, expected: &LogicalType) -> bool {
        match (self, expected) {
            (Self::Null, _) => true,
            (Self::Text(_), LogicalType::Geometry) => true,
            (Self::Integer(_), LogicalType::Decimal(_)) => true,
            (Self::Decimal(_), LogicalType::Integer) => false,
            (value, expected) => value
                .logical_type()
                .is_some_and(|actual| actual.is_compatible(expected)),
        }
    }

    /// Short description used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self.logical_type() {
            Some(t) => t.name(),
            None => "Null",
        }
    }

    /// Convert a JSON value (parameter default, CLI argument) into the given type.
    pub fn from_json(json: &serde_json::Value, ty: &LogicalType) -> Result<Value, String> {
        use serde_json::Value as J;
        match (json, ty) {
            (J::Null, _) => Ok(Value::Null),
            (J::Bool(b), LogicalType::Boolean) => Ok(Value::Boolean(*b)),
            (J::Number(n), LogicalType::Integer) => n
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| format!("{} is not an integer", n)),
            (J::Number(n), LogicalType::Decimal(_)) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .map(Value::Decimal)
                .map_err(|e| e.to_string()),
            (J::String(s), ty) => Value::parse_as(s, ty),
            (other, ty) => Err(format!("cannot use {} as {}", other, ty)),
        }
    }

    /// Parse text into a value of the given type.
    pub fn parse_as(text: &str, ty: &LogicalType) -> Result<Value, String> {
        let bad = |e: &dyn fmt::Display| format!("'{}' is not a valid {}: {}", text, ty, e);
        match ty {
            LogicalType::Integer => text.trim().parse().map(Value::Integer).map_err(|e| bad(&e)),
            LogicalType::Decimal(_) => Decimal::from_str(text.trim())
                .or_else(|_| Decimal::from_scientific(text.trim()))
                .map(Value::Decimal)
                .map_err(|e| bad(&e)),
            LogicalType::Text => Ok(Value::Text(text.to_string())),
            LogicalType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" | "no" => Ok(Value::Boolean(false)),
                _ => Err(bad(&"expected true or false")),
            },
            LogicalType::Date => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| bad(&e)),
            LogicalType::Timestamp => parse_timestamp(text.trim())
                .map(Value::Timestamp)
                .ok_or_else(|| bad(&"expected YYYY-MM-DD HH:MM:SS")),
            LogicalType::Binary => Ok(Value::Binary(text.as_bytes().to_vec())),
            LogicalType::Geometry => Ok(Value::Geometry(text.to_string())),
        }
    }
}

/// Timestamps come back from drivers in a handful of textual shapes.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Text(s) | Self::Geometry(s) => write!(f, "{}", s),
            Self::Date(d) => write!(f, "{}", d),
            Self::Timestamp(t) => write!(f, "{}", t),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(
            LogicalType::Integer.unify(&LogicalType::Decimal(Some((10, 2)))),
            Some(LogicalType::Decimal(Some((10, 2))))
        );
        assert_eq!(LogicalType::Integer.unify(&LogicalType::Text), None);
    }

    #[test]
    fn test_compatibility() {
        assert!(LogicalType::Text.is_compatible(&LogicalType::Date));
        assert!(!LogicalType::Integer.is_compatible(&LogicalType::Text));
        assert!(!LogicalType::Boolean.is_compatible(&LogicalType::Integer));
        assert!(LogicalType::Decimal(None).is_compatible(&LogicalType::Decimal(Some((5, 1)))));
    }

    #[test]
    fn test_parse_logical_type() {
        assert_eq!("integer".parse::<LogicalType>(), Ok(LogicalType::Integer));
        assert_eq!(
            "Decimal(10, 2)".parse::<LogicalType>(),
            Ok(LogicalType::Decimal(Some((10, 2))))
        );
        assert!("varchar".parse::<LogicalType>().is_err());
    }

    #[test]
    fn test_value_fits() {
        assert!(Value::Integer(1).fits(&LogicalType::Decimal(None)));
        assert!(Value::Null.fits(&LogicalType::Boolean));
        assert!(!Value::Text("x".into()).fits(&LogicalType::Integer));
        assert!(Value::Text("2024-01-01".into()).fits(&LogicalType::Date));
    }

    #[test]
    fn test_value_from_json() {
        let v = Value::from_json(&serde_json::json!(42), &LogicalType::Integer).unwrap();
        assert_eq!(v, Value::Integer(42));
        let d = Value::from_json(&serde_json::json!("2024-03-01"), &LogicalType::Date).unwrap();
        assert_eq!(d, Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(Value::from_json(&serde_json::json!("x"), &LogicalType::Integer).is_err());
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        assert!(parse_timestamp("2024-01-02 03:04:05").is_some());
        assert!(parse_timestamp("2024-01-02T03:04:05.123").is_some());
        assert!(parse_timestamp("2024-01-02").is_some());
        assert!(parse_timestamp("nope").is_none());
    }
}
