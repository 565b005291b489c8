//! Signatures of the functions the resolver knows how to type.
//!
//! Functions missing from the registry are opaque: their result is untyped
//! and their arguments give no evidence for parameters.

use crate::types::LogicalType;

/// Expected type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Exact(LogicalType),
    Numeric,
    /// Same type as the other `Peer` arguments.
    Peer,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    Fixed(LogicalType),
    /// Common type of the `Peer` arguments.
    Peer,
    /// Integer when every argument is, otherwise an unconstrained decimal.
    Widened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    Never,
    /// Null when any argument is.
    Propagate,
    /// Null only when every argument is.
    AllArgs,
    Always,
}

#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub name: &'static str,
    pub args: &'static [ArgType],
    /// Extra arguments repeat the last entry of `args`.
    pub variadic: bool,
    pub returns: Returns,
    pub nullable: Nullability,
}

impl Signature {
    pub fn arg(&self, index: usize) -> Option<ArgType> {
        match self.args.get(index) {
            Some(arg) => Some(*arg),
            None if self.variadic => self.args.last().copied(),
            None => None,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.name, "COUNT" | "SUM" | "AVG" | "MIN" | "MAX")
    }
}

use ArgType::*;
use LogicalType::{Date, Integer, Text, Timestamp};

const fn sig(
    name: &'static str,
    args: &'static [ArgType],
    returns: Returns,
    nullable: Nullability,
) -> Signature {
    Signature {
        name,
        args,
        variadic: false,
        returns,
        nullable,
    }
}

const fn variadic(
    name: &'static str,
    args: &'static [ArgType],
    returns: Returns,
    nullable: Nullability,
) -> Signature {
    Signature {
        name,
        args,
        variadic: true,
        returns,
        nullable,
    }
}

const TEXT: ArgType = Exact(Text);
const INT: ArgType = Exact(Integer);

static FUNCTIONS: &[Signature] = &[
    // aggregates are null over an empty group, except COUNT
    sig("COUNT", &[Any], Returns::Fixed(Integer), Nullability::Never),
    sig("SUM", &[Numeric], Returns::Widened, Nullability::Always),
    sig("AVG", &[Numeric], Returns::Fixed(LogicalType::Decimal(None)), Nullability::Always),
    sig("MIN", &[Peer], Returns::Peer, Nullability::Always),
    sig("MAX", &[Peer], Returns::Peer, Nullability::Always),
    sig("UPPER", &[TEXT], Returns::Fixed(Text), Nullability::Propagate),
    sig("LOWER", &[TEXT], Returns::Fixed(Text), Nullability::Propagate),
    sig("TRIM", &[TEXT], Returns::Fixed(Text), Nullability::Propagate),
    sig("LTRIM", &[TEXT], Returns::Fixed(Text), Nullability::Propagate),
    sig("RTRIM", &[TEXT], Returns::Fixed(Text), Nullability::Propagate),
    sig("LENGTH", &[TEXT], Returns::Fixed(Integer), Nullability::Propagate),
    sig("SUBSTRING", &[TEXT, INT, INT], Returns::Fixed(Text), Nullability::Propagate),
    sig("REPLACE", &[TEXT, TEXT, TEXT], Returns::Fixed(Text), Nullability::Propagate),
    sig("ABS", &[Numeric], Returns::Widened, Nullability::Propagate),
    sig("ROUND", &[Numeric, INT], Returns::Widened, Nullability::Propagate),
    sig("FLOOR", &[Numeric], Returns::Widened, Nullability::Propagate),
    sig("CEIL", &[Numeric], Returns::Widened, Nullability::Propagate),
    sig("MOD", &[INT, INT], Returns::Fixed(Integer), Nullability::Propagate),
    variadic("COALESCE", &[Peer], Returns::Peer, Nullability::AllArgs),
    sig("NULLIF", &[Peer, Peer], Returns::Peer, Nullability::Always),
    sig("CURRENT_DATE", &[], Returns::Fixed(Date), Nullability::Never),
    sig("CURRENT_TIMESTAMP", &[], Returns::Fixed(Timestamp), Nullability::Never),
    sig("CURRENT_TIME", &[], Returns::Fixed(Text), Nullability::Never),
    sig("NOW", &[], Returns::Fixed(Timestamp), Nullability::Never),
];

/// Signature for an upper-cased function name.
pub fn lookup(name: &str) -> Option<&'static Signature> {
    FUNCTIONS.iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_variadic_args() {
        let coalesce = lookup("COALESCE").unwrap();
        assert_eq!(coalesce.arg(5), Some(ArgType::Peer));
        let substring = lookup("SUBSTRING").unwrap();
        assert_eq!(substring.arg(1), Some(ArgType::Exact(LogicalType::Integer)));
        assert_eq!(substring.arg(3), None);
        assert!(lookup("COUNT").unwrap().is_aggregate());
        assert!(lookup("MY_UDF").is_none());
    }
}
