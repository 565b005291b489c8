use crate::transpiler::traits::is_plain_identifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// A table, column or alias name with its original spelling.
///
/// Quoted names keep their exact spelling on every backend; bare names are
/// subject to the backend's case folding. Two identifiers are equal when
/// they render the same, so the quoted flag only counts for names that
/// could also be written bare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ident {
    pub value: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub quoted: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Ident {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whether this name refers to the catalog object `actual`: exactly
    /// when quoted, ignoring ASCII case otherwise.
    pub fn matches(&self, actual: &str) -> bool {
        if self.quoted {
            self.value == actual
        } else {
            self.value.eq_ignore_ascii_case(actual)
        }
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && (self.quoted == other.quoted || !is_plain_identifier(&self.value))
    }
}

impl PartialEq<str> for Ident {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl PartialEq<&str> for Ident {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

impl Deref for Ident {
    type Target = str;

    fn deref(&self) -> &str {
        &self.value
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Ident {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&String> for Ident {
    fn from(value: &String) -> Self {
        Self::new(value.as_str())
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting_counts_only_for_plain_names() {
        assert_ne!(Ident::quoted("Name"), Ident::new("Name"));
        assert_ne!(Ident::new("name"), Ident::new("Name"));
        assert_eq!(Ident::quoted("order"), Ident::new("order"));
        assert_eq!(Ident::quoted("my table"), Ident::new("my table"));
        assert_eq!(Ident::new("pets"), "pets");
    }

    #[test]
    fn test_quoted_names_match_exactly() {
        assert!(Ident::new("PETS").matches("pets"));
        assert!(Ident::quoted("Name").matches("Name"));
        assert!(!Ident::quoted("Name").matches("name"));
    }
}
