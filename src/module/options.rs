//! Sidecar options stored next to a module's SQL as `<file>.sql.json`.
//!
//! ```json
//! {
//!   "title": "Pets of one owner",
//!   "readonly": false,
//!   "pageSize": 20,
//!   "writable": ["pets"],
//!   "parameters": { "ownerId": { "type": "Integer", "description": "Owner key", "default": 1 } },
//!   "fields": {
//!     "name": { "description": "Pet name", "nullable": false },
//!     "id": { "key": true },
//!     "owner_id": { "reference": { "entity": "owners", "key": "id" } }
//!   }
//! }
//! ```

use crate::error::ResolutionError;
use crate::resolver::ColumnReference;
use crate::types::LogicalType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Never produce CRUD templates.
    #[serde(default)]
    pub readonly: bool,
    /// Rows per page; paged requests are refused when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    /// Tables CRUD templates may write; any base table when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub writable: Vec<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterOptions>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOptions {
    /// Logical type name, e.g. `Integer` or `Decimal(10, 2)`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value used when the caller binds nothing. `value` is accepted as an alias.
    #[serde(default, alias = "value", skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Parameters of inlined `#module` references this parameter supplies,
    /// keyed by the reference's alias.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binds: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Logical type replacing the inferred one.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Part of the row key; supplies a key for tables the catalog reports without one.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ColumnReference>,
}

impl ModuleOptions {
    pub fn from_json(text: &str) -> Result<Self, String> {
        let options: ModuleOptions = serde_json::from_str(text).map_err(|e| e.to_string())?;
        options.declared_types().map_err(|e| e.to_string())?;
        options.field_types().map_err(|e| e.to_string())?;
        Ok(options)
    }

    /// Parameter options, matched case-insensitively.
    pub fn parameter(&self, name: &str) -> Option<&ParameterOptions> {
        self.parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn field(&self, name: &str) -> Option<&FieldOptions> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Explicitly typed parameters.
    pub fn declared_types(&self) -> Result<Vec<(String, LogicalType)>, ResolutionError> {
        let mut declared = Vec::new();
        for (name, param) in &self.parameters {
            if let Some(type_name) = &param.type_name {
                let ty = LogicalType::from_str(type_name).map_err(|message| {
                    ResolutionError::InvalidParameterOption {
                        parameter: name.clone(),
                        message,
                    }
                })?;
                declared.push((name.clone(), ty));
            }
        }
        Ok(declared)
    }

    /// Explicitly typed fields.
    pub fn field_types(&self) -> Result<Vec<(String, LogicalType)>, ResolutionError> {
        let mut declared = Vec::new();
        for (name, field) in &self.fields {
            if let Some(type_name) = &field.type_name {
                let ty = LogicalType::from_str(type_name).map_err(|message| {
                    ResolutionError::InvalidFieldOption {
                        field: name.clone(),
                        message,
                    }
                })?;
                declared.push((name.clone(), ty));
            }
        }
        Ok(declared)
    }

    /// Fields declared part of the key, in option order.
    pub fn key_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.key)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Whether CRUD templates may write `table`, schema-qualified or not.
    pub fn may_write(&self, table: &str, qualified: &str) -> bool {
        self.writable.is_empty()
            || self
                .writable
                .iter()
                .any(|w| w.eq_ignore_ascii_case(table) || w.eq_ignore_ascii_case(qualified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_json() {
        let options = ModuleOptions::from_json(
            r#"{
                "title": "Pets",
                "pageSize": 20,
                "parameters": {
                    "ownerId": { "type": "Integer", "description": "Owner key", "default": 7 },
                    "since": { "value": "2024-01-01" }
                },
                "fields": { "name": { "description": "Pet name" } }
            }"#,
        )
        .unwrap();
        assert_eq!(options.title.as_deref(), Some("Pets"));
        assert_eq!(options.page_size, Some(20));
        assert!(!options.readonly);
        assert_eq!(
            options.declared_types().unwrap(),
            vec![("ownerId".to_string(), LogicalType::Integer)]
        );
        assert_eq!(
            options.parameter("OWNERID").unwrap().default,
            Some(serde_json::json!(7))
        );
        assert_eq!(
            options.parameter("since").unwrap().default,
            Some(serde_json::json!("2024-01-01"))
        );
        assert_eq!(
            options.field("NAME").unwrap().description.as_deref(),
            Some("Pet name")
        );
    }

    #[test]
    fn test_unknown_type_name_rejected() {
        let err = ModuleOptions::from_json(r#"{"parameters": {"x": {"type": "Widget"}}}"#)
            .unwrap_err();
        assert!(err.contains("parameter ':x'"), "{}", err);
    }

    #[test]
    fn test_field_overrides() {
        let options = ModuleOptions::from_json(
            r#"{
                "writable": ["app.pets"],
                "fields": {
                    "weight": { "type": "Decimal(6, 2)", "nullable": false },
                    "code": { "key": true },
                    "owner": { "reference": { "entity": "owners" } }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            options.field_types().unwrap(),
            vec![("weight".to_string(), LogicalType::Decimal(Some((6, 2))))]
        );
        assert_eq!(options.field("Weight").unwrap().nullable, Some(false));
        assert_eq!(options.key_fields(), vec!["code"]);
        assert_eq!(
            options.field("owner").unwrap().reference,
            Some(ColumnReference {
                entity: "owners".into(),
                key: None
            })
        );
        assert!(options.may_write("pets", "APP.PETS"));
        assert!(!options.may_write("owners", "app.owners"));
        assert!(ModuleOptions::default().may_write("owners", "owners"));

        let err = ModuleOptions::from_json(r#"{"fields": {"w": {"type": "Widget"}}}"#)
            .unwrap_err();
        assert!(err.contains("field 'w'"), "{}", err);
    }

    #[test]
    fn test_empty_sidecar() {
        assert_eq!(ModuleOptions::from_json("{}").unwrap(), ModuleOptions::default());
    }
}
