// @generated by polysql (artifact format 1). Do not edit.
// module: owners/OwnerById

pub const MODULE: &str = "owners/OwnerById";
pub const IDENTIFIER: &str = "owners/owner_by_id";
pub const SQL: &str = "SELECT id, name FROM owners WHERE id = :id";
pub const UPDATABLE: bool = true;

#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: i64,
    pub name: String,
}

/// (name, logical type, nullable, origin)
pub const COLUMNS: &[(&str, &str, bool, &str)] = &[
    ("id", "Integer", false, "owners.id"),
    ("name", "Text", false, "owners.name"),
];

/// (name, logical type, nullable, occurrences, low confidence)
pub const PARAMETERS: &[(&str, &str, bool, usize, bool)] = &[
    ("id", "Integer", false, 1, false),
];
