// @generated by polysql (artifact format 1). Do not edit.
// module: pets/PetsByOwner
// title: Pets of one owner

pub const MODULE: &str = "pets/PetsByOwner";
pub const IDENTIFIER: &str = "pets/pets_by_owner";
pub const SQL: &str = "SELECT name, age FROM pets WHERE owner_id = :ownerId ORDER BY name";
pub const UPDATABLE: bool = true;

#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    /// Owner key
    pub owner_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Pet name
    pub name: Option<String>,
    pub age: Option<i64>,
}

/// (name, logical type, nullable, origin)
pub const COLUMNS: &[(&str, &str, bool, &str)] = &[
    ("name", "Text", true, "pets.name"),
    ("age", "Integer", true, "pets.age"),
];

/// (name, logical type, nullable, occurrences, low confidence)
pub const PARAMETERS: &[(&str, &str, bool, usize, bool)] = &[
    ("ownerId", "Integer", false, 1, false),
];
