//! Typed stub generation.
//!
//! Every resolved data module becomes one Rust source file holding its
//! statement, a `Params` struct, a `Row` struct and the metadata tables.
//! The output depends on resolved metadata only, so generating twice from
//! unchanged modules yields identical bytes and identical hashes.
//!
//! ```ignore
//! let modules = polysql::module::load_dir(Path::new("modules"), None, &ParserConfig::default())?;
//! let artifacts = polysql::codegen::generate(&modules)?;
//! polysql::codegen::golden::write_dir(Path::new("generated"), &artifacts)?;
//! ```

pub mod golden;

use crate::error::GenerationError;
use crate::module::DataModule;
use crate::resolver::{ColumnMetadata, ColumnOrigin, ParameterMetadata};
use crate::transpiler::ToSql;
use crate::types::LogicalType;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Bumped whenever the artifact layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    /// Name of the data module it was generated from.
    pub module: String,
    /// snake_case module path, unique across one generation.
    pub identifier: String,
    /// Path relative to the output directory, `/`-separated.
    pub file_name: String,
    pub content: String,
    /// Hex SHA-256 of `content`.
    pub hash: String,
}

/// Generate one artifact per module, ordered by identifier.
pub fn generate(modules: &[DataModule]) -> Result<Vec<GeneratedArtifact>, GenerationError> {
    let mut by_identifier: BTreeMap<String, Vec<&DataModule>> = BTreeMap::new();
    for module in modules {
        by_identifier
            .entry(module_identifier(&module.name))
            .or_default()
            .push(module);
    }

    let mut artifacts = Vec::with_capacity(modules.len());
    for (identifier, group) in by_identifier {
        if group.len() > 1 {
            let mut names: Vec<String> = group.iter().map(|m| m.name.clone()).collect();
            names.sort();
            return Err(GenerationError::AmbiguousModuleName {
                identifier,
                modules: names,
            });
        }
        artifacts.push(generate_module(group[0])?);
    }
    tracing::debug!(count = artifacts.len(), "generated artifacts");
    Ok(artifacts)
}

/// Generate the artifact of a single module.
pub fn generate_module(module: &DataModule) -> Result<GeneratedArtifact, GenerationError> {
    let resolved = module
        .resolved()
        .ok_or_else(|| GenerationError::UnresolvedMetadata {
            module: module.name.clone(),
        })?;
    let identifier = module_identifier(&module.name);
    let content = render_artifact(
        module,
        &identifier,
        &resolved.resolution.columns,
        &resolved.resolution.parameters,
        resolved.updatability.is_updatable(),
    );
    let hash = content_hash(&content);
    Ok(GeneratedArtifact {
        module: module.name.clone(),
        file_name: format!("{}.rs", identifier),
        identifier,
        content,
        hash,
    })
}

pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn render_artifact(
    module: &DataModule,
    identifier: &str,
    columns: &[ColumnMetadata],
    parameters: &[ParameterMetadata],
    updatable: bool,
) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "// @generated by polysql (artifact format {}). Do not edit.",
        FORMAT_VERSION
    ));
    lines.push(format!("// module: {}", module.name));
    if let Some(title) = &module.options.title {
        lines.push(format!("// title: {}", single_line(title)));
    }
    lines.push(String::new());
    lines.push(format!("pub const MODULE: &str = {:?};", module.name));
    lines.push(format!("pub const IDENTIFIER: &str = {:?};", identifier));
    lines.push(format!(
        "pub const SQL: &str = {:?};",
        module.parsed.statement.to_sql()
    ));
    lines.push(format!("pub const UPDATABLE: bool = {};", updatable));
    lines.push(String::new());

    lines.push("#[derive(Debug, Clone, PartialEq)]".to_string());
    lines.push("pub struct Params {".to_string());
    let param_fields = field_names(parameters.iter().map(|p| p.name.as_str()));
    for (param, field) in parameters.iter().zip(&param_fields) {
        push_doc(&mut lines, param.description.as_deref());
        lines.push(format!(
            "    pub {}: {},",
            field,
            rust_type(&param.logical, param.nullable)
        ));
    }
    lines.push("}".to_string());
    lines.push(String::new());

    lines.push("#[derive(Debug, Clone, PartialEq)]".to_string());
    lines.push("pub struct Row {".to_string());
    let column_fields = field_names(columns.iter().map(|c| c.name.as_str()));
    for (column, field) in columns.iter().zip(&column_fields) {
        push_doc(&mut lines, column.description.as_deref());
        lines.push(format!(
            "    pub {}: {},",
            field,
            rust_type(&column.logical, column.nullable)
        ));
    }
    lines.push("}".to_string());
    lines.push(String::new());

    lines.push("/// (name, logical type, nullable, origin)".to_string());
    lines.push("pub const COLUMNS: &[(&str, &str, bool, &str)] = &[".to_string());
    for column in columns {
        let origin = match &column.origin {
            ColumnOrigin::Table { table, column } => format!("{}.{}", table, column),
            ColumnOrigin::Computed => "computed".to_string(),
        };
        lines.push(format!(
            "    ({:?}, {:?}, {}, {:?}),",
            column.name,
            column.logical.to_string(),
            column.nullable,
            origin
        ));
    }
    lines.push("];".to_string());
    lines.push(String::new());

    lines.push("/// (name, logical type, nullable, occurrences, low confidence)".to_string());
    lines.push(
        "pub const PARAMETERS: &[(&str, &str, bool, usize, bool)] = &[".to_string(),
    );
    for param in parameters {
        lines.push(format!(
            "    ({:?}, {:?}, {}, {}, {}),",
            param.name,
            param.logical.to_string(),
            param.nullable,
            param.occurrences.len(),
            param.low_confidence
        ));
    }
    lines.push("];".to_string());

    let mut content = lines.join("\n");
    content.push('\n');
    content
}

fn push_doc(lines: &mut Vec<String>, description: Option<&str>) {
    if let Some(text) = description {
        for line in text.lines() {
            lines.push(format!("    /// {}", line.trim_end()).trim_end().to_string());
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rust type of a generated field.
pub fn rust_type(logical: &LogicalType, nullable: bool) -> String {
    let base = match logical {
        LogicalType::Integer => "i64",
        LogicalType::Decimal(_) => "rust_decimal::Decimal",
        LogicalType::Text | LogicalType::Geometry => "String",
        LogicalType::Boolean => "bool",
        LogicalType::Date => "chrono::NaiveDate",
        LogicalType::Timestamp => "chrono::NaiveDateTime",
        LogicalType::Binary => "Vec<u8>",
    };
    if nullable {
        format!("Option<{}>", base)
    } else {
        base.to_string()
    }
}

/// snake_case path of a module name: `orders/OrderLines` -> `orders/order_lines`.
pub fn module_identifier(name: &str) -> String {
    name.split('/')
        .filter(|segment| !segment.is_empty())
        .map(to_snake_case)
        .collect::<Vec<_>>()
        .join("/")
}

/// Field identifiers for a struct, unique within it.
fn field_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .map(|name| {
            let base = rust_ident(&to_snake_case(name));
            let mut candidate = base.clone();
            let mut n = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}_{}", base, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Convert camelCase, PascalCase or spaced names to snake_case.
///
/// # Example
/// ```
/// assert_eq!(polysql::codegen::to_snake_case("ownerId"), "owner_id");
/// ```
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 && !out.is_empty() && !out.ends_with('_') {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    let trimmed = out.trim_end_matches('_');
    match trimmed.chars().next() {
        None => "_".to_string(),
        Some(first) if first.is_ascii_digit() => format!("_{}", trimmed),
        Some(_) => trimmed.to_string(),
    }
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "yield",
];

fn rust_ident(name: &str) -> String {
    match name {
        "self" | "super" | "crate" | "Self" => format!("{}_", name),
        _ if KEYWORDS.contains(&name) => format!("r#{}", name),
        _ => name.to_string(),
    }
}
