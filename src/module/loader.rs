//! Load data modules from a directory tree of `.sql` files.
//!
//! `reports/pets.sql` becomes module `reports/pets`; an optional
//! `reports/pets.sql.json` next to it holds the module options. A module
//! may use another as a table with `FROM #reports/pets`.

use super::{DataModule, ModuleOptions, link};
use crate::error::{ConfigError, PolyError};
use crate::parser::ParserConfig;
use crate::transpiler::Dialect;
use std::fs;
use std::path::{Path, PathBuf};

/// Every module under `root`, sorted by name, with `#module` references
/// inlined. Modules are not resolved.
pub fn load_dir(
    root: &Path,
    dialect: Option<Dialect>,
    config: &ParserConfig,
) -> Result<Vec<DataModule>, PolyError> {
    let mut files = Vec::new();
    collect_sql_files(root, &mut files)?;
    files.sort();

    let mut modules = Vec::with_capacity(files.len());
    for path in &files {
        modules.push(load_file(root, path, dialect, config)?);
    }
    link(&mut modules, config)?;
    tracing::info!(dir = %root.display(), modules = modules.len(), "loaded data modules");
    Ok(modules)
}

/// Load one `.sql` file; its module name is its path relative to `root`.
pub fn load_file(
    root: &Path,
    path: &Path,
    dialect: Option<Dialect>,
    config: &ParserConfig,
) -> Result<DataModule, PolyError> {
    let name = module_name(root, path);
    let sql = fs::read_to_string(path)?;
    let options = load_options(path)?;
    tracing::debug!(module = %name, path = %path.display(), "loading module");
    DataModule::from_sql(name, sql.trim_end(), dialect, options, config)
}

/// Relative path without the `.sql` extension, `/`-separated.
pub fn module_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut file = path.as_os_str().to_owned();
    file.push(".json");
    PathBuf::from(file)
}

fn load_options(path: &Path) -> Result<ModuleOptions, PolyError> {
    let sidecar = sidecar_path(path);
    if !sidecar.exists() {
        return Ok(ModuleOptions::default());
    }
    let text = fs::read_to_string(&sidecar).map_err(|source| ConfigError::Read {
        path: sidecar.display().to_string(),
        source,
    })?;
    let options = ModuleOptions::from_json(&text).map_err(|message| ConfigError::Invalid {
        path: sidecar.display().to_string(),
        message,
    })?;
    Ok(options)
}

fn collect_sql_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PolyError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sql_files(&path, out)?;
        } else if path.extension().is_some_and(|e| e == "sql") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_nested_modules_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pets.sql", "SELECT name FROM pets WHERE owner_id = :ownerId\n");
        write(
            dir.path(),
            "pets.sql.json",
            r#"{"title": "Pets", "pageSize": 10}"#,
        );
        write(dir.path(), "reports/by_owner.sql", "SELECT owner_id FROM pets");
        write(dir.path(), "reports/notes.txt", "not a module");

        let modules = load_dir(dir.path(), None, &ParserConfig::default()).unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["pets", "reports/by_owner"]);
        assert_eq!(modules[0].options.title.as_deref(), Some("Pets"));
        assert_eq!(modules[0].options.page_size, Some(10));
        assert_eq!(modules[0].parsed.parameters, vec!["ownerId"]);
        assert_eq!(modules[1].options, ModuleOptions::default());
        assert!(!modules[0].is_resolved());
    }

    #[test]
    fn test_parse_error_names_module() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.sql", "SELECT * FROM");
        let err = load_dir(dir.path(), None, &ParserConfig::default()).unwrap_err();
        assert!(
            matches!(&err, PolyError::Module { module, .. } if module == "broken"),
            "{}",
            err
        );
    }

    #[test]
    fn test_invalid_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pets.sql", "SELECT name FROM pets");
        write(dir.path(), "pets.sql.json", r#"{"pageSize": "ten"}"#);
        let err = load_dir(dir.path(), None, &ParserConfig::default()).unwrap_err();
        assert!(matches!(err, PolyError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_references_are_inlined_on_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pets/all.sql", "SELECT id, name, owner_id FROM pets WHERE age > :age");
        write(
            dir.path(),
            "report.sql",
            "SELECT p.name FROM #pets/all p WHERE p.owner_id = :ownerId",
        );
        write(
            dir.path(),
            "report.sql.json",
            r#"{"parameters": {"minAge": {"binds": {"p": ["age"]}}}}"#,
        );

        let modules = load_dir(dir.path(), None, &ParserConfig::default()).unwrap();
        let report = modules.iter().find(|m| m.name == "report").unwrap();
        assert_eq!(
            report.parsed.source,
            "SELECT p.name FROM (SELECT id, name, owner_id FROM pets WHERE age > :minAge) p \
             WHERE p.owner_id = :ownerId"
        );
        assert_eq!(report.parsed.parameters, vec!["minAge", "ownerId"]);
    }

    #[test]
    fn test_cyclic_references_fail_the_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.sql", "SELECT x FROM #b");
        write(dir.path(), "b.sql", "SELECT x FROM #a");
        let err = load_dir(dir.path(), None, &ParserConfig::default()).unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"), "{}", err);
    }

    #[test]
    fn test_module_name() {
        let root = Path::new("/srv/modules");
        assert_eq!(
            module_name(root, Path::new("/srv/modules/a/b/pets.sql")),
            "a/b/pets"
        );
    }
}
