//! `polysql.toml` configuration.
//!
//! Looked up in order: an explicit path, `./polysql.toml`, then
//! `<config dir>/polysql/config.toml`. `POLYSQL_DATABASE_URL` overrides the
//! database URL from any of them.
//!
//! ```toml
//! dialect = "postgresql"
//! database_url = "postgres://localhost/pets"
//! modules_dir = "modules"
//! catalog = "catalog.json"
//!
//! [parser]
//! max_depth = 32
//!
//! [resolver]
//! fallback_parameter_type = "Text"
//! strict_parameter_types = false
//!
//! [pool]
//! max_connections = 5
//! acquire_timeout_secs = 30
//!
//! [codegen]
//! output_dir = "generated"
//! ```

use crate::error::ConfigError;
use crate::executor::PoolConfig;
use crate::parser::ParserConfig;
use crate::resolver::ResolverConfig;
use crate::transpiler::Dialect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "polysql.toml";
pub const DATABASE_URL_ENV: &str = "POLYSQL_DATABASE_URL";

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodegenConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Target dialect when no database URL implies one.
    #[serde(default)]
    pub dialect: Option<Dialect>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,
    /// Catalog snapshot JSON used when no database is reachable.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub codegen: CodegenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: None,
            database_url: None,
            modules_dir: default_modules_dir(),
            catalog: None,
            parser: ParserConfig::default(),
            resolver: ResolverConfig::default(),
            pool: PoolConfig::default(),
            codegen: CodegenConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Invalid {
            path: origin.to_string(),
            message: e.message().to_string(),
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Load from `explicit`, or the first default location that exists.
    ///
    /// With no file anywhere the defaults apply. The environment override is
    /// applied in every case.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_file(path)?,
            None => match search_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "loading config");
                    Self::load_file(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env(std::env::var(DATABASE_URL_ENV).ok());
        Ok(config)
    }

    fn apply_env(&mut self, database_url: Option<String>) {
        if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
            self.database_url = Some(url);
        }
    }

    /// The dialect in effect: implied by the database URL, else configured.
    pub fn effective_dialect(&self) -> Option<Dialect> {
        self.database_url
            .as_deref()
            .and_then(Dialect::from_url)
            .or(self.dialect)
    }
}

/// Default config locations, most specific first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("polysql").join("config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
dialect = "sqlserver"
modules_dir = "sql"
catalog = "catalog.json"

[parser]
max_depth = 8

[resolver]
fallback_parameter_type = "Integer"
strict_parameter_types = true

[pool]
max_connections = 2

[codegen]
output_dir = "out"
"#,
            "test",
        )
        .unwrap();
        assert_eq!(config.dialect, Some(Dialect::SqlServer));
        assert_eq!(config.modules_dir, PathBuf::from("sql"));
        assert_eq!(config.catalog, Some(PathBuf::from("catalog.json")));
        assert_eq!(config.parser.max_depth, 8);
        assert_eq!(config.resolver.fallback_parameter_type, LogicalType::Integer);
        assert!(config.resolver.strict_parameter_types);
        assert_eq!(config.pool.max_connections, 2);
        assert_eq!(config.pool.acquire_timeout_secs, 30);
        assert_eq!(config.codegen.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(Config::from_toml("", "test").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::from_toml("dialect = \"sybase\"", "polysql.toml").unwrap_err();
        assert!(err.to_string().starts_with("Invalid config polysql.toml"), "{}", err);
    }

    #[test]
    fn test_load_file_and_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polysql.toml");
        std::fs::write(&path, "database_url = \"mysql://localhost/pets\"\n").unwrap();

        let mut config = Config::load_file(&path).unwrap();
        assert_eq!(config.effective_dialect(), Some(Dialect::MySql));

        config.apply_env(Some("postgres://db/pets".into()));
        assert_eq!(config.database_url.as_deref(), Some("postgres://db/pets"));
        assert_eq!(config.effective_dialect(), Some(Dialect::PostgreSql));

        config.apply_env(Some("  ".into()));
        assert_eq!(config.database_url.as_deref(), Some("postgres://db/pets"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/polysql.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
