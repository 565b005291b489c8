use crate::ast::Statement;
use crate::error::DialectError;
use crate::transpiler::sql::db2::Db2Generator;
use crate::transpiler::sql::h2::H2Generator;
use crate::transpiler::sql::mysql::MysqlGenerator;
use crate::transpiler::sql::oracle::OracleGenerator;
use crate::transpiler::sql::postgres::PostgresGenerator;
use crate::transpiler::sql::sqlserver::SqlServerGenerator;
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{Construct, RenderOptions, RenderedSql, dml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported SQL backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    H2,
    #[default]
    PostgreSql,
    MySql,
    SqlServer,
    Oracle,
    Db2,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::H2,
        Dialect::PostgreSql,
        Dialect::MySql,
        Dialect::SqlServer,
        Dialect::Oracle,
        Dialect::Db2,
    ];

    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::H2 => Box::new(H2Generator),
            Dialect::PostgreSql => Box::new(PostgresGenerator),
            Dialect::MySql => Box::new(MysqlGenerator),
            Dialect::SqlServer => Box::new(SqlServerGenerator),
            Dialect::Oracle => Box::new(OracleGenerator),
            Dialect::Db2 => Box::new(Db2Generator),
        }
    }

    pub fn supports(&self, construct: Construct) -> bool {
        self.generator().supports(construct)
    }

    pub fn render(
        &self,
        statement: &Statement,
        options: &RenderOptions,
    ) -> Result<RenderedSql, DialectError> {
        let generator = self.generator();
        let mut renderer = dml::Renderer::new(generator.as_ref(), options.mode);
        let sql = renderer.statement(statement)?;
        tracing::debug!(dialect = %self, %sql, "rendered statement");
        Ok(renderer.finish(sql))
    }

    /// Backend implied by a connection URL scheme. SQLite speaks the H2 dialect.
    pub fn from_url(url: &str) -> Option<Dialect> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Dialect::PostgreSql),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "sqlite" | "h2" => Some(Dialect::H2),
            "mssql" | "sqlserver" => Some(Dialect::SqlServer),
            "oracle" => Some(Dialect::Oracle),
            "db2" => Some(Dialect::Db2),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::H2 => "H2",
            Dialect::PostgreSql => "PostgreSQL",
            Dialect::MySql => "MySQL",
            Dialect::SqlServer => "SQL Server",
            Dialect::Oracle => "Oracle",
            Dialect::Db2 => "DB2",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace([' ', '-', '_'], "").as_str() {
            "h2" => Ok(Dialect::H2),
            "postgresql" | "postgres" | "pg" => Ok(Dialect::PostgreSql),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlserver" | "mssql" | "tsql" => Ok(Dialect::SqlServer),
            "oracle" => Ok(Dialect::Oracle),
            "db2" => Ok(Dialect::Db2),
            _ => Err(format!("unknown dialect '{}'", s)),
        }
    }
}
