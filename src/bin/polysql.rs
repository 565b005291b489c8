//! polysql: data module toolkit
//!
//! # Usage
//!
//! ```bash
//! # Render one statement for a backend
//! polysql render "SELECT name FROM pets ORDER BY name LIMIT 5 OFFSET 10" -d oracle
//!
//! # Resolve every module against a catalog and write typed stubs
//! polysql generate --catalog catalog.json
//!
//! # Run a module
//! polysql exec pets/by_owner --bind ownerId=7 --offset 10 --limit 5
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use polysql::catalog::{CatalogSnapshot, introspect::introspect_url};
use polysql::codegen::{self, golden};
use polysql::config::Config;
use polysql::executor::{ExecutionRequest, Executor, SqlxPool};
use polysql::module::{self, DataModule};
use polysql::parser::parse_with;
use polysql::transpiler::{Dialect, RenderMode, ToSql};
use polysql::types::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polysql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-database data modules: parse, resolve, render, run, generate", long_about = None)]
struct Cli {
    /// Config file (default: ./polysql.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Target dialect, overriding the config
    #[arg(short, long, global = true)]
    dialect: Option<Dialect>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    format: OutputFormat,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a statement and show its tree and parameters
    Parse {
        /// SQL text or path to a .sql file
        input: String,
    },
    /// Render a statement for one dialect, or for every dialect
    Render {
        /// SQL text or path to a .sql file
        input: String,
        /// Backend bind markers instead of :name
        #[arg(long)]
        positional: bool,
        /// Render for every dialect
        #[arg(long)]
        all: bool,
    },
    /// Resolve column and parameter metadata of modules
    Resolve {
        /// Module names (default: every module)
        modules: Vec<String>,
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Write one typed stub per module
    Generate {
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Compare generated stubs against golden files
    Check {
        /// Golden directory (default: the codegen output dir)
        golden: Option<PathBuf>,
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Execute a module against the configured database
    Exec {
        module: String,
        /// Parameter value as name=value, repeatable
        #[arg(short, long = "bind", value_name = "NAME=VALUE")]
        binds: Vec<String>,
        #[arg(long)]
        offset: Option<u64>,
        #[arg(long)]
        limit: Option<u64>,
        /// Zero-based page of the module's page size
        #[arg(long, conflicts_with_all = ["offset", "limit"])]
        page: Option<u64>,
        /// Result column to order by; suffix with :desc for descending
        #[arg(long = "order")]
        order: Vec<String>,
        /// Deadline in seconds
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long, env = "POLYSQL_DATABASE_URL")]
        url: Option<String>,
    },
    /// Snapshot a live database catalog as JSON
    Introspect {
        #[arg(long, env = "POLYSQL_DATABASE_URL")]
        url: Option<String>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dialect) = cli.dialect {
        config.dialect = Some(dialect);
    }

    match &cli.command {
        Commands::Parse { input } => parse_command(input, &cli, &config)?,
        Commands::Render {
            input,
            positional,
            all,
        } => render_command(input, *positional, *all, &cli, &config)?,
        Commands::Resolve { modules, catalog } => {
            let loaded = load_modules(&config, catalog.as_deref()).await?;
            resolve_command(&loaded, modules, cli.format)?;
        }
        Commands::Generate { out, catalog } => {
            let loaded = load_modules(&config, catalog.as_deref()).await?;
            let dir = out.clone().unwrap_or_else(|| config.codegen.output_dir.clone());
            let artifacts = codegen::generate(&loaded)?;
            let written = golden::write_dir(&dir, &artifacts)?;
            println!(
                "{} {} artifacts in {} ({} written)",
                "✓".green(),
                artifacts.len(),
                dir.display(),
                written.len()
            );
        }
        Commands::Check { golden: dir, catalog } => {
            let loaded = load_modules(&config, catalog.as_deref()).await?;
            let dir = dir.clone().unwrap_or_else(|| config.codegen.output_dir.clone());
            let artifacts = codegen::generate(&loaded)?;
            let report = golden::compare_dir(&dir, &artifacts)?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Pretty => print!("{}", report),
            }
            if !report.is_clean() {
                anyhow::bail!("generated stubs differ from {}", dir.display());
            }
            println!("{} golden files match", "✓".green());
        }
        Commands::Exec {
            module: name,
            binds,
            offset,
            limit,
            page,
            order,
            timeout,
            url,
        } => {
            let url = url
                .clone()
                .or_else(|| config.database_url.clone())
                .context("no database URL; pass --url or set database_url")?;
            let pool = SqlxPool::connect(&url, &config.pool).await?;
            let catalog = polysql::catalog::introspect::introspect(
                pool.inner(),
                Dialect::from_url(&url).unwrap_or_default(),
                url.starts_with("sqlite:"),
            )
            .await?;
            let mut modules = module::load_dir(&config.modules_dir, None, &config.parser)?;
            let target = modules
                .iter_mut()
                .find(|m| m.name == *name)
                .with_context(|| format!("no module named '{}'", name))?;
            target
                .resolve(&catalog, &config.resolver)
                .map_err(|e| polysql::error::PolyError::in_module(name.clone(), e))?;

            let mut request = ExecutionRequest::new();
            for bind in binds {
                let (name, value) = parse_binding(target, bind)?;
                request = request.bind(name, value);
            }
            if let Some(page) = page {
                request = request.page(*page);
            } else if offset.is_some() || limit.is_some() {
                request = request.window(offset.unwrap_or(0), limit.unwrap_or(u64::MAX));
            }
            for item in order {
                let (column, ascending) = match item.rsplit_once(':') {
                    Some((column, dir)) if dir.eq_ignore_ascii_case("desc") => (column, false),
                    Some((column, dir)) if dir.eq_ignore_ascii_case("asc") => (column, true),
                    _ => (item.as_str(), true),
                };
                request = request.order_by(column, ascending);
            }
            if let Some(secs) = timeout {
                request = request.deadline(Duration::from_secs(*secs));
            }

            let executor = Executor::new(Arc::new(pool));
            let result = executor.execute(target, &request).await?;
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result.to_json())?)
                }
                OutputFormat::Pretty => {
                    if result.columns.is_empty() {
                        println!("{} {} rows affected", "✓".green(), result.rows_affected);
                    } else {
                        print_rows(&result);
                    }
                }
            }
        }
        Commands::Introspect { url, out } => {
            let url = url
                .clone()
                .or_else(|| config.database_url.clone())
                .context("no database URL; pass --url or set database_url")?;
            let snapshot = introspect_url(&url).await?;
            let json = snapshot.to_json()?;
            match out {
                Some(path) => {
                    std::fs::write(path, json)?;
                    println!(
                        "{} {} tables written to {}",
                        "✓".green(),
                        snapshot.tables.len(),
                        path.display()
                    );
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("POLYSQL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(input: &str) -> Result<String> {
    let path = Path::new(input);
    if path.is_file() {
        return std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()));
    }
    Ok(input.to_string())
}

fn parse_command(input: &str, cli: &Cli, config: &Config) -> Result<()> {
    let sql = read_input(input)?;
    let parsed = parse_with(&sql, config.dialect, &config.parser)?;
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&parsed)?),
        OutputFormat::Pretty => {
            println!("{} {}", "Statement:".dimmed(), parsed.statement.to_sql().white().bold());
            if parsed.parameters.is_empty() {
                println!("{} none", "Parameters:".dimmed());
            } else {
                println!("{}", "Parameters:".dimmed());
                for name in &parsed.parameters {
                    println!(
                        "  :{} ({} uses)",
                        name.cyan(),
                        parsed.occurrences_of(name).count()
                    );
                }
            }
        }
    }
    Ok(())
}

fn render_command(
    input: &str,
    positional: bool,
    all: bool,
    cli: &Cli,
    config: &Config,
) -> Result<()> {
    let sql = read_input(input)?;
    let parsed = parse_with(&sql, None, &config.parser)?;
    let mode = if positional {
        RenderMode::Positional
    } else {
        RenderMode::Named
    };
    let dialects: Vec<Dialect> = if all {
        Dialect::ALL.to_vec()
    } else {
        vec![config.effective_dialect().unwrap_or_default()]
    };

    let mut rendered = Vec::new();
    for dialect in dialects {
        let result = parsed.statement.to_sql_with_dialect(dialect, mode);
        rendered.push((dialect, result));
    }

    match cli.format {
        OutputFormat::Json => {
            let json: serde_json::Map<String, serde_json::Value> = rendered
                .iter()
                .map(|(d, r)| {
                    let value = match r {
                        Ok(r) => serde_json::to_value(r).unwrap_or_default(),
                        Err(e) => serde_json::json!({ "error": e.to_string() }),
                    };
                    (d.to_string(), value)
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Pretty => {
            for (dialect, result) in &rendered {
                match result {
                    Ok(r) => println!("{:12} {}", dialect.to_string().green(), r.sql),
                    Err(e) => println!("{:12} {}", dialect.to_string().red(), e),
                }
            }
        }
    }
    if !all {
        if let Some((_, Err(e))) = rendered.into_iter().next() {
            return Err(e.into());
        }
    }
    Ok(())
}

fn resolve_command(modules: &[DataModule], names: &[String], format: OutputFormat) -> Result<()> {
    let selected: Vec<&DataModule> = if names.is_empty() {
        modules.iter().collect()
    } else {
        names
            .iter()
            .map(|n| {
                modules
                    .iter()
                    .find(|m| m.name == *n)
                    .with_context(|| format!("no module named '{}'", n))
            })
            .collect::<Result<_>>()?
    };

    match format {
        OutputFormat::Json => {
            let json: serde_json::Map<String, serde_json::Value> = selected
                .iter()
                .map(|m| {
                    (
                        m.name.clone(),
                        serde_json::to_value(m.resolved()).unwrap_or_default(),
                    )
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Pretty => {
            for m in selected {
                let Some(resolved) = m.resolved() else {
                    continue;
                };
                let verdict = match &resolved.updatability {
                    polysql::module::Updatability::Updatable { table, .. } => {
                        format!("updatable ({})", table).green()
                    }
                    polysql::module::Updatability::ReadOnly { reason } => {
                        format!("read-only: {}", reason).yellow()
                    }
                };
                println!("{} {}", m.name.cyan().bold(), verdict);
                for c in &resolved.resolution.columns {
                    let null = if c.nullable { "null" } else { "not null" };
                    println!("  {:20} {:18} {}", c.name, c.logical.to_string(), null.dimmed());
                }
                for p in &resolved.resolution.parameters {
                    let flag = if p.low_confidence { " (fallback type)" } else { "" };
                    println!(
                        "  :{:19} {:18} x{}{}",
                        p.name,
                        p.logical.to_string(),
                        p.occurrences.len(),
                        flag.yellow()
                    );
                }
                for w in &resolved.resolution.warnings {
                    println!("  {} {}", "warning:".yellow(), w);
                }
            }
        }
    }
    Ok(())
}

/// Load every module and resolve it against the configured catalog.
async fn load_modules(config: &Config, catalog: Option<&Path>) -> Result<Vec<DataModule>> {
    let snapshot = match catalog.or(config.catalog.as_deref()) {
        Some(path) => CatalogSnapshot::load(path)?,
        None => {
            let url = config
                .database_url
                .as_deref()
                .context("no catalog; pass --catalog, or set catalog or database_url")?;
            introspect_url(url).await?
        }
    };
    let dialect = snapshot.dialect.or(config.dialect);
    let mut modules = module::load_dir(&config.modules_dir, dialect, &config.parser)?;
    for m in &mut modules {
        m.resolve(&snapshot, &config.resolver)
            .map_err(|e| polysql::error::PolyError::in_module(m.name.clone(), e))?;
    }
    Ok(modules)
}

fn parse_binding(module: &DataModule, bind: &str) -> Result<(String, Value)> {
    let (name, text) = bind
        .split_once('=')
        .with_context(|| format!("binding '{}' is not NAME=VALUE", bind))?;
    let param = module
        .parameters()
        .unwrap_or_default()
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .with_context(|| format!("module '{}' has no parameter ':{}'", module.name, name))?;
    let value = if text.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::parse_as(text, &param.logical).map_err(|e| anyhow::anyhow!(e))?
    };
    Ok((param.name.clone(), value))
}

fn print_rows(result: &polysql::executor::ResultSet) {
    let header: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
    println!("{}", header.join(" | ").bold());
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join(" | "));
    }
    println!("{}", format!("({} rows)", result.rows.len()).dimmed());
}
