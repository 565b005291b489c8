//! Inline `#name` references between data modules.
//!
//! A reference in FROM or JOIN is replaced by the referenced module's query
//! as a derived table, aliased by the reference's alias or else by the module
//! name with `/` turned into `_`. Parameters of the inlined query keep their
//! names unless a parameter of the referencing module binds them:
//!
//! ```json
//! { "parameters": { "ownerId": { "binds": { "pets": ["owner"] } } } }
//! ```
//!
//! Here `:owner` inside `#pets` becomes `:ownerId` of the outer module.

use super::{DataModule, ModuleOptions};
use crate::ast::visit::{NodeMut, walk_mut, walk_query_mut};
use crate::ast::{Ident, Statement, TableFactor};
use crate::catalog::did_you_mean;
use crate::error::{LinkError, PolyError};
use crate::parser::{ParserConfig, parse_with};
use crate::transpiler::ToSql;
use std::collections::BTreeMap;

/// Inner parameter renames, by lowercased reference alias then lowercased inner name.
type Binds = BTreeMap<String, BTreeMap<String, String>>;

/// Inline every module reference, in place. Linked modules are re-parsed
/// from their neutral rendering so positions match the new source text.
pub fn link(modules: &mut [DataModule], config: &ParserConfig) -> Result<(), PolyError> {
    if !modules.iter().any(|m| has_reference(&m.parsed.statement)) {
        return Ok(());
    }
    let mut linker = Linker {
        modules: &*modules,
        linked: BTreeMap::new(),
    };
    let mut relinked = Vec::new();
    for (index, module) in modules.iter().enumerate() {
        if !has_reference(&module.parsed.statement) {
            continue;
        }
        let statement = linker
            .linked(&module.name, &mut Vec::new())
            .map_err(|e| PolyError::in_module(module.name.clone(), e))?;
        relinked.push((index, statement));
    }

    for (index, statement) in relinked {
        let module = &mut modules[index];
        let source = statement.to_sql();
        module.parsed = parse_with(&source, None, config)
            .map_err(|e| PolyError::in_module(module.name.clone(), e))?;
        tracing::debug!(module = %module.name, "inlined module references");
    }
    Ok(())
}

struct Linker<'m> {
    modules: &'m [DataModule],
    /// Fully inlined statements by module name.
    linked: BTreeMap<String, Statement>,
}

impl<'m> Linker<'m> {
    fn module(&self, name: &str) -> Result<&'m DataModule, LinkError> {
        self.modules
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| {
                let names: Vec<&str> = self.modules.iter().map(|m| m.name.as_str()).collect();
                LinkError::UnknownModule {
                    module: name.to_string(),
                    suggestion: did_you_mean(name, &names),
                }
            })
    }

    /// The module's statement with every reference inlined. `chain` holds
    /// the modules being inlined above this one.
    fn linked(&mut self, name: &str, chain: &mut Vec<String>) -> Result<Statement, LinkError> {
        if let Some(done) = self.linked.get(name) {
            return Ok(done.clone());
        }
        if let Some(start) = chain.iter().position(|n| n == name) {
            let mut cycle = chain[start..].to_vec();
            cycle.push(name.to_string());
            return Err(LinkError::Cycle { chain: cycle });
        }
        let module = self.module(name)?;
        let binds = binds(&module.options);
        let mut statement = module.parsed.statement.clone();

        chain.push(name.to_string());
        walk_mut(&mut statement, &mut |node| match node {
            NodeMut::Factor(factor) => self.inline(factor, &binds, chain),
            NodeMut::Param(_) => Ok(()),
        })?;
        chain.pop();

        self.linked.insert(name.to_string(), statement.clone());
        Ok(statement)
    }

    fn inline(
        &mut self,
        factor: &mut TableFactor,
        binds: &Binds,
        chain: &mut Vec<String>,
    ) -> Result<(), LinkError> {
        let TableFactor::Module { name, alias } = factor else {
            return Ok(());
        };
        let name = name.clone();
        let alias = alias
            .take()
            .unwrap_or_else(|| Ident::new(name.replace('/', "_")));

        let Statement::Query(mut query) = self.linked(&name, chain)? else {
            return Err(LinkError::NotAQuery { module: name });
        };
        if let Some(renames) = binds.get(&alias.to_ascii_lowercase()) {
            walk_query_mut(&mut query, &mut |node| {
                if let NodeMut::Param(param) = node {
                    if let Some(outer) = renames.get(&param.name.to_ascii_lowercase()) {
                        param.name = outer.clone();
                    }
                }
                Ok::<(), LinkError>(())
            })?;
        }
        *factor = TableFactor::Derived {
            subquery: query,
            alias: Some(alias),
        };
        Ok(())
    }
}

fn binds(options: &ModuleOptions) -> Binds {
    let mut binds = Binds::new();
    for (outer, param) in &options.parameters {
        for (alias, inner) in &param.binds {
            let renames = binds.entry(alias.to_ascii_lowercase()).or_default();
            for name in inner {
                renames.insert(name.to_ascii_lowercase(), outer.clone());
            }
        }
    }
    binds
}

fn has_reference(statement: &Statement) -> bool {
    let mut statement = statement.clone();
    let mut found = false;
    let _ = walk_mut(&mut statement, &mut |node| {
        found |= matches!(node, NodeMut::Factor(TableFactor::Module { .. }));
        Ok::<(), LinkError>(())
    });
    found
}
