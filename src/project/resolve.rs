//! Placeholder name resolution.
//!
//! A bare `Name` resolves through the helper index. A dotted `pkg.Member`
//! resolves, in order, through:
//! 1. an explicit `//go:ahead import pkg=PATH` in a visible helper file
//! 2. a package-scope identifier `pkg` declared by a visible helper file
//! 3. an import named `pkg` in a visible helper file
//! 4. the toolchain's package lookup

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use super::{HelperSymbol, ProjectContext};
use crate::analysis::default_package_name;
use crate::exec::{ExecError, Toolchain};
use crate::report::debug;

/// An import the driver must declare.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
}

impl ImportSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            alias: None,
            path: path.into(),
        }
    }

    /// Import `path` so that it is reachable as `local`.
    ///
    /// The alias is dropped when it equals the package's own name.
    pub fn named(local: &str, path: impl Into<String>) -> Self {
        let path = path.into();
        let alias = if default_package_name(&path) == local {
            None
        } else {
            Some(local.to_string())
        };
        Self { alias, path }
    }

    pub fn local_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => default_package_name(&self.path),
        }
    }

    pub fn to_spec(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} {:?}", alias, self.path),
            None => format!("{:?}", self.path),
        }
    }
}

/// What a placeholder name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An exported helper function from the index.
    Helper(HelperSymbol),
    /// A member of an imported package.
    Package { import: ImportSpec, member: String },
    /// A member of a package-scope value declared in a helper file.
    Qualified { qualifier: String, member: String },
}

impl Target {
    /// Stable identity used for memoization.
    pub fn identity(&self) -> String {
        match self {
            Target::Helper(sym) => format!("{}#{}", sym.path.display(), sym.name),
            Target::Package { import, member } => format!("{}.{}", import.path, member),
            Target::Qualified { qualifier, member } => format!("{}.{}", qualifier, member),
        }
    }

    /// Declared output type; empty when unknown.
    pub fn output_type(&self) -> &str {
        match self {
            Target::Helper(sym) => sym.output_type(),
            _ => "",
        }
    }

    /// Declared parameter type at `index`, when known.
    pub fn param_type_at(&self, index: usize) -> Option<&str> {
        match self {
            Target::Helper(sym) => sym.signature.param_type_at(index),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Helper(sym) => write!(f, "{}", sym.name),
            Target::Package { import, member } => write!(f, "{}.{}", import.path, member),
            Target::Qualified { qualifier, member } => write!(f, "{}.{}", qualifier, member),
        }
    }
}

/// Resolution failures. All of them only skip the placeholder at hand.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no exported helper named {name:?} is visible from this directory")]
    UnknownHelper { name: String },
    #[error("unknown package {qualifier:?}; declare it in a helper file with `//go:ahead import {qualifier}=<import path>`")]
    UnknownPackage { qualifier: String },
    #[error("cannot look up package {qualifier:?}: {source}. Declaring `//go:ahead import {qualifier}=<import path>` in a helper file avoids the lookup")]
    Lookup {
        qualifier: String,
        #[source]
        source: ExecError,
    },
}

/// Resolves placeholder names within one project, caching package lookups.
pub struct Resolver<'a> {
    ctx: &'a ProjectContext,
    toolchain: &'a dyn Toolchain,
    packages: HashMap<String, Option<String>>,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a ProjectContext, toolchain: &'a dyn Toolchain) -> Self {
        Self {
            ctx,
            toolchain,
            packages: HashMap::new(),
        }
    }

    /// Resolve `name` as seen from a file at `depth`.
    pub fn resolve(&mut self, name: &str, depth: usize) -> Result<Target, ResolveError> {
        if let Some(sym) = self.ctx.index().lookup(name, depth) {
            return Ok(Target::Helper(sym.clone()));
        }

        let Some((qualifier, member)) = name.split_once('.') else {
            return Err(ResolveError::UnknownHelper {
                name: name.to_string(),
            });
        };
        let member = member.to_string();
        let visible: Vec<_> = self.ctx.visible_helpers(depth).collect();

        if let Some(alias) = visible
            .iter()
            .flat_map(|h| h.aliases.iter())
            .find(|a| a.alias == qualifier)
        {
            let import = ImportSpec::named(qualifier, alias.path.clone());
            return Ok(Target::Package { import, member });
        }

        if visible
            .iter()
            .any(|h| h.source.find_declaration(qualifier).is_some())
        {
            return Ok(Target::Qualified {
                qualifier: qualifier.to_string(),
                member,
            });
        }

        if let Some(import) = visible
            .iter()
            .flat_map(|h| h.source.imports.iter())
            .find(|i| i.local_name() == qualifier)
        {
            let import = ImportSpec::named(qualifier, import.path.clone());
            return Ok(Target::Package { import, member });
        }

        match self.lookup_package(qualifier)? {
            Some(path) => Ok(Target::Package {
                import: ImportSpec::named(qualifier, path),
                member,
            }),
            None => Err(ResolveError::UnknownPackage {
                qualifier: qualifier.to_string(),
            }),
        }
    }

    fn lookup_package(&mut self, qualifier: &str) -> Result<Option<String>, ResolveError> {
        if let Some(cached) = self.packages.get(qualifier) {
            return Ok(cached.clone());
        }
        let found = self
            .toolchain
            .resolve_package(self.ctx.root(), qualifier)
            .map_err(|source| ResolveError::Lookup {
                qualifier: qualifier.to_string(),
                source,
            })?;
        debug(format!(
            "package {} resolved to {}",
            qualifier,
            found.as_deref().unwrap_or("nothing")
        ));
        self.packages.insert(qualifier.to_string(), found.clone());
        Ok(found)
    }
}
